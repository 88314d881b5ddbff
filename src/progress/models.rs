//! Data models for study progress

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::mastery::{card_mastery, deck_stats, round1};
use crate::flashcards::algorithm::{calculate_next_review, ReviewState};

/// Retention limits applied when recording ratings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressLimits {
    pub session_log_limit: usize,
    pub rating_history_limit: usize,
}

impl Default for ProgressLimits {
    fn default() -> Self {
        Self {
            session_log_limit: 30,
            rating_history_limit: 5,
        }
    }
}

impl From<&crate::settings::SystemSettings> for ProgressLimits {
    fn from(settings: &crate::settings::SystemSettings) -> Self {
        Self {
            session_log_limit: settings.session_log_limit.max(1) as usize,
            rating_history_limit: settings.rating_history_limit.max(1) as usize,
        }
    }
}

/// One user's state on one card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardProgress {
    pub card_id: Uuid,
    /// Most recent ratings, oldest first
    pub ratings: Vec<u8>,
    pub last_rating: u8,
    pub mastery: f64,
    pub review_count: u32,
    pub ease_factor: f32,
    pub interval_days: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

impl CardProgress {
    pub fn new(card_id: Uuid) -> Self {
        let review = ReviewState::default();
        Self {
            card_id,
            ratings: Vec::new(),
            last_rating: 0,
            mastery: 0.0,
            review_count: review.review_count,
            ease_factor: review.ease_factor,
            interval_days: review.interval_days,
            due_at: None,
            last_reviewed_at: None,
        }
    }

    pub fn review_state(&self) -> ReviewState {
        ReviewState {
            review_count: self.review_count,
            interval_days: self.interval_days,
            ease_factor: self.ease_factor,
        }
    }

    fn apply(&mut self, rating: u8, history_limit: usize, now: DateTime<Utc>) {
        self.ratings.push(rating);
        if self.ratings.len() > history_limit {
            let excess = self.ratings.len() - history_limit;
            self.ratings.drain(..excess);
        }
        self.last_rating = rating;
        self.mastery = round1(card_mastery(&self.ratings));

        let next = calculate_next_review(&self.review_state(), rating, now);
        self.review_count = next.state.review_count;
        self.interval_days = next.state.interval_days;
        self.ease_factor = next.state.ease_factor;
        self.due_at = Some(next.due_at);
        self.last_reviewed_at = Some(now);
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at.map_or(false, |due| due <= now)
    }
}

/// Study activity of one UTC day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySession {
    pub date: NaiveDate,
    /// Distinct cards rated that day
    pub cards_studied: u32,
    pub ratings: u32,
    pub average_rating: f64,
    pub duration_seconds: u64,
    pub mastery_after: f64,
    #[serde(default)]
    pub rating_total: u32,
    #[serde(default)]
    pub card_ids: Vec<Uuid>,
}

impl StudySession {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            cards_studied: 0,
            ratings: 0,
            average_rating: 0.0,
            duration_seconds: 0,
            mastery_after: 0.0,
            rating_total: 0,
            card_ids: Vec::new(),
        }
    }

    fn record(&mut self, card_id: Uuid, rating: u8) {
        self.ratings += 1;
        self.rating_total += u32::from(rating);
        self.average_rating = round1(f64::from(self.rating_total) / f64::from(self.ratings));
        if !self.card_ids.contains(&card_id) {
            self.card_ids.push(card_id);
        }
        self.cards_studied = self.card_ids.len() as u32;
    }
}

/// A user's progress on one deck. At most one exists per (user, deck).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub deck_id: Uuid,
    pub mastery_percentage: f64,
    pub average_rating: f64,
    pub total_ratings: u32,
    pub cards_studied: u32,
    pub total_study_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_studied_at: Option<DateTime<Utc>>,
    /// Daily sessions, newest last
    #[serde(default)]
    pub sessions: Vec<StudySession>,
    #[serde(default)]
    pub cards: Vec<CardProgress>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProgress {
    pub fn new(user_id: Uuid, deck_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            deck_id,
            mastery_percentage: 0.0,
            average_rating: 0.0,
            total_ratings: 0,
            cards_studied: 0,
            total_study_seconds: 0,
            last_studied_at: None,
            sessions: Vec::new(),
            cards: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn card(&self, card_id: Uuid) -> Option<&CardProgress> {
        self.cards.iter().find(|c| c.card_id == card_id)
    }

    fn card_mut(&mut self, card_id: Uuid) -> &mut CardProgress {
        let index = match self.cards.iter().position(|c| c.card_id == card_id) {
            Some(index) => index,
            None => {
                self.cards.push(CardProgress::new(card_id));
                self.cards.len() - 1
            }
        };
        &mut self.cards[index]
    }

    fn session_mut(&mut self, date: NaiveDate, limit: usize) -> &mut StudySession {
        if self.sessions.last().map(|s| s.date) != Some(date) {
            self.sessions.push(StudySession::new(date));
            if self.sessions.len() > limit {
                let excess = self.sessions.len() - limit;
                self.sessions.drain(..excess);
            }
        }
        let last = self.sessions.len() - 1;
        &mut self.sessions[last]
    }

    /// Apply ratings given at `now`, then refresh deck stats against the
    /// deck's current card list. Ratings must already be validated.
    pub fn record_ratings(
        &mut self,
        ratings: &[(Uuid, u8)],
        duration_seconds: u64,
        deck_card_ids: &[Uuid],
        limits: ProgressLimits,
        now: DateTime<Utc>,
    ) {
        for &(card_id, rating) in ratings {
            self.card_mut(card_id).apply(rating, limits.rating_history_limit, now);
            self.session_mut(now.date_naive(), limits.session_log_limit)
                .record(card_id, rating);
        }

        self.total_ratings += ratings.len() as u32;
        self.total_study_seconds += duration_seconds;
        self.last_studied_at = Some(now);
        self.recompute(deck_card_ids);

        let mastery = self.mastery_percentage;
        let session = self.session_mut(now.date_naive(), limits.session_log_limit);
        session.duration_seconds += duration_seconds;
        session.mastery_after = mastery;
        self.updated_at = now;
    }

    /// Refresh the aggregate figures for the deck's current cards.
    pub fn recompute(&mut self, deck_card_ids: &[Uuid]) {
        let stats = deck_stats(&self.cards, deck_card_ids);
        self.mastery_percentage = stats.mastery_percentage;
        self.average_rating = stats.average_rating;
        self.cards_studied = stats.cards_studied;
    }

    /// Forget a deleted card. Returns true if the record had an entry for it.
    pub fn remove_card(&mut self, card_id: Uuid, deck_card_ids: &[Uuid]) -> bool {
        let before = self.cards.len();
        self.cards.retain(|c| c.card_id != card_id);
        self.recompute(deck_card_ids);
        self.cards.len() != before
    }
}

/// Ratings of a batch study session
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingEntry {
    pub card_id: Uuid,
    pub rating: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateCardRequest {
    pub card_id: Uuid,
    pub rating: i64,
    #[serde(default)]
    pub duration_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySessionRequest {
    pub ratings: Vec<RatingEntry>,
    #[serde(default)]
    pub duration_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_rating_history_is_capped() {
        let card = Uuid::new_v4();
        let mut progress = UserProgress::new(Uuid::new_v4(), Uuid::new_v4());
        let limits = ProgressLimits {
            session_log_limit: 30,
            rating_history_limit: 3,
        };

        for rating in [1, 2, 3, 4, 5] {
            progress.record_ratings(&[(card, rating)], 0, &[card], limits, at(1, 9));
        }

        let entry = progress.card(card).unwrap();
        assert_eq!(entry.ratings, vec![3, 4, 5]);
        assert_eq!(entry.last_rating, 5);
        assert_eq!(progress.total_ratings, 5);
    }

    #[test]
    fn test_same_day_ratings_share_a_session() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut progress = UserProgress::new(Uuid::new_v4(), Uuid::new_v4());
        let limits = ProgressLimits::default();

        progress.record_ratings(&[(a, 5), (b, 3)], 60, &[a, b], limits, at(1, 9));
        progress.record_ratings(&[(a, 4)], 30, &[a, b], limits, at(1, 18));

        assert_eq!(progress.sessions.len(), 1);
        let session = &progress.sessions[0];
        assert_eq!(session.ratings, 3);
        assert_eq!(session.cards_studied, 2);
        assert_eq!(session.average_rating, 4.0);
        assert_eq!(session.duration_seconds, 90);
        assert_eq!(session.mastery_after, progress.mastery_percentage);
        assert_eq!(progress.total_study_seconds, 90);
    }

    #[test]
    fn test_session_log_is_capped() {
        let card = Uuid::new_v4();
        let mut progress = UserProgress::new(Uuid::new_v4(), Uuid::new_v4());
        let limits = ProgressLimits {
            session_log_limit: 2,
            rating_history_limit: 5,
        };

        for day in 1..=4 {
            progress.record_ratings(&[(card, 3)], 0, &[card], limits, at(day, 9));
        }

        let dates: Vec<u32> = progress.sessions.iter().map(|s| chrono::Datelike::day(&s.date)).collect();
        assert_eq!(dates, vec![3, 4]);
    }

    #[test]
    fn test_deck_mastery_uses_deck_size() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut progress = UserProgress::new(Uuid::new_v4(), Uuid::new_v4());

        progress.record_ratings(&[(a, 5)], 0, &[a, b], ProgressLimits::default(), at(1, 9));

        assert_eq!(progress.mastery_percentage, 50.0);
        assert_eq!(progress.cards_studied, 1);
        assert_eq!(progress.average_rating, 5.0);
    }

    #[test]
    fn test_deck_mastery_rounds_only_the_deck_figure() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut progress = UserProgress::new(Uuid::new_v4(), Uuid::new_v4());

        progress.record_ratings(&[(a, 1), (a, 5)], 0, &[a, b], ProgressLimits::default(), at(1, 9));

        assert_eq!(progress.card(a).unwrap().mastery, 66.7);
        assert_eq!(progress.mastery_percentage, 33.3);
    }

    #[test]
    fn test_rating_schedules_next_review() {
        let card = Uuid::new_v4();
        let mut progress = UserProgress::new(Uuid::new_v4(), Uuid::new_v4());
        let now = at(1, 9);

        progress.record_ratings(&[(card, 4)], 0, &[card], ProgressLimits::default(), now);

        let entry = progress.card(card).unwrap();
        assert_eq!(entry.due_at, Some(now + Duration::days(1)));
        assert!(!entry.is_due(now));
        assert!(entry.is_due(now + Duration::days(2)));
    }

    #[test]
    fn test_remove_card_recomputes() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut progress = UserProgress::new(Uuid::new_v4(), Uuid::new_v4());
        progress.record_ratings(&[(a, 5), (b, 1)], 0, &[a, b], ProgressLimits::default(), at(1, 9));
        assert_eq!(progress.mastery_percentage, 50.0);

        assert!(progress.remove_card(b, &[a]));
        assert_eq!(progress.mastery_percentage, 100.0);
        assert_eq!(progress.cards_studied, 1);
        assert!(!progress.remove_card(b, &[a]));
    }
}
