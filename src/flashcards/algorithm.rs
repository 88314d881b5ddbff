//! SM-2 Spaced Repetition Algorithm
//!
//! Study ratings run from 1 to 5 and are used directly as the SM-2 quality:
//! - 1: No recall
//! - 2: Incorrect, but the answer was familiar
//! - 3: Correct with serious difficulty
//! - 4: Correct after hesitation
//! - 5: Perfect recall

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Minimum ease factor allowed
pub const MIN_EASE_FACTOR: f32 = 1.3;

/// Ease factor of a card that has never been reviewed
pub const DEFAULT_EASE_FACTOR: f32 = 2.5;

/// Scheduling state carried by a card's progress entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewState {
    pub review_count: u32,
    pub interval_days: i32,
    pub ease_factor: f32,
}

impl Default for ReviewState {
    fn default() -> Self {
        Self {
            review_count: 0,
            interval_days: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
        }
    }
}

/// Result of calculating the next review
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewResult {
    pub state: ReviewState,
    pub due_at: DateTime<Utc>,
}

/// Calculate the next review interval and ease factor for a rating given at `now`.
pub fn calculate_next_review(state: &ReviewState, rating: u8, now: DateTime<Utc>) -> ReviewResult {
    let quality = i32::from(rating.clamp(1, 5));

    let mut ease_factor = state.ease_factor;
    let interval;

    if quality >= 3 {
        interval = match state.review_count {
            0 => 1,
            1 => 6,
            _ => ((state.interval_days.max(1) as f32) * ease_factor).round() as i32,
        };

        // EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02))
        ease_factor += 0.1 - (5 - quality) as f32 * (0.08 + (5 - quality) as f32 * 0.02);
        ease_factor = ease_factor.max(MIN_EASE_FACTOR);
    } else {
        // Failed recall starts the card over
        interval = 1;
        ease_factor = (ease_factor - 0.2).max(MIN_EASE_FACTOR);
    }

    let review_count = if quality >= 3 { state.review_count + 1 } else { 0 };

    ReviewResult {
        state: ReviewState {
            review_count,
            interval_days: interval,
            ease_factor,
        },
        due_at: now + Duration::days(interval as i64),
    }
}
