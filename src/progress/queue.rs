//! Ordering cards for a study session

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::models::UserProgress;
use crate::flashcards::Card;

pub const DEFAULT_QUEUE_LIMIT: usize = 20;
pub const MAX_QUEUE_LIMIT: usize = 100;

/// Why a card is in the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum QueueReason {
    Due,
    New,
    Review,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedCard {
    pub card: Card,
    pub reason: QueueReason,
    pub mastery: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
}

/// Clamp a requested queue size into `1..=MAX_QUEUE_LIMIT`.
pub fn clamp_limit(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_QUEUE_LIMIT).clamp(1, MAX_QUEUE_LIMIT)
}

/// Due cards (oldest due first), then never-studied cards in deck order,
/// then the rest by ascending mastery.
pub fn build_queue(cards: Vec<Card>, progress: Option<&UserProgress>, now: DateTime<Utc>, limit: usize) -> Vec<QueuedCard> {
    let mut due = Vec::new();
    let mut fresh = Vec::new();
    let mut review = Vec::new();

    for card in cards {
        match progress.and_then(|p| p.card(card.id)) {
            Some(entry) if entry.is_due(now) => due.push(QueuedCard {
                reason: QueueReason::Due,
                mastery: entry.mastery,
                due_at: entry.due_at,
                card,
            }),
            Some(entry) => review.push(QueuedCard {
                reason: QueueReason::Review,
                mastery: entry.mastery,
                due_at: entry.due_at,
                card,
            }),
            None => fresh.push(QueuedCard {
                reason: QueueReason::New,
                mastery: 0.0,
                due_at: None,
                card,
            }),
        }
    }

    due.sort_by_key(|q| q.due_at);
    fresh.sort_by_key(|q| q.card.position);
    review.sort_by(|a, b| a.mastery.total_cmp(&b.mastery).then(a.card.position.cmp(&b.card.position)));

    due.into_iter().chain(fresh).chain(review).take(limit).collect()
}
