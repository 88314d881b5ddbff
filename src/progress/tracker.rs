//! Recording study activity
//!
//! Every rating updates the user's progress record for the deck, the card's
//! review schedule and the user's daily streak in the caller's transaction.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use super::mastery::validate_rating;
use super::models::{ProgressLimits, UserProgress};
use super::storage;
use crate::flashcards;
use crate::settings;
use crate::storage::{Result, StorageError};
use crate::users::{self, streak::advance_streak};

/// Record a batch of `(card, rating)` pairs for `user_id` on `deck_id`.
///
/// Nothing is written unless every rating is in range and every card
/// belongs to the deck.
pub fn record_study(
    conn: &Connection,
    user_id: Uuid,
    deck_id: Uuid,
    ratings: &[(Uuid, i64)],
    duration_seconds: u64,
    now: DateTime<Utc>,
) -> Result<UserProgress> {
    if ratings.is_empty() {
        return Err(StorageError::Invalid("At least one rating is required".to_string()));
    }

    let deck = flashcards::storage::require_deck(conn, deck_id)?;
    let mut checked = Vec::with_capacity(ratings.len());
    for &(card_id, rating) in ratings {
        let rating = validate_rating(rating).map_err(StorageError::Invalid)?;
        if !deck.card_ids.contains(&card_id) {
            return Err(StorageError::Invalid(format!(
                "Card {} does not belong to deck {}",
                card_id, deck_id
            )));
        }
        checked.push((card_id, rating));
    }

    let limits = ProgressLimits::from(&settings::load(conn)?);
    let mut progress = storage::get(conn, user_id, deck_id)?.unwrap_or_else(|| UserProgress::new(user_id, deck_id));
    progress.record_ratings(&checked, duration_seconds, &deck.card_ids, limits, now);
    storage::save(conn, &progress)?;

    touch_streak(conn, user_id, now)?;

    log::debug!(
        "Recorded {} rating(s) for user {} on deck {} (mastery {:.1}%)",
        checked.len(),
        user_id,
        deck_id,
        progress.mastery_percentage
    );
    Ok(progress)
}

fn touch_streak(conn: &Connection, user_id: Uuid, now: DateTime<Utc>) -> Result<()> {
    let user = users::storage::require(conn, user_id)?;
    let today = now.date_naive();

    let streak = advance_streak(user.study_streak, user.last_studied_on, today);
    let longest = user.longest_streak.max(streak);
    users::storage::update_streak(conn, user_id, streak, longest, today)
}

/// Progress of `user_id` on the deck as it stands now. Users who never
/// studied the deck get a zeroed record that is not persisted.
pub fn current_progress(conn: &Connection, user_id: Uuid, deck_id: Uuid) -> Result<UserProgress> {
    let card_ids = flashcards::storage::card_ids(conn, deck_id)?;
    let mut progress = storage::get(conn, user_id, deck_id)?.unwrap_or_else(|| UserProgress::new(user_id, deck_id));
    // Cards may have been added since the last rating
    progress.recompute(&card_ids);
    Ok(progress)
}

/// Every progress record of `user_id`, each recomputed against its deck's
/// current cards.
pub fn list_current_progress(conn: &Connection, user_id: Uuid) -> Result<Vec<UserProgress>> {
    let mut records = storage::list_for_user(conn, user_id)?;
    for progress in &mut records {
        let card_ids = flashcards::storage::card_ids(conn, progress.deck_id)?;
        progress.recompute(&card_ids);
    }
    Ok(records)
}

/// Drop a deleted card from every progress record of its deck.
/// Call after the card row is gone. Returns the number of records changed.
pub fn forget_card(conn: &Connection, deck_id: Uuid, card_id: Uuid) -> Result<usize> {
    let card_ids = flashcards::storage::card_ids(conn, deck_id)?;
    let mut changed = 0;

    for mut progress in storage::list_for_deck(conn, deck_id)? {
        if progress.remove_card(card_id, &card_ids) {
            progress.updated_at = Utc::now();
            storage::save(conn, &progress)?;
            changed += 1;
        }
    }
    Ok(changed)
}
