//! Storage operations for progress records
//!
//! One row per (user, deck). The session log and per-card entries are
//! embedded JSON columns.

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::models::UserProgress;
use crate::storage::{json_column, to_json, Result};

const PROGRESS_COLUMNS: &str = "id, user_id, deck_id, mastery_percentage, average_rating, total_ratings, \
                                cards_studied, total_study_seconds, last_studied_at, sessions, cards, \
                                created_at, updated_at";

fn parse_progress_row(row: &Row<'_>) -> rusqlite::Result<UserProgress> {
    let seconds: i64 = row.get("total_study_seconds")?;
    Ok(UserProgress {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        deck_id: row.get("deck_id")?,
        mastery_percentage: row.get("mastery_percentage")?,
        average_rating: row.get("average_rating")?,
        total_ratings: row.get("total_ratings")?,
        cards_studied: row.get("cards_studied")?,
        total_study_seconds: seconds.max(0) as u64,
        last_studied_at: row.get("last_studied_at")?,
        sessions: json_column(row, "sessions")?,
        cards: json_column(row, "cards")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn query(conn: &Connection, where_clause: &str, id: Uuid) -> Result<Vec<UserProgress>> {
    let sql = format!(
        "SELECT {} FROM user_progress {} ORDER BY updated_at DESC",
        PROGRESS_COLUMNS, where_clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(params![id], parse_progress_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

pub fn get(conn: &Connection, user_id: Uuid, deck_id: Uuid) -> Result<Option<UserProgress>> {
    let sql = format!(
        "SELECT {} FROM user_progress WHERE user_id = ?1 AND deck_id = ?2",
        PROGRESS_COLUMNS
    );
    Ok(conn
        .query_row(&sql, params![user_id, deck_id], parse_progress_row)
        .optional()?)
}

pub fn list_for_user(conn: &Connection, user_id: Uuid) -> Result<Vec<UserProgress>> {
    query(conn, "WHERE user_id = ?1", user_id)
}

pub fn list_for_deck(conn: &Connection, deck_id: Uuid) -> Result<Vec<UserProgress>> {
    query(conn, "WHERE deck_id = ?1", deck_id)
}

/// Insert the record, or overwrite the existing one for the same (user, deck).
pub fn save(conn: &Connection, progress: &UserProgress) -> Result<()> {
    conn.execute(
        "INSERT INTO user_progress (id, user_id, deck_id, mastery_percentage, average_rating, total_ratings,
                                    cards_studied, total_study_seconds, last_studied_at, sessions, cards,
                                    created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
         ON CONFLICT(user_id, deck_id) DO UPDATE SET
             mastery_percentage = excluded.mastery_percentage,
             average_rating = excluded.average_rating,
             total_ratings = excluded.total_ratings,
             cards_studied = excluded.cards_studied,
             total_study_seconds = excluded.total_study_seconds,
             last_studied_at = excluded.last_studied_at,
             sessions = excluded.sessions,
             cards = excluded.cards,
             updated_at = excluded.updated_at",
        params![
            progress.id,
            progress.user_id,
            progress.deck_id,
            progress.mastery_percentage,
            progress.average_rating,
            progress.total_ratings,
            progress.cards_studied,
            progress.total_study_seconds as i64,
            progress.last_studied_at,
            to_json(&progress.sessions)?,
            to_json(&progress.cards)?,
            progress.created_at,
            progress.updated_at,
        ],
    )?;
    Ok(())
}

/// Reset a user's progress on a deck. Returns false when there was none.
pub fn delete(conn: &Connection, user_id: Uuid, deck_id: Uuid) -> Result<bool> {
    let changed = conn.execute(
        "DELETE FROM user_progress WHERE user_id = ?1 AND deck_id = ?2",
        params![user_id, deck_id],
    )?;
    Ok(changed > 0)
}

pub fn count(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM user_progress", [], |row| row.get(0))?;
    Ok(count as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flashcards::{self, Deck};
    use crate::progress::ProgressLimits;
    use crate::storage::Database;
    use crate::users::{self, Role, User};
    use chrono::Utc;

    fn setup() -> (Database, User, Deck) {
        let db = Database::in_memory().unwrap();
        let user = User::new("sam".into(), "sam@example.com".into(), "h".into(), Role::Student);
        let deck = Deck::new(user.id, "Cells".into());
        db.write(|tx| {
            users::storage::insert(tx, &user)?;
            flashcards::storage::insert_deck(tx, &deck)
        })
        .unwrap();
        (db, user, deck)
    }

    #[test]
    fn test_save_is_unique_per_user_and_deck() {
        let (db, user, deck) = setup();
        let card = Uuid::new_v4();

        let mut first = UserProgress::new(user.id, deck.id);
        first.record_ratings(&[(card, 5)], 10, &[card], ProgressLimits::default(), Utc::now());
        db.write(|tx| save(tx, &first)).unwrap();

        // A second record for the same pair overwrites instead of duplicating
        let mut second = UserProgress::new(user.id, deck.id);
        second.record_ratings(&[(card, 1)], 5, &[card], ProgressLimits::default(), Utc::now());
        db.write(|tx| save(tx, &second)).unwrap();

        assert_eq!(db.read(count).unwrap(), 1);
        let loaded = db.read(|conn| get(conn, user.id, deck.id)).unwrap().unwrap();
        assert_eq!(loaded.id, first.id);
        assert_eq!(loaded.total_study_seconds, 5);
        assert_eq!(loaded.cards.len(), 1);
        assert_eq!(loaded.sessions.len(), 1);
    }

    #[test]
    fn test_delete_and_cascade() {
        let (db, user, deck) = setup();
        db.write(|tx| save(tx, &UserProgress::new(user.id, deck.id))).unwrap();

        assert_eq!(db.read(|conn| list_for_user(conn, user.id)).unwrap().len(), 1);
        assert!(db.write(|tx| delete(tx, user.id, deck.id)).unwrap());
        assert!(!db.write(|tx| delete(tx, user.id, deck.id)).unwrap());

        db.write(|tx| save(tx, &UserProgress::new(user.id, deck.id))).unwrap();
        db.write(|tx| flashcards::storage::delete_deck(tx, deck.id)).unwrap();
        assert_eq!(db.read(|conn| list_for_deck(conn, deck.id)).unwrap().len(), 0);
    }
}
