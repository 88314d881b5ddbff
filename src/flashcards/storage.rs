//! Storage operations for decks and cards
//!
//! Tables:
//! ```text
//! decks       one row per deck, creator_id -> users
//! cards       one row per card, deck_id -> decks, ordered by position
//! user_decks  the creator's and assignees' deck lists
//! class_decks decks attached to classes
//! ```
//! Deleting a deck cascades to its cards, progress records, assignments and
//! both link tables.

use std::collections::HashSet;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::models::*;
use crate::storage::{json_column, parsed_column, to_json, Result, StorageError};
use crate::users::storage::{link_deck, DeckRelation};

const DECK_COLUMNS: &str = "id, name, description, creator_id, created_at, updated_at";
const CARD_COLUMNS: &str =
    "id, deck_id, question, answer, card_type, options, image, position, created_at, updated_at";

fn parse_deck_row(row: &Row<'_>) -> rusqlite::Result<Deck> {
    Ok(Deck {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        creator_id: row.get("creator_id")?,
        card_ids: Vec::new(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_card_row(row: &Row<'_>) -> rusqlite::Result<Card> {
    let image: Option<String> = row.get("image")?;
    let image = match image {
        Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?),
        None => None,
    };

    Ok(Card {
        id: row.get("id")?,
        deck_id: row.get("deck_id")?,
        question: row.get("question")?,
        answer: row.get("answer")?,
        card_type: parsed_column(row, "card_type")?,
        options: json_column(row, "options")?,
        image,
        position: row.get("position")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn query_decks(conn: &Connection, sql: &str, param: Option<Uuid>) -> Result<Vec<Deck>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = match param {
        Some(id) => stmt.query_map(params![id], parse_deck_row)?,
        None => stmt.query_map([], parse_deck_row)?,
    };
    let mut decks = rows.collect::<rusqlite::Result<Vec<_>>>()?;

    for deck in &mut decks {
        deck.card_ids = card_ids(conn, deck.id)?;
    }
    Ok(decks)
}

// ==================== Deck Operations ====================

/// Insert a deck and put it in its creator's deck list.
pub fn insert_deck(conn: &Connection, deck: &Deck) -> Result<()> {
    conn.execute(
        "INSERT INTO decks (id, name, description, creator_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            deck.id,
            deck.name,
            deck.description,
            deck.creator_id,
            deck.created_at,
            deck.updated_at,
        ],
    )?;
    link_deck(conn, deck.creator_id, deck.id, DeckRelation::Created, None)?;
    Ok(())
}

pub fn get_deck(conn: &Connection, id: Uuid) -> Result<Option<Deck>> {
    let sql = format!("SELECT {} FROM decks WHERE id = ?1", DECK_COLUMNS);
    let deck = conn.query_row(&sql, params![id], parse_deck_row).optional()?;

    match deck {
        Some(mut deck) => {
            deck.card_ids = card_ids(conn, deck.id)?;
            Ok(Some(deck))
        }
        None => Ok(None),
    }
}

pub fn require_deck(conn: &Connection, id: Uuid) -> Result<Deck> {
    get_deck(conn, id)?.ok_or_else(|| StorageError::NotFound(format!("Deck {}", id)))
}

pub fn list_all_decks(conn: &Connection) -> Result<Vec<Deck>> {
    let sql = format!("SELECT {} FROM decks ORDER BY name COLLATE NOCASE", DECK_COLUMNS);
    query_decks(conn, &sql, None)
}

/// Decks a non-admin user may open: created, assigned, or attached to a
/// class the user teaches or is enrolled in.
pub fn list_visible_decks(conn: &Connection, user_id: Uuid) -> Result<Vec<Deck>> {
    let sql = format!(
        "SELECT {} FROM decks WHERE id IN (
            SELECT deck_id FROM user_decks WHERE user_id = ?1
            UNION SELECT id FROM decks WHERE creator_id = ?1
            UNION SELECT cd.deck_id FROM class_decks cd
                  JOIN class_students cs ON cs.class_id = cd.class_id
                  WHERE cs.student_id = ?1
            UNION SELECT cd.deck_id FROM class_decks cd
                  JOIN classes c ON c.id = cd.class_id
                  WHERE c.teacher_id = ?1
         ) ORDER BY name COLLATE NOCASE",
        DECK_COLUMNS
    );
    query_decks(conn, &sql, Some(user_id))
}

/// Decks in the user's own deck list (created or assigned)
pub fn list_user_decks(conn: &Connection, user_id: Uuid) -> Result<Vec<Deck>> {
    let sql = format!(
        "SELECT {} FROM decks d JOIN user_decks ud ON ud.deck_id = d.id
         WHERE ud.user_id = ?1 ORDER BY ud.added_at",
        DECK_COLUMNS
            .split(", ")
            .map(|c| format!("d.{}", c))
            .collect::<Vec<_>>()
            .join(", ")
    );
    query_decks(conn, &sql, Some(user_id))
}

pub fn update_deck(conn: &Connection, deck: &Deck) -> Result<()> {
    let changed = conn.execute(
        "UPDATE decks SET name = ?2, description = ?3, updated_at = ?4 WHERE id = ?1",
        params![deck.id, deck.name, deck.description, Utc::now()],
    )?;
    if changed == 0 {
        return Err(StorageError::NotFound(format!("Deck {}", deck.id)));
    }
    Ok(())
}

fn touch_deck(conn: &Connection, id: Uuid) -> Result<()> {
    conn.execute("UPDATE decks SET updated_at = ?2 WHERE id = ?1", params![id, Utc::now()])?;
    Ok(())
}

/// Delete a deck with its cards, progress records, assignments and links.
pub fn delete_deck(conn: &Connection, id: Uuid) -> Result<()> {
    let changed = conn.execute("DELETE FROM decks WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(StorageError::NotFound(format!("Deck {}", id)));
    }
    Ok(())
}

pub fn count_decks(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM decks", [], |row| row.get(0))?;
    Ok(count as u64)
}

// ==================== Card Operations ====================

/// Ids of the deck's cards in study order
pub fn card_ids(conn: &Connection, deck_id: Uuid) -> Result<Vec<Uuid>> {
    let mut stmt = conn.prepare("SELECT id FROM cards WHERE deck_id = ?1 ORDER BY position, created_at")?;
    let ids = stmt
        .query_map(params![deck_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<Uuid>>>()?;
    Ok(ids)
}

pub fn list_cards(conn: &Connection, deck_id: Uuid) -> Result<Vec<Card>> {
    let sql = format!(
        "SELECT {} FROM cards WHERE deck_id = ?1 ORDER BY position, created_at",
        CARD_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let cards = stmt
        .query_map(params![deck_id], parse_card_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(cards)
}

pub fn get_card(conn: &Connection, id: Uuid) -> Result<Option<Card>> {
    let sql = format!("SELECT {} FROM cards WHERE id = ?1", CARD_COLUMNS);
    Ok(conn.query_row(&sql, params![id], parse_card_row).optional()?)
}

pub fn require_card(conn: &Connection, id: Uuid) -> Result<Card> {
    get_card(conn, id)?.ok_or_else(|| StorageError::NotFound(format!("Card {}", id)))
}

/// Append a card to the end of its deck. Sets `card.position`.
pub fn insert_card(conn: &Connection, card: &mut Card) -> Result<()> {
    let next: i32 = conn.query_row(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM cards WHERE deck_id = ?1",
        params![card.deck_id],
        |row| row.get(0),
    )?;
    card.position = next;

    conn.execute(
        "INSERT INTO cards (id, deck_id, question, answer, card_type, options, image, position,
                            created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            card.id,
            card.deck_id,
            card.question,
            card.answer,
            card.card_type.as_str(),
            to_json(&card.options)?,
            card.image.as_ref().map(to_json).transpose()?,
            card.position,
            card.created_at,
            card.updated_at,
        ],
    )?;
    touch_deck(conn, card.deck_id)?;
    Ok(())
}

pub fn update_card(conn: &Connection, card: &Card) -> Result<()> {
    let changed = conn.execute(
        "UPDATE cards SET question = ?2, answer = ?3, card_type = ?4, options = ?5, image = ?6,
                          updated_at = ?7
         WHERE id = ?1",
        params![
            card.id,
            card.question,
            card.answer,
            card.card_type.as_str(),
            to_json(&card.options)?,
            card.image.as_ref().map(to_json).transpose()?,
            Utc::now(),
        ],
    )?;
    if changed == 0 {
        return Err(StorageError::NotFound(format!("Card {}", card.id)));
    }
    touch_deck(conn, card.deck_id)?;
    Ok(())
}

pub fn delete_card(conn: &Connection, id: Uuid) -> Result<Card> {
    let card = require_card(conn, id)?;
    conn.execute("DELETE FROM cards WHERE id = ?1", params![id])?;
    touch_deck(conn, card.deck_id)?;
    Ok(card)
}

/// Rewrite card positions. `ordered` must contain every card of the deck
/// exactly once.
pub fn reorder_cards(conn: &Connection, deck_id: Uuid, ordered: &[Uuid]) -> Result<()> {
    let current: HashSet<Uuid> = card_ids(conn, deck_id)?.into_iter().collect();
    let requested: HashSet<Uuid> = ordered.iter().copied().collect();

    if requested.len() != ordered.len() || requested != current {
        return Err(StorageError::Invalid(
            "Card order must list every card of the deck exactly once".to_string(),
        ));
    }

    let mut stmt = conn.prepare("UPDATE cards SET position = ?2 WHERE id = ?1")?;
    for (position, id) in ordered.iter().enumerate() {
        stmt.execute(params![id, position as i64])?;
    }
    touch_deck(conn, deck_id)?;
    Ok(())
}

pub fn count_cards(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))?;
    Ok(count as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use crate::users::{self, Role, User};

    fn setup() -> (Database, User) {
        let db = Database::in_memory().unwrap();
        let owner = User::new("tess".into(), "tess@example.com".into(), "hash".into(), Role::Teacher);
        db.write(|tx| users::storage::insert(tx, &owner)).unwrap();
        (db, owner)
    }

    fn basic(deck_id: Uuid, question: &str) -> Card {
        Card::new(
            deck_id,
            CardContent {
                question: question.to_string(),
                answer: "answer".to_string(),
                card_type: CardType::Basic,
                options: Vec::new(),
                image: None,
            },
        )
    }

    #[test]
    fn test_create_deck_links_creator() {
        let (db, owner) = setup();
        let deck = Deck::new(owner.id, "Biology".into());
        db.write(|tx| insert_deck(tx, &deck)).unwrap();

        let loaded = db.read(|conn| users::storage::require(conn, owner.id)).unwrap();
        assert_eq!(loaded.deck_ids, vec![deck.id]);
        assert_eq!(db.read(|conn| list_user_decks(conn, owner.id)).unwrap().len(), 1);
    }

    #[test]
    fn test_cards_append_in_order() {
        let (db, owner) = setup();
        let deck = Deck::new(owner.id, "Biology".into());
        db.write(|tx| insert_deck(tx, &deck)).unwrap();

        let mut first = basic(deck.id, "first");
        let mut second = basic(deck.id, "second");
        db.write(|tx| {
            insert_card(tx, &mut first)?;
            insert_card(tx, &mut second)
        })
        .unwrap();

        assert_eq!(first.position, 0);
        assert_eq!(second.position, 1);

        let loaded = db.read(|conn| require_deck(conn, deck.id)).unwrap();
        assert_eq!(loaded.card_ids, vec![first.id, second.id]);
    }

    #[test]
    fn test_reorder_requires_permutation() {
        let (db, owner) = setup();
        let deck = Deck::new(owner.id, "Biology".into());
        let mut a = basic(deck.id, "a");
        let mut b = basic(deck.id, "b");
        db.write(|tx| {
            insert_deck(tx, &deck)?;
            insert_card(tx, &mut a)?;
            insert_card(tx, &mut b)
        })
        .unwrap();

        db.write(|tx| reorder_cards(tx, deck.id, &[b.id, a.id])).unwrap();
        assert_eq!(db.read(|conn| card_ids(conn, deck.id)).unwrap(), vec![b.id, a.id]);

        let err = db.write(|tx| reorder_cards(tx, deck.id, &[a.id])).unwrap_err();
        assert!(matches!(err, StorageError::Invalid(_)));
        let err = db.write(|tx| reorder_cards(tx, deck.id, &[a.id, a.id])).unwrap_err();
        assert!(matches!(err, StorageError::Invalid(_)));
    }

    #[test]
    fn test_card_round_trips_image_and_options() {
        let (db, owner) = setup();
        let deck = Deck::new(owner.id, "Geo".into());
        let mut card = Card::new(
            deck.id,
            CardContent {
                question: "Capital?".into(),
                answer: "Paris".into(),
                card_type: CardType::MultipleChoice,
                options: vec!["Paris".into(), "Lyon".into()],
                image: Some(CardImage {
                    url: "https://cdn.example.com/map.png".into(),
                    filename: None,
                    mime_type: Some("image/png".into()),
                    size_bytes: Some(10),
                }),
            },
        );
        db.write(|tx| {
            insert_deck(tx, &deck)?;
            insert_card(tx, &mut card)
        })
        .unwrap();

        let loaded = db.read(|conn| require_card(conn, card.id)).unwrap();
        assert_eq!(loaded.card_type, CardType::MultipleChoice);
        assert_eq!(loaded.options, vec!["Paris", "Lyon"]);
        assert_eq!(loaded.image, card.image);
    }

    #[test]
    fn test_delete_deck_cascades_cards() {
        let (db, owner) = setup();
        let deck = Deck::new(owner.id, "Biology".into());
        let mut card = basic(deck.id, "q");
        db.write(|tx| {
            insert_deck(tx, &deck)?;
            insert_card(tx, &mut card)
        })
        .unwrap();

        db.write(|tx| delete_deck(tx, deck.id)).unwrap();

        assert!(db.read(|conn| get_card(conn, card.id)).unwrap().is_none());
        assert_eq!(db.read(count_cards).unwrap(), 0);
        let loaded = db.read(|conn| users::storage::require(conn, owner.id)).unwrap();
        assert!(loaded.deck_ids.is_empty());
    }
}
