//! Storage operations for user accounts

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::models::{normalize_email, Role, User};
use crate::storage::{parsed_column, Result, StorageError};

/// How a deck ended up in a user's `deckIds`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeckRelation {
    Created,
    Assigned,
}

impl DeckRelation {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Assigned => "assigned",
        }
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, role, study_streak, longest_streak, \
                            last_studied_on, created_at, updated_at";

fn parse_user_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
        role: parsed_column(row, "role")?,
        class_ids: Vec::new(),
        deck_ids: Vec::new(),
        study_streak: row.get("study_streak")?,
        longest_streak: row.get("longest_streak")?,
        last_studied_on: row.get("last_studied_on")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Fill the embedded class and deck lists from the link tables.
fn load_links(conn: &Connection, user: &mut User) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT class_id FROM class_students WHERE student_id = ?1
         UNION
         SELECT id FROM classes WHERE teacher_id = ?1",
    )?;
    user.class_ids = stmt
        .query_map(params![user.id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<Uuid>>>()?;

    let mut stmt = conn.prepare("SELECT deck_id FROM user_decks WHERE user_id = ?1 ORDER BY added_at")?;
    user.deck_ids = stmt
        .query_map(params![user.id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<Uuid>>>()?;

    Ok(())
}

fn ensure_unique(conn: &Connection, username: &str, email: &str, except: Option<Uuid>) -> Result<()> {
    let email = normalize_email(email);
    let taken: Option<(Uuid, String)> = conn
        .query_row(
            "SELECT id, username FROM users WHERE (username = ?1 COLLATE NOCASE OR email = ?2) LIMIT 1",
            params![username, email],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match taken {
        Some((id, _)) if Some(id) == except => Ok(()),
        Some((_, existing)) if existing.eq_ignore_ascii_case(username) => {
            Err(StorageError::Conflict(format!("Username '{}' is already taken", username)))
        }
        Some(_) => Err(StorageError::Conflict(format!("Email '{}' is already registered", email))),
        None => Ok(()),
    }
}

pub fn insert(conn: &Connection, user: &User) -> Result<()> {
    ensure_unique(conn, &user.username, &user.email, None)?;

    conn.execute(
        "INSERT INTO users (id, username, email, password_hash, role, study_streak, longest_streak,
                            last_studied_on, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            user.id,
            user.username,
            normalize_email(&user.email),
            user.password_hash,
            user.role.as_str(),
            user.study_streak,
            user.longest_streak,
            user.last_studied_on,
            user.created_at,
            user.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: Uuid) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    let user = conn.query_row(&sql, params![id], parse_user_row).optional()?;

    match user {
        Some(mut user) => {
            load_links(conn, &mut user)?;
            Ok(Some(user))
        }
        None => Ok(None),
    }
}

pub fn require(conn: &Connection, id: Uuid) -> Result<User> {
    get(conn, id)?.ok_or_else(|| StorageError::NotFound(format!("User {}", id)))
}

/// Look up an account by username (case-insensitive) or email.
pub fn find_by_login(conn: &Connection, login: &str) -> Result<Option<User>> {
    let login = login.trim();
    let sql = format!(
        "SELECT {} FROM users WHERE username = ?1 COLLATE NOCASE OR email = ?2 LIMIT 1",
        USER_COLUMNS
    );
    let user = conn
        .query_row(&sql, params![login, normalize_email(login)], parse_user_row)
        .optional()?;

    match user {
        Some(mut user) => {
            load_links(conn, &mut user)?;
            Ok(Some(user))
        }
        None => Ok(None),
    }
}

/// List accounts ordered by username, optionally filtered by role
pub fn list(conn: &Connection, role: Option<Role>) -> Result<Vec<User>> {
    let sql = format!(
        "SELECT {} FROM users WHERE (?1 IS NULL OR role = ?1) ORDER BY username COLLATE NOCASE",
        USER_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut users = stmt
        .query_map(params![role.map(|r| r.as_str())], parse_user_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for user in &mut users {
        load_links(conn, user)?;
    }
    Ok(users)
}

/// Persist username, email and role changes.
pub fn update_profile(conn: &Connection, user: &User) -> Result<()> {
    ensure_unique(conn, &user.username, &user.email, Some(user.id))?;

    let changed = conn.execute(
        "UPDATE users SET username = ?2, email = ?3, role = ?4, updated_at = ?5 WHERE id = ?1",
        params![
            user.id,
            user.username,
            normalize_email(&user.email),
            user.role.as_str(),
            Utc::now(),
        ],
    )?;
    if changed == 0 {
        return Err(StorageError::NotFound(format!("User {}", user.id)));
    }
    Ok(())
}

pub fn update_password(conn: &Connection, id: Uuid, password_hash: &str) -> Result<()> {
    let changed = conn.execute(
        "UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, password_hash, Utc::now()],
    )?;
    if changed == 0 {
        return Err(StorageError::NotFound(format!("User {}", id)));
    }
    Ok(())
}

pub fn update_streak(conn: &Connection, id: Uuid, streak: u32, longest: u32, studied_on: NaiveDate) -> Result<()> {
    conn.execute(
        "UPDATE users SET study_streak = ?2, longest_streak = ?3, last_studied_on = ?4 WHERE id = ?1",
        params![id, streak, longest, studied_on],
    )?;
    Ok(())
}

/// Delete an account.
///
/// Link rows, taught classes (with their assignments), created decks (with
/// cards and progress) and progress records go with it through the foreign
/// key cascades. Embedded submissions are stripped here.
pub fn delete(conn: &Connection, id: Uuid) -> Result<()> {
    crate::assignments::storage::strip_student_submissions(conn, id)?;

    let changed = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(StorageError::NotFound(format!("User {}", id)));
    }
    Ok(())
}

pub fn count_by_role(conn: &Connection) -> Result<BTreeMap<Role, u64>> {
    let mut counts: BTreeMap<Role, u64> = Role::all().into_iter().map(|r| (r, 0)).collect();

    let mut stmt = conn.prepare("SELECT role, COUNT(*) AS total FROM users GROUP BY role")?;
    let rows = stmt.query_map([], |row| {
        let role: Role = parsed_column(row, "role")?;
        let total: i64 = row.get("total")?;
        Ok((role, total as u64))
    })?;
    for row in rows {
        let (role, total) = row?;
        counts.insert(role, total);
    }
    Ok(counts)
}

pub fn admin_exists(conn: &Connection) -> Result<bool> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM users WHERE role = 'admin'", [], |row| row.get(0))?;
    Ok(count > 0)
}

/// Add a deck to the user's `deckIds`. Re-linking keeps the original relation.
pub fn link_deck(
    conn: &Connection,
    user_id: Uuid,
    deck_id: Uuid,
    relation: DeckRelation,
    assigned_by: Option<Uuid>,
) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO user_decks (user_id, deck_id, relation, assigned_by, added_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user_id, deck_id, relation.as_str(), assigned_by, Utc::now()],
    )?;
    Ok(())
}

/// Remove an assigned deck from the user's `deckIds`; created decks stay.
pub fn unlink_assigned_deck(conn: &Connection, user_id: Uuid, deck_id: Uuid) -> Result<bool> {
    let changed = conn.execute(
        "DELETE FROM user_decks WHERE user_id = ?1 AND deck_id = ?2 AND relation = 'assigned'",
        params![user_id, deck_id],
    )?;
    Ok(changed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    fn user(name: &str, role: Role) -> User {
        User::new(name.to_string(), format!("{}@example.com", name), "hash".to_string(), role)
    }

    #[test]
    fn test_insert_and_find() {
        let db = Database::in_memory().unwrap();
        let ada = user("ada", Role::Student);

        db.write(|tx| insert(tx, &ada)).unwrap();

        let by_name = db.read(|conn| find_by_login(conn, "ADA")).unwrap().unwrap();
        assert_eq!(by_name.id, ada.id);
        let by_email = db.read(|conn| find_by_login(conn, "Ada@Example.com")).unwrap().unwrap();
        assert_eq!(by_email.id, ada.id);
        assert_eq!(by_email.password_hash, "hash");
    }

    #[test]
    fn test_duplicate_username_is_conflict() {
        let db = Database::in_memory().unwrap();
        db.write(|tx| insert(tx, &user("ada", Role::Student))).unwrap();

        let mut dup = user("Ada", Role::Teacher);
        dup.email = "other@example.com".into();
        let err = db.write(|tx| insert(tx, &dup)).unwrap_err();
        assert!(matches!(err, StorageError::Conflict(msg) if msg.contains("Username")));
    }

    #[test]
    fn test_duplicate_email_is_conflict() {
        let db = Database::in_memory().unwrap();
        db.write(|tx| insert(tx, &user("ada", Role::Student))).unwrap();

        let mut dup = user("grace", Role::Student);
        dup.email = "ADA@example.com".into();
        let err = db.write(|tx| insert(tx, &dup)).unwrap_err();
        assert!(matches!(err, StorageError::Conflict(msg) if msg.contains("Email")));
    }

    #[test]
    fn test_update_profile_allows_keeping_own_name() {
        let db = Database::in_memory().unwrap();
        let mut ada = user("ada", Role::Student);
        db.write(|tx| insert(tx, &ada)).unwrap();

        ada.role = Role::Teacher;
        db.write(|tx| update_profile(tx, &ada)).unwrap();

        let loaded = db.read(|conn| require(conn, ada.id)).unwrap();
        assert_eq!(loaded.role, Role::Teacher);
    }

    #[test]
    fn test_list_filters_by_role_and_counts() {
        let db = Database::in_memory().unwrap();
        db.write(|tx| {
            insert(tx, &user("ada", Role::Student))?;
            insert(tx, &user("bob", Role::Student))?;
            insert(tx, &user("tess", Role::Teacher))
        })
        .unwrap();

        let students = db.read(|conn| list(conn, Some(Role::Student))).unwrap();
        assert_eq!(students.len(), 2);
        assert_eq!(db.read(|conn| list(conn, None)).unwrap().len(), 3);

        let counts = db.read(count_by_role).unwrap();
        assert_eq!(counts[&Role::Student], 2);
        assert_eq!(counts[&Role::Teacher], 1);
        assert_eq!(counts[&Role::Admin], 0);
        assert!(!db.read(admin_exists).unwrap());
    }

    #[test]
    fn test_streak_persists() {
        let db = Database::in_memory().unwrap();
        let ada = user("ada", Role::Student);
        db.write(|tx| insert(tx, &ada)).unwrap();

        let today = NaiveDate::from_ymd_opt(2026, 5, 4).unwrap();
        db.write(|tx| update_streak(tx, ada.id, 3, 7, today)).unwrap();

        let loaded = db.read(|conn| require(conn, ada.id)).unwrap();
        assert_eq!(loaded.study_streak, 3);
        assert_eq!(loaded.longest_streak, 7);
        assert_eq!(loaded.last_studied_on, Some(today));
    }

    struct School {
        db: Database,
        teacher: User,
        student: User,
        class_id: Uuid,
        deck_id: Uuid,
        assignment_id: Uuid,
    }

    /// A teacher's class with one deck, one assignment, and an enrolled
    /// student who has studied and submitted.
    fn school() -> School {
        use crate::assignments::{self, Assignment};
        use crate::classes::{self, Class};
        use crate::flashcards::{self, Card, CardContent, CardType, Deck};
        use crate::progress::tracker;

        let db = Database::in_memory().unwrap();
        let teacher = user("tess", Role::Teacher);
        let student = user("sam", Role::Student);
        let deck = Deck::new(teacher.id, "Cells".into());
        let mut card = Card::new(
            deck.id,
            CardContent {
                question: "Powerhouse of the cell?".into(),
                answer: "Mitochondria".into(),
                card_type: CardType::Basic,
                options: Vec::new(),
                image: None,
            },
        );
        let mut class = Class::new(teacher.id, "Biology".into(), None);
        let now = Utc::now();
        let assignment = Assignment::new(class.id, deck.id, "Week 1".into(), now + chrono::Duration::days(7), 50.0, teacher.id);

        db.write(|tx| {
            insert(tx, &teacher)?;
            insert(tx, &student)?;
            flashcards::storage::insert_deck(tx, &deck)?;
            flashcards::storage::insert_card(tx, &mut card)?;
            classes::storage::insert(tx, &mut class)?;
            classes::storage::add_student(tx, class.id, student.id)?;
            classes::storage::add_deck(tx, class.id, deck.id)?;
            assignments::storage::insert(tx, &assignment)?;

            let progress = tracker::record_study(tx, student.id, deck.id, &[(card.id, 5)], 0, now)?;
            let submission = assignment.evaluate(student.id, progress.mastery_percentage, progress.cards_studied, now);
            assignments::storage::upsert_submission(tx, assignment.id, submission)?;
            Ok::<_, StorageError>(())
        })
        .unwrap();

        School {
            db,
            teacher,
            student,
            class_id: class.id,
            deck_id: deck.id,
            assignment_id: assignment.id,
        }
    }

    #[test]
    fn test_delete_teacher_removes_classes_decks_and_progress() {
        use crate::{assignments, classes, flashcards, progress};

        let s = school();
        s.db.write(|tx| delete(tx, s.teacher.id)).unwrap();

        s.db.read(|conn| {
            assert!(classes::storage::get(conn, s.class_id)?.is_none());
            assert!(flashcards::storage::get_deck(conn, s.deck_id)?.is_none());
            assert!(assignments::storage::get(conn, s.assignment_id)?.is_none());
            assert_eq!(flashcards::storage::count_cards(conn)?, 0);
            assert_eq!(progress::storage::count(conn)?, 0);

            let student = require(conn, s.student.id)?;
            assert!(student.class_ids.is_empty());
            assert!(student.deck_ids.is_empty());
            Ok::<_, StorageError>(())
        })
        .unwrap();
    }

    #[test]
    fn test_delete_student_clears_roster_and_submissions() {
        use crate::{assignments, classes, progress};

        let s = school();
        s.db.write(|tx| delete(tx, s.student.id)).unwrap();

        s.db.read(|conn| {
            let class = classes::storage::require(conn, s.class_id)?;
            assert!(class.student_ids.is_empty());
            assert_eq!(class.deck_ids, vec![s.deck_id]);

            let assignment = assignments::storage::require(conn, s.assignment_id)?;
            assert!(assignment.submissions.is_empty());
            assert!(progress::storage::get(conn, s.student.id, s.deck_id)?.is_none());
            assert!(get(conn, s.student.id)?.is_none());
            Ok::<_, StorageError>(())
        })
        .unwrap();
    }

    #[test]
    fn test_delete_missing_user_is_not_found() {
        let db = Database::in_memory().unwrap();
        let err = db.write(|tx| delete(tx, Uuid::new_v4())).unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
