//! Table layout and migrations, versioned through `PRAGMA user_version`.

use rusqlite::Connection;

use super::Result;

pub(crate) const SCHEMA_VERSION: i64 = 1;

const V1: &str = r#"
-- Accounts. Username uniqueness ignores case; emails are stored lowercased.
CREATE TABLE IF NOT EXISTS users (
    id BLOB PRIMARY KEY,
    username TEXT NOT NULL UNIQUE COLLATE NOCASE,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL,
    study_streak INTEGER NOT NULL DEFAULT 0,
    longest_streak INTEGER NOT NULL DEFAULT 0,
    last_studied_on TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS decks (
    id BLOB PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    creator_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- options and image are embedded JSON
CREATE TABLE IF NOT EXISTS cards (
    id BLOB PRIMARY KEY,
    deck_id BLOB NOT NULL REFERENCES decks(id) ON DELETE CASCADE,
    question TEXT NOT NULL,
    answer TEXT NOT NULL,
    card_type TEXT NOT NULL,
    options TEXT NOT NULL DEFAULT '[]',
    image TEXT,
    position INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS classes (
    id BLOB PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    teacher_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    join_code TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS class_students (
    class_id BLOB NOT NULL REFERENCES classes(id) ON DELETE CASCADE,
    student_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    joined_at TEXT NOT NULL,
    PRIMARY KEY (class_id, student_id)
);

CREATE TABLE IF NOT EXISTS class_decks (
    class_id BLOB NOT NULL REFERENCES classes(id) ON DELETE CASCADE,
    deck_id BLOB NOT NULL REFERENCES decks(id) ON DELETE CASCADE,
    added_at TEXT NOT NULL,
    PRIMARY KEY (class_id, deck_id)
);

-- relation is 'created' or 'assigned'
CREATE TABLE IF NOT EXISTS user_decks (
    user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    deck_id BLOB NOT NULL REFERENCES decks(id) ON DELETE CASCADE,
    relation TEXT NOT NULL,
    assigned_by BLOB,
    added_at TEXT NOT NULL,
    PRIMARY KEY (user_id, deck_id)
);

-- submissions are embedded JSON, one record per student
CREATE TABLE IF NOT EXISTS assignments (
    id BLOB PRIMARY KEY,
    class_id BLOB NOT NULL REFERENCES classes(id) ON DELETE CASCADE,
    deck_id BLOB NOT NULL REFERENCES decks(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT,
    due_date TEXT NOT NULL,
    required_mastery REAL NOT NULL,
    required_cards INTEGER NOT NULL,
    submissions TEXT NOT NULL DEFAULT '[]',
    created_by BLOB NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- sessions and cards are embedded JSON
CREATE TABLE IF NOT EXISTS user_progress (
    id BLOB PRIMARY KEY,
    user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    deck_id BLOB NOT NULL REFERENCES decks(id) ON DELETE CASCADE,
    mastery_percentage REAL NOT NULL DEFAULT 0,
    average_rating REAL NOT NULL DEFAULT 0,
    total_ratings INTEGER NOT NULL DEFAULT 0,
    cards_studied INTEGER NOT NULL DEFAULT 0,
    total_study_seconds INTEGER NOT NULL DEFAULT 0,
    last_studied_at TEXT,
    sessions TEXT NOT NULL DEFAULT '[]',
    cards TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (user_id, deck_id)
);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_decks_creator ON decks(creator_id);
CREATE INDEX IF NOT EXISTS idx_cards_deck ON cards(deck_id, position);
CREATE INDEX IF NOT EXISTS idx_classes_teacher ON classes(teacher_id);
CREATE INDEX IF NOT EXISTS idx_class_students_student ON class_students(student_id);
CREATE INDEX IF NOT EXISTS idx_class_decks_deck ON class_decks(deck_id);
CREATE INDEX IF NOT EXISTS idx_user_decks_deck ON user_decks(deck_id);
CREATE INDEX IF NOT EXISTS idx_assignments_class ON assignments(class_id);
CREATE INDEX IF NOT EXISTS idx_progress_deck ON user_progress(deck_id);
"#;

/// Apply every migration newer than the stored `user_version`.
pub(crate) fn migrate(conn: &Connection) -> Result<()> {
    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if current < 1 {
        log::info!("Migrating database schema to version 1");
        conn.execute_batch(V1)?;
    }

    if current < SCHEMA_VERSION {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }

    Ok(())
}
