//! Storage operations for classes, rosters and class decks

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::models::{generate_join_code, normalize_join_code, Class};
use crate::storage::{Result, StorageError};

const CLASS_COLUMNS: &str = "id, name, description, teacher_id, join_code, created_at, updated_at";

/// Attempts at drawing an unused join code before giving up
const JOIN_CODE_ATTEMPTS: usize = 16;

fn parse_class_row(row: &Row<'_>) -> rusqlite::Result<Class> {
    Ok(Class {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        teacher_id: row.get("teacher_id")?,
        student_ids: Vec::new(),
        deck_ids: Vec::new(),
        assignment_ids: Vec::new(),
        join_code: row.get("join_code")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn ids(conn: &Connection, sql: &str, id: Uuid) -> Result<Vec<Uuid>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map(params![id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<Uuid>>>()?;
    Ok(ids)
}

fn load_links(conn: &Connection, class: &mut Class) -> Result<()> {
    class.student_ids = ids(
        conn,
        "SELECT student_id FROM class_students WHERE class_id = ?1 ORDER BY joined_at",
        class.id,
    )?;
    class.deck_ids = ids(
        conn,
        "SELECT deck_id FROM class_decks WHERE class_id = ?1 ORDER BY added_at",
        class.id,
    )?;
    class.assignment_ids = ids(
        conn,
        "SELECT id FROM assignments WHERE class_id = ?1 ORDER BY due_date",
        class.id,
    )?;
    Ok(())
}

fn query_classes(conn: &Connection, where_clause: &str, param: Option<Uuid>) -> Result<Vec<Class>> {
    let sql = format!(
        "SELECT {} FROM classes {} ORDER BY name COLLATE NOCASE",
        CLASS_COLUMNS, where_clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = match param {
        Some(id) => stmt.query_map(params![id], parse_class_row)?,
        None => stmt.query_map([], parse_class_row)?,
    };
    let mut classes = rows.collect::<rusqlite::Result<Vec<_>>>()?;

    for class in &mut classes {
        load_links(conn, class)?;
    }
    Ok(classes)
}

fn join_code_taken(conn: &Connection, code: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM classes WHERE join_code = ?1", params![code], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

fn unused_join_code(conn: &Connection) -> Result<String> {
    for _ in 0..JOIN_CODE_ATTEMPTS {
        let code = generate_join_code();
        if !join_code_taken(conn, &code)? {
            return Ok(code);
        }
    }
    Err(StorageError::Conflict("Could not allocate a unique join code".to_string()))
}

/// Insert a class. A join code that collides with another class is replaced.
pub fn insert(conn: &Connection, class: &mut Class) -> Result<()> {
    if join_code_taken(conn, &class.join_code)? {
        class.join_code = unused_join_code(conn)?;
    }

    conn.execute(
        "INSERT INTO classes (id, name, description, teacher_id, join_code, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            class.id,
            class.name,
            class.description,
            class.teacher_id,
            class.join_code,
            class.created_at,
            class.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: Uuid) -> Result<Option<Class>> {
    let sql = format!("SELECT {} FROM classes WHERE id = ?1", CLASS_COLUMNS);
    let class = conn.query_row(&sql, params![id], parse_class_row).optional()?;

    match class {
        Some(mut class) => {
            load_links(conn, &mut class)?;
            Ok(Some(class))
        }
        None => Ok(None),
    }
}

pub fn require(conn: &Connection, id: Uuid) -> Result<Class> {
    get(conn, id)?.ok_or_else(|| StorageError::NotFound(format!("Class {}", id)))
}

pub fn find_by_join_code(conn: &Connection, code: &str) -> Result<Option<Class>> {
    let sql = format!("SELECT {} FROM classes WHERE join_code = ?1", CLASS_COLUMNS);
    let class = conn
        .query_row(&sql, params![normalize_join_code(code)], parse_class_row)
        .optional()?;

    match class {
        Some(mut class) => {
            load_links(conn, &mut class)?;
            Ok(Some(class))
        }
        None => Ok(None),
    }
}

pub fn list_all(conn: &Connection) -> Result<Vec<Class>> {
    query_classes(conn, "", None)
}

pub fn list_taught(conn: &Connection, teacher_id: Uuid) -> Result<Vec<Class>> {
    query_classes(conn, "WHERE teacher_id = ?1", Some(teacher_id))
}

pub fn list_enrolled(conn: &Connection, student_id: Uuid) -> Result<Vec<Class>> {
    query_classes(
        conn,
        "WHERE id IN (SELECT class_id FROM class_students WHERE student_id = ?1)",
        Some(student_id),
    )
}

pub fn update(conn: &Connection, class: &Class) -> Result<()> {
    let changed = conn.execute(
        "UPDATE classes SET name = ?2, description = ?3, updated_at = ?4 WHERE id = ?1",
        params![class.id, class.name, class.description, Utc::now()],
    )?;
    if changed == 0 {
        return Err(StorageError::NotFound(format!("Class {}", class.id)));
    }
    Ok(())
}

/// Replace the join code with a fresh unused one and return it.
pub fn regenerate_join_code(conn: &Connection, id: Uuid) -> Result<String> {
    let code = unused_join_code(conn)?;
    let changed = conn.execute(
        "UPDATE classes SET join_code = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, code, Utc::now()],
    )?;
    if changed == 0 {
        return Err(StorageError::NotFound(format!("Class {}", id)));
    }
    Ok(code)
}

/// Delete a class with its roster, deck links and assignments.
pub fn delete(conn: &Connection, id: Uuid) -> Result<()> {
    let changed = conn.execute("DELETE FROM classes WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(StorageError::NotFound(format!("Class {}", id)));
    }
    Ok(())
}

fn touch(conn: &Connection, id: Uuid) -> Result<()> {
    conn.execute("UPDATE classes SET updated_at = ?2 WHERE id = ?1", params![id, Utc::now()])?;
    Ok(())
}

/// Enroll a student. Returns false when already enrolled.
pub fn add_student(conn: &Connection, class_id: Uuid, student_id: Uuid) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO class_students (class_id, student_id, joined_at) VALUES (?1, ?2, ?3)",
        params![class_id, student_id, Utc::now()],
    )?;
    if changed > 0 {
        touch(conn, class_id)?;
    }
    Ok(changed > 0)
}

pub fn remove_student(conn: &Connection, class_id: Uuid, student_id: Uuid) -> Result<bool> {
    let changed = conn.execute(
        "DELETE FROM class_students WHERE class_id = ?1 AND student_id = ?2",
        params![class_id, student_id],
    )?;
    if changed > 0 {
        touch(conn, class_id)?;
    }
    Ok(changed > 0)
}

/// Attach a deck to the class. Returns false when already attached.
pub fn add_deck(conn: &Connection, class_id: Uuid, deck_id: Uuid) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO class_decks (class_id, deck_id, added_at) VALUES (?1, ?2, ?3)",
        params![class_id, deck_id, Utc::now()],
    )?;
    if changed > 0 {
        touch(conn, class_id)?;
    }
    Ok(changed > 0)
}

/// Detach a deck along with the class's assignments on it.
pub fn remove_deck(conn: &Connection, class_id: Uuid, deck_id: Uuid) -> Result<bool> {
    let changed = conn.execute(
        "DELETE FROM class_decks WHERE class_id = ?1 AND deck_id = ?2",
        params![class_id, deck_id],
    )?;
    if changed == 0 {
        return Ok(false);
    }

    let dropped = conn.execute(
        "DELETE FROM assignments WHERE class_id = ?1 AND deck_id = ?2",
        params![class_id, deck_id],
    )?;
    if dropped > 0 {
        log::info!("Removed {} assignment(s) with deck {} from class {}", dropped, deck_id, class_id);
    }
    touch(conn, class_id)?;
    Ok(true)
}

fn exists(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<bool> {
    let found: Option<i64> = conn.query_row(sql, params, |row| row.get(0)).optional()?;
    Ok(found.is_some())
}

pub fn is_student(conn: &Connection, class_id: Uuid, user_id: Uuid) -> Result<bool> {
    exists(
        conn,
        "SELECT 1 FROM class_students WHERE class_id = ?1 AND student_id = ?2",
        params![class_id, user_id],
    )
}

pub fn has_deck(conn: &Connection, class_id: Uuid, deck_id: Uuid) -> Result<bool> {
    exists(
        conn,
        "SELECT 1 FROM class_decks WHERE class_id = ?1 AND deck_id = ?2",
        params![class_id, deck_id],
    )
}

/// True when `student_id` is enrolled in any class taught by `teacher_id`.
pub fn teaches_student(conn: &Connection, teacher_id: Uuid, student_id: Uuid) -> Result<bool> {
    exists(
        conn,
        "SELECT 1 FROM class_students cs JOIN classes c ON c.id = cs.class_id
         WHERE c.teacher_id = ?1 AND cs.student_id = ?2 LIMIT 1",
        params![teacher_id, student_id],
    )
}

/// True when the deck is attached to a class the user teaches or attends.
pub fn deck_in_user_classes(conn: &Connection, user_id: Uuid, deck_id: Uuid) -> Result<bool> {
    exists(
        conn,
        "SELECT 1 FROM class_decks cd JOIN classes c ON c.id = cd.class_id
         WHERE cd.deck_id = ?2
           AND (c.teacher_id = ?1
                OR EXISTS (SELECT 1 FROM class_students cs
                           WHERE cs.class_id = c.id AND cs.student_id = ?1))
         LIMIT 1",
        params![user_id, deck_id],
    )
}

/// True when one of the teacher's classes holds both the student and the deck.
pub fn teaches_student_on_deck(conn: &Connection, teacher_id: Uuid, student_id: Uuid, deck_id: Uuid) -> Result<bool> {
    exists(
        conn,
        "SELECT 1 FROM classes c
         JOIN class_students cs ON cs.class_id = c.id
         JOIN class_decks cd ON cd.class_id = c.id
         WHERE c.teacher_id = ?1 AND cs.student_id = ?2 AND cd.deck_id = ?3
         LIMIT 1",
        params![teacher_id, student_id, deck_id],
    )
}

pub fn count(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM classes", [], |row| row.get(0))?;
    Ok(count as u64)
}
