//! Storage operations for assignments
//!
//! Submissions are embedded in the assignment row as a JSON array, one
//! record per student.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::models::{Assignment, Submission};
use crate::storage::{json_column, to_json, Result, StorageError};

const ASSIGNMENT_COLUMNS: &str = "id, class_id, deck_id, title, description, due_date, required_mastery, \
                                  required_cards, submissions, created_by, created_at, updated_at";

fn parse_assignment_row(row: &Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: row.get("id")?,
        class_id: row.get("class_id")?,
        deck_id: row.get("deck_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        due_date: row.get("due_date")?,
        required_mastery: row.get("required_mastery")?,
        required_cards: row.get("required_cards")?,
        submissions: json_column(row, "submissions")?,
        created_by: row.get("created_by")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn query(conn: &Connection, where_clause: &str, param: Option<Uuid>) -> Result<Vec<Assignment>> {
    let sql = format!(
        "SELECT {} FROM assignments {} ORDER BY due_date, title",
        ASSIGNMENT_COLUMNS, where_clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = match param {
        Some(id) => stmt.query_map(params![id], parse_assignment_row)?,
        None => stmt.query_map([], parse_assignment_row)?,
    };
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn insert(conn: &Connection, assignment: &Assignment) -> Result<()> {
    conn.execute(
        "INSERT INTO assignments (id, class_id, deck_id, title, description, due_date, required_mastery,
                                  required_cards, submissions, created_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            assignment.id,
            assignment.class_id,
            assignment.deck_id,
            assignment.title,
            assignment.description,
            assignment.due_date,
            assignment.required_mastery,
            assignment.required_cards,
            to_json(&assignment.submissions)?,
            assignment.created_by,
            assignment.created_at,
            assignment.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: Uuid) -> Result<Option<Assignment>> {
    let sql = format!("SELECT {} FROM assignments WHERE id = ?1", ASSIGNMENT_COLUMNS);
    Ok(conn.query_row(&sql, params![id], parse_assignment_row).optional()?)
}

pub fn require(conn: &Connection, id: Uuid) -> Result<Assignment> {
    get(conn, id)?.ok_or_else(|| StorageError::NotFound(format!("Assignment {}", id)))
}

pub fn list_all(conn: &Connection) -> Result<Vec<Assignment>> {
    query(conn, "", None)
}

pub fn list_for_class(conn: &Connection, class_id: Uuid) -> Result<Vec<Assignment>> {
    query(conn, "WHERE class_id = ?1", Some(class_id))
}

/// Assignments of every class the student is enrolled in
pub fn list_for_student(conn: &Connection, student_id: Uuid) -> Result<Vec<Assignment>> {
    query(
        conn,
        "WHERE class_id IN (SELECT class_id FROM class_students WHERE student_id = ?1)",
        Some(student_id),
    )
}

/// Assignments of every class the teacher teaches
pub fn list_for_teacher(conn: &Connection, teacher_id: Uuid) -> Result<Vec<Assignment>> {
    query(
        conn,
        "WHERE class_id IN (SELECT id FROM classes WHERE teacher_id = ?1)",
        Some(teacher_id),
    )
}

/// Persist every field, submissions included.
pub fn update(conn: &Connection, assignment: &Assignment) -> Result<()> {
    let changed = conn.execute(
        "UPDATE assignments SET title = ?2, description = ?3, due_date = ?4, required_mastery = ?5,
                                required_cards = ?6, submissions = ?7, updated_at = ?8
         WHERE id = ?1",
        params![
            assignment.id,
            assignment.title,
            assignment.description,
            assignment.due_date,
            assignment.required_mastery,
            assignment.required_cards,
            to_json(&assignment.submissions)?,
            Utc::now(),
        ],
    )?;
    if changed == 0 {
        return Err(StorageError::NotFound(format!("Assignment {}", assignment.id)));
    }
    Ok(())
}

pub fn delete(conn: &Connection, id: Uuid) -> Result<()> {
    let changed = conn.execute("DELETE FROM assignments WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(StorageError::NotFound(format!("Assignment {}", id)));
    }
    Ok(())
}

/// Record a submission, replacing the student's earlier one.
pub fn upsert_submission(conn: &Connection, id: Uuid, submission: Submission) -> Result<Assignment> {
    let mut assignment = require(conn, id)?;
    assignment.upsert_submission(submission);
    update(conn, &assignment)?;
    Ok(assignment)
}

/// Drop a student's submissions from every assignment. Returns how many
/// assignments changed.
pub fn strip_student_submissions(conn: &Connection, student_id: Uuid) -> Result<usize> {
    let mut changed = 0;
    for mut assignment in list_all(conn)? {
        let before = assignment.submissions.len();
        assignment.submissions.retain(|s| s.student_id != student_id);
        if assignment.submissions.len() != before {
            conn.execute(
                "UPDATE assignments SET submissions = ?2 WHERE id = ?1",
                params![assignment.id, to_json(&assignment.submissions)?],
            )?;
            changed += 1;
        }
    }
    Ok(changed)
}

pub fn count(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM assignments", [], |row| row.get(0))?;
    Ok(count as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::{self, Class};
    use crate::flashcards::{self, Deck};
    use crate::storage::Database;
    use crate::users::{self, Role, User};
    use chrono::Duration;

    struct Fixture {
        db: Database,
        teacher: User,
        student: User,
        class: Class,
        deck: Deck,
    }

    fn setup() -> Fixture {
        let db = Database::in_memory().unwrap();
        let teacher = User::new("tess".into(), "tess@example.com".into(), "h".into(), Role::Teacher);
        let student = User::new("sam".into(), "sam@example.com".into(), "h".into(), Role::Student);
        let mut class = Class::new(teacher.id, "Biology".into(), None);
        let deck = Deck::new(teacher.id, "Cells".into());

        db.write(|tx| {
            users::storage::insert(tx, &teacher)?;
            users::storage::insert(tx, &student)?;
            classes::storage::insert(tx, &mut class)?;
            classes::storage::add_student(tx, class.id, student.id)?;
            flashcards::storage::insert_deck(tx, &deck)?;
            classes::storage::add_deck(tx, class.id, deck.id).map(|_| ())
        })
        .unwrap();

        Fixture { db, teacher, student, class, deck }
    }

    fn assignment(f: &Fixture) -> Assignment {
        Assignment::new(
            f.class.id,
            f.deck.id,
            "Quiz".into(),
            Utc::now() + Duration::days(7),
            80.0,
            f.teacher.id,
        )
    }

    #[test]
    fn test_listing_by_role() {
        let f = setup();
        let a = assignment(&f);
        f.db.write(|tx| insert(tx, &a)).unwrap();

        assert_eq!(f.db.read(|conn| list_for_class(conn, f.class.id)).unwrap().len(), 1);
        assert_eq!(f.db.read(|conn| list_for_student(conn, f.student.id)).unwrap().len(), 1);
        assert_eq!(f.db.read(|conn| list_for_teacher(conn, f.teacher.id)).unwrap().len(), 1);
        assert_eq!(f.db.read(|conn| list_for_teacher(conn, f.student.id)).unwrap().len(), 0);

        let class = f.db.read(|conn| classes::storage::require(conn, f.class.id)).unwrap();
        assert_eq!(class.assignment_ids, vec![a.id]);
    }

    #[test]
    fn test_submission_round_trip_and_strip() {
        let f = setup();
        let a = assignment(&f);
        f.db.write(|tx| insert(tx, &a)).unwrap();

        let submission = a.evaluate(f.student.id, 90.0, 4, Utc::now());
        f.db.write(|tx| upsert_submission(tx, a.id, submission.clone())).unwrap();

        let loaded = f.db.read(|conn| require(conn, a.id)).unwrap();
        assert_eq!(loaded.submissions, vec![submission]);

        let changed = f.db.write(|tx| strip_student_submissions(tx, f.student.id)).unwrap();
        assert_eq!(changed, 1);
        let loaded = f.db.read(|conn| require(conn, a.id)).unwrap();
        assert!(loaded.submissions.is_empty());
    }

    #[test]
    fn test_removing_class_deck_drops_assignments() {
        let f = setup();
        let a = assignment(&f);
        f.db.write(|tx| insert(tx, &a)).unwrap();

        f.db.write(|tx| classes::storage::remove_deck(tx, f.class.id, f.deck.id)).unwrap();

        assert!(f.db.read(|conn| get(conn, a.id)).unwrap().is_none());
    }

    #[test]
    fn test_deleting_deck_cascades() {
        let f = setup();
        let a = assignment(&f);
        f.db.write(|tx| insert(tx, &a)).unwrap();

        f.db.write(|tx| flashcards::storage::delete_deck(tx, f.deck.id)).unwrap();

        assert_eq!(f.db.read(count).unwrap(), 0);
    }
}
