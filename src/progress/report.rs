//! Class gradebook: every student's mastery on every class deck

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use super::tracker::current_progress;
use crate::classes::Class;
use crate::storage::Result;
use crate::{flashcards, users};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckColumn {
    pub deck_id: Uuid,
    pub name: String,
    pub card_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckMastery {
    pub deck_id: Uuid,
    pub mastery_percentage: f64,
    pub cards_studied: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_studied_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    pub student_id: Uuid,
    pub username: String,
    pub decks: Vec<DeckMastery>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassProgress {
    pub class_id: Uuid,
    pub class_name: String,
    pub decks: Vec<DeckColumn>,
    pub students: Vec<StudentRow>,
}

/// Build the gradebook of a class from its roster and deck list.
pub fn class_progress(conn: &Connection, class: &Class) -> Result<ClassProgress> {
    let mut decks = Vec::with_capacity(class.deck_ids.len());
    for &deck_id in &class.deck_ids {
        let deck = flashcards::storage::require_deck(conn, deck_id)?;
        decks.push(DeckColumn {
            deck_id,
            name: deck.name,
            card_count: deck.card_ids.len(),
        });
    }

    let mut students = Vec::with_capacity(class.student_ids.len());
    for &student_id in &class.student_ids {
        let student = users::storage::require(conn, student_id)?;
        let mut row = StudentRow {
            student_id,
            username: student.username,
            decks: Vec::with_capacity(decks.len()),
        };
        for column in &decks {
            let progress = current_progress(conn, student_id, column.deck_id)?;
            row.decks.push(DeckMastery {
                deck_id: column.deck_id,
                mastery_percentage: progress.mastery_percentage,
                cards_studied: progress.cards_studied,
                last_studied_at: progress.last_studied_at,
            });
        }
        students.push(row);
    }
    students.sort_by(|a, b| a.username.to_lowercase().cmp(&b.username.to_lowercase()));

    Ok(ClassProgress {
        class_id: class.id,
        class_name: class.name.clone(),
        decks,
        students,
    })
}

impl ClassProgress {
    /// Render as CSV: one row per student, one mastery column per deck.
    pub fn to_csv(&self) -> std::result::Result<String, csv::Error> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        let mut header = vec!["student_id".to_string(), "username".to_string()];
        header.extend(self.decks.iter().map(|d| d.name.clone()));
        writer.write_record(&header)?;

        for student in &self.students {
            let mut record = vec![student.student_id.to_string(), student.username.clone()];
            record.extend(student.decks.iter().map(|d| format!("{:.1}", d.mastery_percentage)));
            writer.write_record(&record)?;
        }

        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes;
    use crate::flashcards::{Card, CardContent, CardType, Deck};
    use crate::progress::tracker::record_study;
    use crate::storage::{Database, StorageError};
    use crate::users::{Role, User};

    #[test]
    fn test_gradebook_and_csv() {
        let db = Database::in_memory().unwrap();
        let teacher = User::new("tess".into(), "tess@example.com".into(), "h".into(), Role::Teacher);
        let zoe = User::new("zoe".into(), "zoe@example.com".into(), "h".into(), Role::Student);
        let amy = User::new("amy".into(), "amy@example.com".into(), "h".into(), Role::Student);
        let mut class = Class::new(teacher.id, "Bio, period 2".into(), None);
        let deck = Deck::new(teacher.id, "Cells".into());
        let mut card = Card::new(
            deck.id,
            CardContent {
                question: "q".into(),
                answer: "a".into(),
                card_type: CardType::Basic,
                options: Vec::new(),
                image: None,
            },
        );

        db.write(|tx| {
            users::storage::insert(tx, &teacher)?;
            users::storage::insert(tx, &zoe)?;
            users::storage::insert(tx, &amy)?;
            classes::storage::insert(tx, &mut class)?;
            flashcards::storage::insert_deck(tx, &deck)?;
            flashcards::storage::insert_card(tx, &mut card)?;
            classes::storage::add_deck(tx, class.id, deck.id)?;
            classes::storage::add_student(tx, class.id, zoe.id)?;
            classes::storage::add_student(tx, class.id, amy.id)?;
            record_study(tx, zoe.id, deck.id, &[(card.id, 5)], 0, Utc::now())?;
            Ok::<_, StorageError>(())
        })
        .unwrap();

        let class = db.read(|conn| classes::storage::require(conn, class.id)).unwrap();
        let report = db.read(|conn| class_progress(conn, &class)).unwrap();

        assert_eq!(report.decks.len(), 1);
        assert_eq!(report.students[0].username, "amy");
        assert_eq!(report.students[0].decks[0].mastery_percentage, 0.0);
        assert_eq!(report.students[1].decks[0].mastery_percentage, 100.0);

        let csv = report.to_csv().unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "student_id,username,Cells");
        assert!(lines[1].ends_with(",amy,0.0"));
        assert!(lines[2].ends_with(",zoe,100.0"));
    }
}
