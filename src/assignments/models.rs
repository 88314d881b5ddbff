//! Data models for assignments and submissions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A due-dated requirement that students of a class reach a mastery
/// threshold on one deck.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: Uuid,
    pub class_id: Uuid,
    pub deck_id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    /// Mastery percentage (0-100) needed to complete
    pub required_mastery: f64,
    /// Distinct cards that must have been studied; 0 means no requirement
    #[serde(default)]
    pub required_cards: u32,
    #[serde(default)]
    pub submissions: Vec<Submission>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One student's latest submission, embedded in the assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub student_id: Uuid,
    pub mastery: f64,
    pub cards_studied: u32,
    pub completed: bool,
    pub late: bool,
    pub submitted_at: DateTime<Utc>,
}

/// Where a student stands on an assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssignmentStatus {
    /// Not submitted and still open
    Pending,
    /// Submitted without meeting the requirements
    Incomplete,
    Completed,
    /// Not completed and past the due date
    Overdue,
}

impl Assignment {
    pub fn new(
        class_id: Uuid,
        deck_id: Uuid,
        title: String,
        due_date: DateTime<Utc>,
        required_mastery: f64,
        created_by: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            class_id,
            deck_id,
            title,
            description: None,
            due_date,
            required_mastery,
            required_cards: 0,
            submissions: Vec::new(),
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn submission_of(&self, student_id: Uuid) -> Option<&Submission> {
        self.submissions.iter().find(|s| s.student_id == student_id)
    }

    /// Grade a submission from the student's current deck progress.
    pub fn evaluate(&self, student_id: Uuid, mastery: f64, cards_studied: u32, now: DateTime<Utc>) -> Submission {
        Submission {
            student_id,
            mastery,
            cards_studied,
            completed: mastery >= self.required_mastery && cards_studied >= self.required_cards,
            late: now > self.due_date,
            submitted_at: now,
        }
    }

    /// Replace the student's earlier submission, if any.
    pub fn upsert_submission(&mut self, submission: Submission) {
        match self.submissions.iter_mut().find(|s| s.student_id == submission.student_id) {
            Some(existing) => *existing = submission,
            None => self.submissions.push(submission),
        }
    }

    pub fn status_for(&self, student_id: Uuid, now: DateTime<Utc>) -> AssignmentStatus {
        match self.submission_of(student_id) {
            Some(s) if s.completed => AssignmentStatus::Completed,
            _ if now > self.due_date => AssignmentStatus::Overdue,
            Some(_) => AssignmentStatus::Incomplete,
            None => AssignmentStatus::Pending,
        }
    }

    /// Copy that only carries the given student's submission.
    pub fn redacted_for(&self, student_id: Uuid) -> Self {
        let mut copy = self.clone();
        copy.submissions.retain(|s| s.student_id == student_id);
        copy
    }
}

/// An assignment as one student sees it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAssignment {
    #[serde(flatten)]
    pub assignment: Assignment,
    pub status: AssignmentStatus,
}

impl StudentAssignment {
    pub fn new(assignment: &Assignment, student_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            status: assignment.status_for(student_id, now),
            assignment: assignment.redacted_for(student_id),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssignmentRequest {
    pub deck_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub required_mastery: Option<f64>,
    #[serde(default)]
    pub required_cards: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAssignmentRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "crate::serde_util::double_option")]
    pub description: Option<Option<String>>,
    pub due_date: Option<DateTime<Utc>>,
    pub required_mastery: Option<f64>,
    pub required_cards: Option<u32>,
}

impl UpdateAssignmentRequest {
    pub fn apply_to(self, assignment: &mut Assignment) -> Result<(), String> {
        if let Some(title) = self.title {
            assignment.title = validate_title(&title)?;
        }
        if let Some(description) = self.description {
            assignment.description = description;
        }
        if let Some(due_date) = self.due_date {
            assignment.due_date = due_date;
        }
        if let Some(mastery) = self.required_mastery {
            assignment.required_mastery = validate_required_mastery(mastery)?;
        }
        if let Some(cards) = self.required_cards {
            assignment.required_cards = cards;
        }
        Ok(())
    }
}

pub fn validate_title(title: &str) -> Result<String, String> {
    let title = title.trim();
    if title.is_empty() || title.chars().count() > 200 {
        return Err("Assignment title must be 1-200 characters".to_string());
    }
    Ok(title.to_string())
}

pub fn validate_required_mastery(value: f64) -> Result<f64, String> {
    if !(0.0..=100.0).contains(&value) {
        return Err("Required mastery must be between 0 and 100".to_string());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn assignment(due_in_days: i64) -> Assignment {
        let mut a = Assignment::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Cells quiz".into(),
            Utc::now() + Duration::days(due_in_days),
            80.0,
            Uuid::new_v4(),
        );
        a.required_cards = 10;
        a
    }

    #[test]
    fn test_evaluate_requires_mastery_and_cards() {
        let a = assignment(3);
        let student = Uuid::new_v4();
        let now = Utc::now();

        assert!(a.evaluate(student, 85.0, 10, now).completed);
        assert!(!a.evaluate(student, 85.0, 9, now).completed);
        assert!(!a.evaluate(student, 79.9, 12, now).completed);
        assert!(!a.evaluate(student, 85.0, 10, now).late);
    }

    #[test]
    fn test_late_after_due_date() {
        let a = assignment(-1);
        let submission = a.evaluate(Uuid::new_v4(), 100.0, 10, Utc::now());
        assert!(submission.completed);
        assert!(submission.late);
    }

    #[test]
    fn test_upsert_keeps_one_per_student() {
        let mut a = assignment(3);
        let student = Uuid::new_v4();
        let now = Utc::now();

        a.upsert_submission(a.evaluate(student, 10.0, 1, now));
        a.upsert_submission(a.evaluate(student, 90.0, 10, now));

        assert_eq!(a.submissions.len(), 1);
        assert!(a.submissions[0].completed);
    }

    #[test]
    fn test_status_for() {
        let mut a = assignment(3);
        let student = Uuid::new_v4();
        let now = Utc::now();

        assert_eq!(a.status_for(student, now), AssignmentStatus::Pending);
        a.upsert_submission(a.evaluate(student, 10.0, 1, now));
        assert_eq!(a.status_for(student, now), AssignmentStatus::Incomplete);
        assert_eq!(a.status_for(student, now + Duration::days(4)), AssignmentStatus::Overdue);
        a.upsert_submission(a.evaluate(student, 95.0, 20, now));
        assert_eq!(a.status_for(student, now + Duration::days(4)), AssignmentStatus::Completed);
    }

    #[test]
    fn test_redacted_for_hides_other_students() {
        let mut a = assignment(3);
        let me = Uuid::new_v4();
        let now = Utc::now();
        a.upsert_submission(a.evaluate(me, 50.0, 5, now));
        a.upsert_submission(a.evaluate(Uuid::new_v4(), 60.0, 5, now));

        let mine = a.redacted_for(me);
        assert_eq!(mine.submissions.len(), 1);
        assert_eq!(mine.submissions[0].student_id, me);
    }

    #[test]
    fn test_update_validates() {
        let mut a = assignment(3);
        let bad = UpdateAssignmentRequest {
            required_mastery: Some(120.0),
            ..Default::default()
        };
        assert!(bad.apply_to(&mut a).is_err());

        let good: UpdateAssignmentRequest =
            serde_json::from_str(r#"{"title": " Final ", "description": null}"#).unwrap();
        good.apply_to(&mut a).unwrap();
        assert_eq!(a.title, "Final");
        assert!(a.description.is_none());
    }
}
