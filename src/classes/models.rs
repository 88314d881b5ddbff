//! Data models for classes

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of a class join code
pub const JOIN_CODE_LEN: usize = 8;

const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A teacher's group of students with the decks and assignments they share
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub teacher_id: Uuid,
    #[serde(default)]
    pub student_ids: Vec<Uuid>,
    #[serde(default)]
    pub deck_ids: Vec<Uuid>,
    #[serde(default)]
    pub assignment_ids: Vec<Uuid>,
    pub join_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Class {
    pub fn new(teacher_id: Uuid, name: String, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            description,
            teacher_id,
            student_ids: Vec::new(),
            deck_ids: Vec::new(),
            assignment_ids: Vec::new(),
            join_code: generate_join_code(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Random uppercase alphanumeric code students use to enroll themselves.
pub fn generate_join_code() -> String {
    let mut rng = rand::thread_rng();
    (0..JOIN_CODE_LEN)
        .map(|_| JOIN_CODE_ALPHABET[rng.gen_range(0..JOIN_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Normalize a code typed by a student (case and surrounding whitespace).
pub fn normalize_join_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

pub fn validate_class_name(name: &str) -> Result<String, String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 100 {
        return Err("Class name must be 1-100 characters".to_string());
    }
    Ok(name.to_string())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClassRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Only honored for admins
    #[serde(default)]
    pub teacher_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClassRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "crate::serde_util::double_option")]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddStudentRequest {
    pub student_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinClassRequest {
    pub join_code: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddDeckRequest {
    pub deck_id: Uuid,
}
