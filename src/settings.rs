//! System-wide settings edited by admins
//!
//! Stored as one JSON document under the `system` key of the `settings`
//! table. A missing row reads as the defaults.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::storage::{to_json, Result, StorageError};

const SETTINGS_KEY: &str = "system";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemSettings {
    /// Whether `POST /api/auth/register` accepts new accounts
    pub registration_open: bool,
    /// Whether self-registration may pick the teacher role
    pub allow_teacher_signup: bool,
    /// Daily session entries kept per progress record
    pub session_log_limit: u32,
    /// Ratings kept per card for mastery
    pub rating_history_limit: u32,
    /// Mastery required by new assignments that do not set one
    pub default_required_mastery: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            registration_open: true,
            allow_teacher_signup: false,
            session_log_limit: 30,
            rating_history_limit: 5,
            default_required_mastery: 80.0,
            updated_at: None,
        }
    }
}

/// Partial settings update
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub registration_open: Option<bool>,
    pub allow_teacher_signup: Option<bool>,
    pub session_log_limit: Option<u32>,
    pub rating_history_limit: Option<u32>,
    pub default_required_mastery: Option<f64>,
}

impl UpdateSettingsRequest {
    /// Apply onto `settings`, rejecting out-of-range values before anything changes.
    pub fn apply_to(self, settings: &mut SystemSettings) -> std::result::Result<(), String> {
        if let Some(limit) = self.session_log_limit {
            if !(1..=365).contains(&limit) {
                return Err("sessionLogLimit must be between 1 and 365".to_string());
            }
        }
        if let Some(limit) = self.rating_history_limit {
            if !(1..=50).contains(&limit) {
                return Err("ratingHistoryLimit must be between 1 and 50".to_string());
            }
        }
        if let Some(mastery) = self.default_required_mastery {
            if !(0.0..=100.0).contains(&mastery) {
                return Err("defaultRequiredMastery must be between 0 and 100".to_string());
            }
        }

        if let Some(v) = self.registration_open {
            settings.registration_open = v;
        }
        if let Some(v) = self.allow_teacher_signup {
            settings.allow_teacher_signup = v;
        }
        if let Some(v) = self.session_log_limit {
            settings.session_log_limit = v;
        }
        if let Some(v) = self.rating_history_limit {
            settings.rating_history_limit = v;
        }
        if let Some(v) = self.default_required_mastery {
            settings.default_required_mastery = v;
        }
        Ok(())
    }
}

pub fn load(conn: &Connection) -> Result<SystemSettings> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![SETTINGS_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match raw {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(SystemSettings::default()),
    }
}

pub fn save(conn: &Connection, settings: &mut SystemSettings) -> Result<()> {
    settings.updated_at = Some(Utc::now());
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![SETTINGS_KEY, to_json(settings)?],
    )?;
    Ok(())
}

/// Load, apply a partial update and save in one go.
pub fn update(conn: &Connection, request: UpdateSettingsRequest) -> Result<SystemSettings> {
    let mut settings = load(conn)?;
    request.apply_to(&mut settings).map_err(StorageError::Invalid)?;
    save(conn, &mut settings)?;
    log::info!("System settings updated");
    Ok(settings)
}
