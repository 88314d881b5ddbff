//! Role-dependent landing summary

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::api::extract::AuthUser;
use crate::api::AppState;
use crate::assignments::{self, AssignmentStatus, StudentAssignment};
use crate::classes;
use crate::flashcards;
use crate::progress::tracker;
use crate::stats::{self, SystemStats};
use crate::storage::StorageError;
use crate::users::Role;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckSummary {
    pub deck_id: Uuid,
    pub name: String,
    pub card_count: usize,
    pub mastery_percentage: f64,
    pub cards_studied: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummary {
    pub class_id: Uuid,
    pub name: String,
    pub join_code: String,
    pub student_count: usize,
    pub deck_count: usize,
    pub assignment_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Dashboard {
    #[serde(rename_all = "camelCase")]
    Student {
        current_streak: u32,
        longest_streak: u32,
        decks: Vec<DeckSummary>,
        upcoming_assignments: Vec<StudentAssignment>,
    },
    Teacher {
        classes: Vec<ClassSummary>,
    },
    Admin {
        stats: SystemStats,
    },
}

pub async fn dashboard(State(state): State<AppState>, AuthUser(actor): AuthUser) -> ApiResult<Json<Dashboard>> {
    let now = Utc::now();

    let dashboard = state.db.read(|conn| -> Result<Dashboard, StorageError> {
        match actor.role {
        Role::Student => {
            let mut decks = Vec::new();
            for deck in flashcards::storage::list_visible_decks(conn, actor.id)? {
                let progress = tracker::current_progress(conn, actor.id, deck.id)?;
                decks.push(DeckSummary {
                    deck_id: deck.id,
                    card_count: deck.card_ids.len(),
                    name: deck.name,
                    mastery_percentage: progress.mastery_percentage,
                    cards_studied: progress.cards_studied,
                });
            }

            let mut upcoming: Vec<StudentAssignment> = assignments::storage::list_for_student(conn, actor.id)?
                .iter()
                .map(|a| StudentAssignment::new(a, actor.id, now))
                .filter(|a| matches!(a.status, AssignmentStatus::Pending | AssignmentStatus::Incomplete))
                .collect();
            upcoming.sort_by_key(|a| a.assignment.due_date);

            let today = now.date_naive();
            Ok(Dashboard::Student {
                current_streak: actor.current_streak(today),
                longest_streak: actor.longest_streak,
                decks,
                upcoming_assignments: upcoming,
            })
        }
        Role::Teacher => {
            let classes = classes::storage::list_taught(conn, actor.id)?
                .into_iter()
                .map(|class| ClassSummary {
                    class_id: class.id,
                    student_count: class.student_ids.len(),
                    deck_count: class.deck_ids.len(),
                    assignment_count: class.assignment_ids.len(),
                    name: class.name,
                    join_code: class.join_code,
                })
                .collect();
            Ok(Dashboard::Teacher { classes })
        }
        Role::Admin => Ok(Dashboard::Admin {
            stats: stats::collect(conn)?,
        }),
        }
    })?;

    Ok(Json(dashboard))
}
