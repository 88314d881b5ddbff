//! Assignment endpoints

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::{clean_text, validated};
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{ApiJson, ApiPath, AuthUser};
use crate::api::AppState;
use crate::assignments::{
    self, validate_required_mastery, validate_title, Assignment, CreateAssignmentRequest, StudentAssignment,
    UpdateAssignmentRequest,
};
use crate::classes::{self, Class};
use crate::permissions;
use crate::progress::tracker;
use crate::settings;
use crate::users::{Role, User};
use crate::{flashcards, storage::StorageError};

/// Students get their own status; staff get full records.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AssignmentList {
    Student(Vec<StudentAssignment>),
    Staff(Vec<Assignment>),
}

/// Managers see every submission, everyone else only their own.
fn visible_to(actor: &User, class: &Class, assignment: Assignment) -> Assignment {
    if permissions::can_manage_class(actor, class) {
        assignment
    } else {
        assignment.redacted_for(actor.id)
    }
}

pub async fn list_class_assignments(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(class_id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<Assignment>>> {
    let (class, list) = state.db.read(|conn| {
        let class = classes::storage::require(conn, class_id)?;
        let list = assignments::storage::list_for_class(conn, class_id)?;
        Ok::<_, StorageError>((class, list))
    })?;
    permissions::ensure_view_class(&actor, &class)?;

    Ok(Json(list.into_iter().map(|a| visible_to(&actor, &class, a)).collect()))
}

pub async fn create_assignment(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(class_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<CreateAssignmentRequest>,
) -> ApiResult<(StatusCode, Json<Assignment>)> {
    let title = validated(validate_title(&req.title))?;

    let assignment = state.db.write(|tx| {
        let class = classes::storage::require(tx, class_id)?;
        permissions::ensure_manage_class(&actor, &class)?;
        let deck = flashcards::storage::require_deck(tx, req.deck_id)?;
        permissions::ensure_view_deck(tx, &actor, &deck)?;

        let required_mastery = match req.required_mastery {
            Some(value) => validated(validate_required_mastery(value))?,
            None => settings::load(tx)?.default_required_mastery,
        };

        // Students must be able to open the deck they are graded on
        if classes::storage::add_deck(tx, class_id, deck.id)? {
            log::info!("Linked deck {} to class {} for a new assignment", deck.id, class_id);
        }

        let mut assignment = Assignment::new(class_id, deck.id, title, req.due_date, required_mastery, actor.id);
        assignment.description = clean_text(req.description);
        assignment.required_cards = req.required_cards.unwrap_or(0);
        assignments::storage::insert(tx, &assignment)?;
        Ok::<_, ApiError>(assignment)
    })?;

    log::info!("{} created assignment '{}'", actor.username, assignment.title);
    Ok((StatusCode::CREATED, Json(assignment)))
}

pub async fn list_assignments(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> ApiResult<Json<AssignmentList>> {
    let now = Utc::now();
    let list = match actor.role {
        Role::Student => {
            let list = state.db.read(|conn| assignments::storage::list_for_student(conn, actor.id))?;
            AssignmentList::Student(
                list.iter()
                    .map(|a| StudentAssignment::new(a, actor.id, now))
                    .collect(),
            )
        }
        Role::Teacher => {
            AssignmentList::Staff(state.db.read(|conn| assignments::storage::list_for_teacher(conn, actor.id))?)
        }
        Role::Admin => AssignmentList::Staff(state.db.read(assignments::storage::list_all)?),
    };
    Ok(Json(list))
}

fn load_with_class(state: &AppState, id: Uuid) -> ApiResult<(Assignment, Class)> {
    Ok(state.db.read(|conn| {
        let assignment = assignments::storage::require(conn, id)?;
        let class = classes::storage::require(conn, assignment.class_id)?;
        Ok::<_, StorageError>((assignment, class))
    })?)
}

pub async fn get_assignment(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Assignment>> {
    let (assignment, class) = load_with_class(&state, id)?;
    permissions::ensure_view_class(&actor, &class)?;
    Ok(Json(visible_to(&actor, &class, assignment)))
}

pub async fn update_assignment(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateAssignmentRequest>,
) -> ApiResult<Json<Assignment>> {
    let assignment = state.db.write(|tx| {
        let mut assignment = assignments::storage::require(tx, id)?;
        let class = classes::storage::require(tx, assignment.class_id)?;
        permissions::ensure_manage_class(&actor, &class)?;

        validated(req.apply_to(&mut assignment))?;
        assignment.description = clean_text(assignment.description.take());
        assignments::storage::update(tx, &assignment)?;
        Ok::<_, ApiError>(assignments::storage::require(tx, id)?)
    })?;
    Ok(Json(assignment))
}

pub async fn delete_assignment(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    state.db.write(|tx| {
        let assignment = assignments::storage::require(tx, id)?;
        let class = classes::storage::require(tx, assignment.class_id)?;
        permissions::ensure_manage_class(&actor, &class)?;
        Ok::<_, ApiError>(assignments::storage::delete(tx, id)?)
    })?;
    Ok(StatusCode::NO_CONTENT)
}

/// Grade the student's current progress on the assignment's deck.
pub async fn submit_assignment(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<StudentAssignment>> {
    let now = Utc::now();

    let assignment = state.db.write(|tx| {
        let assignment = assignments::storage::require(tx, id)?;
        let class = classes::storage::require(tx, assignment.class_id)?;
        permissions::ensure_submit(&actor, &class)?;

        let progress = tracker::current_progress(tx, actor.id, assignment.deck_id)?;
        let submission = assignment.evaluate(actor.id, progress.mastery_percentage, progress.cards_studied, now);
        Ok::<_, ApiError>(assignments::storage::upsert_submission(tx, id, submission)?)
    })?;

    let view = StudentAssignment::new(&assignment, actor.id, now);
    log::info!(
        "{} submitted '{}' ({:?})",
        actor.username,
        assignment.title,
        view.status
    );
    Ok(Json(view))
}
