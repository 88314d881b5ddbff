//! Class (team) endpoints

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{clean_text, validated};
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{ApiJson, ApiPath, AuthUser};
use crate::api::AppState;
use crate::classes::{
    self, validate_class_name, AddDeckRequest, AddStudentRequest, Class, CreateClassRequest, JoinClassRequest,
    UpdateClassRequest,
};
use crate::flashcards;
use crate::permissions;
use crate::progress::report::{self, ClassProgress};
use crate::users::{self, Role};

pub async fn list_classes(State(state): State<AppState>, AuthUser(actor): AuthUser) -> ApiResult<Json<Vec<Class>>> {
    let classes = state.db.read(|conn| match actor.role {
        Role::Admin => classes::storage::list_all(conn),
        Role::Teacher => classes::storage::list_taught(conn, actor.id),
        Role::Student => classes::storage::list_enrolled(conn, actor.id),
    })?;
    Ok(Json(classes))
}

pub async fn create_class(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiJson(req): ApiJson<CreateClassRequest>,
) -> ApiResult<(StatusCode, Json<Class>)> {
    permissions::require_role(&actor, &[Role::Teacher, Role::Admin])?;
    let name = validated(validate_class_name(&req.name))?;

    let class = state.db.write(|tx| {
        let teacher_id = match req.teacher_id {
            Some(teacher_id) if actor.is_admin() && teacher_id != actor.id => {
                let teacher = users::storage::require(tx, teacher_id)?;
                if teacher.role != Role::Teacher {
                    return Err(ApiError::BadRequest("teacherId must reference a teacher".to_string()));
                }
                teacher_id
            }
            _ => actor.id,
        };

        let mut class = Class::new(teacher_id, name, clean_text(req.description));
        classes::storage::insert(tx, &mut class)?;
        Ok(class)
    })?;

    log::info!("{} created class '{}'", actor.username, class.name);
    Ok((StatusCode::CREATED, Json(class)))
}

fn managed_class(conn: &rusqlite::Connection, actor: &users::User, id: Uuid) -> ApiResult<Class> {
    let class = classes::storage::require(conn, id)?;
    permissions::ensure_manage_class(actor, &class)?;
    Ok(class)
}

pub async fn get_class(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Class>> {
    let class = state.db.read(|conn| classes::storage::require(conn, id))?;
    permissions::ensure_view_class(&actor, &class)?;
    Ok(Json(class))
}

pub async fn update_class(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateClassRequest>,
) -> ApiResult<Json<Class>> {
    let class = state.db.write(|tx| {
        let mut class = managed_class(tx, &actor, id)?;
        if let Some(name) = &req.name {
            class.name = validated(validate_class_name(name))?;
        }
        if let Some(description) = req.description.clone() {
            class.description = clean_text(description);
        }
        classes::storage::update(tx, &class)?;
        Ok::<_, ApiError>(classes::storage::require(tx, id)?)
    })?;
    Ok(Json(class))
}

/// Delete a class with its roster, deck links and assignments.
pub async fn delete_class(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    state.db.write(|tx| {
        managed_class(tx, &actor, id)?;
        Ok::<_, ApiError>(classes::storage::delete(tx, id)?)
    })?;
    log::info!("{} deleted class {}", actor.username, id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_student(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<AddStudentRequest>,
) -> ApiResult<Json<Class>> {
    let class = state.db.write(|tx| {
        managed_class(tx, &actor, id)?;
        let student = users::storage::require(tx, req.student_id)?;
        if student.role != Role::Student {
            return Err(ApiError::BadRequest(format!("{} is not a student", student.username)));
        }
        classes::storage::add_student(tx, id, student.id)?;
        Ok(classes::storage::require(tx, id)?)
    })?;
    Ok(Json(class))
}

pub async fn remove_student(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath((id, student_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Json<Class>> {
    let class = state.db.write(|tx| {
        managed_class(tx, &actor, id)?;
        if !classes::storage::remove_student(tx, id, student_id)? {
            return Err(ApiError::NotFound("Student is not enrolled in this class".to_string()));
        }
        Ok(classes::storage::require(tx, id)?)
    })?;
    Ok(Json(class))
}

/// Student self-enrollment by join code
pub async fn join_class(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiJson(req): ApiJson<JoinClassRequest>,
) -> ApiResult<Json<Class>> {
    if actor.role != Role::Student {
        return Err(ApiError::Forbidden("Only students can join classes".to_string()));
    }

    let class = state.db.write(|tx| {
        let class = classes::storage::find_by_join_code(tx, &req.join_code)?
            .ok_or_else(|| ApiError::NotFound("No class matches that join code".to_string()))?;
        if !classes::storage::add_student(tx, class.id, actor.id)? {
            return Err(ApiError::Conflict("You are already enrolled in this class".to_string()));
        }
        Ok(classes::storage::require(tx, class.id)?)
    })?;

    log::info!("{} joined class '{}'", actor.username, class.name);
    Ok(Json(class))
}

pub async fn regenerate_join_code(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Value>> {
    let code = state.db.write(|tx| {
        managed_class(tx, &actor, id)?;
        Ok::<_, ApiError>(classes::storage::regenerate_join_code(tx, id)?)
    })?;
    Ok(Json(json!({ "joinCode": code })))
}

pub async fn add_deck(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<AddDeckRequest>,
) -> ApiResult<Json<Class>> {
    let class = state.db.write(|tx| {
        managed_class(tx, &actor, id)?;
        let deck = flashcards::storage::require_deck(tx, req.deck_id)?;
        permissions::ensure_view_deck(tx, &actor, &deck)?;
        classes::storage::add_deck(tx, id, deck.id)?;
        Ok::<_, ApiError>(classes::storage::require(tx, id)?)
    })?;
    Ok(Json(class))
}

/// Detach a deck; the class's assignments on it go too.
pub async fn remove_deck(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath((id, deck_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Json<Class>> {
    let class = state.db.write(|tx| {
        managed_class(tx, &actor, id)?;
        if !classes::storage::remove_deck(tx, id, deck_id)? {
            return Err(ApiError::NotFound("Deck is not part of this class".to_string()));
        }
        Ok(classes::storage::require(tx, id)?)
    })?;
    Ok(Json(class))
}

fn load_report(state: &AppState, actor: &users::User, id: Uuid) -> ApiResult<ClassProgress> {
    state.db.read(|conn| {
        let class = managed_class(conn, actor, id)?;
        Ok(report::class_progress(conn, &class)?)
    })
}

pub async fn class_progress(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ClassProgress>> {
    Ok(Json(load_report(&state, &actor, id)?))
}

/// Gradebook as CSV, one row per student
pub async fn class_progress_csv(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let report = load_report(&state, &actor, id)?;
    let body = report.to_csv()?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"class-{}-progress.csv\"", id),
            ),
        ],
        body,
    ))
}
