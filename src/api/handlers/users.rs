//! Account listing and management

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use uuid::Uuid;

use super::validated;
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{ApiJson, ApiPath, ApiQuery, AuthUser};
use crate::api::AppState;
use crate::flashcards::{self, Deck};
use crate::permissions;
use crate::users::{self, validate_email, validate_username, Role, UpdateUserRequest, User};

#[derive(Debug, Deserialize)]
pub struct RoleFilter {
    pub role: Option<Role>,
}

pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiQuery(filter): ApiQuery<RoleFilter>,
) -> ApiResult<Json<Vec<User>>> {
    let role = match actor.role {
        Role::Admin => filter.role,
        // Teachers browse students to build rosters
        Role::Teacher => match filter.role {
            None | Some(Role::Student) => Some(Role::Student),
            Some(_) => return Err(ApiError::Forbidden("Teachers can only list students".to_string())),
        },
        Role::Student => return Err(ApiError::Forbidden("Students cannot list users".to_string())),
    };

    Ok(Json(state.db.read(|conn| users::storage::list(conn, role))?))
}

pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<User>> {
    let user = state.db.read(|conn| {
        permissions::ensure_view_user(conn, &actor, id)?;
        Ok::<_, ApiError>(users::storage::require(conn, id)?)
    })?;
    Ok(Json(user))
}

pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    let user = state.db.write(|tx| {
        let mut target = users::storage::require(tx, id)?;
        let changes_role = req.role.map_or(false, |role| role != target.role);
        permissions::ensure_update_user(&actor, id, changes_role)?;

        if let Some(username) = &req.username {
            target.username = validated(validate_username(username))?;
        }
        if let Some(email) = &req.email {
            target.email = validated(validate_email(email))?;
        }
        if let Some(role) = req.role {
            if changes_role && target.role == Role::Admin {
                let admins = users::storage::count_by_role(tx)?;
                if admins.get(&Role::Admin).copied().unwrap_or(0) <= 1 {
                    return Err(ApiError::Conflict("Cannot demote the last admin".to_string()));
                }
            }
            target.role = role;
        }

        users::storage::update_profile(tx, &target)?;
        Ok(users::storage::require(tx, id)?)
    })?;

    log::info!("{} updated user {}", actor.username, user.username);
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    permissions::require_role(&actor, &[Role::Admin])?;
    if actor.id == id {
        return Err(ApiError::BadRequest("You cannot delete your own account".to_string()));
    }

    state.db.write(|tx| users::storage::delete(tx, id))?;
    log::info!("{} deleted user {}", actor.username, id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn user_decks(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<Deck>>> {
    let decks = state.db.read(|conn| {
        permissions::ensure_view_user(conn, &actor, id)?;
        users::storage::require(conn, id)?;
        Ok::<_, ApiError>(flashcards::storage::list_user_decks(conn, id)?)
    })?;
    Ok(Json(decks))
}
