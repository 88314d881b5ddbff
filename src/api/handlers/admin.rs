//! Admin-only endpoints plus the health probe

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use super::blocking;
use crate::api::error::ApiResult;
use crate::api::extract::{ApiJson, AuthUser};
use crate::api::AppState;
use crate::permissions;
use crate::settings::{self, SystemSettings, UpdateSettingsRequest};
use crate::stats::{self, SystemStats};
use crate::users::{self, accounts, CreateUserRequest, Role, User};

pub async fn get_settings(State(state): State<AppState>, AuthUser(actor): AuthUser) -> ApiResult<Json<SystemSettings>> {
    permissions::require_role(&actor, &[Role::Admin])?;
    Ok(Json(state.settings()?))
}

pub async fn update_settings(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiJson(req): ApiJson<UpdateSettingsRequest>,
) -> ApiResult<Json<SystemSettings>> {
    permissions::require_role(&actor, &[Role::Admin])?;
    let updated = state.db.write(|tx| settings::update(tx, req))?;
    log::info!("{} updated system settings", actor.username);
    Ok(Json(updated))
}

pub async fn stats(State(state): State<AppState>, AuthUser(actor): AuthUser) -> ApiResult<Json<SystemStats>> {
    permissions::require_role(&actor, &[Role::Admin])?;
    Ok(Json(state.db.read(stats::collect)?))
}

/// Create an account of any role, bypassing the registration settings.
pub async fn create_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    permissions::require_role(&actor, &[Role::Admin])?;

    let user = blocking(move || {
        Ok(accounts::prepare_account(&req.username, &req.email, &req.password, req.role)?)
    })
    .await?;
    state.db.write(|tx| users::storage::insert(tx, &user))?;
    log::info!("{} created {} account {}", actor.username, user.role, user.username);
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
