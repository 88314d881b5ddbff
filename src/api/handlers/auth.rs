//! Registration, login and password changes

use axum::{extract::State, http::StatusCode, Json};

use super::blocking;
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{ApiJson, AuthUser};
use crate::api::AppState;
use crate::auth::{self, AuthError};
use crate::users::{
    self, accounts, AuthResponse, ChangePasswordRequest, LoginRequest, RegisterRequest, Role, User,
};

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let settings = state.settings()?;
    if !settings.registration_open {
        return Err(ApiError::Forbidden("Registration is closed".to_string()));
    }

    let role = req.role.unwrap_or_default();
    match role {
        Role::Student => {}
        Role::Teacher if settings.allow_teacher_signup => {}
        Role::Teacher => {
            return Err(ApiError::Forbidden("Teacher sign-up is disabled".to_string()));
        }
        Role::Admin => {
            return Err(ApiError::Forbidden("Admin accounts cannot self-register".to_string()));
        }
    }

    let user = blocking(move || {
        Ok(accounts::prepare_account(&req.username, &req.email, &req.password, role)?)
    })
    .await?;
    state.db.write(|tx| users::storage::insert(tx, &user))?;
    log::info!("Registered {} as {}", user.username, user.role);

    let token = state.signer.issue(&user)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let user = state.db.read(|conn| users::storage::find_by_login(conn, &req.login))?;

    // Unknown account and wrong password look the same to the client
    let user = match user {
        Some(user) => user,
        None => return Err(AuthError::InvalidCredentials.into()),
    };
    let hash = user.password_hash.clone();
    if !blocking(move || Ok(auth::verify_password(&req.password, &hash))).await? {
        return Err(AuthError::InvalidCredentials.into());
    }

    let token = state.signer.issue(&user)?;
    log::info!("{} logged in", user.username);
    Ok(Json(AuthResponse { token, user }))
}

pub async fn me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    let current_hash = user.password_hash.clone();
    let hash = blocking(move || {
        if !auth::verify_password(&req.current_password, &current_hash) {
            return Err(ApiError::Unauthorized("Current password is incorrect".to_string()));
        }
        Ok(auth::hash_password(&req.new_password)?)
    })
    .await?;
    state.db.write(|tx| users::storage::update_password(tx, user.id, &hash))?;
    log::info!("{} changed their password", user.username);
    Ok(StatusCode::NO_CONTENT)
}
