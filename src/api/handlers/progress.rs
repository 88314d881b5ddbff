//! Study and progress endpoints

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{ApiJson, ApiPath, ApiQuery, AuthUser};
use crate::api::AppState;
use crate::flashcards;
use crate::permissions;
use crate::progress::{
    self,
    queue::{self, QueuedCard},
    tracker, RateCardRequest, StudySessionRequest, UserProgress,
};
use crate::users::User;

fn ensure_deck_access(conn: &rusqlite::Connection, actor: &User, deck_id: Uuid) -> ApiResult<()> {
    let deck = flashcards::storage::require_deck(conn, deck_id)?;
    permissions::ensure_view_deck(conn, actor, &deck)?;
    Ok(())
}

pub async fn list_progress(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> ApiResult<Json<Vec<UserProgress>>> {
    let list = state.db.read(|conn| tracker::list_current_progress(conn, actor.id))?;
    Ok(Json(list))
}

/// The caller's progress on a deck; a deck never studied reads as zero.
pub async fn get_progress(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(deck_id): ApiPath<Uuid>,
) -> ApiResult<Json<UserProgress>> {
    let record = state.db.read(|conn| {
        ensure_deck_access(conn, &actor, deck_id)?;
        Ok::<_, ApiError>(tracker::current_progress(conn, actor.id, deck_id)?)
    })?;
    Ok(Json(record))
}

pub async fn reset_progress(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(deck_id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    let removed = state.db.write(|tx| progress::storage::delete(tx, actor.id, deck_id))?;
    if !removed {
        return Err(ApiError::NotFound("Progress not found".to_string()));
    }
    log::info!("{} reset progress on deck {}", actor.username, deck_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn rate_card(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(deck_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<RateCardRequest>,
) -> ApiResult<Json<UserProgress>> {
    let now = Utc::now();
    let record = state.db.write(|tx| {
        ensure_deck_access(tx, &actor, deck_id)?;
        Ok::<_, ApiError>(tracker::record_study(
            tx,
            actor.id,
            deck_id,
            &[(req.card_id, req.rating)],
            req.duration_seconds.unwrap_or(0),
            now,
        )?)
    })?;
    Ok(Json(record))
}

/// Record a whole study session in one transaction.
pub async fn record_session(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(deck_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<StudySessionRequest>,
) -> ApiResult<Json<UserProgress>> {
    let now = Utc::now();
    let ratings: Vec<(Uuid, i64)> = req.ratings.iter().map(|r| (r.card_id, r.rating)).collect();

    let record = state.db.write(|tx| {
        ensure_deck_access(tx, &actor, deck_id)?;
        Ok::<_, ApiError>(tracker::record_study(tx, actor.id, deck_id, &ratings, req.duration_seconds, now)?)
    })?;
    log::info!(
        "{} studied {} card(s) on deck {}",
        actor.username,
        ratings.len(),
        deck_id
    );
    Ok(Json(record))
}

/// Another user's progress, for their teachers and admins.
pub async fn user_progress(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath((deck_id, user_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Json<UserProgress>> {
    let record = state.db.read(|conn| {
        flashcards::storage::require_deck(conn, deck_id)?;
        permissions::ensure_view_progress(conn, &actor, user_id, deck_id)?;
        Ok::<_, ApiError>(tracker::current_progress(conn, user_id, deck_id)?)
    })?;
    Ok(Json(record))
}

#[derive(Debug, Default, Deserialize)]
pub struct QueueParams {
    pub limit: Option<usize>,
}

pub async fn study_queue(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(deck_id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<QueueParams>,
) -> ApiResult<Json<Vec<QueuedCard>>> {
    let (cards, record) = state.db.read(|conn| {
        ensure_deck_access(conn, &actor, deck_id)?;
        let cards = flashcards::storage::list_cards(conn, deck_id)?;
        let record = progress::storage::get(conn, actor.id, deck_id)?;
        Ok::<_, ApiError>((cards, record))
    })?;

    let limit = queue::clamp_limit(params.limit);
    Ok(Json(queue::build_queue(cards, record.as_ref(), Utc::now(), limit)))
}
