//! Deck and card endpoints

use axum::{extract::State, http::StatusCode, Json};
use uuid::Uuid;

use super::{clean_text, validated};
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{ApiJson, ApiPath, AuthUser};
use crate::api::AppState;
use crate::flashcards::{
    self, validate_deck_name, AssignDeckRequest, Card, CardContent, CreateDeckRequest, Deck, DeckWithCards,
    ReorderCardsRequest, UpdateCardRequest, UpdateDeckRequest,
};
use crate::permissions;
use crate::progress::tracker;
use crate::users::{self, storage::DeckRelation, Role, User};

// ==================== Decks ====================

pub async fn list_decks(State(state): State<AppState>, AuthUser(actor): AuthUser) -> ApiResult<Json<Vec<Deck>>> {
    let decks = state.db.read(|conn| {
        if actor.is_admin() {
            flashcards::storage::list_all_decks(conn)
        } else {
            flashcards::storage::list_visible_decks(conn, actor.id)
        }
    })?;
    Ok(Json(decks))
}

pub async fn create_deck(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiJson(req): ApiJson<CreateDeckRequest>,
) -> ApiResult<(StatusCode, Json<Deck>)> {
    let mut deck = Deck::new(actor.id, validated(validate_deck_name(&req.name))?);
    deck.description = clean_text(req.description);

    state.db.write(|tx| flashcards::storage::insert_deck(tx, &deck))?;
    log::info!("{} created deck '{}'", actor.username, deck.name);
    Ok((StatusCode::CREATED, Json(deck)))
}

pub async fn get_deck(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<DeckWithCards>> {
    let deck = state.db.read(|conn| {
        let deck = flashcards::storage::require_deck(conn, id)?;
        permissions::ensure_view_deck(conn, &actor, &deck)?;
        let cards = flashcards::storage::list_cards(conn, id)?;
        Ok::<_, ApiError>(DeckWithCards { deck, cards })
    })?;
    Ok(Json(deck))
}

pub async fn update_deck(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateDeckRequest>,
) -> ApiResult<Json<Deck>> {
    let deck = state.db.write(|tx| {
        let mut deck = flashcards::storage::require_deck(tx, id)?;
        permissions::ensure_edit_deck(&actor, &deck)?;

        if let Some(name) = &req.name {
            deck.name = validated(validate_deck_name(name))?;
        }
        if let Some(description) = req.description.clone() {
            deck.description = clean_text(description);
        }
        flashcards::storage::update_deck(tx, &deck)?;
        Ok::<_, ApiError>(flashcards::storage::require_deck(tx, id)?)
    })?;
    Ok(Json(deck))
}

/// Delete a deck together with its cards, progress records, assignments
/// and every class or user link.
pub async fn delete_deck(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    state.db.write(|tx| {
        let deck = flashcards::storage::require_deck(tx, id)?;
        permissions::ensure_edit_deck(&actor, &deck)?;
        Ok::<_, ApiError>(flashcards::storage::delete_deck(tx, id)?)
    })?;
    log::info!("{} deleted deck {}", actor.username, id);
    Ok(StatusCode::NO_CONTENT)
}

/// Add the deck to each listed user's deck list.
pub async fn assign_deck(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<AssignDeckRequest>,
) -> ApiResult<Json<Vec<User>>> {
    permissions::require_role(&actor, &[Role::Teacher, Role::Admin])?;
    if req.user_ids.is_empty() {
        return Err(ApiError::BadRequest("userIds must not be empty".to_string()));
    }

    let assigned = state.db.write(|tx| {
        let deck = flashcards::storage::require_deck(tx, id)?;
        permissions::ensure_view_deck(tx, &actor, &deck)?;

        let mut assigned = Vec::with_capacity(req.user_ids.len());
        for &user_id in &req.user_ids {
            let target = users::storage::require(tx, user_id)?;
            permissions::ensure_assign_deck(tx, &actor, &target)?;
            users::storage::link_deck(tx, user_id, id, DeckRelation::Assigned, Some(actor.id))?;
            assigned.push(users::storage::require(tx, user_id)?);
        }
        Ok::<_, ApiError>(assigned)
    })?;

    log::info!("{} assigned deck {} to {} user(s)", actor.username, id, assigned.len());
    Ok(Json(assigned))
}

pub async fn unassign_deck(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath((id, user_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    permissions::require_role(&actor, &[Role::Teacher, Role::Admin])?;

    state.db.write(|tx| {
        flashcards::storage::require_deck(tx, id)?;
        let target = users::storage::require(tx, user_id)?;
        permissions::ensure_assign_deck(tx, &actor, &target)?;

        if !users::storage::unlink_assigned_deck(tx, user_id, id)? {
            return Err(ApiError::NotFound("Deck is not assigned to this user".to_string()));
        }
        Ok(())
    })?;
    Ok(StatusCode::NO_CONTENT)
}

// ==================== Cards ====================

pub async fn list_cards(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<Card>>> {
    let cards = state.db.read(|conn| {
        let deck = flashcards::storage::require_deck(conn, id)?;
        permissions::ensure_view_deck(conn, &actor, &deck)?;
        Ok::<_, ApiError>(flashcards::storage::list_cards(conn, id)?)
    })?;
    Ok(Json(cards))
}

pub async fn create_card(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(content): ApiJson<CardContent>,
) -> ApiResult<(StatusCode, Json<Card>)> {
    let content = validated(content.validate(state.config.max_image_bytes))?;

    let card = state.db.write(|tx| {
        let deck = flashcards::storage::require_deck(tx, id)?;
        permissions::ensure_edit_deck(&actor, &deck)?;

        let mut card = Card::new(id, content);
        flashcards::storage::insert_card(tx, &mut card)?;
        Ok::<_, ApiError>(card)
    })?;
    Ok((StatusCode::CREATED, Json(card)))
}

pub async fn update_card(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateCardRequest>,
) -> ApiResult<Json<Card>> {
    let max_image_bytes = state.config.max_image_bytes;

    let card = state.db.write(|tx| {
        let mut card = flashcards::storage::require_card(tx, id)?;
        let deck = flashcards::storage::require_deck(tx, card.deck_id)?;
        permissions::ensure_edit_deck(&actor, &deck)?;

        let content = validated(req.apply_to(&card).validate(max_image_bytes))?;
        card.question = content.question;
        card.answer = content.answer;
        card.card_type = content.card_type;
        card.options = content.options;
        card.image = content.image;

        flashcards::storage::update_card(tx, &card)?;
        Ok::<_, ApiError>(flashcards::storage::require_card(tx, id)?)
    })?;
    Ok(Json(card))
}

/// Delete a card and drop it from every progress record of its deck.
pub async fn delete_card(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    state.db.write(|tx| {
        let card = flashcards::storage::require_card(tx, id)?;
        let deck = flashcards::storage::require_deck(tx, card.deck_id)?;
        permissions::ensure_edit_deck(&actor, &deck)?;

        flashcards::storage::delete_card(tx, id)?;
        let touched = tracker::forget_card(tx, card.deck_id, id)?;
        log::debug!("Card {} removed from {} progress record(s)", id, touched);
        Ok::<_, ApiError>(())
    })?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reorder_cards(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ReorderCardsRequest>,
) -> ApiResult<Json<Vec<Card>>> {
    let cards = state.db.write(|tx| {
        let deck = flashcards::storage::require_deck(tx, id)?;
        permissions::ensure_edit_deck(&actor, &deck)?;

        flashcards::storage::reorder_cards(tx, id, &req.card_ids)?;
        Ok::<_, ApiError>(flashcards::storage::list_cards(tx, id)?)
    })?;
    Ok(Json(cards))
}
