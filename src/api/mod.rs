//! JSON REST API
//!
//! Every route lives under `/api`. Handlers run their storage work through
//! [`Database::read`] / [`Database::write`] so each request is one
//! transaction.

pub mod error;
pub mod extract;
mod handlers;
pub mod middleware;

use std::future::Future;
use std::sync::Arc;

use axum::{
    http::{HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::auth::TokenSigner;
use crate::config::ServerConfig;
use crate::settings::{self, SystemSettings};
use crate::storage::Database;

pub use error::{ApiError, ApiResult};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub signer: Arc<TokenSigner>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(db: Database, signer: TokenSigner, config: ServerConfig) -> Self {
        Self {
            db: Arc::new(db),
            signer: Arc::new(signer),
            config: Arc::new(config),
        }
    }

    pub fn settings(&self) -> ApiResult<SystemSettings> {
        Ok(self.db.read(settings::load)?)
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    use handlers::{admin, assignments, auth, classes, dashboard, decks, progress, users};

    let api = Router::new()
        // auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/auth/password", put(auth::change_password))
        // users
        .route("/users", get(users::list_users))
        .route(
            "/users/{id}",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        .route("/users/{id}/decks", get(users::user_decks))
        .route("/dashboard", get(dashboard::dashboard))
        // decks & cards
        .route("/decks", get(decks::list_decks).post(decks::create_deck))
        .route(
            "/decks/{id}",
            get(decks::get_deck).put(decks::update_deck).delete(decks::delete_deck),
        )
        .route("/decks/{id}/assign", post(decks::assign_deck))
        .route("/decks/{id}/assign/{user_id}", delete(decks::unassign_deck))
        .route("/decks/{id}/cards", get(decks::list_cards).post(decks::create_card))
        .route("/decks/{id}/cards/order", put(decks::reorder_cards))
        .route("/cards/{id}", put(decks::update_card).delete(decks::delete_card))
        // classes
        .route("/classes", get(classes::list_classes).post(classes::create_class))
        .route("/classes/join", post(classes::join_class))
        .route(
            "/classes/{id}",
            get(classes::get_class).put(classes::update_class).delete(classes::delete_class),
        )
        .route("/classes/{id}/students", post(classes::add_student))
        .route("/classes/{id}/students/{student_id}", delete(classes::remove_student))
        .route("/classes/{id}/join-code", post(classes::regenerate_join_code))
        .route("/classes/{id}/decks", post(classes::add_deck))
        .route("/classes/{id}/decks/{deck_id}", delete(classes::remove_deck))
        .route("/classes/{id}/progress", get(classes::class_progress))
        .route("/classes/{id}/progress.csv", get(classes::class_progress_csv))
        // assignments
        .route(
            "/classes/{id}/assignments",
            get(assignments::list_class_assignments).post(assignments::create_assignment),
        )
        .route("/assignments", get(assignments::list_assignments))
        .route(
            "/assignments/{id}",
            get(assignments::get_assignment)
                .put(assignments::update_assignment)
                .delete(assignments::delete_assignment),
        )
        .route("/assignments/{id}/submit", post(assignments::submit_assignment))
        // progress & study
        .route("/progress", get(progress::list_progress))
        .route(
            "/progress/{deck_id}",
            get(progress::get_progress).delete(progress::reset_progress),
        )
        .route("/progress/{deck_id}/ratings", post(progress::rate_card))
        .route("/progress/{deck_id}/sessions", post(progress::record_session))
        .route("/progress/{deck_id}/users/{user_id}", get(progress::user_progress))
        .route("/study/{deck_id}/queue", get(progress::study_queue))
        // admin
        .route(
            "/admin/settings",
            get(admin::get_settings).put(admin::update_settings),
        )
        .route("/admin/stats", get(admin::stats))
        .route("/admin/users", post(admin::create_user))
        .route("/health", get(admin::health));

    Router::new()
        .nest("/api", api)
        .layer(axum::middleware::from_fn(middleware::log_requests))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}

/// Serve on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = router(state);
    log::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown.await;
            log::info!("Server shutting down");
        })
        .await
}

#[cfg(test)]
mod tests;
