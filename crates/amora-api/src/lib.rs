pub mod auth;
pub mod error;
pub mod likes;
pub mod messages;
pub mod middleware;
pub mod pagination;

use std::sync::Arc;

use axum::{
    Json, Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use serde_json::{Value, json};
use tracing::error;

use amora_db::Database;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    /// Lifetime of issued tokens.
    pub token_days: i64,
}

/// All REST routes. `/auth/*` and `/health` are public; everything under
/// `/api` requires a bearer token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/api/likes", get(likes::get_user_likes))
        .route("/api/likes/{username}", post(likes::add_like))
        .route(
            "/api/messages",
            get(messages::get_messages_for_user).post(messages::create_message),
        )
        .route("/api/messages/thread/{username}", get(messages::get_message_thread))
        .route("/api/messages/{id}", delete(messages::delete_message))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Run blocking DB work off the async runtime.
pub(crate) async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
}

/// Timestamps are stored as RFC 3339 UTC strings with milliseconds.
pub(crate) fn parse_timestamp(raw: &str) -> chrono::DateTime<chrono::Utc> {
    raw.parse::<chrono::DateTime<chrono::Utc>>()
        .unwrap_or_else(|e| {
            tracing::warn!("Corrupt timestamp '{}': {}", raw, e);
            chrono::DateTime::default()
        })
}

pub(crate) fn parse_uuid(raw: &str) -> uuid::Uuid {
    raw.parse().unwrap_or_else(|e| {
        tracing::warn!("Corrupt id '{}': {}", raw, e);
        uuid::Uuid::default()
    })
}
