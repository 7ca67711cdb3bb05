//! API v0 endpoints.
//!
//! Version 0 signals an unstable API -- breaking changes are expected
//! until the pool reaches 1.0.

use axum::{Json, extract::State, http::StatusCode};
use std::sync::Arc;
use utoipa_axum::{router::OpenApiRouter, routes};

use super::server::SharedState;
use crate::api_client::types::{PoolState, ReloadResult, RoundPayout, SessionSummary};
use crate::tracing::prelude::*;

/// Build the v0 API routes with OpenAPI metadata.
pub fn routes() -> OpenApiRouter<SharedState> {
    OpenApiRouter::new()
        .routes(routes!(health))
        .routes(routes!(get_pool))
        .routes(routes!(get_sessions))
        .routes(routes!(get_rounds))
        .routes(routes!(reload_credentials))
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = OK, description = "Server is running", body = String),
    ),
)]
async fn health() -> &'static str {
    "OK"
}

/// Return the current pool state snapshot.
#[utoipa::path(
    get,
    path = "/pool",
    tag = "pool",
    responses(
        (status = OK, description = "Current pool state", body = PoolState),
    ),
)]
async fn get_pool(State(state): State<SharedState>) -> Json<PoolState> {
    Json(state.pool.state())
}

/// Return all authenticated sessions.
#[utoipa::path(
    get,
    path = "/sessions",
    tag = "sessions",
    responses(
        (status = OK, description = "Connected miners", body = Vec<SessionSummary>),
    ),
)]
async fn get_sessions(State(state): State<SharedState>) -> Json<Vec<SessionSummary>> {
    Json(state.pool.sessions())
}

/// Return recently closed rounds, oldest first.
#[utoipa::path(
    get,
    path = "/rounds",
    tag = "rounds",
    responses(
        (status = OK, description = "Payout history", body = Vec<RoundPayout>),
    ),
)]
async fn get_rounds(State(state): State<SharedState>) -> Json<Vec<RoundPayout>> {
    Json(state.pool.rounds())
}

/// Re-read the credential file. The previous set stays on failure.
#[utoipa::path(
    post,
    path = "/credentials/reload",
    tag = "credentials",
    responses(
        (status = OK, description = "Credentials reloaded", body = ReloadResult),
        (status = INTERNAL_SERVER_ERROR, description = "Reload failed, previous set kept"),
    ),
)]
async fn reload_credentials(
    State(state): State<SharedState>,
) -> Result<Json<ReloadResult>, StatusCode> {
    let pool = Arc::clone(&state.pool);
    let result = tokio::task::spawn_blocking(move || pool.reload_credentials())
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    match result {
        Ok(logins) => Ok(Json(ReloadResult { logins })),
        Err(e) => {
            warn!(error = %e, "Credential reload via API failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
