//! Circuit breaker inspection endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use breaker::CircuitBreakerState;
use bridge::Bridge;

use crate::AppState;
use crate::error::ApiError;

/// GET /breakers — lists the dependency keys with breaker state.
pub async fn list<B: Bridge>(State(state): State<Arc<AppState<B>>>) -> Json<Vec<String>> {
    Json(state.breaker.known_dependencies().await)
}

/// GET /breakers/{id} — returns one dependency's breaker snapshot.
pub async fn get<B: Bridge>(
    State(state): State<Arc<AppState<B>>>,
    Path(dependency_id): Path<String>,
) -> Result<Json<CircuitBreakerState>, ApiError> {
    state
        .breaker
        .snapshot(&dependency_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no breaker for dependency '{dependency_id}'")))
}
