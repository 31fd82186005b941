//! Service registry endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use bridge::Bridge;
use registry::{HealthStatus, ServiceInfo, ServiceRegistration};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct RegisteredResponse {
    pub service_id: String,
}

#[derive(Deserialize, Default)]
pub struct ListQuery {
    pub capability: Option<String>,
}

#[derive(Deserialize)]
pub struct ReportHealthRequest {
    pub status: HealthStatus,
}

/// POST /services — registers or updates a service instance.
pub async fn register<B: Bridge>(
    State(state): State<Arc<AppState<B>>>,
    Json(info): Json<ServiceInfo>,
) -> Result<(StatusCode, Json<RegisteredResponse>), ApiError> {
    if info.service_id.is_empty() {
        return Err(ApiError::BadRequest("service_id must not be empty".into()));
    }
    let service_id = state.registry.register(info).await;
    Ok((StatusCode::CREATED, Json(RegisteredResponse { service_id })))
}

/// GET /services — lists registrations, optionally filtered by capability.
pub async fn list<B: Bridge>(
    State(state): State<Arc<AppState<B>>>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<ServiceRegistration>> {
    let registrations = match query.capability {
        Some(capability) => state.registry.list_by_capability(&capability).await,
        None => state.registry.list_all().await,
    };
    Json(registrations)
}

/// GET /services/{id} — resolves a single registration.
pub async fn get<B: Bridge>(
    State(state): State<Arc<AppState<B>>>,
    Path(service_id): Path<String>,
) -> Result<Json<ServiceRegistration>, ApiError> {
    let registration = state.registry.resolve(&service_id).await?;
    Ok(Json(registration))
}

/// DELETE /services/{id} — removes a registration.
pub async fn deregister<B: Bridge>(
    State(state): State<Arc<AppState<B>>>,
    Path(service_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.registry.deregister(&service_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /services/{id}/heartbeat — refreshes an instance's liveness.
pub async fn heartbeat<B: Bridge>(
    State(state): State<Arc<AppState<B>>>,
    Path(service_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.registry.heartbeat(&service_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /services/{id}/health — sets an instance's reported health.
pub async fn report_health<B: Bridge>(
    State(state): State<Arc<AppState<B>>>,
    Path(service_id): Path<String>,
    Json(request): Json<ReportHealthRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .registry
        .report_health(&service_id, request.status)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
