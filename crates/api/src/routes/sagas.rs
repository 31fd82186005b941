//! Saga orchestration endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use bridge::Bridge;
use common::SagaId;
use saga::{SagaContext, SagaExecution, SagaOptions};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;

fn default_true() -> bool {
    true
}

#[derive(Deserialize, Default)]
pub struct StartSagaRequest {
    /// Initial saga context, merged step by step as responses arrive.
    #[serde(default)]
    pub context: Value,
    #[serde(default = "default_true")]
    pub compensate_on_failure: bool,
}

#[derive(Serialize)]
pub struct SagaStartedResponse {
    pub saga_id: SagaId,
    pub name: String,
}

#[derive(Serialize)]
pub struct SagaStatusResponse {
    pub saga_id: SagaId,
    pub name: String,
    pub status: String,
    pub steps: Vec<SagaStepResponse>,
    pub context: Value,
}

#[derive(Serialize)]
pub struct SagaStepResponse {
    pub name: String,
    pub status: String,
    pub dependency_id: String,
    pub retry_count: u32,
    pub error: Option<String>,
    pub compensation_error: Option<String>,
}

impl From<SagaExecution> for SagaStatusResponse {
    fn from(execution: SagaExecution) -> Self {
        Self {
            saga_id: execution.saga_id,
            name: execution.name,
            status: execution.status.to_string(),
            steps: execution
                .steps
                .into_iter()
                .map(|s| SagaStepResponse {
                    name: s.name,
                    status: s.status.to_string(),
                    dependency_id: s.dependency_id,
                    retry_count: s.retry_count,
                    error: s.error,
                    compensation_error: s.compensation_error,
                })
                .collect(),
            context: execution.context.as_value(),
        }
    }
}

/// POST /sagas/{name} — starts a cataloged saga and returns immediately.
pub async fn start<B: Bridge + Clone + Send + Sync + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(name): Path<String>,
    request: Option<Json<StartSagaRequest>>,
) -> Result<(StatusCode, Json<SagaStartedResponse>), ApiError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let definitions = state
        .catalog
        .get(&name)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("no saga named '{name}'")))?;

    let saga_id = state
        .orchestrator
        .start_saga_with_options(
            name.clone(),
            definitions.as_ref().clone(),
            SagaContext::from(request.context),
            SagaOptions {
                compensate_on_failure: request.compensate_on_failure,
            },
        )
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SagaStartedResponse { saga_id, name }),
    ))
}

/// GET /sagas/{id} — returns a saga's execution snapshot.
pub async fn status<B: Bridge + Clone + Send + Sync + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(id): Path<String>,
) -> Result<Json<SagaStatusResponse>, ApiError> {
    let uuid: Uuid = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("'{id}' is not a saga id")))?;
    let execution = state
        .orchestrator
        .get_saga_status(SagaId::from_uuid(uuid))
        .await?;
    Ok(Json(execution.into()))
}
