//! Saga execution state.
//!
//! A `SagaExecution` and its `SagaStep`s are created at `start_saga`,
//! mutated only by the orchestrator, and retired to the audit sink once a
//! terminal status is reached. This layer never deletes them.

use chrono::{DateTime, Utc};
use common::{SagaId, StepId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use bridge::{SagaExecutionRecord, SagaStepRecord};

use crate::context::SagaContext;
use crate::state::{SagaStatus, StepStatus};
use crate::step::StepDefinition;

/// Runtime record of one step within a saga.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaStep {
    /// Stable step identifier.
    pub step_id: StepId,
    /// The saga this step belongs to.
    pub saga_id: SagaId,
    /// Step name from the definition.
    pub name: String,
    /// Position within the saga; steps execute strictly in this order.
    pub sequence_index: usize,
    /// Current status.
    pub status: StepStatus,
    /// Circuit breaker key the step calls through.
    pub dependency_id: String,
    /// Context snapshot captured when the step was first invoked.
    pub request_payload: Value,
    /// Response stored on successful completion.
    pub response_payload: Option<Value>,
    /// Retries consumed so far.
    pub retry_count: u32,
    /// Whether the definition carries a compensating action.
    pub compensation_defined: bool,
    /// Error from the forward action, if it failed.
    pub error: Option<String>,
    /// Error from the compensating action, recorded distinctly.
    pub compensation_error: Option<String>,
}

impl SagaStep {
    fn from_definition(saga_id: SagaId, sequence_index: usize, def: &StepDefinition) -> Self {
        Self {
            step_id: StepId::new(),
            saga_id,
            name: def.name.clone(),
            sequence_index,
            status: StepStatus::Pending,
            dependency_id: def.dependency_id.clone(),
            request_payload: Value::Null,
            response_payload: None,
            retry_count: 0,
            compensation_defined: def.compensation_defined(),
            error: None,
            compensation_error: None,
        }
    }

    /// Converts this step into an audit record.
    pub fn to_record(&self) -> SagaStepRecord {
        SagaStepRecord {
            step_id: self.step_id,
            saga_id: self.saga_id,
            name: self.name.clone(),
            sequence_index: self.sequence_index,
            status: self.status.to_string(),
            dependency_id: self.dependency_id.clone(),
            request_payload: self.request_payload.clone(),
            response_payload: self.response_payload.clone(),
            retry_count: self.retry_count,
            compensation_defined: self.compensation_defined,
            error: self.error.clone(),
            compensation_error: self.compensation_error.clone(),
        }
    }
}

/// Runtime record of one saga.
///
/// Also serves as the snapshot returned by `get_saga_status` — it carries
/// no handler state, only data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaExecution {
    /// Stable saga identifier.
    pub saga_id: SagaId,
    /// Saga name (e.g. "provision-agent").
    pub name: String,
    /// Current status.
    pub status: SagaStatus,
    /// Steps in execution order.
    pub steps: Vec<SagaStep>,
    /// Context passed to all steps, accumulating step responses.
    pub context: SagaContext,
    /// When the saga was created.
    pub started_at: DateTime<Utc>,
    /// When the saga reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Whether a terminal step failure triggers the compensation sweep.
    pub compensate_on_failure: bool,
}

impl SagaExecution {
    /// Creates a pending execution from step definitions.
    pub fn new(
        name: impl Into<String>,
        definitions: &[StepDefinition],
        context: SagaContext,
        compensate_on_failure: bool,
    ) -> Self {
        let saga_id = SagaId::new();
        let steps = definitions
            .iter()
            .enumerate()
            .map(|(i, def)| SagaStep::from_definition(saga_id, i, def))
            .collect();
        Self {
            saga_id,
            name: name.into(),
            status: SagaStatus::Pending,
            steps,
            context,
            started_at: Utc::now(),
            completed_at: None,
            compensate_on_failure,
        }
    }

    /// Returns the indices of completed steps, in ascending order.
    pub fn completed_indices(&self) -> Vec<usize> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .map(|s| s.sequence_index)
            .collect()
    }

    /// Returns the names of completed steps, in ascending order.
    pub fn completed_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Returns the first failed step, if any.
    pub fn failed_step(&self) -> Option<&SagaStep> {
        self.steps.iter().find(|s| s.status == StepStatus::Failed)
    }

    /// Converts this execution into an audit record.
    pub fn to_record(&self) -> SagaExecutionRecord {
        SagaExecutionRecord {
            saga_id: self.saga_id,
            name: self.name.clone(),
            status: self.status.to_string(),
            context: self.context.as_value(),
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}
