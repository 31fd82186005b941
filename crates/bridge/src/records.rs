//! Record types handed to the bridge.
//!
//! Statuses cross this boundary as strings rather than the source enums so
//! the bridge stays a leaf crate that the registry, breaker, and saga crates
//! can all depend on without cycles.

use chrono::{DateTime, Utc};
use common::{SagaId, StepId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Snapshot of a saga execution for the audit sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaExecutionRecord {
    /// The saga instance ID.
    pub saga_id: SagaId,
    /// Human-readable saga name (e.g. "provision-agent").
    pub name: String,
    /// Current saga status.
    pub status: String,
    /// Opaque key/value context passed to all steps.
    pub context: Value,
    /// When the saga started.
    pub started_at: DateTime<Utc>,
    /// When the saga reached a terminal status, if it has.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Snapshot of a single saga step for the audit sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaStepRecord {
    /// The step ID.
    pub step_id: StepId,
    /// The saga this step belongs to.
    pub saga_id: SagaId,
    /// Step name.
    pub name: String,
    /// Position within the saga (steps execute in this order).
    pub sequence_index: usize,
    /// Current step status.
    pub status: String,
    /// The dependency key the step calls through.
    pub dependency_id: String,
    /// Context snapshot captured when the step was invoked.
    pub request_payload: Value,
    /// Response stored after a successful execution.
    pub response_payload: Option<Value>,
    /// Number of retries consumed so far.
    pub retry_count: u32,
    /// Whether the step carries a compensating action.
    pub compensation_defined: bool,
    /// Error from the forward execution, if any.
    pub error: Option<String>,
    /// Error from the compensating action, if any (recorded distinctly).
    pub compensation_error: Option<String>,
}

/// A circuit breaker state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerEventRecord {
    /// The dependency the breaker guards.
    pub dependency_id: String,
    /// Transition name: "opened", "half_open", "closed", "reopened".
    pub event: String,
    /// Breaker state after the transition.
    pub state: String,
    /// Failure count at the time of the transition.
    pub failure_count: u32,
    /// When the transition happened.
    pub occurred_at: DateTime<Utc>,
}

/// A service registry mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRegistryEventRecord {
    /// The service the event concerns.
    pub service_id: String,
    /// Event name: "registered", "updated", "deregistered",
    /// "health_change", "heartbeat", "marked_stale".
    pub event: String,
    /// Optional event-specific detail (e.g. the new health status).
    pub detail: Option<Value>,
    /// When the mutation happened.
    pub occurred_at: DateTime<Utc>,
}
