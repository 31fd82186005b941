//! Saga error types.

use common::SagaId;
use thiserror::Error;

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// No saga exists with the given ID.
    #[error("Saga not found: {0}")]
    SagaNotFound(SagaId),

    /// A saga must have at least one step.
    #[error("Saga '{0}' has no steps")]
    NoSteps(String),

    /// The step index does not exist in the saga.
    #[error("Saga {saga_id} has no step at index {index}")]
    UnknownStep { saga_id: SagaId, index: usize },

    /// A step was invoked before all earlier steps completed. Steps execute
    /// strictly in sequence order within one saga.
    #[error("Step {index} of saga {saga_id} cannot execute before earlier steps complete")]
    OutOfOrder { saga_id: SagaId, index: usize },

    /// A saga step failed after exhausting its retry budget (or on a
    /// terminal error).
    #[error("Saga step '{step}' failed: {reason}")]
    StepFailed { step: String, reason: String },
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
