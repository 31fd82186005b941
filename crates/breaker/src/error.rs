use thiserror::Error;

/// Errors produced by breaker admission.
#[derive(Debug, Error)]
pub enum BreakerError {
    /// The breaker for this dependency is open; the call was rejected
    /// without any attempt against the dependency.
    #[error("Circuit breaker open for dependency '{dependency_id}'")]
    Open { dependency_id: String },
}

/// Error surface of the generic [`call`](crate::CircuitBreaker::call)
/// wrapper: either the breaker rejected the call, or the wrapped call
/// itself failed (and the failure has been reported to the breaker).
#[derive(Debug, Error)]
pub enum CallError<E> {
    /// The breaker rejected the call; the wrapped function never ran.
    #[error(transparent)]
    Rejected(#[from] BreakerError),

    /// The wrapped function ran and failed.
    #[error("Call failed: {0}")]
    Failed(E),
}

impl<E> CallError<E> {
    /// Returns true if the breaker rejected the call outright.
    pub fn is_rejected(&self) -> bool {
        matches!(self, CallError::Rejected(_))
    }
}
