//! Saga and step status machines.

use serde::{Deserialize, Serialize};

/// The status of a saga in its lifecycle.
///
/// Status transitions:
/// ```text
/// Pending ──► Running ──┬──► Completed
///                       └──► Compensating ──► Compensated
///                       └──► Failed            (compensation disabled)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaStatus {
    /// Saga created but the driver has not started yet.
    #[default]
    Pending,

    /// Steps are being executed.
    Running,

    /// All steps completed successfully (terminal).
    Completed,

    /// A step failed terminally and compensation was disabled (terminal).
    Failed,

    /// A step failed terminally; compensating actions are in progress.
    Compensating,

    /// The compensation sweep finished (terminal).
    Compensated,
}

impl SagaStatus {
    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaStatus::Completed | SagaStatus::Failed | SagaStatus::Compensated
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Pending => "Pending",
            SagaStatus::Running => "Running",
            SagaStatus::Completed => "Completed",
            SagaStatus::Failed => "Failed",
            SagaStatus::Compensating => "Compensating",
            SagaStatus::Compensated => "Compensated",
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The status of a single step within a saga.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StepStatus {
    /// Not reached yet.
    #[default]
    Pending,

    /// The forward action is in flight (or between retries).
    Executing,

    /// The forward action succeeded.
    Completed,

    /// The forward action failed terminally. A failed step is never
    /// compensated, since it never completed.
    Failed,

    /// Its compensating action is in flight.
    Compensating,

    /// Covered by the compensation sweep (whether or not a compensating
    /// action was defined, and regardless of the compensation's outcome).
    Compensated,
}

impl StepStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "Pending",
            StepStatus::Executing => "Executing",
            StepStatus::Completed => "Completed",
            StepStatus::Failed => "Failed",
            StepStatus::Compensating => "Compensating",
            StepStatus::Compensated => "Compensated",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_statuses() {
        assert_eq!(SagaStatus::default(), SagaStatus::Pending);
        assert_eq!(StepStatus::default(), StepStatus::Pending);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!SagaStatus::Pending.is_terminal());
        assert!(!SagaStatus::Running.is_terminal());
        assert!(!SagaStatus::Compensating.is_terminal());
        assert!(SagaStatus::Completed.is_terminal());
        assert!(SagaStatus::Failed.is_terminal());
        assert!(SagaStatus::Compensated.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(SagaStatus::Compensating.to_string(), "Compensating");
        assert_eq!(StepStatus::Executing.to_string(), "Executing");
    }

    #[test]
    fn test_serialization() {
        let status = SagaStatus::Compensated;
        let json = serde_json::to_string(&status).unwrap();
        let deserialized: SagaStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(status, deserialized);
    }
}
