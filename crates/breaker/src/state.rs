//! Breaker state machine states.

use serde::{Deserialize, Serialize};

/// The state of one dependency's circuit breaker.
///
/// State transitions:
/// ```text
/// Closed ──(failure_threshold failures)──► Open
/// Open ──(open_timeout elapsed, next call)──► HalfOpen
/// HalfOpen ──(success streak)──► Closed
/// HalfOpen ──(any failure)──► Open
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BreakerState {
    /// Calls pass through; failures are counted.
    #[default]
    Closed,

    /// Calls are rejected without touching the dependency.
    Open,

    /// A bounded number of trial calls probe for recovery.
    HalfOpen,
}

impl BreakerState {
    /// Returns true if calls pass through without trial accounting.
    pub fn is_closed(&self) -> bool {
        matches!(self, BreakerState::Closed)
    }

    /// Returns true if calls are currently rejected.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerState::Open)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "Closed",
            BreakerState::Open => "Open",
            BreakerState::HalfOpen => "HalfOpen",
        }
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_closed() {
        assert_eq!(BreakerState::default(), BreakerState::Closed);
        assert!(BreakerState::default().is_closed());
    }

    #[test]
    fn test_predicates() {
        assert!(BreakerState::Open.is_open());
        assert!(!BreakerState::Closed.is_open());
        assert!(!BreakerState::HalfOpen.is_open());
        assert!(!BreakerState::HalfOpen.is_closed());
    }

    #[test]
    fn test_display() {
        assert_eq!(BreakerState::Closed.to_string(), "Closed");
        assert_eq!(BreakerState::Open.to_string(), "Open");
        assert_eq!(BreakerState::HalfOpen.to_string(), "HalfOpen");
    }

    #[test]
    fn test_serialization() {
        let state = BreakerState::HalfOpen;
        let json = serde_json::to_string(&state).unwrap();
        let deserialized: BreakerState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, deserialized);
    }
}
