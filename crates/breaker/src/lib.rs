//! Circuit breakers keyed per dependency.
//!
//! Each downstream dependency gets its own breaker instance, created lazily
//! on first call and kept for the process lifetime. A breaker moves through
//! closed → open → half-open based on recent success/failure history,
//! rejecting calls outright while open so a failing dependency sees zero
//! network attempts.
//!
//! Callers follow a split contract: check [`CircuitBreaker::allow_call`]
//! before the real call, then invoke [`CircuitBreaker::report_outcome`]
//! exactly once per permitted attempt. A call rejected while open must not
//! report an outcome — which is also why an open breaker never counts its
//! own rejections as new failures. The [`CircuitBreaker::call`] wrapper
//! bundles the contract for callers outside the saga orchestrator.

pub mod breaker;
pub mod config;
pub mod error;
pub mod state;

pub use breaker::{CircuitBreaker, CircuitBreakerState};
pub use config::BreakerConfig;
pub use error::{BreakerError, CallError};
pub use state::BreakerState;
