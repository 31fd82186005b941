//! Audit/recording sink for the integration reliability layer.
//!
//! The [`Bridge`] trait is the seam through which the registry, circuit
//! breaker, and saga orchestrator hand off audit records. All recording is
//! fire-and-forget from the caller's perspective: a failing bridge call is
//! logged and swallowed at the call site, never propagated.
//!
//! [`NoopBridge`] satisfies the trait for deployments without a persistence
//! layer, so no component ever special-cases "bridge absent".

pub mod error;
pub mod memory;
pub mod records;
pub mod sink;

pub use error::{BridgeError, Result};
pub use memory::InMemoryBridge;
pub use records::{
    CircuitBreakerEventRecord, SagaExecutionRecord, SagaStepRecord, ServiceRegistryEventRecord,
};
pub use sink::{Bridge, NoopBridge};
