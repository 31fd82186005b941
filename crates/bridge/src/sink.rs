use async_trait::async_trait;

use crate::Result;
use crate::records::{
    CircuitBreakerEventRecord, SagaExecutionRecord, SagaStepRecord, ServiceRegistryEventRecord,
};

/// The injected audit/recording sink.
///
/// Implementations persist records to whatever backing store the deployment
/// uses; this layer never looks at them again. All methods are best-effort
/// from the caller's side: callers log and swallow errors, so an
/// implementation may fail without affecting the primary operation it
/// describes.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Bridge: Send + Sync {
    /// Records a newly started saga execution.
    async fn record_saga_execution(&self, record: SagaExecutionRecord) -> Result<()>;

    /// Updates a previously recorded saga execution (status changes,
    /// completion timestamp).
    async fn update_saga_execution(&self, record: SagaExecutionRecord) -> Result<()>;

    /// Records a saga step when it first starts executing.
    async fn record_saga_step(&self, record: SagaStepRecord) -> Result<()>;

    /// Updates a previously recorded saga step (completion, failure,
    /// compensation).
    async fn update_saga_step(&self, record: SagaStepRecord) -> Result<()>;

    /// Records a circuit breaker state transition.
    async fn record_circuit_breaker_event(&self, record: CircuitBreakerEventRecord) -> Result<()>;

    /// Records a service registry mutation.
    async fn record_service_registry_event(
        &self,
        record: ServiceRegistryEventRecord,
    ) -> Result<()>;
}

/// Bridge implementation that drops every record.
///
/// Used by deployments without a persistence layer. Keeping this as a real
/// implementation means the registry, breaker, and orchestrator never carry
/// an `Option<Bridge>` or scatter "is there a sink?" checks through control
/// flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBridge;

impl NoopBridge {
    /// Creates a new no-op bridge.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Bridge for NoopBridge {
    async fn record_saga_execution(&self, _record: SagaExecutionRecord) -> Result<()> {
        Ok(())
    }

    async fn update_saga_execution(&self, _record: SagaExecutionRecord) -> Result<()> {
        Ok(())
    }

    async fn record_saga_step(&self, _record: SagaStepRecord) -> Result<()> {
        Ok(())
    }

    async fn update_saga_step(&self, _record: SagaStepRecord) -> Result<()> {
        Ok(())
    }

    async fn record_circuit_breaker_event(&self, _record: CircuitBreakerEventRecord) -> Result<()> {
        Ok(())
    }

    async fn record_service_registry_event(
        &self,
        _record: ServiceRegistryEventRecord,
    ) -> Result<()> {
        Ok(())
    }
}
