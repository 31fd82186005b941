use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{BridgeError, Result};
use crate::records::{
    CircuitBreakerEventRecord, SagaExecutionRecord, SagaStepRecord, ServiceRegistryEventRecord,
};
use crate::sink::Bridge;

#[derive(Debug, Default)]
struct InMemoryBridgeState {
    saga_executions: Vec<SagaExecutionRecord>,
    saga_execution_updates: Vec<SagaExecutionRecord>,
    saga_steps: Vec<SagaStepRecord>,
    saga_step_updates: Vec<SagaStepRecord>,
    breaker_events: Vec<CircuitBreakerEventRecord>,
    registry_events: Vec<ServiceRegistryEventRecord>,
    fail_all: bool,
}

/// In-memory bridge implementation for testing.
///
/// Stores every record it receives and exposes inspection helpers. Can be
/// switched into a failing mode to verify that callers swallow bridge errors
/// instead of propagating them.
#[derive(Clone, Default)]
pub struct InMemoryBridge {
    state: Arc<RwLock<InMemoryBridgeState>>,
}

impl InMemoryBridge {
    /// Creates a new empty in-memory bridge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent recording call return an error.
    pub async fn set_fail_all(&self, fail: bool) {
        self.state.write().await.fail_all = fail;
    }

    /// Returns all recorded saga executions (initial records only).
    pub async fn saga_executions(&self) -> Vec<SagaExecutionRecord> {
        self.state.read().await.saga_executions.clone()
    }

    /// Returns all saga execution updates, in arrival order.
    pub async fn saga_execution_updates(&self) -> Vec<SagaExecutionRecord> {
        self.state.read().await.saga_execution_updates.clone()
    }

    /// Returns all recorded saga steps (initial records only).
    pub async fn saga_steps(&self) -> Vec<SagaStepRecord> {
        self.state.read().await.saga_steps.clone()
    }

    /// Returns all saga step updates, in arrival order.
    pub async fn saga_step_updates(&self) -> Vec<SagaStepRecord> {
        self.state.read().await.saga_step_updates.clone()
    }

    /// Returns all recorded circuit breaker events, in arrival order.
    pub async fn breaker_events(&self) -> Vec<CircuitBreakerEventRecord> {
        self.state.read().await.breaker_events.clone()
    }

    /// Returns all recorded registry events, in arrival order.
    pub async fn registry_events(&self) -> Vec<ServiceRegistryEventRecord> {
        self.state.read().await.registry_events.clone()
    }

    /// Returns the total number of records received.
    pub async fn record_count(&self) -> usize {
        let state = self.state.read().await;
        state.saga_executions.len()
            + state.saga_execution_updates.len()
            + state.saga_steps.len()
            + state.saga_step_updates.len()
            + state.breaker_events.len()
            + state.registry_events.len()
    }

    /// Clears all recorded data.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.saga_executions.clear();
        state.saga_execution_updates.clear();
        state.saga_steps.clear();
        state.saga_step_updates.clear();
        state.breaker_events.clear();
        state.registry_events.clear();
    }
}

#[async_trait]
impl Bridge for InMemoryBridge {
    async fn record_saga_execution(&self, record: SagaExecutionRecord) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_all {
            return Err(BridgeError::Unavailable("in-memory bridge failing".into()));
        }
        state.saga_executions.push(record);
        Ok(())
    }

    async fn update_saga_execution(&self, record: SagaExecutionRecord) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_all {
            return Err(BridgeError::Unavailable("in-memory bridge failing".into()));
        }
        state.saga_execution_updates.push(record);
        Ok(())
    }

    async fn record_saga_step(&self, record: SagaStepRecord) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_all {
            return Err(BridgeError::Unavailable("in-memory bridge failing".into()));
        }
        state.saga_steps.push(record);
        Ok(())
    }

    async fn update_saga_step(&self, record: SagaStepRecord) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_all {
            return Err(BridgeError::Unavailable("in-memory bridge failing".into()));
        }
        state.saga_step_updates.push(record);
        Ok(())
    }

    async fn record_circuit_breaker_event(&self, record: CircuitBreakerEventRecord) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_all {
            return Err(BridgeError::Unavailable("in-memory bridge failing".into()));
        }
        state.breaker_events.push(record);
        Ok(())
    }

    async fn record_service_registry_event(
        &self,
        record: ServiceRegistryEventRecord,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_all {
            return Err(BridgeError::Unavailable("in-memory bridge failing".into()));
        }
        state.registry_events.push(record);
        Ok(())
    }
}
