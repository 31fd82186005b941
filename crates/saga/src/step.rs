//! Step definitions and the handler seam.
//!
//! A step's action is an injected client interface issued over the network —
//! never a direct in-process call into another service's code. The handler
//! receives the registration the registry resolved for it, so the breaker
//! and registry mediate every process-boundary interaction.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use registry::ServiceRegistration;
use serde_json::Value;
use thiserror::Error;

use crate::context::SagaContext;

/// How a step failed, from the handler's point of view.
///
/// Transient failures are retried within the step's budget; terminal
/// failures escalate to compensation immediately, consuming no budget.
#[derive(Debug, Clone, Error)]
pub enum StepError {
    /// Worth retrying: network flake, 5xx-equivalent response, timeout.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Not worth retrying: malformed request, precondition violation.
    #[error("Terminal failure: {0}")]
    Terminal(String),
}

impl StepError {
    /// Returns true if the failure may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StepError::Transient(_))
    }
}

/// How the orchestrator finds a step's target in the registry.
#[derive(Debug, Clone)]
pub enum StepTarget {
    /// Resolve one specific instance by its `service_id`.
    Service(String),

    /// Pick among the instances advertising a capability,
    /// most-recently-heartbeated first.
    Capability(String),
}

impl StepTarget {
    /// Returns the registry key this target resolves through.
    pub fn key(&self) -> &str {
        match self {
            StepTarget::Service(id) => id,
            StepTarget::Capability(cap) => cap,
        }
    }
}

/// The injected client seam a step executes through.
///
/// `execute` performs the step's forward action against the resolved
/// target; `compensate` undoes it. A handler without a compensating action
/// leaves `has_compensation` at its default and the orchestrator will skip
/// it during the sweep.
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// Performs the forward action. The returned value is stored as the
    /// step's response payload and merged into the saga context.
    async fn execute(
        &self,
        target: &ServiceRegistration,
        ctx: &SagaContext,
    ) -> Result<Value, StepError>;

    /// Returns true if this handler defines a compensating action.
    fn has_compensation(&self) -> bool {
        false
    }

    /// Undoes a previously completed forward action. Only invoked when
    /// `has_compensation` returns true.
    async fn compensate(
        &self,
        _target: &ServiceRegistration,
        _ctx: &SagaContext,
    ) -> Result<(), StepError> {
        Ok(())
    }
}

type ExecuteFn =
    dyn Fn(ServiceRegistration, SagaContext) -> BoxFuture<'static, Result<Value, StepError>>
        + Send
        + Sync;
type CompensateFn =
    dyn Fn(ServiceRegistration, SagaContext) -> BoxFuture<'static, Result<(), StepError>>
        + Send
        + Sync;

/// Closure-based [`StepHandler`] for hosting code and tests that don't
/// want a dedicated handler type per step.
#[derive(Clone)]
pub struct FnHandler {
    execute: Arc<ExecuteFn>,
    compensate: Option<Arc<CompensateFn>>,
}

impl FnHandler {
    /// Creates a handler from an async closure for the forward action.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(ServiceRegistration, SagaContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, StepError>> + Send + 'static,
    {
        Self {
            execute: Arc::new(move |target, ctx| Box::pin(f(target, ctx))),
            compensate: None,
        }
    }

    /// Attaches a compensating action.
    pub fn with_compensation<G, Fut>(mut self, g: G) -> Self
    where
        G: Fn(ServiceRegistration, SagaContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), StepError>> + Send + 'static,
    {
        self.compensate = Some(Arc::new(move |target, ctx| Box::pin(g(target, ctx))));
        self
    }
}

#[async_trait]
impl StepHandler for FnHandler {
    async fn execute(
        &self,
        target: &ServiceRegistration,
        ctx: &SagaContext,
    ) -> Result<Value, StepError> {
        (self.execute)(target.clone(), ctx.clone()).await
    }

    fn has_compensation(&self) -> bool {
        self.compensate.is_some()
    }

    async fn compensate(
        &self,
        target: &ServiceRegistration,
        ctx: &SagaContext,
    ) -> Result<(), StepError> {
        match &self.compensate {
            Some(g) => g(target.clone(), ctx.clone()).await,
            None => Ok(()),
        }
    }
}

/// Definition of one saga step.
///
/// `dependency_id` keys the circuit breaker and defaults to the target's
/// registry key; it can differ when several services sit behind one
/// downstream dependency (e.g. a shared gateway).
#[derive(Clone)]
pub struct StepDefinition {
    /// Step name, unique within the saga. The step's response is merged
    /// into the context under this name.
    pub name: String,
    /// How the registry resolves the step's target.
    pub target: StepTarget,
    /// Circuit breaker key for the step's calls.
    pub dependency_id: String,
    /// Retries permitted for transient failures.
    pub max_retries: u32,
    /// The injected client seam.
    pub handler: Arc<dyn StepHandler>,
}

impl StepDefinition {
    /// Default retry budget for transient failures.
    pub const DEFAULT_MAX_RETRIES: u32 = 2;

    /// Creates a step definition with the default retry budget and the
    /// target's registry key as the breaker dependency.
    pub fn new(
        name: impl Into<String>,
        target: StepTarget,
        handler: impl StepHandler + 'static,
    ) -> Self {
        let dependency_id = target.key().to_string();
        Self {
            name: name.into(),
            target,
            dependency_id,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            handler: Arc::new(handler),
        }
    }

    /// Overrides the breaker dependency key.
    pub fn with_dependency_id(mut self, dependency_id: impl Into<String>) -> Self {
        self.dependency_id = dependency_id.into();
        self
    }

    /// Overrides the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Returns true if this step carries a compensating action.
    pub fn compensation_defined(&self) -> bool {
        self.handler.has_compensation()
    }
}

impl std::fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDefinition")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("dependency_id", &self.dependency_id)
            .field("max_retries", &self.max_retries)
            .field("compensation_defined", &self.compensation_defined())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use registry::ServiceInfo;

    fn target() -> ServiceRegistration {
        ServiceRegistration::from_info(
            ServiceInfo {
                service_id: "svc-1".to_string(),
                name: "svc".to_string(),
                layer: "worker".to_string(),
                host: "127.0.0.1".to_string(),
                port: 8080,
                capabilities: Default::default(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn step_error_retryability() {
        assert!(StepError::Transient("timeout".into()).is_retryable());
        assert!(!StepError::Terminal("bad request".into()).is_retryable());
    }

    #[test]
    fn definition_defaults_dependency_to_target_key() {
        let def = StepDefinition::new(
            "allocate",
            StepTarget::Capability("allocate_resource".into()),
            FnHandler::new(|_, _| async { Ok(Value::Null) }),
        );
        assert_eq!(def.dependency_id, "allocate_resource");
        assert_eq!(def.max_retries, StepDefinition::DEFAULT_MAX_RETRIES);
        assert!(!def.compensation_defined());

        let def = def.with_dependency_id("model-gateway").with_max_retries(0);
        assert_eq!(def.dependency_id, "model-gateway");
        assert_eq!(def.max_retries, 0);
    }

    #[tokio::test]
    async fn fn_handler_executes_and_compensates() {
        let handler = FnHandler::new(|target, _ctx| async move {
            Ok(serde_json::json!({"address": target.address()}))
        })
        .with_compensation(|_, _| async { Ok(()) });

        assert!(handler.has_compensation());

        let result = handler
            .execute(&target(), &SagaContext::new())
            .await
            .unwrap();
        assert_eq!(result["address"], "127.0.0.1:8080");

        handler
            .compensate(&target(), &SagaContext::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn fn_handler_without_compensation() {
        let handler = FnHandler::new(|_, _| async { Ok(Value::Null) });
        assert!(!handler.has_compensation());
        // compensate is a no-op rather than a panic.
        handler
            .compensate(&target(), &SagaContext::new())
            .await
            .unwrap();
    }
}
