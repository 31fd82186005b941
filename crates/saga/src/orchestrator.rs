//! The saga orchestrator.
//!
//! Drives each saga in its own task: steps run strictly in sequence, each
//! resolving its target through the registry and calling it through the
//! dependency's circuit breaker. No saga-wide or registry-wide lock is
//! held while an outbound call is in flight, so unrelated sagas and
//! registry lookups stay unblocked.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use breaker::CircuitBreaker;
use bridge::{Bridge, SagaExecutionRecord, SagaStepRecord};
use chrono::Utc;
use common::SagaId;
use registry::{HealthStatus, RegistryError, ServiceRegistration, ServiceRegistry};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock, watch};

use crate::context::SagaContext;
use crate::error::{Result, SagaError};
use crate::execution::SagaExecution;
use crate::state::{SagaStatus, StepStatus};
use crate::step::{StepDefinition, StepError, StepTarget};

/// Orchestrator-wide timing configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Bound on every outbound call (forward and compensating). A timeout
    /// is reported to the breaker as a failure and to the saga as a
    /// retryable step failure.
    pub call_timeout: Duration,
    /// Pause between retry attempts of one step.
    pub retry_backoff: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(10),
            retry_backoff: Duration::from_millis(100),
        }
    }
}

/// Per-saga options supplied at start.
#[derive(Debug, Clone)]
pub struct SagaOptions {
    /// When false, a terminal step failure ends the saga as `Failed`
    /// without running the compensation sweep.
    pub compensate_on_failure: bool,
}

impl Default for SagaOptions {
    fn default() -> Self {
        Self {
            compensate_on_failure: true,
        }
    }
}

/// One tracked saga: its data, its definitions, and its control state.
struct SagaRun {
    execution: SagaExecution,
    definitions: Arc<Vec<StepDefinition>>,
    cancel_requested: bool,
    status_tx: watch::Sender<SagaStatus>,
}

struct Inner<B: Bridge> {
    registry: ServiceRegistry<B>,
    breaker: CircuitBreaker<B>,
    bridge: B,
    config: OrchestratorConfig,
    sagas: RwLock<HashMap<SagaId, Arc<Mutex<SagaRun>>>>,
}

/// Orchestrates saga executions over the registry/breaker path.
///
/// Cheap to clone; all clones share the same saga table.
pub struct SagaOrchestrator<B: Bridge> {
    inner: Arc<Inner<B>>,
}

impl<B: Bridge> Clone for SagaOrchestrator<B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<B: Bridge + Clone + Send + Sync + 'static> SagaOrchestrator<B> {
    /// Creates an orchestrator with default timing configuration.
    pub fn new(registry: ServiceRegistry<B>, breaker: CircuitBreaker<B>, bridge: B) -> Self {
        Self::with_config(registry, breaker, bridge, OrchestratorConfig::default())
    }

    /// Creates an orchestrator with explicit timing configuration.
    pub fn with_config(
        registry: ServiceRegistry<B>,
        breaker: CircuitBreaker<B>,
        bridge: B,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                breaker,
                bridge,
                config,
                sagas: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Starts a saga with default options.
    ///
    /// Creates the execution in `Pending`, transitions it to `Running`,
    /// and spawns the driver task that begins executing step 0. Returns
    /// the saga ID immediately; use [`wait`](Self::wait) or
    /// [`run_saga`](Self::run_saga) to await the terminal status.
    pub async fn start_saga(
        &self,
        name: impl Into<String>,
        definitions: Vec<StepDefinition>,
        context: SagaContext,
    ) -> Result<SagaId> {
        self.start_saga_with_options(name, definitions, context, SagaOptions::default())
            .await
    }

    /// Starts a saga with explicit options.
    #[tracing::instrument(skip_all, fields(saga_name))]
    pub async fn start_saga_with_options(
        &self,
        name: impl Into<String>,
        definitions: Vec<StepDefinition>,
        context: SagaContext,
        options: SagaOptions,
    ) -> Result<SagaId> {
        let name = name.into();
        tracing::Span::current().record("saga_name", name.as_str());
        if definitions.is_empty() {
            return Err(SagaError::NoSteps(name));
        }

        let mut execution =
            SagaExecution::new(name, &definitions, context, options.compensate_on_failure);
        let saga_id = execution.saga_id;

        metrics::counter!("saga_executions_total").increment(1);
        self.emit_execution(execution.to_record()).await;

        execution.status = SagaStatus::Running;
        let running_record = execution.to_record();
        let (status_tx, _) = watch::channel(SagaStatus::Running);
        let run = Arc::new(Mutex::new(SagaRun {
            execution,
            definitions: Arc::new(definitions),
            cancel_requested: false,
            status_tx,
        }));
        self.inner.sagas.write().await.insert(saga_id, run);
        self.emit_execution_update(running_record).await;

        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.drive(saga_id).await;
        });

        tracing::info!(%saga_id, "saga started");
        Ok(saga_id)
    }

    /// Starts a saga and awaits its terminal status.
    pub async fn run_saga(
        &self,
        name: impl Into<String>,
        definitions: Vec<StepDefinition>,
        context: SagaContext,
    ) -> Result<SagaExecution> {
        let saga_id = self.start_saga(name, definitions, context).await?;
        self.wait(saga_id).await
    }

    /// Awaits a saga's terminal status and returns the final snapshot.
    pub async fn wait(&self, saga_id: SagaId) -> Result<SagaExecution> {
        let mut rx = {
            let run = self.run(saga_id).await?;
            let run = run.lock().await;
            run.status_tx.subscribe()
        };
        loop {
            let status = *rx.borrow_and_update();
            if status.is_terminal() {
                break;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
        self.get_saga_status(saga_id).await
    }

    /// Returns a snapshot of a saga's current state.
    pub async fn get_saga_status(&self, saga_id: SagaId) -> Result<SagaExecution> {
        let run = self.run(saga_id).await?;
        let run = run.lock().await;
        Ok(run.execution.clone())
    }

    /// Requests cancellation of a saga.
    ///
    /// Honored only at step boundaries: an in-flight step is allowed to
    /// finish so its external side effect is known, then the saga is
    /// handled as if that boundary were a terminal step failure — the
    /// compensation sweep runs for everything completed so far.
    pub async fn cancel(&self, saga_id: SagaId) -> Result<()> {
        let run = self.run(saga_id).await?;
        let mut run = run.lock().await;
        run.cancel_requested = true;
        tracing::info!(%saga_id, "saga cancellation requested");
        Ok(())
    }

    /// Executes (or replays) one step of a saga.
    ///
    /// Idempotent: re-invoking on an already-completed step returns the
    /// stored response without re-issuing the outbound call, so
    /// caller-level retries cannot duplicate side effects already
    /// recorded.
    #[tracing::instrument(skip(self), fields(step_name))]
    pub async fn execute_step(&self, saga_id: SagaId, step_index: usize) -> Result<Value> {
        let run = self.run(saga_id).await?;

        // Admission: replay check, ordering check, mark executing.
        let (definition, ctx, started_record) = {
            let mut run = run.lock().await;
            let step_count = run.execution.steps.len();
            if step_index >= step_count {
                return Err(SagaError::UnknownStep {
                    saga_id,
                    index: step_index,
                });
            }
            if run.execution.steps[step_index].status == StepStatus::Completed {
                metrics::counter!("saga_step_replays_total").increment(1);
                let stored = run.execution.steps[step_index]
                    .response_payload
                    .clone()
                    .unwrap_or(Value::Null);
                return Ok(stored);
            }
            if run.execution.steps[..step_index]
                .iter()
                .any(|s| s.status != StepStatus::Completed)
            {
                return Err(SagaError::OutOfOrder {
                    saga_id,
                    index: step_index,
                });
            }

            let definition = run.definitions[step_index].clone();
            tracing::Span::current().record("step_name", definition.name.as_str());
            let ctx = run.execution.context.clone();
            let step = &mut run.execution.steps[step_index];
            step.status = StepStatus::Executing;
            step.request_payload = ctx.as_value();
            let record = step.to_record();
            (definition, ctx, record)
        };

        self.emit_step_record(started_record).await;
        tracing::info!(%saga_id, step = %definition.name, "saga step started");

        // Attempt loop. No saga lock is held while the call is in flight.
        loop {
            match self.attempt_forward(&definition, &ctx).await {
                Ok(value) => {
                    let record = {
                        let mut run = run.lock().await;
                        let step = &mut run.execution.steps[step_index];
                        step.status = StepStatus::Completed;
                        step.response_payload = Some(value.clone());
                        let name = step.name.clone();
                        let record = run.execution.steps[step_index].to_record();
                        run.execution.context.insert(name, value.clone());
                        record
                    };
                    self.emit_step_update(record).await;
                    return Ok(value);
                }
                Err(e) => {
                    let will_retry = {
                        let mut run = run.lock().await;
                        let step = &mut run.execution.steps[step_index];
                        if e.is_retryable() && step.retry_count < definition.max_retries {
                            step.retry_count += 1;
                            true
                        } else {
                            false
                        }
                    };

                    if will_retry {
                        tracing::warn!(
                            %saga_id,
                            step = %definition.name,
                            error = %e,
                            "step attempt failed, retrying"
                        );
                        tokio::time::sleep(self.inner.config.retry_backoff).await;
                        continue;
                    }

                    let record = {
                        let mut run = run.lock().await;
                        let step = &mut run.execution.steps[step_index];
                        step.status = StepStatus::Failed;
                        step.error = Some(e.to_string());
                        run.execution.steps[step_index].to_record()
                    };
                    self.emit_step_update(record).await;
                    metrics::counter!("saga_step_failures_total").increment(1);
                    tracing::warn!(%saga_id, step = %definition.name, error = %e, "saga step failed");
                    return Err(SagaError::StepFailed {
                        step: definition.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    /// Drives a saga from step 0 to a terminal status.
    async fn drive(&self, saga_id: SagaId) {
        let saga_start = std::time::Instant::now();
        let step_count = match self.run(saga_id).await {
            Ok(run) => run.lock().await.execution.steps.len(),
            Err(_) => return,
        };

        for index in 0..step_count {
            let cancelled = match self.run(saga_id).await {
                Ok(run) => run.lock().await.cancel_requested,
                Err(_) => return,
            };
            if cancelled {
                tracing::info!(%saga_id, at_step = index, "saga cancelled at step boundary");
                self.compensate(saga_id).await;
                metrics::histogram!("saga_duration_seconds")
                    .record(saga_start.elapsed().as_secs_f64());
                return;
            }

            if self.execute_step(saga_id, index).await.is_err() {
                self.compensate(saga_id).await;
                metrics::histogram!("saga_duration_seconds")
                    .record(saga_start.elapsed().as_secs_f64());
                return;
            }
        }

        let record = match self.run(saga_id).await {
            Ok(run) => {
                let mut run = run.lock().await;
                run.execution.status = SagaStatus::Completed;
                run.execution.completed_at = Some(Utc::now());
                let _ = run.status_tx.send(SagaStatus::Completed);
                run.execution.to_record()
            }
            Err(_) => return,
        };
        self.emit_execution_update(record).await;

        let duration = saga_start.elapsed().as_secs_f64();
        metrics::histogram!("saga_duration_seconds").record(duration);
        metrics::counter!("saga_completed").increment(1);
        tracing::info!(%saga_id, duration, "saga completed successfully");
    }

    /// Runs compensating actions in strict reverse completion order.
    ///
    /// Best-effort: a compensation failure is recorded on the step and the
    /// sweep continues to earlier steps. The saga ends `Compensated` (or
    /// `Failed` when compensation is disabled, skipping the sweep).
    #[tracing::instrument(skip(self))]
    async fn compensate(&self, saga_id: SagaId) {
        let run = match self.run(saga_id).await {
            Ok(run) => run,
            Err(_) => return,
        };

        // Mark the saga, collect the sweep plan.
        let (sweep, record) = {
            let mut run = run.lock().await;
            if !run.execution.compensate_on_failure {
                run.execution.status = SagaStatus::Failed;
                run.execution.completed_at = Some(Utc::now());
                let _ = run.status_tx.send(SagaStatus::Failed);
                let record = run.execution.to_record();
                (Vec::new(), record)
            } else {
                run.execution.status = SagaStatus::Compensating;
                let _ = run.status_tx.send(SagaStatus::Compensating);
                let mut indices = run.execution.completed_indices();
                indices.reverse();
                let definitions = run.definitions.clone();
                let sweep: Vec<(usize, StepDefinition)> = indices
                    .into_iter()
                    .map(|i| (i, definitions[i].clone()))
                    .collect();
                let record = run.execution.to_record();
                (sweep, record)
            }
        };
        self.emit_execution_update(record).await;

        let compensating = {
            let run = run.lock().await;
            run.execution.status == SagaStatus::Compensating
        };
        if !compensating {
            metrics::counter!("saga_failed").increment(1);
            tracing::warn!(%saga_id, "saga failed without compensation");
            return;
        }

        for (index, definition) in sweep {
            let (ctx, record) = {
                let mut run = run.lock().await;
                run.execution.steps[index].status = StepStatus::Compensating;
                (
                    run.execution.context.clone(),
                    run.execution.steps[index].to_record(),
                )
            };
            self.emit_step_update(record).await;

            if definition.compensation_defined() {
                if let Err(e) = self.attempt_compensation(&definition, &ctx).await {
                    // Continue-on-error: record, log, keep sweeping.
                    metrics::counter!("saga_compensation_failures_total").increment(1);
                    tracing::warn!(
                        %saga_id,
                        step = %definition.name,
                        error = %e,
                        "compensation failed, continuing sweep"
                    );
                    let mut run = run.lock().await;
                    run.execution.steps[index].compensation_error = Some(e.to_string());
                }
            }

            let record = {
                let mut run = run.lock().await;
                run.execution.steps[index].status = StepStatus::Compensated;
                run.execution.steps[index].to_record()
            };
            self.emit_step_update(record).await;
        }

        let record = {
            let mut run = run.lock().await;
            run.execution.status = SagaStatus::Compensated;
            run.execution.completed_at = Some(Utc::now());
            let _ = run.status_tx.send(SagaStatus::Compensated);
            run.execution.to_record()
        };
        self.emit_execution_update(record).await;
        metrics::counter!("saga_compensated").increment(1);
        tracing::warn!(%saga_id, "saga compensated");
    }

    /// One forward attempt: resolve the target, pass the breaker, run the
    /// handler under the call timeout, report the outcome.
    async fn attempt_forward(
        &self,
        definition: &StepDefinition,
        ctx: &SagaContext,
    ) -> std::result::Result<Value, StepError> {
        let target = self.resolve_target(&definition.target).await?;

        // A rejected call reports no outcome: counting it as a failure
        // would keep an open breaker from ever reaching half-open.
        if let Err(e) = self.inner.breaker.allow_call(&definition.dependency_id).await {
            return Err(StepError::Transient(e.to_string()));
        }

        let outcome = tokio::time::timeout(
            self.inner.config.call_timeout,
            definition.handler.execute(&target, ctx),
        )
        .await;

        match outcome {
            Ok(Ok(value)) => {
                self.inner
                    .breaker
                    .report_outcome(&definition.dependency_id, true)
                    .await;
                Ok(value)
            }
            Ok(Err(e)) => {
                self.inner
                    .breaker
                    .report_outcome(&definition.dependency_id, false)
                    .await;
                Err(e)
            }
            Err(_) => {
                self.inner
                    .breaker
                    .report_outcome(&definition.dependency_id, false)
                    .await;
                Err(StepError::Transient(format!(
                    "call to '{}' timed out",
                    definition.dependency_id
                )))
            }
        }
    }

    /// One compensation attempt through the same registry/breaker path.
    /// Never retried.
    async fn attempt_compensation(
        &self,
        definition: &StepDefinition,
        ctx: &SagaContext,
    ) -> std::result::Result<(), StepError> {
        let target = self.resolve_target(&definition.target).await?;

        if let Err(e) = self.inner.breaker.allow_call(&definition.dependency_id).await {
            return Err(StepError::Transient(e.to_string()));
        }

        let outcome = tokio::time::timeout(
            self.inner.config.call_timeout,
            definition.handler.compensate(&target, ctx),
        )
        .await;

        match outcome {
            Ok(Ok(())) => {
                self.inner
                    .breaker
                    .report_outcome(&definition.dependency_id, true)
                    .await;
                Ok(())
            }
            Ok(Err(e)) => {
                self.inner
                    .breaker
                    .report_outcome(&definition.dependency_id, false)
                    .await;
                Err(e)
            }
            Err(_) => {
                self.inner
                    .breaker
                    .report_outcome(&definition.dependency_id, false)
                    .await;
                Err(StepError::Transient(format!(
                    "compensation call to '{}' timed out",
                    definition.dependency_id
                )))
            }
        }
    }

    /// Resolves a step target through the registry.
    ///
    /// A miss is terminal: registrations survive staleness, so an absent
    /// entry means the target was never registered.
    async fn resolve_target(
        &self,
        target: &StepTarget,
    ) -> std::result::Result<ServiceRegistration, StepError> {
        let resolved = match target {
            StepTarget::Service(service_id) => self.inner.registry.resolve(service_id).await,
            StepTarget::Capability(capability) => {
                let instances = self.inner.registry.list_by_capability(capability).await;
                instances
                    .iter()
                    .find(|r| r.health_status != HealthStatus::Unhealthy)
                    .or_else(|| instances.first())
                    .cloned()
                    .ok_or_else(|| RegistryError::NotFound(capability.clone()))
            }
        };
        resolved.map_err(|e| StepError::Terminal(format!("target resolution failed: {e}")))
    }

    async fn run(&self, saga_id: SagaId) -> Result<Arc<Mutex<SagaRun>>> {
        self.inner
            .sagas
            .read()
            .await
            .get(&saga_id)
            .cloned()
            .ok_or(SagaError::SagaNotFound(saga_id))
    }

    async fn emit_execution(&self, record: SagaExecutionRecord) {
        if let Err(e) = self.inner.bridge.record_saga_execution(record).await {
            tracing::warn!(error = %e, "bridge recording failed");
        }
    }

    async fn emit_execution_update(&self, record: SagaExecutionRecord) {
        if let Err(e) = self.inner.bridge.update_saga_execution(record).await {
            tracing::warn!(error = %e, "bridge recording failed");
        }
    }

    async fn emit_step_record(&self, record: SagaStepRecord) {
        if let Err(e) = self.inner.bridge.record_saga_step(record).await {
            tracing::warn!(error = %e, "bridge recording failed");
        }
    }

    async fn emit_step_update(&self, record: SagaStepRecord) {
        if let Err(e) = self.inner.bridge.update_saga_step(record).await {
            tracing::warn!(error = %e, "bridge recording failed");
        }
    }
}
