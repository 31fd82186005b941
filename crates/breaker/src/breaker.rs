//! The keyed breaker store and its state machine.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use bridge::{Bridge, CircuitBreakerEventRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::error::{BreakerError, CallError};
use crate::state::BreakerState;

/// Serializable snapshot of one dependency's breaker, including the
/// thresholds in force.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub dependency_id: String,
    pub state: BreakerState,
    pub failure_count: u32,
    pub success_count: u32,
    pub failure_threshold: u32,
    pub success_threshold_to_close: u32,
    pub open_timeout_secs: u64,
    pub opened_at: Option<DateTime<Utc>>,
}

/// Mutable per-dependency state, guarded by its own mutex.
#[derive(Debug, Default)]
struct DependencyState {
    state: BreakerState,
    failure_count: u32,
    success_count: u32,
    /// Monotonic instant of the last open transition, for timeout checks.
    opened_at: Option<Instant>,
    /// Wall-clock counterpart of `opened_at`, for snapshots and records.
    opened_at_wall: Option<DateTime<Utc>>,
    /// Trial calls currently permitted while half-open.
    trials_in_flight: u32,
}

/// A state transition worth recording, computed inside the per-key lock and
/// emitted after it is released.
#[derive(Debug, Clone, Copy)]
enum Transition {
    Opened,
    HalfOpened,
    Closed,
    Reopened,
}

impl Transition {
    fn event(&self) -> &'static str {
        match self {
            Transition::Opened => "opened",
            Transition::HalfOpened => "half_open",
            Transition::Closed => "closed",
            Transition::Reopened => "reopened",
        }
    }

    fn state(&self) -> BreakerState {
        match self {
            Transition::Opened | Transition::Reopened => BreakerState::Open,
            Transition::HalfOpened => BreakerState::HalfOpen,
            Transition::Closed => BreakerState::Closed,
        }
    }
}

/// Per-dependency circuit breakers behind one handle.
///
/// Breaker state is created lazily on first call to a new dependency key
/// and persists for the process lifetime. Each key owns its own mutex, so
/// concurrent callers against the same dependency serialize their counter
/// updates without serializing unrelated traffic; the outer map lock is
/// held only to find or insert an entry, never across a wrapped call.
#[derive(Clone)]
pub struct CircuitBreaker<B: Bridge> {
    dependencies: Arc<RwLock<HashMap<String, Arc<Mutex<DependencyState>>>>>,
    bridge: B,
    config: BreakerConfig,
}

impl<B: Bridge> CircuitBreaker<B> {
    /// Creates a breaker store with default thresholds.
    pub fn new(bridge: B) -> Self {
        Self::with_config(bridge, BreakerConfig::default())
    }

    /// Creates a breaker store with explicit thresholds.
    pub fn with_config(bridge: B, config: BreakerConfig) -> Self {
        Self {
            dependencies: Arc::new(RwLock::new(HashMap::new())),
            bridge,
            config,
        }
    }

    async fn entry(&self, dependency_id: &str) -> Arc<Mutex<DependencyState>> {
        if let Some(entry) = self.dependencies.read().await.get(dependency_id) {
            return entry.clone();
        }
        let mut dependencies = self.dependencies.write().await;
        dependencies
            .entry(dependency_id.to_string())
            .or_default()
            .clone()
    }

    /// Asks the breaker whether a call to this dependency may proceed.
    ///
    /// Must be checked before the real call executes. Every permitted
    /// attempt obliges the caller to invoke [`report_outcome`] exactly
    /// once; a rejected call must not report.
    ///
    /// An open breaker whose `open_timeout` has elapsed flips to half-open
    /// here, and the current call is permitted as a trial. Half-open admits
    /// at most `success_threshold_to_close` concurrent trials; excess
    /// callers are rejected as if the breaker were still open.
    ///
    /// [`report_outcome`]: CircuitBreaker::report_outcome
    pub async fn allow_call(&self, dependency_id: &str) -> Result<(), BreakerError> {
        let entry = self.entry(dependency_id).await;
        let transition = {
            let mut dep = entry.lock().await;
            match dep.state {
                BreakerState::Closed => Ok(None),
                BreakerState::Open => {
                    let elapsed = dep
                        .opened_at
                        .is_some_and(|t| t.elapsed() >= self.config.open_timeout);
                    if elapsed {
                        dep.state = BreakerState::HalfOpen;
                        dep.success_count = 0;
                        dep.trials_in_flight = 1;
                        Ok(Some(Transition::HalfOpened))
                    } else {
                        Err(BreakerError::Open {
                            dependency_id: dependency_id.to_string(),
                        })
                    }
                }
                BreakerState::HalfOpen => {
                    if dep.trials_in_flight < self.config.success_threshold_to_close {
                        dep.trials_in_flight += 1;
                        Ok(None)
                    } else {
                        Err(BreakerError::Open {
                            dependency_id: dependency_id.to_string(),
                        })
                    }
                }
            }
        };

        match transition {
            Ok(Some(t)) => {
                self.record_transition(dependency_id, t, 0).await;
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                metrics::counter!("breaker_rejections_total").increment(1);
                Err(e)
            }
        }
    }

    /// Reports the outcome of a permitted call.
    ///
    /// Must be called exactly once per attempt that `allow_call` permitted,
    /// by the same caller that made the call — outcomes are never inferred.
    pub async fn report_outcome(&self, dependency_id: &str, success: bool) {
        let entry = self.entry(dependency_id).await;
        let transition = {
            let mut dep = entry.lock().await;
            match dep.state {
                BreakerState::Closed => {
                    if success {
                        dep.failure_count = 0;
                        None
                    } else {
                        dep.failure_count += 1;
                        if dep.failure_count >= self.config.failure_threshold {
                            dep.state = BreakerState::Open;
                            dep.opened_at = Some(Instant::now());
                            dep.opened_at_wall = Some(Utc::now());
                            Some((Transition::Opened, dep.failure_count))
                        } else {
                            None
                        }
                    }
                }
                BreakerState::HalfOpen => {
                    dep.trials_in_flight = dep.trials_in_flight.saturating_sub(1);
                    if success {
                        dep.success_count += 1;
                        if dep.success_count >= self.config.success_threshold_to_close {
                            dep.state = BreakerState::Closed;
                            dep.failure_count = 0;
                            dep.success_count = 0;
                            dep.opened_at = None;
                            dep.opened_at_wall = None;
                            dep.trials_in_flight = 0;
                            Some((Transition::Closed, 0))
                        } else {
                            None
                        }
                    } else {
                        // A single half-open failure reopens immediately.
                        dep.state = BreakerState::Open;
                        dep.opened_at = Some(Instant::now());
                        dep.opened_at_wall = Some(Utc::now());
                        dep.success_count = 0;
                        dep.trials_in_flight = 0;
                        Some((Transition::Reopened, dep.failure_count))
                    }
                }
                // A late outcome for a call permitted before the breaker
                // reopened; the reopen already accounted for the failure.
                BreakerState::Open => None,
            }
        };

        if let Some((t, failure_count)) = transition {
            self.record_transition(dependency_id, t, failure_count).await;
        }
    }

    /// Wraps a call in the full admission contract: allow, invoke, report.
    ///
    /// Usable outside sagas for any guarded dependency call. Holds no lock
    /// while `f` is in flight.
    pub async fn call<F, Fut, T, E>(
        &self,
        dependency_id: &str,
        f: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.allow_call(dependency_id).await?;
        match f().await {
            Ok(value) => {
                self.report_outcome(dependency_id, true).await;
                Ok(value)
            }
            Err(e) => {
                self.report_outcome(dependency_id, false).await;
                Err(CallError::Failed(e))
            }
        }
    }

    /// Returns a snapshot of one dependency's breaker, or `None` if that
    /// dependency has never been called.
    pub async fn snapshot(&self, dependency_id: &str) -> Option<CircuitBreakerState> {
        let entry = self.dependencies.read().await.get(dependency_id)?.clone();
        let dep = entry.lock().await;
        Some(CircuitBreakerState {
            dependency_id: dependency_id.to_string(),
            state: dep.state,
            failure_count: dep.failure_count,
            success_count: dep.success_count,
            failure_threshold: self.config.failure_threshold,
            success_threshold_to_close: self.config.success_threshold_to_close,
            open_timeout_secs: self.config.open_timeout.as_secs(),
            opened_at: dep.opened_at_wall,
        })
    }

    /// Returns the dependency keys seen so far.
    pub async fn known_dependencies(&self) -> Vec<String> {
        self.dependencies.read().await.keys().cloned().collect()
    }

    async fn record_transition(&self, dependency_id: &str, t: Transition, failure_count: u32) {
        metrics::counter!("breaker_transitions_total", "transition" => t.event()).increment(1);
        tracing::info!(
            %dependency_id,
            transition = t.event(),
            state = %t.state(),
            "circuit breaker transition"
        );

        let record = CircuitBreakerEventRecord {
            dependency_id: dependency_id.to_string(),
            event: t.event().to_string(),
            state: t.state().to_string(),
            failure_count,
            occurred_at: Utc::now(),
        };
        if let Err(e) = self.bridge.record_circuit_breaker_event(record).await {
            tracing::warn!(error = %e, %dependency_id, "bridge recording failed");
        }
    }
}
