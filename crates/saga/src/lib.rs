//! Saga orchestration for multi-step operations spanning service processes.
//!
//! A saga is an ordered list of steps, each resolving its target through the
//! service registry and calling it through that dependency's circuit
//! breaker. Steps execute strictly sequentially; on terminal failure the
//! orchestrator walks the completed steps in reverse order and invokes their
//! compensating actions through the same registry/breaker path.
//!
//! Guarantees are deliberately modest: at-least-once step execution with
//! idempotent accounting and best-effort compensation. There is no
//! consensus, no leader election, and no exactly-once delivery here.

pub mod catalog;
pub mod context;
pub mod error;
pub mod execution;
pub mod orchestrator;
pub mod state;
pub mod step;

pub use catalog::SagaCatalog;
pub use context::SagaContext;
pub use error::SagaError;
pub use execution::{SagaExecution, SagaStep};
pub use orchestrator::{OrchestratorConfig, SagaOptions, SagaOrchestrator};
pub use state::{SagaStatus, StepStatus};
pub use step::{FnHandler, StepDefinition, StepError, StepHandler, StepTarget};
