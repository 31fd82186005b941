//! Shared identifier types used across the reliability layer crates.

pub mod types;

pub use types::{SagaId, StepId};
