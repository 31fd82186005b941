//! Service registry: the live directory of reachable service instances.
//!
//! Tracks registrations keyed by `service_id`, their capabilities, and
//! health. Staleness never deletes an entry — a registration that stops
//! heartbeating is flipped to unhealthy but remains resolvable, preserving
//! a forensic trail of what was once live. Removal requires an explicit
//! deregister.

pub mod error;
pub mod registration;
pub mod registry;

pub use error::{RegistryError, Result};
pub use registration::{HealthStatus, ServiceInfo, ServiceRegistration};
pub use registry::{RegistryConfig, ServiceRegistry};
