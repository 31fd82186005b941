//! Service registration records and health status.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Health of a registered service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// The instance is serving traffic normally.
    Healthy,

    /// The instance is not usable (failed health report or stale heartbeat).
    Unhealthy,

    /// The instance is serving but impaired.
    Degraded,

    /// No health information has been reported yet.
    #[default]
    Unknown,
}

impl HealthStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for HealthStatus {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "healthy" => Ok(HealthStatus::Healthy),
            "unhealthy" => Ok(HealthStatus::Unhealthy),
            "degraded" => Ok(HealthStatus::Degraded),
            "unknown" => Ok(HealthStatus::Unknown),
            other => Err(RegistryError::InvalidHealthStatus(other.to_string())),
        }
    }
}

/// Caller-supplied description of a service instance.
///
/// This is what `register` consumes; the registry fills in timestamps and
/// health to produce a [`ServiceRegistration`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Unique key for this instance. Re-registering the same ID updates
    /// the existing entry in place.
    pub service_id: String,
    /// Human-readable service name.
    pub name: String,
    /// Architectural layer the service belongs to (e.g. "gateway", "worker").
    pub layer: String,
    /// Reachable host.
    pub host: String,
    /// Reachable port.
    pub port: u16,
    /// Capabilities this instance advertises.
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
}

/// A live registry entry for one service instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRegistration {
    /// Unique key for this instance.
    pub service_id: String,
    /// Human-readable service name.
    pub name: String,
    /// Architectural layer the service belongs to.
    pub layer: String,
    /// Reachable host.
    pub host: String,
    /// Reachable port.
    pub port: u16,
    /// Capabilities this instance advertises.
    pub capabilities: BTreeSet<String>,
    /// Last reported (or swept) health.
    pub health_status: HealthStatus,
    /// When the instance first registered. Preserved across re-registration.
    pub registered_at: DateTime<Utc>,
    /// When the instance last heartbeated (or re-registered).
    pub last_heartbeat_at: DateTime<Utc>,
}

impl ServiceRegistration {
    /// Builds a fresh registration from caller-supplied info.
    pub fn from_info(info: ServiceInfo, now: DateTime<Utc>) -> Self {
        Self {
            service_id: info.service_id,
            name: info.name,
            layer: info.layer,
            host: info.host,
            port: info.port,
            capabilities: info.capabilities,
            health_status: HealthStatus::Unknown,
            registered_at: now,
            last_heartbeat_at: now,
        }
    }

    /// Applies a re-registration: addressing fields and capabilities are
    /// replaced, the heartbeat refreshed, `registered_at` preserved.
    pub fn update_from_info(&mut self, info: ServiceInfo, now: DateTime<Utc>) {
        self.name = info.name;
        self.layer = info.layer;
        self.host = info.host;
        self.port = info.port;
        self.capabilities = info.capabilities;
        self.last_heartbeat_at = now;
    }

    /// Returns true if this instance advertises the given capability.
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    /// Returns the `"host:port"` address string.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample_info(service_id: &str) -> ServiceInfo {
        ServiceInfo {
            service_id: service_id.to_string(),
            name: "sandbox-manager".to_string(),
            layer: "worker".to_string(),
            host: "10.0.0.5".to_string(),
            port: 8080,
            capabilities: ["create_sandbox".to_string()].into_iter().collect(),
        }
    }

    #[test]
    fn health_status_parse_roundtrip() {
        for status in [
            HealthStatus::Healthy,
            HealthStatus::Unhealthy,
            HealthStatus::Degraded,
            HealthStatus::Unknown,
        ] {
            assert_eq!(HealthStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn health_status_rejects_unknown_strings() {
        let result = HealthStatus::from_str("dead");
        assert!(matches!(
            result,
            Err(RegistryError::InvalidHealthStatus(s)) if s == "dead"
        ));
    }

    #[test]
    fn from_info_starts_unknown() {
        let now = Utc::now();
        let registration = ServiceRegistration::from_info(sample_info("svc-1"), now);
        assert_eq!(registration.health_status, HealthStatus::Unknown);
        assert_eq!(registration.registered_at, now);
        assert_eq!(registration.last_heartbeat_at, now);
        assert!(registration.has_capability("create_sandbox"));
        assert!(!registration.has_capability("allocate_resource"));
    }

    #[test]
    fn update_preserves_registered_at() {
        let first = Utc::now();
        let mut registration = ServiceRegistration::from_info(sample_info("svc-1"), first);
        registration.health_status = HealthStatus::Healthy;

        let later = first + chrono::Duration::seconds(30);
        let mut info = sample_info("svc-1");
        info.port = 9090;
        registration.update_from_info(info, later);

        assert_eq!(registration.registered_at, first);
        assert_eq!(registration.last_heartbeat_at, later);
        assert_eq!(registration.port, 9090);
        // Health is not touched by re-registration.
        assert_eq!(registration.health_status, HealthStatus::Healthy);
    }

    #[test]
    fn address_formatting() {
        let registration = ServiceRegistration::from_info(sample_info("svc-1"), Utc::now());
        assert_eq!(registration.address(), "10.0.0.5:8080");
    }
}
