//! The concurrency-safe registry store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bridge::{Bridge, ServiceRegistryEventRecord};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::{RegistryError, Result};
use crate::registration::{HealthStatus, ServiceInfo, ServiceRegistration};

/// Configuration for the registry's staleness policy.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How long an instance may go without a heartbeat before the sweep
    /// flips it to unhealthy.
    pub heartbeat_timeout: Duration,
    /// How often the background sweeper runs.
    pub sweep_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(15),
        }
    }
}

/// The live directory of service instances.
///
/// All mutations go through the public operations here; the underlying map
/// is never handed out. Every mutating call best-effort-emits a registry
/// event to the injected [`Bridge`] — recording failures are logged and
/// never affect control flow.
#[derive(Clone)]
pub struct ServiceRegistry<B: Bridge> {
    services: Arc<RwLock<HashMap<String, ServiceRegistration>>>,
    bridge: B,
    config: RegistryConfig,
}

impl<B: Bridge> ServiceRegistry<B> {
    /// Creates a registry with default staleness configuration.
    pub fn new(bridge: B) -> Self {
        Self::with_config(bridge, RegistryConfig::default())
    }

    /// Creates a registry with explicit staleness configuration.
    pub fn with_config(bridge: B, config: RegistryConfig) -> Self {
        Self {
            services: Arc::new(RwLock::new(HashMap::new())),
            bridge,
            config,
        }
    }

    /// Registers a service instance, or updates it in place if the
    /// `service_id` is already known (idempotent upsert). Either way the
    /// heartbeat timestamp is refreshed.
    ///
    /// Returns the `service_id` under which the instance is registered.
    #[tracing::instrument(skip(self, info), fields(service_id = %info.service_id))]
    pub async fn register(&self, info: ServiceInfo) -> String {
        let now = Utc::now();
        let service_id = info.service_id.clone();

        let event = {
            let mut services = self.services.write().await;
            match services.get_mut(&service_id) {
                Some(existing) => {
                    existing.update_from_info(info, now);
                    "updated"
                }
                None => {
                    services.insert(service_id.clone(), ServiceRegistration::from_info(info, now));
                    metrics::counter!("registry_registrations_total").increment(1);
                    "registered"
                }
            }
        };

        tracing::info!(%service_id, event, "service registration");
        self.emit(&service_id, event, None).await;
        service_id
    }

    /// Refreshes an instance's heartbeat. An instance that was unknown or
    /// swept unhealthy becomes healthy again on heartbeat.
    pub async fn heartbeat(&self, service_id: &str) -> Result<()> {
        {
            let mut services = self.services.write().await;
            let registration = services
                .get_mut(service_id)
                .ok_or_else(|| RegistryError::NotFound(service_id.to_string()))?;
            registration.last_heartbeat_at = Utc::now();
            if matches!(
                registration.health_status,
                HealthStatus::Unknown | HealthStatus::Unhealthy
            ) {
                registration.health_status = HealthStatus::Healthy;
            }
        }

        self.emit(service_id, "heartbeat", None).await;
        Ok(())
    }

    /// Removes a registration. This is the only way an entry leaves the
    /// registry; the staleness sweep never deletes.
    #[tracing::instrument(skip(self))]
    pub async fn deregister(&self, service_id: &str) -> Result<()> {
        {
            let mut services = self.services.write().await;
            services
                .remove(service_id)
                .ok_or_else(|| RegistryError::NotFound(service_id.to_string()))?;
        }

        metrics::counter!("registry_deregistrations_total").increment(1);
        tracing::info!(%service_id, "service deregistered");
        self.emit(service_id, "deregistered", None).await;
        Ok(())
    }

    /// Records a health status reported by (or on behalf of) an instance.
    #[tracing::instrument(skip(self))]
    pub async fn report_health(&self, service_id: &str, status: HealthStatus) -> Result<()> {
        let previous = {
            let mut services = self.services.write().await;
            let registration = services
                .get_mut(service_id)
                .ok_or_else(|| RegistryError::NotFound(service_id.to_string()))?;
            let previous = registration.health_status;
            registration.health_status = status;
            previous
        };

        tracing::info!(%service_id, from = %previous, to = %status, "health change");
        self.emit(
            service_id,
            "health_change",
            Some(serde_json::json!({ "from": previous, "to": status })),
        )
        .await;
        Ok(())
    }

    /// Looks up a registration by service ID.
    ///
    /// A stale instance still resolves (with `health_status` unhealthy);
    /// only an explicit deregister makes an ID unresolvable.
    pub async fn resolve(&self, service_id: &str) -> Result<ServiceRegistration> {
        self.services
            .read()
            .await
            .get(service_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(service_id.to_string()))
    }

    /// Lists instances advertising a capability, most recently heartbeated
    /// first, for selection among equivalent instances.
    pub async fn list_by_capability(&self, capability: &str) -> Vec<ServiceRegistration> {
        let services = self.services.read().await;
        let mut matches: Vec<ServiceRegistration> = services
            .values()
            .filter(|r| r.has_capability(capability))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.last_heartbeat_at.cmp(&a.last_heartbeat_at));
        matches
    }

    /// Lists all registrations.
    pub async fn list_all(&self) -> Vec<ServiceRegistration> {
        self.services.read().await.values().cloned().collect()
    }

    /// Marks instances whose heartbeat is older than the configured timeout
    /// as unhealthy. Entries are never deleted here.
    ///
    /// Returns the number of instances flipped this pass.
    pub async fn sweep_stale(&self) -> usize {
        let now = Utc::now();
        let swept = self.collect_stale(now).await;

        for service_id in &swept {
            metrics::counter!("registry_stale_marked_total").increment(1);
            tracing::warn!(%service_id, "heartbeat expired, marking unhealthy");
            self.emit(service_id, "marked_stale", None).await;
        }
        swept.len()
    }

    async fn collect_stale(&self, now: DateTime<Utc>) -> Vec<String> {
        let cutoff = chrono::Duration::from_std(self.config.heartbeat_timeout)
            .unwrap_or_else(|_| chrono::Duration::seconds(60));
        let mut services = self.services.write().await;
        let mut swept = Vec::new();
        for (service_id, registration) in services.iter_mut() {
            if registration.health_status != HealthStatus::Unhealthy
                && now - registration.last_heartbeat_at > cutoff
            {
                registration.health_status = HealthStatus::Unhealthy;
                swept.push(service_id.clone());
            }
        }
        swept
    }

    /// Best-effort bridge emission: failures are logged, never propagated.
    async fn emit(&self, service_id: &str, event: &str, detail: Option<serde_json::Value>) {
        let record = ServiceRegistryEventRecord {
            service_id: service_id.to_string(),
            event: event.to_string(),
            detail,
            occurred_at: Utc::now(),
        };
        if let Err(e) = self.bridge.record_service_registry_event(record).await {
            tracing::warn!(error = %e, %service_id, event, "bridge recording failed");
        }
    }
}

impl<B: Bridge + Clone + Send + Sync + 'static> ServiceRegistry<B> {
    /// Spawns the background staleness sweeper.
    ///
    /// Runs `sweep_stale` every `sweep_interval` until the returned handle
    /// is aborted or the runtime shuts down.
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(registry.config.sweep_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let swept = registry.sweep_stale().await;
                if swept > 0 {
                    tracing::debug!(swept, "staleness sweep completed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge::{InMemoryBridge, NoopBridge};

    fn info(service_id: &str, capabilities: &[&str]) -> ServiceInfo {
        ServiceInfo {
            service_id: service_id.to_string(),
            name: format!("{service_id}-name"),
            layer: "worker".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn register_and_resolve() {
        let registry = ServiceRegistry::new(NoopBridge::new());
        registry.register(info("svc-1", &["create_sandbox"])).await;

        let registration = registry.resolve("svc-1").await.unwrap();
        assert_eq!(registration.service_id, "svc-1");
        assert_eq!(registration.health_status, HealthStatus::Unknown);
    }

    #[tokio::test]
    async fn register_is_idempotent_upsert() {
        let registry = ServiceRegistry::new(NoopBridge::new());
        registry.register(info("svc-1", &["a"])).await;
        let first = registry.resolve("svc-1").await.unwrap();

        let mut updated = info("svc-1", &["a", "b"]);
        updated.port = 9999;
        registry.register(updated).await;

        let second = registry.resolve("svc-1").await.unwrap();
        assert_eq!(registry.list_all().await.len(), 1);
        assert_eq!(second.port, 9999);
        assert!(second.has_capability("b"));
        assert_eq!(second.registered_at, first.registered_at);
        assert!(second.last_heartbeat_at >= first.last_heartbeat_at);
    }

    #[tokio::test]
    async fn resolve_after_deregister_is_not_found() {
        let registry = ServiceRegistry::new(NoopBridge::new());
        registry.register(info("svc-1", &[])).await;
        registry.deregister("svc-1").await.unwrap();

        let result = registry.resolve("svc-1").await;
        assert!(matches!(result, Err(RegistryError::NotFound(_))));
    }

    #[tokio::test]
    async fn deregister_unknown_is_not_found() {
        let registry = ServiceRegistry::new(NoopBridge::new());
        let result = registry.deregister("nope").await;
        assert!(matches!(result, Err(RegistryError::NotFound(_))));
    }

    #[tokio::test]
    async fn report_health_updates_status() {
        let registry = ServiceRegistry::new(NoopBridge::new());
        registry.register(info("svc-1", &[])).await;

        registry
            .report_health("svc-1", HealthStatus::Degraded)
            .await
            .unwrap();
        let registration = registry.resolve("svc-1").await.unwrap();
        assert_eq!(registration.health_status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn report_health_unknown_service_is_not_found() {
        let registry = ServiceRegistry::new(NoopBridge::new());
        let result = registry.report_health("ghost", HealthStatus::Healthy).await;
        assert!(matches!(result, Err(RegistryError::NotFound(_))));
    }

    #[tokio::test]
    async fn list_by_capability_orders_by_recency() {
        let registry = ServiceRegistry::new(NoopBridge::new());
        registry.register(info("svc-old", &["gen"])).await;
        registry.register(info("svc-new", &["gen"])).await;
        registry.register(info("svc-other", &["embed"])).await;

        // Heartbeat refreshes recency, so svc-old should now sort first.
        registry.heartbeat("svc-old").await.unwrap();

        let listed = registry.list_by_capability("gen").await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].service_id, "svc-old");
        assert_eq!(listed[1].service_id, "svc-new");
    }

    #[tokio::test]
    async fn stale_sweep_marks_unhealthy_but_keeps_entry() {
        let config = RegistryConfig {
            heartbeat_timeout: Duration::ZERO,
            sweep_interval: Duration::from_secs(1),
        };
        let registry = ServiceRegistry::with_config(NoopBridge::new(), config);
        registry.register(info("svc-1", &[])).await;
        registry
            .report_health("svc-1", HealthStatus::Healthy)
            .await
            .unwrap();

        let swept = registry.sweep_stale().await;
        assert_eq!(swept, 1);

        // Still resolvable, but unhealthy now.
        let registration = registry.resolve("svc-1").await.unwrap();
        assert_eq!(registration.health_status, HealthStatus::Unhealthy);

        // Already-unhealthy entries are not swept again.
        assert_eq!(registry.sweep_stale().await, 0);
    }

    #[tokio::test]
    async fn heartbeat_revives_swept_instance() {
        let config = RegistryConfig {
            heartbeat_timeout: Duration::ZERO,
            sweep_interval: Duration::from_secs(1),
        };
        let registry = ServiceRegistry::with_config(NoopBridge::new(), config);
        registry.register(info("svc-1", &[])).await;
        registry.sweep_stale().await;

        registry.heartbeat("svc-1").await.unwrap();
        let registration = registry.resolve("svc-1").await.unwrap();
        assert_eq!(registration.health_status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn mutations_emit_registry_events() {
        let bridge = InMemoryBridge::new();
        let registry = ServiceRegistry::new(bridge.clone());

        registry.register(info("svc-1", &[])).await;
        registry
            .report_health("svc-1", HealthStatus::Healthy)
            .await
            .unwrap();
        registry.deregister("svc-1").await.unwrap();

        let events: Vec<String> = bridge
            .registry_events()
            .await
            .into_iter()
            .map(|e| e.event)
            .collect();
        assert_eq!(events, vec!["registered", "health_change", "deregistered"]);
    }

    #[tokio::test]
    async fn bridge_failure_never_propagates() {
        let bridge = InMemoryBridge::new();
        bridge.set_fail_all(true).await;
        let registry = ServiceRegistry::new(bridge.clone());

        registry.register(info("svc-1", &[])).await;
        registry
            .report_health("svc-1", HealthStatus::Healthy)
            .await
            .unwrap();
        registry.deregister("svc-1").await.unwrap();

        assert_eq!(bridge.record_count().await, 0);
    }
}
