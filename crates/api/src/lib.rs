//! HTTP API server with observability for the integration reliability layer.
//!
//! Exposes the service registry, circuit breakers, and saga orchestrator
//! over REST, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use breaker::CircuitBreaker;
use bridge::Bridge;
use metrics_exporter_prometheus::PrometheusHandle;
use registry::{RegistryConfig, ServiceRegistry};
use saga::{OrchestratorConfig, SagaCatalog, SagaOrchestrator};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<B: Bridge> {
    pub registry: ServiceRegistry<B>,
    pub breaker: CircuitBreaker<B>,
    pub orchestrator: SagaOrchestrator<B>,
    pub catalog: SagaCatalog,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<B: Bridge + Clone + Send + Sync + 'static>(
    state: Arc<AppState<B>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/services", post(routes::services::register::<B>))
        .route("/services", get(routes::services::list::<B>))
        .route("/services/{id}", get(routes::services::get::<B>))
        .route("/services/{id}", delete(routes::services::deregister::<B>))
        .route(
            "/services/{id}/heartbeat",
            post(routes::services::heartbeat::<B>),
        )
        .route(
            "/services/{id}/health",
            post(routes::services::report_health::<B>),
        )
        .route("/sagas/{id}", post(routes::sagas::start::<B>))
        .route("/sagas/{id}", get(routes::sagas::status::<B>))
        .route("/breakers", get(routes::breakers::list::<B>))
        .route("/breakers/{id}", get(routes::breakers::get::<B>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state wired over the given audit bridge.
pub fn create_default_state<B: Bridge + Clone + Send + Sync + 'static>(
    bridge: B,
    registry_config: RegistryConfig,
    orchestrator_config: OrchestratorConfig,
) -> Arc<AppState<B>> {
    let registry = ServiceRegistry::with_config(bridge.clone(), registry_config);
    let breaker = CircuitBreaker::new(bridge.clone());
    let orchestrator = SagaOrchestrator::with_config(
        registry.clone(),
        breaker.clone(),
        bridge,
        orchestrator_config,
    );
    Arc::new(AppState {
        registry,
        breaker,
        orchestrator,
        catalog: SagaCatalog::new(),
    })
}
