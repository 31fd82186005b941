//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bridge::NoopBridge;
use metrics_exporter_prometheus::PrometheusHandle;
use registry::RegistryConfig;
use saga::{FnHandler, StepDefinition, StepTarget};
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (axum::Router, Arc<api::AppState<NoopBridge>>) {
    let state = api::create_default_state(
        NoopBridge::new(),
        RegistryConfig::default(),
        saga::OrchestratorConfig::default(),
    );
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_check() {
    let (app, _) = setup();

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn register_resolve_and_deregister() {
    let (app, _) = setup();

    let response = app
        .clone()
        .oneshot(post_json(
            "/services",
            json!({
                "service_id": "worker-1",
                "name": "transcode-worker",
                "layer": "worker",
                "host": "10.0.0.4",
                "port": 9000,
                "capabilities": ["transcode"]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["service_id"], "worker-1");

    let response = app.clone().oneshot(get("/services/worker-1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["name"], "transcode-worker");
    assert_eq!(json["health_status"], "unknown");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/services/worker-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.oneshot(get("/services/worker-1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn heartbeat_and_health_reporting() {
    let (app, _) = setup();

    let response = app
        .clone()
        .oneshot(post_json("/services/ghost/heartbeat", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.clone()
        .oneshot(post_json(
            "/services",
            json!({
                "service_id": "gw-1",
                "name": "gateway",
                "layer": "gateway",
                "host": "10.0.0.1",
                "port": 8443
            }),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(post_json("/services/gw-1/heartbeat", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .clone()
        .oneshot(post_json(
            "/services/gw-1/health",
            json!({ "status": "degraded" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.oneshot(get("/services/gw-1")).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["health_status"], "degraded");
}

#[tokio::test]
async fn capability_filter_lists_matching_services() {
    let (app, _) = setup();

    for (id, caps) in [("a", json!(["encode"])), ("b", json!(["decode"]))] {
        app.clone()
            .oneshot(post_json(
                "/services",
                json!({
                    "service_id": id,
                    "name": id,
                    "layer": "worker",
                    "host": "127.0.0.1",
                    "port": 8080,
                    "capabilities": caps
                }),
            ))
            .await
            .unwrap();
    }

    let response = app.oneshot(get("/services?capability=encode")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let listed = json.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["service_id"], "a");
}

#[tokio::test]
async fn cataloged_saga_runs_to_completion() {
    let (app, state) = setup();

    app.clone()
        .oneshot(post_json(
            "/services",
            json!({
                "service_id": "billing",
                "name": "billing",
                "layer": "worker",
                "host": "127.0.0.1",
                "port": 8080
            }),
        ))
        .await
        .unwrap();

    let charge = FnHandler::new(|_target, ctx| async move {
        let amount = ctx.get("amount").cloned().unwrap_or(json!(0));
        Ok(json!({ "charged": amount }))
    });
    state
        .catalog
        .register(
            "checkout",
            vec![StepDefinition::new(
                "charge",
                StepTarget::Service("billing".to_string()),
                charge,
            )],
        )
        .await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/sagas/checkout",
            json!({ "context": { "amount": 1299 } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let started = body_json(response).await;
    let saga_id: common::SagaId =
        serde_json::from_value(started["saga_id"].clone()).unwrap();

    let execution = state.orchestrator.wait(saga_id).await.unwrap();
    assert_eq!(execution.status, saga::SagaStatus::Completed);

    let response = app
        .oneshot(get(&format!("/sagas/{saga_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "Completed");
    assert_eq!(json["steps"][0]["status"], "Completed");
    assert_eq!(json["context"]["charge"]["charged"], 1299);
}

#[tokio::test]
async fn unknown_saga_name_and_bad_id_are_rejected() {
    let (app, _) = setup();

    let response = app
        .clone()
        .oneshot(post_json("/sagas/nonexistent", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.clone().oneshot(get("/sagas/not-a-uuid")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let missing = common::SagaId::new();
    let response = app.oneshot(get(&format!("/sagas/{missing}"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn breaker_snapshots_are_exposed() {
    let (app, state) = setup();

    let response = app
        .clone()
        .oneshot(get("/breakers/unknown-dep"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    state.breaker.allow_call("payment-api").await.unwrap();
    state.breaker.report_outcome("payment-api", false).await;

    let response = app.clone().oneshot(get("/breakers/payment-api")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["failure_count"], 1);

    let response = app.oneshot(get("/breakers")).await.unwrap();
    let json = body_json(response).await;
    assert!(json.as_array().unwrap().contains(&json!("payment-api")));
}

#[tokio::test]
async fn metrics_endpoint_renders() {
    let (app, _) = setup();

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
