//! HTTP handler tests driven through the router with `oneshot`

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use rescue_planner::generation::GenerationSettings;
use rescue_planner::http::{router, AppState};
use rescue_planner::RescuePlanCoordinator;
use serde_json::{json, Value};
use service_sdk::{RetryConfig, ServiceClient, ServiceEndpoint};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UNREACHABLE: &str = "http://127.0.0.1:1";

fn client(knowledge: &str, generation: &str) -> ServiceClient {
    ServiceClient::builder()
        .endpoint(
            ServiceEndpoint::new("knowledge_graph", knowledge)
                .with_timeout(Duration::from_millis(300))
                .required(true),
        )
        .endpoint(ServiceEndpoint::new("rag", UNREACHABLE).with_timeout(Duration::from_millis(300)))
        .endpoint(
            ServiceEndpoint::new("generation", generation)
                .with_timeout(Duration::from_millis(300))
                .required(true),
        )
        .endpoint(ServiceEndpoint::new("cache", UNREACHABLE).with_timeout(Duration::from_millis(300)))
        .retry_config(RetryConfig {
            max_attempts: 1,
            ..RetryConfig::default()
        })
        .build()
        .expect("client")
}

fn app(client: ServiceClient) -> Router {
    let coordinator = RescuePlanCoordinator::with_caller(
        Arc::new(client.clone()),
        3,
        Duration::from_secs(3600),
        GenerationSettings::default(),
    );
    router(Arc::new(AppState::new(coordinator, client, 0.7)))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_plan(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/rescue-plan")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

#[tokio::test]
async fn rescue_plan_returns_fallback_envelope() {
    let app = app(client(UNREACHABLE, UNREACHABLE));
    let body = json!({
        "items": [{"name": "沙发", "material": "布料", "quantity": 1, "location": "客厅"}],
        "environment": {"type": "室内", "area": "住宅", "ventilation": "一般", "exits": 2},
        "urgency_level": "紧急"
    });

    let response = app.oneshot(post_plan(body.to_string())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], json!(true));
    assert_eq!(json["message"], json!("Fallback rescue plan generated"));
    assert_eq!(json["data"]["priority"], json!("urgent"));
    assert_eq!(json["data"]["steps"].as_array().unwrap().len(), 4);
    assert_eq!(json["data"]["status"], json!("active"));
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn validation_error_is_400() {
    let app = app(client(UNREACHABLE, UNREACHABLE));
    let body = json!({
        "items": [],
        "environment": {"type": "indoor", "area": "residential", "ventilation": "good", "exits": 2}
    });

    let response = app.oneshot(post_plan(body.to_string())).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["success"], json!(false));
    assert_eq!(json["error"], json!("validation_error"));
    assert!(json["message"].as_str().unwrap().contains("items must not be empty"));
}

#[tokio::test]
async fn malformed_json_is_400() {
    let app = app(client(UNREACHABLE, UNREACHABLE));

    let response = app.oneshot(post_plan("{\"items\": [")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["success"], json!(false));
    assert_eq!(json["error"], json!("invalid_request"));
}

#[tokio::test]
async fn unknown_enum_value_is_400() {
    let app = app(client(UNREACHABLE, UNREACHABLE));
    let body = json!({
        "items": [{"name": "x", "material": "unobtainium", "quantity": 1, "location": "y"}],
        "environment": {"type": "indoor", "area": "residential", "ventilation": "good", "exits": 2}
    });

    let response = app.oneshot(post_plan(body.to_string())).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_unhealthy_when_most_services_are_down() {
    let knowledge = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": {"status": "healthy"}})))
        .mount(&knowledge)
        .await;

    // knowledge_graph up; rag, generation and cache down: 3 of 4 unhealthy > 0.7
    let app = app(client(&knowledge.uri(), UNREACHABLE));
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], json!("unhealthy"));
    assert_eq!(json["success"], json!(false));
    assert_eq!(json["data"]["services"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn health_is_healthy_when_required_services_answer() {
    let up = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&up)
        .await;

    // rag and cache are optional here
    let app = app(client(&up.uri(), &up.uri()));
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], json!("healthy"));
    assert_eq!(json["success"], json!(true));
}

#[tokio::test]
async fn status_includes_breakers_and_cache_state() {
    let client = client(UNREACHABLE, UNREACHABLE);
    let app = app(client);

    let response = app
        .clone()
        .oneshot(post_plan(
            json!({
                "items": [{"name": "木桌", "material": "wood", "quantity": 1, "location": "客厅"}],
                "environment": {"type": "indoor", "area": "residential", "ventilation": "good", "exits": 1}
            })
            .to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_json(response).await;

    assert_eq!(json["data"]["cache_enabled"], json!(false));
    let breakers = json["data"]["breakers"].as_array().unwrap();
    assert!(breakers.iter().any(|b| b["service"] == json!("generation")));
    assert!(json["data"]["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn root_lists_endpoints() {
    let app = app(client(UNREACHABLE, UNREACHABLE));
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let json = body_json(response).await;
    assert!(json["endpoints"]
        .as_array()
        .unwrap()
        .contains(&json!("POST /rescue-plan")));
}
