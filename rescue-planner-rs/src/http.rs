//! HTTP surface
//!
//! - `POST /rescue-plan`: produce a plan
//! - `GET /health`: aggregate health of the collaborators
//! - `GET /status`: health plus breaker snapshots and cache state
//! - `GET /`: service info

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use service_sdk::{HealthStatus, ServiceClient};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::coordinator::RescuePlanCoordinator;
use crate::error::ApiError;
use crate::models::{ApiResponse, PlanSource, RescuePlanRequest};

/// Maximum accepted request body
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state
pub struct AppState {
    pub coordinator: RescuePlanCoordinator,
    pub client: ServiceClient,
    pub health_threshold: f64,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(coordinator: RescuePlanCoordinator, client: ServiceClient, health_threshold: f64) -> Self {
        Self {
            coordinator,
            client,
            health_threshold,
            started_at: Instant::now(),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/rescue-plan", post(rescue_plan_handler))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST /rescue-plan
async fn rescue_plan_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RescuePlanRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::MalformedBody(rejection.body_text()))?;

    let outcome = state.coordinator.generate_plan(&request).await?;
    info!(plan_id = %outcome.plan.id, source = %outcome.source, "rescue plan served");

    let message = match outcome.source {
        PlanSource::Generated => "Rescue plan generated",
        PlanSource::Cache => "Rescue plan served from cache",
        PlanSource::Fallback => "Fallback rescue plan generated",
    };
    Ok(Json(ApiResponse::ok(message, outcome.plan)))
}

/// GET /health
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let report = state.client.health_report(state.health_threshold).await;
    let success = report.status != HealthStatus::Unhealthy;
    let message = match report.status {
        HealthStatus::Healthy => "All services healthy",
        HealthStatus::Degraded => "Some services unavailable, running degraded",
        HealthStatus::Unhealthy => "Most services unavailable",
    };

    Json(ApiResponse {
        success,
        ..ApiResponse::ok(message, report)
    })
}

/// GET /status
async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let report = state.client.health_report(state.health_threshold).await;

    Json(ApiResponse::ok(
        "Service status",
        json!({
            "service": config_rs::get_formatted_service_name(crate::config::SERVICE_NAME),
            "overall_status": report.status,
            "services": report.services,
            "breakers": state.client.breaker_snapshots(),
            "cache_enabled": state.coordinator.cache().is_enabled(),
            "uptime_seconds": state.started_at.elapsed().as_secs(),
        }),
    ))
}

/// GET /
async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": "Fire Emergency Rescue Planner",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "POST /rescue-plan",
            "GET /health",
            "GET /status"
        ]
    }))
}
