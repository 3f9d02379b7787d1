//! # Rescue Planner
//!
//! Turns a description of a fire scene into a stepwise rescue plan by
//! coordinating the knowledge store, the retrieval service, the generation
//! backend and the cache, and falls back to a fixed plan when they fail.

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fallback;
pub mod generation;
pub mod http;
pub mod knowledge;
pub mod models;
pub mod validation;

use std::sync::Arc;

use service_sdk::{ServiceClient, ServiceError};

pub use config::PlannerConfig;
pub use coordinator::{PlanOutcome, RescuePlanCoordinator};
pub use error::{ApiError, CacheError, GenerationError, ValidationError};
pub use models::{PlanSource, RescuePlan, RescuePlanRequest, RescueStep};

/// Build the service client and the shared state from a configuration
pub fn build_state(config: &PlannerConfig) -> Result<Arc<http::AppState>, ServiceError> {
    let client = ServiceClient::builder()
        .registry(config.registry()?)
        .resilience(config.resilience.clone())
        .build()?;

    let coordinator = RescuePlanCoordinator::with_caller(
        Arc::new(client.clone()),
        config.rag_limit,
        config.cache_ttl,
        config.generation.clone(),
    );

    Ok(Arc::new(http::AppState::new(
        coordinator,
        client,
        config.health_threshold,
    )))
}
