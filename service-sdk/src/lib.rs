//! # Service SDK
//!
//! Resilient client plumbing for the fire-rescue planning services.
//!
//! This crate provides:
//!
//! - A uniform way to call a named upstream service (`ServiceCaller`)
//! - Per-service circuit breakers shared by all concurrent callers
//! - Bounded retries with exponential backoff and per-call timeouts
//! - A normalized error taxonomy (`ServiceError`, `ErrorKind`)
//! - Configuration providers and the endpoint registry
//! - `/health` probing with an aggregate classification

// Re-export core modules
pub mod core;
pub use core::{ServiceCaller, ServiceClient, ServiceClientBuilder};

// Re-export error handling
pub mod error;
pub use error::{ErrorContext, ErrorKind, Result, ServiceError};

// Re-export resilience patterns
pub mod resilience;
pub use resilience::{
    BreakerRegistry, BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStatus,
    RetryConfig, RetryExecutor,
};

// Re-export configuration management
pub mod config;
pub use config::{
    ConfigProvider, ConfigProviderExt, EnvConfigProvider, MemoryConfigProvider, ResilienceSettings,
    ServiceEndpoint, ServiceRegistry,
};

// Health probing and transport helpers
pub mod services;
pub use services::{HealthReport, HealthStatus, ServiceHealth};

// Utility module for common functionality
pub mod util;

pub use reqwest::Method;

#[cfg(test)]
mod tests;

/// Create a new default client builder
pub fn client() -> ServiceClientBuilder {
    ServiceClientBuilder::new()
}
