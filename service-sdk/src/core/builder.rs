//! Client builder implementation
//!
//! Provides a builder for creating and configuring the [`ServiceClient`].

use std::time::Duration;

use super::ServiceClient;
use crate::config::{ResilienceSettings, ServiceEndpoint, ServiceRegistry};
use crate::error::Result;
use crate::resilience::{BreakerRegistry, CircuitBreakerConfig, RetryConfig, RetryExecutor};
use crate::services::common::{build_http_client, UserAgent};

/// Builder for [`ServiceClient`]
#[derive(Debug, Default)]
pub struct ServiceClientBuilder {
    registry: ServiceRegistry,
    endpoints: Vec<ServiceEndpoint>,
    retry_config: RetryConfig,
    circuit_breaker_config: CircuitBreakerConfig,
    user_agent: Option<UserAgent>,
    max_timeout: Option<Duration>,
}

impl ServiceClientBuilder {
    /// Create a new client builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an already-populated registry
    pub fn registry(mut self, registry: ServiceRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Register one endpoint (validated on build)
    pub fn endpoint(mut self, endpoint: ServiceEndpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    /// Configure retry behavior
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Configure circuit breakers
    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker_config = config;
        self
    }

    /// Apply breaker and retry settings loaded from a config provider
    pub fn resilience(self, settings: ResilienceSettings) -> Self {
        self.retry_config(settings.retry)
            .circuit_breaker(settings.breaker)
    }

    /// Set the user agent
    pub fn user_agent(mut self, user_agent: UserAgent) -> Self {
        self.user_agent = Some(user_agent);
        self
    }

    /// Ceiling applied to every request on top of per-call timeouts
    pub fn max_timeout(mut self, timeout: Duration) -> Self {
        self.max_timeout = Some(timeout);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<ServiceClient> {
        let mut registry = self.registry;
        for endpoint in self.endpoints {
            registry.register(endpoint)?;
        }

        let http = build_http_client(self.user_agent, self.max_timeout)?;

        Ok(ServiceClient::from_parts(
            http,
            registry,
            BreakerRegistry::new(self.circuit_breaker_config),
            RetryExecutor::new(self.retry_config),
        ))
    }
}
