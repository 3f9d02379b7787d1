//! Planner configuration
//!
//! Service addresses come from `config-rs` (`{NAME}_SERVICE_ADDR` /
//! `{NAME}_SERVICE_PORT`); every other tunable is read through a
//! [`ConfigProvider`], `RESCUE_*` environment variables in production.

use std::net::SocketAddr;
use std::time::Duration;

use service_sdk::{
    ConfigProvider, ConfigProviderExt, EnvConfigProvider, ResilienceSettings, ServiceEndpoint,
    ServiceError, ServiceRegistry,
};

use crate::generation::GenerationSettings;

pub const KNOWLEDGE_GRAPH_SERVICE: &str = "knowledge_graph";
pub const RAG_SERVICE: &str = "rag";
pub const GENERATION_SERVICE: &str = "generation";
pub const CACHE_SERVICE: &str = "cache";

/// Name this service resolves its own port under
pub const SERVICE_NAME: &str = "EMERGENCY";

/// Prefix of the tunables' environment variables
pub const ENV_PREFIX: &str = "RESCUE";

fn default_timeout(service: &str) -> Duration {
    match service {
        KNOWLEDGE_GRAPH_SERVICE => Duration::from_secs(10),
        RAG_SERVICE => Duration::from_secs(15),
        GENERATION_SERVICE => Duration::from_secs(120),
        CACHE_SERVICE => Duration::from_secs(5),
        _ => Duration::from_secs(30),
    }
}

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub bind_addr: SocketAddr,
    pub resilience: ResilienceSettings,
    pub cache_ttl: Duration,
    pub rag_limit: usize,
    pub generation: GenerationSettings,
    /// Unhealthy fraction above which the aggregate health is "unhealthy"
    pub health_threshold: f64,
    pub endpoints: Vec<ServiceEndpoint>,
}

impl PlannerConfig {
    /// Load from `RESCUE_*` environment variables
    pub fn from_env() -> Result<Self, ServiceError> {
        Self::from_provider(&EnvConfigProvider::new().with_prefix(ENV_PREFIX))
    }

    /// Load from any provider. Absent keys take their defaults.
    ///
    /// `{service}_url` overrides the address resolved by `config-rs` and
    /// `{service}_timeout` the per-service default timeout.
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self, ServiceError> {
        let resilience = ResilienceSettings::from_provider(provider)?;

        let defaults = GenerationSettings::default();
        let generation = GenerationSettings {
            model: provider
                .get_string("generation_model")
                .ok()
                .filter(|m| !m.trim().is_empty()),
            temperature: provider.try_get_float_or("generation_temperature", defaults.temperature)?,
            top_p: provider.try_get_float_or("generation_top_p", defaults.top_p)?,
            max_tokens: provider.try_get_u32_or("generation_max_tokens", defaults.max_tokens)?,
        };
        if !(0.0..=2.0).contains(&generation.temperature) {
            return Err(ServiceError::configuration(
                "generation_temperature must be between 0 and 2",
            ));
        }
        if !(0.0..=1.0).contains(&generation.top_p) {
            return Err(ServiceError::configuration("generation_top_p must be between 0 and 1"));
        }
        if generation.max_tokens == 0 {
            return Err(ServiceError::configuration("generation_max_tokens must be positive"));
        }

        let health_threshold = provider.try_get_float_or("health_unhealthy_threshold", 0.7)?;
        if !(health_threshold > 0.0 && health_threshold <= 1.0) {
            return Err(ServiceError::configuration(
                "health_unhealthy_threshold must be in (0, 1]",
            ));
        }

        let rag_limit = provider.try_get_u32_or("rag_limit", 3)?;
        if rag_limit < 1 {
            return Err(ServiceError::configuration("rag_limit must be at least 1"));
        }

        let cache_ttl = provider.try_get_duration_or("cache_ttl", Duration::from_secs(3600))?;
        if cache_ttl.as_secs() == 0 {
            return Err(ServiceError::configuration("cache_ttl must be at least one second"));
        }

        let endpoints = config_rs::get_upstream_services()
            .into_iter()
            .map(|definition| {
                let name = definition.logical_name();
                let base_url = provider
                    .get_string(&format!("{}_url", name))
                    .unwrap_or_else(|_| definition.client_address());
                let timeout = provider
                    .try_get_duration_or(&format!("{}_timeout", name), default_timeout(&name))?;
                Ok(ServiceEndpoint::new(name, base_url)
                    .with_timeout(timeout)
                    .required(definition.required))
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        Ok(Self {
            bind_addr: config_rs::get_bind_address(
                SERVICE_NAME,
                config_rs::get_default_port(SERVICE_NAME),
            ),
            resilience,
            cache_ttl,
            rag_limit: rag_limit as usize,
            generation,
            health_threshold,
            endpoints,
        })
    }

    /// Endpoint registry for the service client
    pub fn registry(&self) -> Result<ServiceRegistry, ServiceError> {
        self.endpoints
            .iter()
            .cloned()
            .try_fold(ServiceRegistry::new(), |registry, endpoint| registry.with(endpoint))
    }
}
