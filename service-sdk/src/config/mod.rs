//! Configuration management for service clients
//!
//! This module provides the configuration providers used to load tunables
//! (environment variables or in-memory values) and the registry of named
//! upstream endpoints that [`crate::ServiceClient`] resolves calls against.

use std::collections::{BTreeMap, HashMap};
use std::env;
use std::time::Duration;

use serde::Serialize;

use crate::error::{Result, ServiceError};
use crate::resilience::{CircuitBreakerConfig, RetryConfig};
use crate::util::parse_duration;

/// Base trait for configuration providers
pub trait ConfigProvider: Send + Sync {
    /// Get a string configuration value
    fn get_string(&self, key: &str) -> Result<String>;
}

/// Extension methods for configuration providers
pub trait ConfigProviderExt: ConfigProvider {
    /// Get an integer configuration value
    fn get_int(&self, key: &str) -> Result<i64> {
        let value = self.get_string(key)?;
        value
            .trim()
            .parse::<i64>()
            .map_err(|e| ServiceError::configuration(format!("Invalid integer for key {}: {}", key, e)))
    }

    /// Get a float configuration value
    fn get_float(&self, key: &str) -> Result<f64> {
        let value = self.get_string(key)?;
        value
            .trim()
            .parse::<f64>()
            .map_err(|e| ServiceError::configuration(format!("Invalid float for key {}: {}", key, e)))
    }

    /// Get a duration value such as "30s", "500ms" or a bare number of seconds
    fn get_duration(&self, key: &str) -> Result<Duration> {
        let value = self.get_string(key)?;
        parse_duration(&value).ok_or_else(|| {
            ServiceError::configuration(format!("Invalid duration for key {}: {}", key, value))
        })
    }

    /// Whether the provider has a value for the key
    fn has_key(&self, key: &str) -> bool {
        self.get_string(key).is_ok()
    }

    /// Integer value, or the default when the key is absent.
    /// A present value that does not parse is an error.
    fn try_get_int_or(&self, key: &str, default: i64) -> Result<i64> {
        if self.has_key(key) {
            self.get_int(key)
        } else {
            Ok(default)
        }
    }

    /// Non-negative integer that fits a `u32`, or the default when absent
    fn try_get_u32_or(&self, key: &str, default: u32) -> Result<u32> {
        let value = self.try_get_int_or(key, i64::from(default))?;
        u32::try_from(value).map_err(|_| {
            ServiceError::configuration(format!("Value for key {} is out of range: {}", key, value))
        })
    }

    /// Float value, or the default when the key is absent
    fn try_get_float_or(&self, key: &str, default: f64) -> Result<f64> {
        if self.has_key(key) {
            self.get_float(key)
        } else {
            Ok(default)
        }
    }

    /// Duration value, or the default when the key is absent
    fn try_get_duration_or(&self, key: &str, default: Duration) -> Result<Duration> {
        if self.has_key(key) {
            self.get_duration(key)
        } else {
            Ok(default)
        }
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProviderExt for T {}

/// Environment variable based configuration provider
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    /// Optional prefix for environment variables
    prefix: Option<String>,

    /// Optional namespace for variables (e.g., "CACHE", "RAG")
    namespace: Option<String>,
}

impl EnvConfigProvider {
    /// Create a new environment variable config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a prefix for environment variables
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set a namespace for environment variables
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Format a configuration key as an environment variable
    fn format_key(&self, key: &str) -> String {
        let mut env_key = String::new();

        if let Some(ref prefix) = self.prefix {
            env_key.push_str(prefix);
            env_key.push('_');
        }

        if let Some(ref namespace) = self.namespace {
            env_key.push_str(namespace);
            env_key.push('_');
        }

        env_key.push_str(&key.to_uppercase().replace(|c: char| !c.is_ascii_alphanumeric(), "_"));

        env_key
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        let env_key = self.format_key(key);

        env::var(&env_key).map_err(|e| match e {
            env::VarError::NotPresent => {
                ServiceError::configuration(format!("Environment variable not set: {}", env_key))
            }
            env::VarError::NotUnicode(_) => ServiceError::configuration(format!(
                "Environment variable is not valid unicode: {}",
                env_key
            )),
        })
    }
}

/// In-memory config provider for testing or static configuration
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigProvider {
    values: HashMap<String, String>,
}

impl MemoryConfigProvider {
    /// Create a new empty memory config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory config provider with initial values
    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Set a configuration value
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: ToString,
    {
        self.values.insert(key.into(), value.to_string());
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| ServiceError::configuration(format!("Configuration key not found: {}", key)))
    }
}

/// A named upstream service
#[derive(Debug, Clone, Serialize)]
pub struct ServiceEndpoint {
    /// Logical name callers use, e.g. "knowledge_graph"
    pub name: String,

    /// Base address, e.g. "http://localhost:8001"
    pub base_url: String,

    /// Default request timeout
    #[serde(with = "duration_secs")]
    pub timeout: Duration,

    /// Whether the service counts toward "healthy" in health reports
    pub required: bool,
}

impl ServiceEndpoint {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            required: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Join a request path onto the base address
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Validate this endpoint
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ServiceError::configuration("Service name is required"));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ServiceError::configuration(format!(
                "Base URL for {} must be http(s): {}",
                self.name, self.base_url
            )));
        }
        if self.timeout.is_zero() {
            return Err(ServiceError::configuration(format!(
                "Timeout for {} must be positive",
                self.name
            )));
        }
        Ok(())
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }
}

/// Registry of known upstream services, keyed by logical name
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    endpoints: BTreeMap<String, ServiceEndpoint>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) an endpoint after validating it
    pub fn register(&mut self, endpoint: ServiceEndpoint) -> Result<()> {
        endpoint.validate()?;
        self.endpoints.insert(endpoint.name.clone(), endpoint);
        Ok(())
    }

    /// Builder-style registration
    pub fn with(mut self, endpoint: ServiceEndpoint) -> Result<Self> {
        self.register(endpoint)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&ServiceEndpoint> {
        self.endpoints.get(name)
    }

    /// Endpoints in name order
    pub fn endpoints(&self) -> impl Iterator<Item = &ServiceEndpoint> {
        self.endpoints.values()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Breaker and retry tunables loaded from a provider
#[derive(Debug, Clone, Default)]
pub struct ResilienceSettings {
    pub breaker: CircuitBreakerConfig,
    pub retry: RetryConfig,
}

impl ResilienceSettings {
    /// Load settings, falling back to defaults for absent keys
    ///
    /// Keys: `breaker_failure_threshold`, `breaker_cool_down`,
    /// `retry_max_attempts`, `retry_base_delay`, `retry_max_delay`.
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let defaults = Self::default();

        let failure_threshold =
            provider.try_get_u32_or("breaker_failure_threshold", defaults.breaker.failure_threshold)?;
        let max_attempts = provider.try_get_u32_or("retry_max_attempts", defaults.retry.max_attempts)?;

        if failure_threshold < 1 {
            return Err(ServiceError::configuration(
                "breaker_failure_threshold must be at least 1",
            ));
        }
        if max_attempts < 1 {
            return Err(ServiceError::configuration("retry_max_attempts must be at least 1"));
        }

        Ok(Self {
            breaker: CircuitBreakerConfig {
                failure_threshold,
                cool_down: provider.try_get_duration_or("breaker_cool_down", defaults.breaker.cool_down)?,
            },
            retry: RetryConfig {
                max_attempts,
                base_delay: provider.try_get_duration_or("retry_base_delay", defaults.retry.base_delay)?,
                max_delay: provider.try_get_duration_or("retry_max_delay", defaults.retry.max_delay)?,
                ..defaults.retry
            },
        })
    }
}
