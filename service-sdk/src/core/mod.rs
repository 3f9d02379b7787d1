//! Core abstractions for the service SDK
//!
//! - `ServiceCaller`: the seam the orchestration layer depends on
//! - `ServiceClient`: the HTTP implementation with breaker, retry and timeouts
//! - `ServiceClientBuilder`: builder for the client

pub mod builder;
pub use builder::ServiceClientBuilder;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};

use crate::config::{ServiceEndpoint, ServiceRegistry};
use crate::error::{mapping, ErrorContext, Result, ServiceError};
use crate::resilience::{BreakerRegistry, BreakerSnapshot, CircuitBreakerStatus, RetryExecutor};

/// Call a named upstream service
#[async_trait]
pub trait ServiceCaller: Send + Sync {
    /// Issue one logical request. `timeout` overrides the endpoint default.
    async fn call(
        &self,
        service: &str,
        path: &str,
        method: Method,
        body: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value>;

    /// GET with the endpoint's default timeout
    async fn get(&self, service: &str, path: &str) -> Result<Value> {
        self.call(service, path, Method::GET, None, None).await
    }

    /// POST a JSON body with the endpoint's default timeout
    async fn post(&self, service: &str, path: &str, body: Value) -> Result<Value> {
        self.call(service, path, Method::POST, Some(body), None).await
    }
}

/// HTTP client for the registered services
///
/// Breaker state is keyed by service name and shared across clones, so every
/// concurrent caller of the same service sees the same circuit.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: Client,
    registry: Arc<ServiceRegistry>,
    breakers: Arc<BreakerRegistry>,
    retry: RetryExecutor,
}

impl ServiceClient {
    /// Start building a client
    pub fn builder() -> ServiceClientBuilder {
        ServiceClientBuilder::new()
    }

    pub(crate) fn from_parts(
        http: Client,
        registry: ServiceRegistry,
        breakers: BreakerRegistry,
        retry: RetryExecutor,
    ) -> Self {
        Self {
            http,
            registry: Arc::new(registry),
            breakers: Arc::new(breakers),
            retry,
        }
    }

    /// The registered endpoints
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Current status of a service's breaker
    pub fn breaker_status(&self, service: &str) -> CircuitBreakerStatus {
        self.breakers.breaker(service).status()
    }

    /// Snapshots of every breaker that has seen traffic
    pub fn breaker_snapshots(&self) -> Vec<BreakerSnapshot> {
        self.breakers.snapshots()
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    fn endpoint(&self, service: &str) -> Result<&ServiceEndpoint> {
        self.registry
            .get(service)
            .ok_or_else(|| ServiceError::unknown_service(service))
    }

    async fn send_once(
        &self,
        service: &str,
        method: Method,
        url: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<Value> {
        log::debug!("{} {} ({}, timeout {:?})", method, url, service, timeout);

        let mut request = self.http.request(method, url).timeout(timeout);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(mapping::map_http_error(service, status, &text));
        }

        let text = response.text().await?;
        Ok(decode_body(&text))
    }
}

/// JSON bodies are returned as-is, anything else is wrapped as `{"data": text}`
pub fn decode_body(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| json!({ "data": text }))
}

#[async_trait]
impl ServiceCaller for ServiceClient {
    async fn call(
        &self,
        service: &str,
        path: &str,
        method: Method,
        body: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let endpoint = self.endpoint(service)?;
        let url = endpoint.url_for(path);
        let timeout = timeout.unwrap_or(endpoint.timeout);
        let breaker = self.breakers.breaker(service);

        let url = url.as_str();
        let body = body.as_ref();
        let method = &method;
        let breaker_ref = &breaker;

        self.retry
            .execute_with(
                move |attempt| async move {
                    breaker_ref.try_acquire()?;

                    match self.send_once(service, method.clone(), url, body, timeout).await {
                        Ok(value) => {
                            breaker_ref.record_success();
                            Ok(value)
                        }
                        Err(err) if err.is_client_rejection() => {
                            // The service is up, it just refused this request
                            breaker_ref.record_success();
                            Err(err)
                        }
                        Err(err) => {
                            let status = breaker_ref.record_failure();
                            log::debug!(
                                "{} attempt {} failed (breaker {}): {}",
                                service,
                                attempt,
                                status,
                                err
                            );
                            Err(err)
                        }
                    }
                },
                // Stop as soon as the breaker has opened
                |err| err.is_retryable() && breaker.status() != CircuitBreakerStatus::Open,
            )
            .await
            .map_err(|err| err.with_context(ErrorContext::for_service(service).endpoint(path)))
    }
}
