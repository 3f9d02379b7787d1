//! Health probing across the registered services
//!
//! Each collaborator is asked for `GET /health` with its own timeout. Probes
//! bypass the breakers and retries: they report what the service says right
//! now and never change circuit state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;

use crate::config::ServiceEndpoint;
use crate::core::{decode_body, ServiceClient};
use crate::error::{mapping, ServiceError};
use crate::util::measure_time_async;

/// Aggregate health of the collaborator set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Result of probing one service
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub service: String,
    pub healthy: bool,
    pub required: bool,
    pub response_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Health of every registered service plus the aggregate verdict
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub services: Vec<ServiceHealth>,
    pub checked_at: DateTime<Utc>,
}

/// Classify a set of probe results
///
/// Healthy when every required service is healthy. Otherwise unhealthy when
/// the fraction of unhealthy services exceeds `unhealthy_threshold`, else
/// degraded.
pub fn classify(services: &[ServiceHealth], unhealthy_threshold: f64) -> HealthStatus {
    if services.iter().filter(|s| s.required).all(|s| s.healthy) {
        return HealthStatus::Healthy;
    }

    let unhealthy = services.iter().filter(|s| !s.healthy).count();
    let fraction = unhealthy as f64 / services.len() as f64;

    if fraction > unhealthy_threshold {
        HealthStatus::Unhealthy
    } else {
        HealthStatus::Degraded
    }
}

impl ServiceClient {
    /// Probe one endpoint's `/health`
    pub async fn check_service(&self, endpoint: &ServiceEndpoint) -> ServiceHealth {
        let (outcome, elapsed) =
            measure_time_async(|| probe(self, endpoint, endpoint.timeout)).await;

        if let Err(ref err) = outcome {
            log::debug!("Health probe for {} failed: {}", endpoint.name, err);
        }

        ServiceHealth {
            service: endpoint.name.clone(),
            healthy: outcome.is_ok(),
            required: endpoint.required,
            response_time_ms: elapsed.as_secs_f64() * 1000.0,
            error: outcome.err().map(|e| e.to_string()),
        }
    }

    /// Probe every registered endpoint concurrently
    pub async fn health_report(&self, unhealthy_threshold: f64) -> HealthReport {
        let services = join_all(
            self.registry()
                .endpoints()
                .map(|endpoint| self.check_service(endpoint)),
        )
        .await;

        HealthReport {
            status: classify(&services, unhealthy_threshold),
            services,
            checked_at: Utc::now(),
        }
    }
}

async fn probe(
    client: &ServiceClient,
    endpoint: &ServiceEndpoint,
    timeout: Duration,
) -> Result<(), ServiceError> {
    let response = client
        .http()
        .get(endpoint.url_for("/health"))
        .timeout(timeout)
        .send()
        .await?;

    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    if !status.is_success() {
        return Err(mapping::map_http_error(&endpoint.name, status, &text));
    }

    // A 2xx that explicitly reports `success: false` still counts as down
    if decode_body(&text).get("success").and_then(Value::as_bool) == Some(false) {
        return Err(ServiceError::unreachable(format!(
            "{} reported itself unhealthy",
            endpoint.name
        )));
    }

    Ok(())
}
