//! Content-addressed plan cache backed by the cache service
//!
//! Lookups are read-through and writes are best effort. The first error
//! talking to the cache service turns caching off for the rest of the
//! process; there is no way back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use service_sdk::ServiceCaller;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::CACHE_SERVICE;
use crate::error::CacheError;
use crate::models::{RescuePlan, RescuePlanRequest};

pub const CACHE_KEY_PREFIX: &str = "emergency:rescue_plan:";

/// Deterministic key for a request
///
/// SHA-256 over the request's JSON form with every object's keys sorted, so
/// the field order of the inbound body has no influence.
pub fn cache_key(request: &RescuePlanRequest) -> String {
    let normalized = json!({
        "items": request.items,
        "environment": request.environment,
        "additional_info": request.additional_info,
        "urgency_level": request.urgency_level,
    });
    format!("{}{}", CACHE_KEY_PREFIX, sha256_hex(&canonical_json(&normalized)))
}

pub(crate) fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Compact JSON with recursively sorted object keys
pub(crate) fn canonical_json(value: &Value) -> String {
    sorted(value).to_string()
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), sorted(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(values) => Value::Array(values.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

pub struct PlanCache {
    caller: Arc<dyn ServiceCaller>,
    enabled: AtomicBool,
    ttl: Duration,
}

impl PlanCache {
    pub fn new(caller: Arc<dyn ServiceCaller>, ttl: Duration) -> Self {
        Self {
            caller,
            enabled: AtomicBool::new(true),
            ttl,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look a plan up. Misses, decode failures and service errors all yield `None`.
    pub async fn get(&self, key: &str) -> Option<RescuePlan> {
        if !self.is_enabled() {
            return None;
        }

        match self.fetch(key).await {
            Ok(Some(plan)) => {
                debug!(key, "cache hit");
                Some(plan)
            }
            Ok(None) => {
                debug!(key, "cache miss");
                None
            }
            Err(CacheError::Decode(reason)) => {
                warn!(key, reason = %reason, "ignoring undecodable cache entry");
                None
            }
            Err(err) => {
                self.disable(&err);
                None
            }
        }
    }

    /// Store a plan. Failures are logged and disable the cache.
    pub async fn set(&self, key: &str, plan: &RescuePlan) {
        if !self.is_enabled() {
            return;
        }

        if let Err(err) = self.store(key, plan).await {
            self.disable(&err);
        } else {
            debug!(key, ttl = self.ttl.as_secs(), "plan cached");
        }
    }

    async fn fetch(&self, key: &str) -> Result<Option<RescuePlan>, CacheError> {
        let response = self
            .caller
            .get(CACHE_SERVICE, &format!("/get/{}", key))
            .await?;

        if response.get("success").and_then(Value::as_bool) != Some(true) {
            return Ok(None);
        }

        let data = match response.get("data") {
            None | Some(Value::Null) => return Ok(None),
            // Some cache deployments store the plan as a JSON string
            Some(Value::String(text)) => serde_json::from_str::<Value>(text)
                .map_err(|e| CacheError::Decode(e.to_string()))?,
            Some(data) => data.clone(),
        };

        let plan: RescuePlan =
            serde_json::from_value(data).map_err(|e| CacheError::Decode(e.to_string()))?;
        if !plan.check_invariants() {
            return Err(CacheError::Decode("plan steps are not numbered 1..N".to_string()));
        }
        Ok(Some(plan))
    }

    async fn store(&self, key: &str, plan: &RescuePlan) -> Result<(), CacheError> {
        let value = serde_json::to_value(plan).map_err(|e| CacheError::Decode(e.to_string()))?;
        let body = json!({
            "key": key,
            "value": value,
            "ttl": self.ttl.as_secs(),
        });

        let response = self.caller.post(CACHE_SERVICE, "/set", body).await?;
        if response.get("success").and_then(Value::as_bool) == Some(false) {
            let message = response
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("set failed")
                .to_string();
            return Err(CacheError::Rejected(message));
        }
        Ok(())
    }

    fn disable(&self, err: &CacheError) {
        if self.enabled.swap(false, Ordering::AcqRel) {
            warn!(error = %err, "cache service failed, caching disabled");
        } else {
            info!(error = %err, "cache already disabled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;

    fn request() -> RescuePlanRequest {
        serde_json::from_value(json!({
            "items": [{"name": "木桌", "material": "wood", "quantity": 1, "location": "客厅"}],
            "environment": {"type": "indoor", "area": "residential", "ventilation": "good", "exits": 2},
            "urgency_level": "urgent"
        }))
        .unwrap()
    }

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let a = json!({"b": 1, "a": {"z": [ {"y": 1, "x": 2} ], "c": null}});
        assert_eq!(canonical_json(&a), r#"{"a":{"c":null,"z":[{"x":2,"y":1}]},"b":1}"#);
    }

    #[test]
    fn test_key_ignores_field_order() {
        let reordered: RescuePlanRequest = serde_json::from_str(
            r#"{"urgency_level": "urgent",
                "environment": {"exits": 2, "ventilation": "good", "area": "residential", "type": "indoor"},
                "items": [{"location": "客厅", "quantity": 1, "material": "wood", "name": "木桌"}]}"#,
        )
        .unwrap();

        let key = cache_key(&request());
        assert_eq!(key, cache_key(&reordered));
        assert!(key.starts_with(CACHE_KEY_PREFIX));
        assert_eq!(key.len(), CACHE_KEY_PREFIX.len() + 64);
    }

    #[test]
    fn test_key_changes_with_quantity() {
        let mut changed = request();
        changed.items[0].quantity = 2;
        assert_ne!(cache_key(&request()), cache_key(&changed));
    }

    #[test]
    fn test_chinese_alias_normalizes_to_same_key() {
        let mut zh = request();
        zh.items[0].material = serde_json::from_value(json!("木质")).unwrap();
        assert_eq!(cache_key(&request()), cache_key(&zh));
    }
}
