//! PlanCache latch behaviour against a mocked service caller

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::MockCaller;
use rescue_planner::cache::PlanCache;
use rescue_planner::fallback;
use rescue_planner::models::Environment;
use serde_json::json;
use service_sdk::{Method, ServiceError};

const KEY: &str = "emergency:rescue_plan:0123";

fn plan() -> rescue_planner::RescuePlan {
    let env: Environment = serde_json::from_value(json!({
        "type": "outdoor", "area": "vehicle", "ventilation": "excellent", "exits": 4
    }))
    .unwrap();
    fallback::synthesize(&env, "高")
}

#[tokio::test]
async fn undecodable_entry_is_a_miss_without_latching() {
    let mut caller = MockCaller::new();
    caller
        .expect_call()
        .withf(|service, path, method, _, _| {
            service == "cache" && path == format!("/get/{}", KEY) && *method == Method::GET
        })
        .times(2)
        .returning(|_, _, _, _, _| Ok(json!({"success": true, "data": {"not": "a plan"}})));

    let cache = PlanCache::new(Arc::new(caller), Duration::from_secs(60));
    assert!(cache.get(KEY).await.is_none());
    assert!(cache.is_enabled());
    assert!(cache.get(KEY).await.is_none());
}

#[tokio::test]
async fn rejected_write_disables_cache() {
    let mut caller = MockCaller::new();
    caller
        .expect_call()
        .withf(|_, path, _, body, _| {
            path == "/set"
                && body
                    .as_ref()
                    .map_or(false, |b| b["key"] == json!(KEY) && b["ttl"] == json!(60))
        })
        .times(1)
        .returning(|_, _, _, _, _| Ok(json!({"success": false, "data": false, "message": "设置失败"})));

    let cache = PlanCache::new(Arc::new(caller), Duration::from_secs(60));
    cache.set(KEY, &plan()).await;
    assert!(!cache.is_enabled());

    // Latched: neither call reaches the caller
    assert!(cache.get(KEY).await.is_none());
    cache.set(KEY, &plan()).await;
}

#[tokio::test]
async fn service_error_on_read_disables_cache() {
    let mut caller = MockCaller::new();
    caller
        .expect_call()
        .times(1)
        .returning(|_, _, _, _, _| Err(ServiceError::circuit_open("cache")));

    let cache = PlanCache::new(Arc::new(caller), Duration::from_secs(60));
    assert!(cache.get(KEY).await.is_none());
    assert!(!cache.is_enabled());
}

#[tokio::test]
async fn stored_plan_round_trips() {
    let stored = serde_json::to_value(plan()).unwrap();
    let mut caller = MockCaller::new();
    caller
        .expect_call()
        .returning(move |_, _, _, _, _| Ok(json!({"success": true, "data": stored.clone()})));

    let cache = PlanCache::new(Arc::new(caller), Duration::from_secs(60));
    assert_eq!(cache.get(KEY).await, Some(plan()));
}
