//! KnowledgeAggregator edge cases against a mocked service caller

mod common;

use std::sync::Arc;

use common::MockCaller;
use rescue_planner::knowledge::KnowledgeAggregator;
use rescue_planner::models::{Environment, Item};
use serde_json::{json, Value};
use service_sdk::{Method, ServiceError};

fn items(value: Value) -> Vec<Item> {
    serde_json::from_value(value).unwrap()
}

fn environment() -> Environment {
    serde_json::from_value(json!({
        "type": "indoor", "area": "residential", "ventilation": "good", "exits": 2
    }))
    .unwrap()
}

fn ok(data: Value) -> service_sdk::Result<Value> {
    Ok(json!({ "success": true, "data": data, "message": "ok" }))
}

#[tokio::test]
async fn total_failure_yields_empty_context() {
    let mut caller = MockCaller::new();
    caller
        .expect_call()
        .returning(|service, _, _, _, _| Err(ServiceError::unreachable(format!("{} down", service))));

    let aggregator = KnowledgeAggregator::new(Arc::new(caller), 3);
    let context = aggregator
        .gather(
            &items(json!([{"name": "木桌", "material": "wood", "quantity": 1, "location": "客厅"}])),
            &environment(),
        )
        .await;

    assert!(context.is_empty());
    assert!(context.material_knowledge.is_empty());
    assert!(context.environment_knowledge.is_none());
}

#[tokio::test]
async fn distinct_materials_are_looked_up_once() {
    let mut caller = MockCaller::new();
    caller
        .expect_call()
        .withf(|_, path, _, _, _| path == "/materials/木质")
        .times(1)
        .returning(|_, _, _, _, _| ok(json!({"name": "木质", "flammability": "易燃"})));
    caller
        .expect_call()
        .withf(|service, path, method, _, _| service == "rag" && path == "/search" && *method == Method::POST)
        .times(2)
        .returning(|_, _, _, body, _| {
            let body = body.unwrap_or_default();
            assert_eq!(body["limit"], json!(4));
            Ok(json!({ "query": body["query"], "results": [{"content": body["query"]}], "total_count": 1 }))
        });
    caller
        .expect_call()
        .withf(|_, path, _, _, _| path == "/environments/住宅")
        .returning(|_, _, _, _, _| ok(json!({"type": "住宅"})));
    caller
        .expect_call()
        .withf(|_, path, _, _, _| path == "/procedures")
        .returning(|_, _, _, _, _| ok(json!([{"name": "初期灭火"}, {"name": "人员疏散"}])));

    let aggregator = KnowledgeAggregator::new(Arc::new(caller), 4);
    let context = aggregator
        .gather(
            &items(json!([
                {"name": "木桌", "material": "wood", "quantity": 1, "location": "客厅"},
                {"name": "木椅", "material": "木质", "quantity": 4, "location": "餐厅"}
            ])),
            &environment(),
        )
        .await;

    assert_eq!(context.material_knowledge.len(), 1);
    assert!(context.material_knowledge.contains_key("木质"));
    assert_eq!(context.environment_knowledge, Some(json!({"type": "住宅"})));
    assert_eq!(context.rescue_procedures.len(), 2);
    assert_eq!(context.rag_context.len(), 2);
    assert!(context
        .rag_context
        .iter()
        .any(|s| s["content"] == json!("木椅 木质 火灾 救援")));
    assert!(context.total_context_size > 0);
}

#[tokio::test]
async fn missing_material_falls_back_to_search() {
    let mut caller = MockCaller::new();
    caller
        .expect_call()
        .withf(|_, path, _, _, _| path == "/materials/化学")
        .times(1)
        .returning(|_, _, _, _, _| Err(ServiceError::http(404, "not found")));
    caller
        .expect_call()
        .withf(|_, path, _, _, _| path == "/materials/search/化学")
        .times(1)
        .returning(|_, _, _, _, _| ok(json!([{"name": "化学品"}])));
    caller
        .expect_call()
        .returning(|_, _, _, _, _| Err(ServiceError::timeout("slow")));

    let aggregator = KnowledgeAggregator::new(Arc::new(caller), 3);
    let context = aggregator
        .gather(
            &items(json!([{"name": "溶剂", "material": "chemical", "quantity": 2, "location": "实验台"}])),
            &environment(),
        )
        .await;

    assert_eq!(context.material_knowledge.get("化学"), Some(&json!([{"name": "化学品"}])));
    assert!(context.rag_context.is_empty());
    assert!(context.rescue_procedures.is_empty());
}

#[tokio::test]
async fn unsuccessful_envelopes_contribute_nothing() {
    let mut caller = MockCaller::new();
    caller
        .expect_call()
        .withf(|service, _, _, _, _| service == "knowledge_graph")
        .returning(|_, _, _, _, _| Ok(json!({"success": false, "data": {"ignored": true}, "message": "error"})));
    caller
        .expect_call()
        .withf(|service, _, _, _, _| service == "rag")
        .returning(|_, _, _, _, _| Ok(json!({"success": true, "data": null})));

    let aggregator = KnowledgeAggregator::new(Arc::new(caller), 3);
    let context = aggregator
        .gather(
            &items(json!([{"name": "电视", "material": "electronic", "quantity": 1, "location": "卧室"}])),
            &environment(),
        )
        .await;

    assert!(context.is_empty());
}
