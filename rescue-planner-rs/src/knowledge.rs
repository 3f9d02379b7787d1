//! Knowledge aggregation
//!
//! Fans out the knowledge-store and retrieval lookups for one request,
//! waits for all of them and folds each failure into an absent entry.
//! `gather` never fails.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};
use service_sdk::{ServiceCaller, ServiceError};
use tracing::{debug, warn};

use crate::config::{KNOWLEDGE_GRAPH_SERVICE, RAG_SERVICE};
use crate::models::{Environment, Item, Material};

/// Everything the upstream stores told us about the scene
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KnowledgeContext {
    /// Keyed by material label
    pub material_knowledge: BTreeMap<String, Value>,
    pub environment_knowledge: Option<Value>,
    pub rescue_procedures: Vec<Value>,
    pub rag_context: Vec<Value>,
    /// Serialized byte length of the merged context
    pub total_context_size: usize,
}

impl KnowledgeContext {
    pub fn is_empty(&self) -> bool {
        self.material_knowledge.is_empty()
            && self.environment_knowledge.is_none()
            && self.rescue_procedures.is_empty()
            && self.rag_context.is_empty()
    }

    fn measure(mut self) -> Self {
        self.total_context_size = 0;
        self.total_context_size = serde_json::to_vec(&self).map(|v| v.len()).unwrap_or(0);
        self
    }
}

pub struct KnowledgeAggregator {
    caller: Arc<dyn ServiceCaller>,
    rag_limit: usize,
}

impl KnowledgeAggregator {
    pub fn new(caller: Arc<dyn ServiceCaller>, rag_limit: usize) -> Self {
        Self { caller, rag_limit }
    }

    /// Run every lookup concurrently and merge whatever succeeded
    pub async fn gather(&self, items: &[Item], environment: &Environment) -> KnowledgeContext {
        let materials: BTreeSet<Material> = items.iter().map(|item| item.material).collect();

        let material_lookups = join_all(materials.into_iter().map(|material| async move {
            (material, self.material(material).await)
        }));
        let rag_lookups = join_all(items.iter().map(|item| self.search(item)));

        let (materials, environment_knowledge, procedures, rag) = tokio::join!(
            material_lookups,
            self.environment(environment),
            self.procedures(),
            rag_lookups,
        );

        let mut context = KnowledgeContext::default();

        for (material, outcome) in materials {
            match outcome {
                Ok(Some(data)) => {
                    context
                        .material_knowledge
                        .insert(material.label().to_string(), data);
                }
                Ok(None) => debug!(material = material.label(), "no material knowledge"),
                Err(err) => warn!(material = material.label(), error = %err, "material lookup failed"),
            }
        }

        match environment_knowledge {
            Ok(data) => context.environment_knowledge = data,
            Err(err) => warn!(area = environment.area.label(), error = %err, "environment lookup failed"),
        }

        match procedures {
            Ok(records) => context.rescue_procedures = records,
            Err(err) => warn!(error = %err, "procedure lookup failed"),
        }

        for outcome in rag {
            match outcome {
                Ok(snippets) => context.rag_context.extend(snippets),
                Err(err) => warn!(error = %err, "retrieval search failed"),
            }
        }

        let context = context.measure();
        debug!(
            materials = context.material_knowledge.len(),
            procedures = context.rescue_procedures.len(),
            snippets = context.rag_context.len(),
            size = context.total_context_size,
            "knowledge gathered"
        );
        context
    }

    async fn material(&self, material: Material) -> Result<Option<Value>, ServiceError> {
        let label = material.label();
        match self
            .caller
            .get(KNOWLEDGE_GRAPH_SERVICE, &format!("/materials/{}", label))
            .await
        {
            Ok(value) => Ok(envelope_data(value)),
            Err(err) if err.status_code() == Some(404) => {
                let value = self
                    .caller
                    .get(KNOWLEDGE_GRAPH_SERVICE, &format!("/materials/search/{}", label))
                    .await?;
                Ok(envelope_data(value))
            }
            Err(err) => Err(err),
        }
    }

    async fn environment(&self, environment: &Environment) -> Result<Option<Value>, ServiceError> {
        let path = format!("/environments/{}", environment.area.label());
        let value = self.caller.get(KNOWLEDGE_GRAPH_SERVICE, &path).await?;
        Ok(envelope_data(value))
    }

    async fn procedures(&self) -> Result<Vec<Value>, ServiceError> {
        let value = self.caller.get(KNOWLEDGE_GRAPH_SERVICE, "/procedures").await?;
        Ok(match envelope_data(value) {
            Some(Value::Array(records)) => records,
            Some(other) => vec![other],
            None => Vec::new(),
        })
    }

    async fn search(&self, item: &Item) -> Result<Vec<Value>, ServiceError> {
        let query = format!("{} {} 火灾 救援", item.name, item.material.label());
        let body = json!({ "query": query, "limit": self.rag_limit });
        let value = self.caller.post(RAG_SERVICE, "/search", body).await?;
        Ok(search_results(value))
    }
}

/// `{success, data}` envelopes only count when `success` is true and data is present
pub(crate) fn envelope_data(value: Value) -> Option<Value> {
    match value {
        Value::Object(mut map) => {
            if map.get("success").and_then(Value::as_bool) != Some(true) {
                return None;
            }
            match map.remove("data") {
                Some(Value::Null) | None => None,
                Some(data) => Some(data),
            }
        }
        _ => None,
    }
}

/// The retrieval service answers either natively (`results`) or enveloped
fn search_results(value: Value) -> Vec<Value> {
    if let Some(Value::Array(results)) = value.get("results") {
        return results.clone();
    }
    match envelope_data(value) {
        Some(Value::Array(results)) => results,
        Some(data) => match data.get("results") {
            Some(Value::Array(results)) => results.clone(),
            _ => Vec::new(),
        },
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_requires_success() {
        assert_eq!(
            envelope_data(json!({"success": true, "data": {"a": 1}})),
            Some(json!({"a": 1}))
        );
        assert_eq!(envelope_data(json!({"success": true, "data": null})), None);
        assert_eq!(envelope_data(json!({"success": false, "data": {"a": 1}})), None);
        assert_eq!(envelope_data(json!({"data": {"a": 1}})), None);
        assert_eq!(envelope_data(json!([1, 2])), None);
    }

    #[test]
    fn test_search_results_shapes() {
        let native = json!({"query": "q", "results": [{"content": "x"}], "total_count": 1});
        assert_eq!(search_results(native).len(), 1);

        let enveloped = json!({"success": true, "data": [{"content": "x"}, {"content": "y"}]});
        assert_eq!(search_results(enveloped).len(), 2);

        let nested = json!({"success": true, "data": {"results": [{"content": "x"}]}});
        assert_eq!(search_results(nested).len(), 1);

        assert!(search_results(json!({"success": false})).is_empty());
    }

    #[test]
    fn test_context_size_is_measured() {
        let mut context = KnowledgeContext::default();
        assert!(context.is_empty());

        context.rag_context.push(json!({"content": "火灾"}));
        let context = context.measure();
        assert!(!context.is_empty());
        assert!(context.total_context_size > 0);
    }
}
