//! Request coordination
//!
//! `validate -> cache lookup -> aggregate -> generate -> cache write`, with
//! the fallback plan substituted when generation fails. Once a request has
//! passed validation the coordinator always answers with a plan.

use std::sync::Arc;
use std::time::Duration;

use service_sdk::ServiceCaller;
use tracing::{info, instrument, warn};

use crate::cache::{cache_key, PlanCache};
use crate::error::ValidationError;
use crate::fallback;
use crate::generation::{GenerationAdapter, GenerationSettings};
use crate::knowledge::KnowledgeAggregator;
use crate::models::{PlanSource, RescuePlan, RescuePlanRequest};
use crate::validation::validate;

/// A plan together with where it came from
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub plan: RescuePlan,
    pub source: PlanSource,
}

pub struct RescuePlanCoordinator {
    aggregator: KnowledgeAggregator,
    cache: Arc<PlanCache>,
    generator: GenerationAdapter,
}

impl RescuePlanCoordinator {
    pub fn new(
        aggregator: KnowledgeAggregator,
        cache: Arc<PlanCache>,
        generator: GenerationAdapter,
    ) -> Self {
        Self {
            aggregator,
            cache,
            generator,
        }
    }

    /// Wire every stage to one caller
    pub fn with_caller(
        caller: Arc<dyn ServiceCaller>,
        rag_limit: usize,
        cache_ttl: Duration,
        generation: GenerationSettings,
    ) -> Self {
        Self::new(
            KnowledgeAggregator::new(caller.clone(), rag_limit),
            Arc::new(PlanCache::new(caller.clone(), cache_ttl)),
            GenerationAdapter::new(caller, generation),
        )
    }

    pub fn cache(&self) -> &Arc<PlanCache> {
        &self.cache
    }

    /// Produce a plan for the request. Only validation errors escape.
    #[instrument(skip_all, fields(items = request.items.len(), urgency = %request.urgency_level))]
    pub async fn generate_plan(
        &self,
        request: &RescuePlanRequest,
    ) -> Result<PlanOutcome, ValidationError> {
        validate(request)?;

        let key = cache_key(request);
        if let Some(plan) = self.cache.get(&key).await {
            info!(plan_id = %plan.id, source = %PlanSource::Cache, "returning cached plan");
            return Ok(PlanOutcome {
                plan,
                source: PlanSource::Cache,
            });
        }

        let knowledge = self
            .aggregator
            .gather(&request.items, &request.environment)
            .await;
        info!(context_size = knowledge.total_context_size, "knowledge aggregated");

        match self.generator.generate(request, &knowledge).await {
            Ok(plan) => {
                self.cache.set(&key, &plan).await;
                info!(
                    plan_id = %plan.id,
                    steps = plan.steps.len(),
                    source = %PlanSource::Generated,
                    "plan generated"
                );
                Ok(PlanOutcome {
                    plan,
                    source: PlanSource::Generated,
                })
            }
            Err(err) => {
                warn!(error = %err, "generation failed, using fallback plan");
                let plan = fallback::synthesize(&request.environment, &request.urgency_level);
                info!(plan_id = %plan.id, source = %PlanSource::Fallback, "fallback plan synthesized");
                Ok(PlanOutcome {
                    plan,
                    source: PlanSource::Fallback,
                })
            }
        }
    }
}
