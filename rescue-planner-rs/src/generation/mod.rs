//! Generation adapter
//!
//! Turns a request and its knowledge context into a prompt, calls the
//! generation backend and parses the returned text into a [`RescuePlan`].

pub mod parser;
pub mod prompt;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use service_sdk::ServiceCaller;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::GENERATION_SERVICE;
use crate::error::GenerationError;
use crate::knowledge::KnowledgeContext;
use crate::models::{AreaType, Priority, RescuePlan, RescuePlanRequest, RescueStep};

pub use parser::{parse_response, ParsedPlan};
pub use prompt::{build_prompt, PromptInput, MAX_PROMPT_CHARS};

/// Sampling parameters sent with every generation request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub model: Option<String>,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 2048,
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    temperature: f64,
    top_p: f64,
    max_tokens: u32,
    stream: bool,
}

pub struct GenerationAdapter {
    caller: Arc<dyn ServiceCaller>,
    settings: GenerationSettings,
}

impl GenerationAdapter {
    pub fn new(caller: Arc<dyn ServiceCaller>, settings: GenerationSettings) -> Self {
        Self { caller, settings }
    }

    /// Generate a plan for the request
    pub async fn generate(
        &self,
        request: &RescuePlanRequest,
        knowledge: &KnowledgeContext,
    ) -> Result<RescuePlan, GenerationError> {
        let prompt = build_prompt(&PromptInput {
            items: &request.items,
            environment: &request.environment,
            urgency_level: &request.urgency_level,
            additional_info: request.additional_info.as_deref(),
            knowledge,
        });
        debug!(chars = prompt.chars().count(), "prompt built");

        let body = serde_json::to_value(GenerateRequest {
            prompt: &prompt,
            model: self.settings.model.as_deref(),
            temperature: self.settings.temperature,
            top_p: self.settings.top_p,
            max_tokens: self.settings.max_tokens,
            stream: false,
        })
        .map_err(|e| GenerationError::Malformed(e.to_string()))?;

        let response = self.caller.post(GENERATION_SERVICE, "/generate", body).await?;
        let text = response_text(&response)?;

        let parsed = parse_response(text);
        info!(steps = parsed.steps.len(), "generated response parsed");

        plan_from_parsed(
            Uuid::new_v4().to_string(),
            parsed,
            request.environment.area,
            &request.urgency_level,
        )
    }
}

/// The generated text lives in `response`, either at the top level or
/// inside a `{success, data}` envelope.
fn response_text(response: &Value) -> Result<&str, GenerationError> {
    let field = response
        .get("response")
        .or_else(|| response.get("data").and_then(|d| d.get("response")));

    match field {
        Some(Value::String(text)) if text.trim().is_empty() => Err(GenerationError::EmptyResponse),
        Some(Value::String(text)) => Ok(text),
        Some(other) => Err(GenerationError::Malformed(format!(
            "`response` is not a string: {}",
            other
        ))),
        None => Err(GenerationError::Malformed("missing `response` field".to_string())),
    }
}

pub(crate) fn default_title(area: AreaType) -> String {
    format!("火灾应急救援方案 - {}", area.label())
}

/// Steps used when the generated text contains none
fn default_steps() -> Vec<RescueStep> {
    vec![
        RescueStep::new("评估现场情况，确保救援人员安全")
            .equipment(["防护装备", "通信设备"])
            .warnings(["注意现场安全", "保持通信畅通"])
            .minutes(5),
        RescueStep::new("制定具体救援方案并执行")
            .equipment(["救援工具", "安全设备"])
            .warnings(["严格按照安全程序操作"])
            .minutes(30),
    ]
}

fn plan_from_parsed(
    id: String,
    parsed: ParsedPlan,
    area: AreaType,
    urgency: &str,
) -> Result<RescuePlan, GenerationError> {
    let title = parsed.title.unwrap_or_else(|| default_title(area));
    let steps = if parsed.steps.is_empty() {
        default_steps()
    } else {
        parsed.steps
    };

    RescuePlan::assemble(id, title, Priority::from_urgency(urgency), steps)
        .ok_or_else(|| GenerationError::Malformed("plan has no steps".to_string()))
}
