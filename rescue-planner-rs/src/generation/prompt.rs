//! Prompt construction for the generation backend

use serde_json::Value;
use service_sdk::util::truncate_string;

use crate::knowledge::KnowledgeContext;
use crate::models::{Environment, Item};

/// Hard ceiling on prompt length, in characters
pub const MAX_PROMPT_CHARS: usize = 10_000;

const SNIPPET_CHARS: usize = 300;
const MAX_PROCEDURES: usize = 5;

pub struct PromptInput<'a> {
    pub items: &'a [Item],
    pub environment: &'a Environment,
    pub urgency_level: &'a str,
    pub additional_info: Option<&'a str>,
    pub knowledge: &'a KnowledgeContext,
}

/// Build the rescue-plan prompt. Only the knowledge digest is shortened when
/// the prompt would exceed [`MAX_PROMPT_CHARS`].
pub fn build_prompt(input: &PromptInput<'_>) -> String {
    let head = format!(
        "你是一个专业的火灾应急救援专家。请根据以下信息生成详细的救援方案：\n\n\
         ## 物品信息\n{}\n\n\
         ## 环境信息\n{}\n\
         ## 紧急程度\n{}\n\n\
         ## 附加信息\n{}\n\n",
        items_section(input.items),
        environment_section(input.environment),
        input.urgency_level,
        input.additional_info.filter(|s| !s.trim().is_empty()).unwrap_or("无"),
    );

    let tail = "\n请按以下格式输出救援方案：\n\
                标题: <方案标题>\n\
                ### 第1步：<步骤标题>\n\
                描述: <步骤描述>\n\
                所需设备: <设备，用顿号分隔>\n\
                注意事项: <注意事项，用分号分隔>\n\
                预计时间: <分钟数>分钟\n\n\
                请确保方案专业、详细、可操作，并考虑所有安全因素。\n";

    let digest = knowledge_digest(input.knowledge);
    let fixed = head.chars().count() + tail.chars().count() + "## 相关知识\n".chars().count();
    let budget = MAX_PROMPT_CHARS.saturating_sub(fixed);
    let digest = truncate_string(&digest, budget);

    let mut prompt = head;
    if !digest.is_empty() {
        prompt.push_str("## 相关知识\n");
        prompt.push_str(&digest);
    }
    prompt.push_str(tail);

    // A pathological head (huge item list) can still exceed the ceiling
    truncate_string(&prompt, MAX_PROMPT_CHARS)
}

fn items_section(items: &[Item]) -> String {
    items
        .iter()
        .map(|item| {
            let mut line = format!("- {} ({})", item.name, item.material.label());
            if item.quantity > 1 {
                line.push_str(&format!(" x{}", item.quantity));
            }
            line.push_str(&format!(" 位置: {}", item.location));
            if let Some(condition) = item.condition.as_deref().filter(|c| !c.is_empty()) {
                line.push_str(&format!(" 状态: {}", condition));
            }
            if let Some(flammability) = item.flammability {
                line.push_str(&format!(" 可燃性: {}", flammability.label()));
            }
            if let Some(toxicity) = item.toxicity {
                line.push_str(&format!(" 毒性: {}", toxicity.label()));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn environment_section(env: &Environment) -> String {
    let mut out = format!(
        "环境类型: {}\n区域类型: {}\n通风情况: {}\n出口数量: {}\n",
        env.env_type.label(),
        env.area.label(),
        env.ventilation.label(),
        env.exits
    );
    if let Some(floor) = env.floor {
        out.push_str(&format!("楼层: {}\n", floor));
    }
    if let Some(occupancy) = env.occupancy {
        out.push_str(&format!("人员数量: {}\n", occupancy));
    }
    if let Some(building) = env.building_type.as_deref().filter(|s| !s.is_empty()) {
        out.push_str(&format!("建筑类型: {}\n", building));
    }
    if let Some(special) = env.special_conditions.as_deref().filter(|s| !s.is_empty()) {
        out.push_str(&format!("特殊条件: {}\n", special));
    }
    if let Some(equipment) = env.fire_safety_equipment.as_ref().filter(|e| !e.is_empty()) {
        out.push_str(&format!("消防设施: {}\n", equipment.join("、")));
    }
    out
}

fn knowledge_digest(knowledge: &KnowledgeContext) -> String {
    let mut lines = Vec::new();

    for (material, data) in &knowledge.material_knowledge {
        lines.push(format!("- 材质 {}: {}", material, compact(data)));
    }
    if let Some(env) = &knowledge.environment_knowledge {
        lines.push(format!("- 环境: {}", compact(env)));
    }
    for procedure in knowledge.rescue_procedures.iter().take(MAX_PROCEDURES) {
        lines.push(format!("- 程序: {}", compact(procedure)));
    }
    for snippet in &knowledge.rag_context {
        let text = snippet
            .get("content")
            .or_else(|| snippet.get("text"))
            .and_then(Value::as_str)
            .map(|s| truncate_string(s, SNIPPET_CHARS))
            .unwrap_or_else(|| compact(snippet));
        lines.push(format!("- 参考: {}", text));
    }

    if lines.is_empty() {
        String::new()
    } else {
        lines.join("\n") + "\n"
    }
}

fn compact(value: &Value) -> String {
    match value {
        Value::String(s) => truncate_string(s, SNIPPET_CHARS),
        other => truncate_string(&other.to_string(), SNIPPET_CHARS),
    }
}
