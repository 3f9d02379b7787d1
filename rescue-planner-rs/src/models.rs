//! Domain model for rescue-plan requests and plans
//!
//! Enumerations serialize as snake_case English. The Chinese labels used by
//! the knowledge store and the generation prompts are accepted as aliases on
//! input and exposed through `label()`.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound for any single time estimate, in minutes
pub const MAX_MINUTES: u32 = 24 * 60;

/// Duration reported when no step carries a time estimate
pub const DEFAULT_PLAN_DURATION: u32 = 60;

/// Material an item is made of
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Material {
    #[serde(alias = "木质")]
    Wood,
    #[serde(alias = "金属")]
    Metal,
    #[serde(alias = "塑料")]
    Plastic,
    #[serde(alias = "玻璃")]
    Glass,
    #[serde(alias = "陶瓷")]
    Ceramic,
    #[serde(alias = "布料")]
    Fabric,
    #[serde(alias = "皮革")]
    Leather,
    #[serde(alias = "电子")]
    Electronic,
    #[serde(alias = "化学")]
    Chemical,
    #[serde(alias = "其他")]
    Other,
}

impl Material {
    pub fn label(&self) -> &'static str {
        match self {
            Material::Wood => "木质",
            Material::Metal => "金属",
            Material::Plastic => "塑料",
            Material::Glass => "玻璃",
            Material::Ceramic => "陶瓷",
            Material::Fabric => "布料",
            Material::Leather => "皮革",
            Material::Electronic => "电子",
            Material::Chemical => "化学",
            Material::Other => "其他",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentType {
    #[serde(alias = "室内")]
    Indoor,
    #[serde(alias = "室外")]
    Outdoor,
    #[serde(alias = "半室外")]
    SemiOutdoor,
}

impl EnvironmentType {
    pub fn label(&self) -> &'static str {
        match self {
            EnvironmentType::Indoor => "室内",
            EnvironmentType::Outdoor => "室外",
            EnvironmentType::SemiOutdoor => "半室外",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaType {
    #[serde(alias = "住宅")]
    Residential,
    #[serde(alias = "商业")]
    Commercial,
    #[serde(alias = "工业")]
    Industrial,
    #[serde(alias = "公共建筑")]
    PublicBuilding,
    #[serde(alias = "交通工具")]
    Vehicle,
    #[serde(alias = "仓库")]
    Warehouse,
    #[serde(alias = "实验室")]
    Laboratory,
    #[serde(alias = "其他")]
    Other,
}

impl AreaType {
    pub fn label(&self) -> &'static str {
        match self {
            AreaType::Residential => "住宅",
            AreaType::Commercial => "商业",
            AreaType::Industrial => "工业",
            AreaType::PublicBuilding => "公共建筑",
            AreaType::Vehicle => "交通工具",
            AreaType::Warehouse => "仓库",
            AreaType::Laboratory => "实验室",
            AreaType::Other => "其他",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ventilation {
    #[serde(alias = "良好")]
    Excellent,
    #[serde(alias = "一般")]
    Good,
    #[serde(alias = "较差")]
    Poor,
    #[serde(alias = "很差")]
    VeryPoor,
}

impl Ventilation {
    pub fn label(&self) -> &'static str {
        match self {
            Ventilation::Excellent => "良好",
            Ventilation::Good => "一般",
            Ventilation::Poor => "较差",
            Ventilation::VeryPoor => "很差",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flammability {
    #[serde(alias = "不燃")]
    NonFlammable,
    #[serde(alias = "难燃")]
    Difficult,
    #[serde(alias = "易燃")]
    Flammable,
    #[serde(alias = "极易燃")]
    HighlyFlammable,
}

impl Flammability {
    pub fn label(&self) -> &'static str {
        match self {
            Flammability::NonFlammable => "不燃",
            Flammability::Difficult => "难燃",
            Flammability::Flammable => "易燃",
            Flammability::HighlyFlammable => "极易燃",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Toxicity {
    #[serde(alias = "无毒")]
    NonToxic,
    #[serde(alias = "低毒")]
    Low,
    #[serde(alias = "中毒")]
    Medium,
    #[serde(alias = "高毒")]
    High,
    #[serde(alias = "剧毒")]
    Extreme,
}

impl Toxicity {
    pub fn label(&self) -> &'static str {
        match self {
            Toxicity::NonToxic => "无毒",
            Toxicity::Low => "低毒",
            Toxicity::Medium => "中毒",
            Toxicity::High => "高毒",
            Toxicity::Extreme => "剧毒",
        }
    }
}

/// Plan priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[serde(alias = "低")]
    Low,
    #[serde(alias = "中")]
    Medium,
    #[serde(alias = "高")]
    High,
    #[serde(alias = "紧急")]
    Urgent,
}

impl Priority {
    /// Map a free-form urgency level onto a plan priority.
    ///
    /// Low urgency still yields `Medium`: no fire plan is ever filed as low.
    pub fn from_urgency(urgency: &str) -> Self {
        match urgency.trim().to_lowercase().as_str() {
            "low" | "general" | "低" | "一般" => Priority::Medium,
            "urgent" | "very urgent" | "very_urgent" | "紧急" | "非常紧急" => Priority::Urgent,
            _ => Priority::High,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Priority::Low => "低",
            Priority::Medium => "中",
            Priority::High => "高",
            Priority::Urgent => "紧急",
        }
    }
}

/// One item present at the scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub material: Material,
    pub quantity: i64,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flammability: Option<Flammability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toxicity: Option<Toxicity>,
}

/// The scene around the items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(rename = "type")]
    pub env_type: EnvironmentType,
    pub area: AreaType,
    pub ventilation: Ventilation,
    pub exits: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupancy: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_conditions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fire_safety_equipment: Option<Vec<String>>,
}

fn default_urgency() -> String {
    "中".to_string()
}

/// Inbound request body of `POST /rescue-plan`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescuePlanRequest {
    pub items: Vec<Item>,
    pub environment: Environment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
    #[serde(default = "default_urgency")]
    pub urgency_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescueStep {
    pub step_number: u32,
    pub description: String,
    #[serde(default)]
    pub equipment: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Minutes; absent when the source gave no usable estimate
    #[serde(default)]
    pub estimated_time: Option<u32>,
}

impl RescueStep {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            step_number: 0,
            description: description.into(),
            equipment: Vec::new(),
            warnings: Vec::new(),
            estimated_time: None,
        }
    }

    pub fn equipment<I, S>(mut self, equipment: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.equipment = equipment.into_iter().map(Into::into).collect();
        self
    }

    pub fn warnings<I, S>(mut self, warnings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.warnings = warnings.into_iter().map(Into::into).collect();
        self
    }

    pub fn minutes(mut self, minutes: u32) -> Self {
        self.estimated_time = Some(minutes);
        self
    }
}

/// A complete rescue plan
///
/// Plans are only built through [`RescuePlan::assemble`], which numbers the
/// steps `1..N`, derives the deduplicated equipment and warning lists and the
/// total duration. Nothing mutates a plan afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescuePlan {
    pub id: String,
    pub title: String,
    pub priority: Priority,
    pub status: String,
    pub steps: Vec<RescueStep>,
    pub equipment_list: Vec<String>,
    pub warnings: Vec<String>,
    /// Minutes
    pub estimated_duration: u32,
}

impl RescuePlan {
    /// Build a plan from ordered steps. Returns `None` when `steps` is empty.
    pub(crate) fn assemble(
        id: impl Into<String>,
        title: impl Into<String>,
        priority: Priority,
        steps: Vec<RescueStep>,
    ) -> Option<Self> {
        let mut steps = steps.into_iter();
        let first = steps.next()?;
        Some(Self::from_steps(id, title, priority, first, steps))
    }

    /// Build a plan from a first step and any number of followers
    pub(crate) fn from_steps(
        id: impl Into<String>,
        title: impl Into<String>,
        priority: Priority,
        first: RescueStep,
        rest: impl IntoIterator<Item = RescueStep>,
    ) -> Self {
        let steps: Vec<RescueStep> = std::iter::once(first)
            .chain(rest)
            .enumerate()
            .map(|(index, mut step)| {
                step.step_number = index as u32 + 1;
                step.estimated_time = step
                    .estimated_time
                    .filter(|minutes| *minutes > 0)
                    .map(|minutes| minutes.min(MAX_MINUTES));
                step
            })
            .collect();

        let equipment_list = dedup_ordered(steps.iter().flat_map(|s| s.equipment.iter()));
        let warnings = dedup_ordered(steps.iter().flat_map(|s| s.warnings.iter()));

        let total = steps
            .iter()
            .filter_map(|s| s.estimated_time)
            .fold(0u32, u32::saturating_add);
        let estimated_duration = if total == 0 {
            DEFAULT_PLAN_DURATION
        } else {
            total
        };

        Self {
            id: id.into(),
            title: title.into(),
            priority,
            status: "active".to_string(),
            steps,
            equipment_list,
            warnings,
            estimated_duration,
        }
    }

    /// Structural checks for plans that did not come out of `assemble`,
    /// i.e. plans decoded from the cache.
    pub fn check_invariants(&self) -> bool {
        !self.steps.is_empty()
            && self
                .steps
                .iter()
                .enumerate()
                .all(|(i, s)| s.step_number == i as u32 + 1 && !s.description.trim().is_empty())
    }
}

fn dedup_ordered<'a>(values: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in values {
        if !value.trim().is_empty() && seen.insert(value.as_str()) {
            out.push(value.clone());
        }
    }
    out
}

/// Where a returned plan came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Cache,
    Generated,
    Fallback,
}

impl std::fmt::Display for PlanSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanSource::Cache => write!(f, "cache"),
            PlanSource::Generated => write!(f, "generated"),
            PlanSource::Fallback => write!(f, "fallback"),
        }
    }
}

/// Response envelope shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }
}

impl ApiResponse<()> {
    pub fn failure(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}
