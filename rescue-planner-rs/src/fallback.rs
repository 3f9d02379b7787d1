//! Deterministic fallback plan
//!
//! Used whenever a valid request could not be answered by the generation
//! pipeline. The output depends only on the environment and urgency level.

use serde_json::json;

use crate::cache::{canonical_json, sha256_hex};
use crate::generation::default_title;
use crate::models::{Environment, Priority, RescuePlan, RescueStep};

pub const FALLBACK_ID_PREFIX: &str = "fallback-";

fn template() -> [RescueStep; 4] {
    [
        RescueStep::new("立即报警并疏散人员")
            .equipment(["通信设备", "疏散指示牌"])
            .warnings(["确保所有人员安全撤离", "保持冷静"])
            .minutes(5),
        RescueStep::new("使用适当的灭火器材控制火势")
            .equipment(["灭火器", "消防水带", "防护装备"])
            .warnings(["选择合适的灭火器材", "注意风向"])
            .minutes(20),
        RescueStep::new("组织人员撤离并清点人数")
            .equipment(["疏散指示牌", "照明设备"])
            .warnings(["清点人数确认无人员遗漏", "引导人员远离火场"])
            .minutes(10),
        RescueStep::new("确保火势完全扑灭并检查现场")
            .equipment(["检测设备", "照明设备"])
            .warnings(["确保无复燃风险", "检查是否有人员受伤"])
            .minutes(15),
    ]
}

/// Build the fallback plan. Equal inputs give byte-identical plans.
pub fn synthesize(environment: &Environment, urgency_level: &str) -> RescuePlan {
    let fingerprint = canonical_json(&json!({
        "environment": environment,
        "urgency_level": urgency_level,
    }));
    let digest = sha256_hex(&fingerprint);
    let id = format!("{}{}", FALLBACK_ID_PREFIX, &digest[..16]);

    let title = default_title(environment.area);
    let priority = Priority::from_urgency(urgency_level);
    let [first, rest @ ..] = template();

    RescuePlan::from_steps(id, title, priority, first, rest)
}
