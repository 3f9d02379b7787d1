//! Free-text to structured plan parser
//!
//! Each non-blank line is classified into a [`LineKind`] and fed to a small
//! state machine with two states: seeking the first step, or inside a step.
//! A step header always flushes the step in progress. Steps are numbered in
//! the order they appear; numbers written in the text are ignored.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::RescueStep;

static STEP_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:#{1,6}\s*)?(?:\*\*)?\s*(?:第\s*[0-9一二三四五六七八九十]+\s*步|步骤\s*[0-9一二三四五六七八九十]+|(?i:step)\s*\d+)\s*(?:\*\*)?\s*[:：.、\-]?\s*(?:\*\*)?\s*(.*?)\s*(?:\*\*)?$",
    )
    .expect("step header pattern")
});

static STEP_NUMBERED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#{1,6}\s*(?:\*\*)?\s*\d+\s*[.、)]\s*(?:\*\*)?\s*(.*?)\s*(?:\*\*)?$")
        .expect("numbered step pattern")
});

static TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:#{1,6}\s*)?(?:\*\*)?\s*(?:方案标题|标题|(?i:title))\s*(?:\*\*)?\s*[:：]\s*(?:\*\*)?\s*(.*?)\s*(?:\*\*)?$")
        .expect("title pattern")
});

static FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:[-*•+]\s+)?(?:\*\*)?\s*(描述|说明|所需设备|设备|注意事项|警告|预计时间|时间|(?i:description|required equipment|equipment|warnings?|cautions?|estimated time|time))\s*(?:\*\*)?\s*[:：]\s*(?:\*\*)?\s*(.*?)\s*$",
    )
    .expect("field pattern")
});

// A line opening with a decimal ("1.5 小时") is a bare value, not item 1.
static BULLET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[-*•+]\s+(.+)|\d+\s*[.)、]\s*(\D.*)|(\d+\.\d+.*))$").expect("bullet pattern")
});

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("number pattern"));

/// Labeled field inside a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Description,
    Equipment,
    Warnings,
    Time,
}

impl Field {
    fn from_label(label: &str) -> Self {
        match label.to_lowercase().as_str() {
            "描述" | "说明" | "description" => Field::Description,
            "所需设备" | "设备" | "required equipment" | "equipment" => Field::Equipment,
            "预计时间" | "时间" | "estimated time" | "time" => Field::Time,
            _ => Field::Warnings,
        }
    }
}

/// Classification of one input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'a> {
    StepHeader(&'a str),
    Title(&'a str),
    Field(Field, &'a str),
    Bullet(&'a str),
    Other,
}

pub fn classify(line: &str) -> LineKind<'_> {
    let line = line.trim();

    if let Some(caps) = STEP_WORD.captures(line).or_else(|| STEP_NUMBERED.captures(line)) {
        return LineKind::StepHeader(caps.get(1).map_or("", |m| m.as_str()));
    }
    if let Some(caps) = TITLE.captures(line) {
        return LineKind::Title(caps.get(1).map_or("", |m| m.as_str()));
    }
    if let Some(caps) = FIELD.captures(line) {
        let field = Field::from_label(caps.get(1).map_or("", |m| m.as_str()));
        return LineKind::Field(field, caps.get(2).map_or("", |m| m.as_str()));
    }
    if let Some(caps) = BULLET.captures(line) {
        let text = caps.iter().skip(1).flatten().next().map_or("", |m| m.as_str());
        return LineKind::Bullet(text.trim());
    }
    LineKind::Other
}

/// Result of parsing a generated response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPlan {
    pub title: Option<String>,
    /// Numbered 1..N, every description non-empty
    pub steps: Vec<RescueStep>,
}

struct Draft {
    step: RescueStep,
    field: Option<Field>,
}

impl Draft {
    fn open(title: &str) -> Self {
        Self {
            step: RescueStep::new(strip_emphasis(title)),
            field: None,
        }
    }

    fn apply_field(&mut self, field: Field, value: &str) {
        self.field = Some(field);
        let value = strip_emphasis(value);
        if value.is_empty() {
            return;
        }
        match field {
            Field::Description => self.step.description = value,
            Field::Equipment => self
                .step
                .equipment
                .extend(split_list(&value, &[',', '，', '、', ';', '；'])),
            Field::Warnings => self.step.warnings.extend(split_list(&value, &[';', '；'])),
            Field::Time => self.step.estimated_time = parse_minutes(&value),
        }
    }

    fn apply_bullet(&mut self, text: &str) {
        let text = strip_emphasis(text);
        if text.is_empty() {
            return;
        }
        match self.field {
            Some(Field::Description) if self.step.description.is_empty() => {
                self.step.description = text
            }
            Some(Field::Description) => {
                self.step.description.push(' ');
                self.step.description.push_str(&text);
            }
            Some(Field::Equipment) => self.step.equipment.push(text),
            Some(Field::Warnings) => self.step.warnings.push(text),
            Some(Field::Time) => {
                if self.step.estimated_time.is_none() {
                    self.step.estimated_time = parse_minutes(&text);
                }
            }
            None => {}
        }
    }
}

enum State {
    SeekingStep,
    InStep(Draft),
}

/// Parse generated text into ordered steps
pub fn parse_response(text: &str) -> ParsedPlan {
    let mut parsed = ParsedPlan::default();
    let mut state = State::SeekingStep;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        state = match (state, classify(line)) {
            (State::InStep(draft), LineKind::StepHeader(title)) => {
                flush(&mut parsed, draft);
                State::InStep(Draft::open(title))
            }
            (State::SeekingStep, LineKind::StepHeader(title)) => State::InStep(Draft::open(title)),
            (State::SeekingStep, LineKind::Title(title)) => {
                let title = strip_emphasis(title);
                if parsed.title.is_none() && !title.is_empty() {
                    parsed.title = Some(title);
                }
                State::SeekingStep
            }
            (State::InStep(mut draft), LineKind::Field(field, value)) => {
                draft.apply_field(field, value);
                State::InStep(draft)
            }
            (State::InStep(mut draft), LineKind::Bullet(text)) => {
                draft.apply_bullet(text);
                State::InStep(draft)
            }
            (state, _) => state,
        };
    }

    if let State::InStep(draft) = state {
        flush(&mut parsed, draft);
    }

    parsed
}

fn flush(parsed: &mut ParsedPlan, draft: Draft) {
    let mut step = draft.step;
    if step.description.trim().is_empty() {
        return;
    }
    step.step_number = parsed.steps.len() as u32 + 1;
    parsed.steps.push(step);
}

/// First number in the text, in minutes, rounded. Hours are converted; zero
/// means absent.
pub fn parse_minutes(text: &str) -> Option<u32> {
    let value: f64 = NUMBER.find(text)?.as_str().parse().ok()?;
    let lower = text.to_lowercase();
    let minutes = if lower.contains("小时") || lower.contains("hour") {
        value * 60.0
    } else {
        value
    };
    // float to int casts saturate
    Some(minutes.round() as u32).filter(|m| *m > 0)
}

fn split_list(value: &str, separators: &[char]) -> Vec<String> {
    value
        .split(|c: char| separators.contains(&c))
        .map(|part| part.trim().trim_end_matches(|c: char| c == '。' || c == '.').trim())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_emphasis(text: &str) -> String {
    text.trim().trim_matches('*').trim().to_string()
}
