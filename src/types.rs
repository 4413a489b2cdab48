use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A photo as supplied by the caller, before normalization.
#[derive(Debug, Clone)]
pub struct SourceImage {
    /// Raw file bytes.
    pub bytes: Vec<u8>,
    /// Declared MIME type (e.g. `image/jpeg`).
    pub media_type: String,
    /// Free-text view label such as "спереди" or "сбоку".
    pub label: Option<String>,
}

impl SourceImage {
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A size-bounded, base64-encoded image ready to embed in a provider request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    /// Encoded bytes, without a data-URI prefix.
    pub base64: String,
    /// MIME type of the encoded bytes, always from the accepted-format list.
    pub media_type: String,
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
}

/// System and user prompt sent together in one round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

impl PromptPair {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Fields recognized in the first-stage response of a staged analysis.
///
/// Unmatched fields stay empty strings so they can be interpolated as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step1Result {
    pub viewpoint: String,
    pub child_location: String,
    pub child_gaze: String,
    pub age: String,
    pub legs: String,
    pub position: String,
}

/// Age bracket of the carried child.
///
/// `Preschooler` and `Schooler` are "older" children: the infant M-position
/// criterion does not apply to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeBracket {
    /// 0-6 months.
    Infant,
    /// 6-18 months.
    Baby,
    /// 1.5-3 years.
    Toddler,
    /// 3-6 years.
    Preschooler,
    /// 6+ years.
    Schooler,
}

impl AgeBracket {
    pub const ALL: [AgeBracket; 5] = [
        AgeBracket::Infant,
        AgeBracket::Baby,
        AgeBracket::Toddler,
        AgeBracket::Preschooler,
        AgeBracket::Schooler,
    ];

    /// Label used in prompts and in model output.
    pub fn label(self) -> &'static str {
        match self {
            AgeBracket::Infant => "МЛАДЕНЕЦ",
            AgeBracket::Baby => "МАЛЫШ",
            AgeBracket::Toddler => "ТОДДЛЕР",
            AgeBracket::Preschooler => "ДОШКОЛЬНИК",
            AgeBracket::Schooler => "ШКОЛЬНИК",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            AgeBracket::Infant => "0-6 мес, маленький, не держит голову",
            AgeBracket::Baby => "6-18 мес, сидит, но маленький",
            AgeBracket::Toddler => "1.5-3 года, ходит, но ещё носят",
            AgeBracket::Preschooler => "3-6 лет, большой ребёнок",
            AgeBracket::Schooler => "6+ лет, явно большой",
        }
    }

    pub fn is_older_child(self) -> bool {
        matches!(self, AgeBracket::Preschooler | AgeBracket::Schooler)
    }
}

impl fmt::Display for AgeBracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error for a string that names no age bracket.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown age bracket: {0}")]
pub struct UnknownAgeBracket(pub String);

impl FromStr for AgeBracket {
    type Err = UnknownAgeBracket;

    /// Matches the leading word exactly, so "МЛАДЕНЕЦ (0-6 мес)" parses but
    /// "ДОШКОЛЬНИК" never reads as "ШКОЛЬНИК".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let word = s
            .trim()
            .split(|c: char| c.is_whitespace() || matches!(c, '(' | ',' | '.' | '/' | '-'))
            .next()
            .unwrap_or("")
            .to_uppercase();

        AgeBracket::ALL
            .into_iter()
            .find(|bracket| bracket.label() == word)
            .ok_or_else(|| UnknownAgeBracket(s.to_string()))
    }
}

/// Caller-declared carrying position that replaces automatic detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualPosition {
    pub position: String,
    pub age: Option<AgeBracket>,
    pub legs: Option<String>,
}

impl ManualPosition {
    pub fn new(position: impl Into<String>) -> Self {
        Self {
            position: position.into(),
            age: None,
            legs: None,
        }
    }

    pub fn with_age(mut self, age: AgeBracket) -> Self {
        self.age = Some(age);
        self
    }

    pub fn with_legs(mut self, legs: impl Into<String>) -> Self {
        self.legs = Some(legs.into());
        self
    }

    /// Legs text with blank input treated as absent.
    pub fn legs(&self) -> Option<&str> {
        self.legs.as_deref().map(str::trim).filter(|l| !l.is_empty())
    }
}

/// Advisory child details appended to prompts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildInfo {
    pub age: Option<String>,
    /// Weight in kilograms, free text.
    pub weight: Option<String>,
}

impl ChildInfo {
    pub fn is_empty(&self) -> bool {
        blank(&self.age) && blank(&self.weight)
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Output of a staged analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedReport {
    pub step1: String,
    pub step1_parsed: Step1Result,
    pub step2: String,
    /// Both stages under their section headers, in stage order.
    pub combined: String,
}

/// Progress reported during multi-image analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisProgress {
    PreparingImages { count: usize },
    Analyzing { count: usize },
}
