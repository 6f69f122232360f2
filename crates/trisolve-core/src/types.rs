//! Core types shared by the parser, the trap checker and the renderer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::traps::TrapWarning;

/// One of the three solution narratives requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StrategyId {
    /// Step-by-step textbook method
    Systematic,
    /// Pattern recognition and speed tricks
    Shortcut,
    /// Olympiad-style insight
    Elegant,
}

impl StrategyId {
    /// All strategies in prompt order.
    pub const ALL: [StrategyId; 3] = [Self::Systematic, Self::Shortcut, Self::Elegant];

    /// The 1-based number the model uses for this strategy.
    pub fn number(self) -> u8 {
        match self {
            Self::Systematic => 1,
            Self::Shortcut => 2,
            Self::Elegant => 3,
        }
    }

    /// Look up a strategy by its 1-based number.
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::Systematic),
            2 => Some(Self::Shortcut),
            3 => Some(Self::Elegant),
            _ => None,
        }
    }

    /// Section title used in prompts and rendered documents.
    pub fn title(self) -> &'static str {
        match self {
            Self::Systematic => "Textbook Rigor",
            Self::Shortcut => "Speed Shortcuts",
            Self::Elegant => "Olympiad Insight",
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Strategy {}: {}", self.number(), self.title())
    }
}

/// Whether an extracted value came from the text or from a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSource {
    /// The marker was present and the value was read from the text
    Found,
    /// The marker was missing or unusable; the value is a documented default
    Fallback,
}

/// A best-effort extraction result.
///
/// Extraction never fails. Callers that care about the difference between
/// genuine content and a default check [`Extracted::is_fallback`] instead of
/// comparing against sentinel strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extracted<T> {
    pub value: T,
    pub source: ExtractionSource,
}

impl<T> Extracted<T> {
    pub fn found(value: T) -> Self {
        Self {
            value,
            source: ExtractionSource::Found,
        }
    }

    pub fn fallback(value: T) -> Self {
        Self {
            value,
            source: ExtractionSource::Fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == ExtractionSource::Fallback
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Structured view of one model reply.
///
/// Created fresh per request and discarded once the artifact is delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionRecord {
    /// The model's full response, never modified
    pub raw_text: String,

    /// Strategy narratives keyed by strategy
    pub sections: BTreeMap<StrategyId, Extracted<String>>,

    /// Cross-verification narrative
    pub synthesis: Extracted<String>,

    /// The `ANSWER n:` line of each strategy, when present
    pub strategy_answers: BTreeMap<StrategyId, String>,

    pub final_answer: Extracted<String>,

    /// Percentage in 0..=100
    pub confidence: Extracted<u8>,

    pub reason: Extracted<String>,

    /// Model's self-reported agreement (text heuristic, not verified)
    pub all_agree: bool,

    /// Trap checker output, in check order
    pub warnings: Vec<TrapWarning>,

    pub received_at: DateTime<Utc>,
}

impl SolutionRecord {
    /// Narrative for a strategy, empty when the markers were missing.
    pub fn section(&self, strategy: StrategyId) -> &str {
        self.sections
            .get(&strategy)
            .map(|s| s.value.as_str())
            .unwrap_or("")
    }

    /// Warning messages in check order.
    pub fn warning_messages(&self) -> Vec<&str> {
        self.warnings.iter().map(|w| w.message.as_str()).collect()
    }
}
