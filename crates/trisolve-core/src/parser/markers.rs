//! Literal markers shared by the solver prompt and the response parser.
//!
//! The prompt asks the model to echo these labels back; the parser slices on
//! them. Both sides import from here so they cannot drift apart.

use crate::types::StrategyId;

pub const STRATEGY_1: &str = "STRATEGY 1";
pub const STRATEGY_2: &str = "STRATEGY 2";
pub const STRATEGY_3: &str = "STRATEGY 3";
pub const FINAL_SYNTHESIS: &str = "FINAL SYNTHESIS";
pub const ULTIMATE_ANSWER: &str = "ULTIMATE ANSWER";

pub const FINAL_ANSWER: &str = "FINAL ANSWER:";
pub const FINAL_CONFIDENCE: &str = "FINAL CONFIDENCE:";
pub const ONE_SENTENCE: &str = "ONE-SENTENCE";
pub const ALL_THREE_AGREE: &str = "ALL THREE AGREE";

/// A `(start, end)` pair delimiting one section of the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerPair {
    pub start: &'static str,
    pub end: &'static str,
}

impl MarkerPair {
    pub const fn new(start: &'static str, end: &'static str) -> Self {
        Self { start, end }
    }
}

/// Marker pair delimiting a strategy narrative.
pub fn strategy_markers(strategy: StrategyId) -> MarkerPair {
    match strategy {
        StrategyId::Systematic => MarkerPair::new(STRATEGY_1, STRATEGY_2),
        StrategyId::Shortcut => MarkerPair::new(STRATEGY_2, STRATEGY_3),
        StrategyId::Elegant => MarkerPair::new(STRATEGY_3, FINAL_SYNTHESIS),
    }
}

/// Marker pair delimiting the synthesis narrative.
pub const SYNTHESIS_MARKERS: MarkerPair = MarkerPair::new(FINAL_SYNTHESIS, ULTIMATE_ANSWER);

/// The `ANSWER n:` label the prompt asks each strategy to end with.
pub fn answer_label(strategy: StrategyId) -> String {
    format!("ANSWER {}:", strategy.number())
}

/// The `CONFIDENCE n:` label for a strategy.
pub fn confidence_label(strategy: StrategyId) -> String {
    format!("CONFIDENCE {}:", strategy.number())
}
