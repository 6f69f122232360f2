//! Response parsing.
//!
//! Slices the model's reply into named sections using literal markers and
//! pulls out a handful of scalar fields. There is no grammar here and no
//! failure mode: missing markers yield fallback values.

mod extract;
pub mod markers;

pub use extract::{
    extract_all_agree, extract_between, extract_confidence, extract_final_answer, extract_reason,
    extract_sections, extract_strategy_answers, DEFAULT_CONFIDENCE, DEFAULT_FINAL_ANSWER,
    DEFAULT_REASON,
};
pub use markers::MarkerPair;

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::traps::check_traps;
use crate::types::{SolutionRecord, StrategyId};

/// Parse a raw model reply into a [`SolutionRecord`].
pub fn parse_response(raw_text: impl Into<String>) -> SolutionRecord {
    parse_response_at(raw_text, Utc::now())
}

/// Parse with an explicit receive time.
pub fn parse_response_at(raw_text: impl Into<String>, received_at: DateTime<Utc>) -> SolutionRecord {
    let raw_text = raw_text.into();

    let pairs: Vec<MarkerPair> = StrategyId::ALL
        .iter()
        .map(|s| markers::strategy_markers(*s))
        .collect();
    let sections: BTreeMap<_, _> = StrategyId::ALL
        .into_iter()
        .zip(extract_sections(&raw_text, &pairs))
        .collect();

    let synthesis = extract_between(
        &raw_text,
        markers::SYNTHESIS_MARKERS.start,
        markers::SYNTHESIS_MARKERS.end,
    );

    let record = SolutionRecord {
        sections,
        synthesis,
        strategy_answers: extract_strategy_answers(&raw_text),
        final_answer: extract_final_answer(&raw_text),
        confidence: extract_confidence(&raw_text),
        reason: extract_reason(&raw_text),
        all_agree: extract_all_agree(&raw_text),
        warnings: check_traps(&raw_text),
        received_at,
        raw_text,
    };

    let missing: Vec<_> = record
        .sections
        .iter()
        .filter(|(_, s)| s.is_fallback())
        .map(|(id, _)| id.number())
        .collect();
    if !missing.is_empty() {
        tracing::debug!(?missing, "Strategy markers not found");
    }
    tracing::debug!(
        confidence = record.confidence.value,
        answer_fallback = record.final_answer.is_fallback(),
        warnings = record.warnings.len(),
        "Parsed model response"
    );

    record
}
