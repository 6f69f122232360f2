//! Marker-based extraction over a free-form model reply.
//!
//! Every function here is total: a missing or malformed marker degrades to a
//! documented default flagged as [`ExtractionSource::Fallback`].
//!
//! [`ExtractionSource::Fallback`]: crate::types::ExtractionSource::Fallback

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

use super::markers::{
    MarkerPair, ALL_THREE_AGREE, FINAL_ANSWER, FINAL_CONFIDENCE, ONE_SENTENCE,
};
use crate::types::{Extracted, StrategyId};

/// Returned when no final answer can be found.
pub const DEFAULT_FINAL_ANSWER: &str = "Unable to extract answer";

/// Returned when no reason line can be found.
pub const DEFAULT_REASON: &str = "See detailed analysis above";

/// Returned when no labeled confidence number can be found.
pub const DEFAULT_CONFIDENCE: u8 = 90;

lazy_static! {
    static ref FIRST_INTEGER: Regex = Regex::new(r"\d+").unwrap();

    /// `ANSWER 1: ...` through `ANSWER 3: ...`; `FINAL ANSWER:` has no digit.
    static ref STRATEGY_ANSWER: Regex = Regex::new(r"ANSWER ([1-3]):[ \t]*([^\r\n]*)").unwrap();
}

/// Return the trimmed text strictly between `start` and the first `end`
/// that follows it.
pub fn extract_between(text: &str, start: &str, end: &str) -> Extracted<String> {
    let Some(start_idx) = text.find(start) else {
        return Extracted::fallback(String::new());
    };

    let content_start = start_idx + start.len();
    match text[content_start..].find(end) {
        Some(rel_end) => {
            let body = &text[content_start..content_start + rel_end];
            Extracted::found(body.trim().to_string())
        }
        None => Extracted::fallback(String::new()),
    }
}

/// Extract every marker pair in order.
pub fn extract_sections(text: &str, pairs: &[MarkerPair]) -> Vec<Extracted<String>> {
    pairs
        .iter()
        .map(|pair| extract_between(text, pair.start, pair.end))
        .collect()
}

/// Extract the final answer from the `FINAL ANSWER:` line.
///
/// When the label ends its line, the next non-blank line is used instead.
pub fn extract_final_answer(text: &str) -> Extracted<String> {
    let Some(idx) = text.find(FINAL_ANSWER) else {
        return Extracted::fallback(DEFAULT_FINAL_ANSWER.to_string());
    };

    let rest = &text[idx + FINAL_ANSWER.len()..];
    match rest.lines().map(strip_emphasis).find(|line| !line.is_empty()) {
        Some(answer) => Extracted::found(answer.to_string()),
        None => Extracted::fallback(DEFAULT_FINAL_ANSWER.to_string()),
    }
}

/// Extract the first integer on the `FINAL CONFIDENCE:` line, clamped to 0..=100.
pub fn extract_confidence(text: &str) -> Extracted<u8> {
    let Some(idx) = text.find(FINAL_CONFIDENCE) else {
        return Extracted::fallback(DEFAULT_CONFIDENCE);
    };

    let line = text[idx + FINAL_CONFIDENCE.len()..]
        .lines()
        .next()
        .unwrap_or("");

    match FIRST_INTEGER.find(line) {
        Some(m) => {
            // Digit runs too long for u64 are far above 100 anyway.
            let value = m.as_str().parse::<u64>().unwrap_or(u64::MAX).min(100);
            Extracted::found(value as u8)
        }
        None => Extracted::fallback(DEFAULT_CONFIDENCE),
    }
}

/// Extract the one-sentence reason.
///
/// The label is matched case-sensitively, so a lowercase "one-sentence" in
/// the narrative is not mistaken for it. Text after a colon on the label
/// line wins; otherwise the first non-blank line below the label is used.
pub fn extract_reason(text: &str) -> Extracted<String> {
    let Some(idx) = text.find(ONE_SENTENCE) else {
        return Extracted::fallback(DEFAULT_REASON.to_string());
    };

    let rest = &text[idx + ONE_SENTENCE.len()..];
    let mut lines = rest.lines();

    if let Some(label_line) = lines.next() {
        if let Some((_, inline)) = label_line.split_once(':') {
            let inline = strip_emphasis(inline);
            if !inline.is_empty() {
                return Extracted::found(inline.to_string());
            }
        }
    }

    match lines.map(strip_emphasis).find(|line| !line.is_empty()) {
        Some(line) if !line.starts_with(FINAL_CONFIDENCE) => Extracted::found(line.to_string()),
        _ => Extracted::fallback(DEFAULT_REASON.to_string()),
    }
}

/// The model's self-reported agreement.
///
/// True for any `YES` anywhere plus the agreement question anywhere. An
/// incidental `YES` gives a false positive; this is not verification.
pub fn extract_all_agree(text: &str) -> bool {
    text.contains("YES") && text.to_uppercase().contains(ALL_THREE_AGREE)
}

/// Collect the first non-empty `ANSWER n:` line of each strategy.
pub fn extract_strategy_answers(text: &str) -> BTreeMap<StrategyId, String> {
    let mut answers = BTreeMap::new();

    for caps in STRATEGY_ANSWER.captures_iter(text) {
        let number = caps[1].parse::<u8>().ok();
        let Some(strategy) = number.and_then(StrategyId::from_number) else {
            continue;
        };
        let answer = strip_emphasis(&caps[2]);
        if !answer.is_empty() {
            answers.entry(strategy).or_insert_with(|| answer.to_string());
        }
    }

    answers
}

/// Trim whitespace and markdown bold markers around a value.
fn strip_emphasis(s: &str) -> &str {
    s.trim_matches(|c: char| c == '*' || c.is_whitespace())
}
