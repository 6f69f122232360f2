//! Trap & consistency checks over the raw model reply.
//!
//! **Question**: Does the reply show a known exam-answer mistake?
//!
//! Each check is an independent keyword or regex scan that yields at most
//! one warning. Checks run in a fixed order, so the warning list is stable.
//! No check looks at the mathematics itself; an empty list only means none
//! of these patterns matched.
//!
//! | Order | Kind | Fires when |
//! |-------|------|------------|
//! | 1 | `MissingIntegrationConstant` | integration mentioned, no `+C`, not definite |
//! | 2 | `MissingAbsoluteValue` | `ln(x)` with `1/x` and no `ln\|x\|` |
//! | 3 | `DomainNotChecked` | `ln(`, `sqrt(`, `log(` or `1/` with no mention of domain |
//! | 4 | `StrategiesDisagree` | two or more `ANSWER n:` lines differ |
//! | 5 | `MissingFinalAnswer` | no `FINAL ANSWER:` label |

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::parser::extract_strategy_answers;
use crate::parser::markers::FINAL_ANSWER;

lazy_static! {
    static ref INTEGRATION_MENTION: Regex = Regex::new(r"(?i)integrat").unwrap();

    /// `+ C`, `+c`, `+ C_1`; not `+ cos x`. A literal `+C` is checked separately.
    static ref CONSTANT_TOKEN: Regex = Regex::new(r"\+\s*[cC](?:[^A-Za-z]|$)").unwrap();

    /// Whole word only, so "indefinite" does not count as definite.
    static ref DEFINITE_WORD: Regex = Regex::new(r"(?i)\bdefinite\b").unwrap();

    static ref DOMAIN_WORD: Regex = Regex::new(r"(?i)domain").unwrap();

    static ref DOMAIN_SENSITIVE: Vec<&'static str> = vec!["ln(", "sqrt(", "log(", "1/"];
}

/// Category of a trap warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrapKind {
    MissingIntegrationConstant,
    MissingAbsoluteValue,
    DomainNotChecked,
    StrategiesDisagree,
    MissingFinalAnswer,
}

/// Byte range in the raw reply that triggered a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "raw_text[{}:{}]", self.start, self.end)
    }
}

/// One warning produced by the trap checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrapWarning {
    pub kind: TrapKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl TrapWarning {
    fn new(kind: TrapKind, message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
        }
    }
}

impl fmt::Display for TrapWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

type Check = fn(&str) -> Option<TrapWarning>;

/// Checks in reporting order.
const CHECKS: [Check; 5] = [
    check_integration_constant,
    check_absolute_value,
    check_domain,
    check_strategy_agreement,
    check_final_answer_present,
];

/// Run every check over the raw reply.
pub fn check_traps(raw_text: &str) -> Vec<TrapWarning> {
    CHECKS.iter().filter_map(|check| check(raw_text)).collect()
}

fn check_integration_constant(text: &str) -> Option<TrapWarning> {
    let mention = INTEGRATION_MENTION.find(text)?;
    if text.contains("+C") || CONSTANT_TOKEN.is_match(text) || DEFINITE_WORD.is_match(text) {
        return None;
    }
    Some(TrapWarning::new(
        TrapKind::MissingIntegrationConstant,
        "Missing +C in indefinite integral",
        Some(Span {
            start: mention.start(),
            end: mention.end(),
        }),
    ))
}

fn check_absolute_value(text: &str) -> Option<TrapWarning> {
    let start = text.find("ln(x)")?;
    if text.contains("ln|x|") || !text.contains("1/x") {
        return None;
    }
    Some(TrapWarning::new(
        TrapKind::MissingAbsoluteValue,
        "Should be ln|x| not ln(x) when integrating 1/x",
        Some(Span {
            start,
            end: start + "ln(x)".len(),
        }),
    ))
}

fn check_domain(text: &str) -> Option<TrapWarning> {
    if DOMAIN_WORD.is_match(text) {
        return None;
    }
    let (start, keyword) = DOMAIN_SENSITIVE
        .iter()
        .filter_map(|kw| text.find(kw).map(|idx| (idx, *kw)))
        .min_by_key(|(idx, _)| *idx)?;
    Some(TrapWarning::new(
        TrapKind::DomainNotChecked,
        "Consider checking domain restrictions",
        Some(Span {
            start,
            end: start + keyword.len(),
        }),
    ))
}

fn check_strategy_agreement(text: &str) -> Option<TrapWarning> {
    let answers = extract_strategy_answers(text);
    if answers.len() < 2 {
        return None;
    }

    let distinct: BTreeSet<String> = answers.values().map(|a| normalize_answer(a)).collect();
    if distinct.len() < 2 {
        return None;
    }

    let listed = answers
        .iter()
        .map(|(id, answer)| format!("{}: {}", id.number(), answer))
        .collect::<Vec<_>>()
        .join("; ");
    Some(TrapWarning::new(
        TrapKind::StrategiesDisagree,
        format!("Strategy answers differ ({listed})"),
        None,
    ))
}

fn check_final_answer_present(text: &str) -> Option<TrapWarning> {
    if text.contains(FINAL_ANSWER) {
        return None;
    }
    Some(TrapWarning::new(
        TrapKind::MissingFinalAnswer,
        "No FINAL ANSWER label in the model reply",
        None,
    ))
}

/// Normalize an answer for comparison: drop whitespace and trailing periods, lowercase.
pub fn normalize_answer(answer: &str) -> String {
    answer
        .trim()
        .trim_end_matches('.')
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
