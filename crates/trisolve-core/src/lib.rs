//! # trisolve-core
//!
//! Deterministic processing of a triple-strategy calculus solution.
//!
//! Given the free-form text a vision model returned for a calculus problem,
//! this crate answers:
//! - What did each of the three strategies say?
//! - What is the final answer, and how confident was the model?
//! - Does the reply show a known exam trap?
//!
//! ## Key Guarantees
//!
//! 1. **Total**: parsing never fails; missing markers yield flagged defaults
//! 2. **No network or process calls**: everything here is pure text work
//! 3. **Escaped output**: every model-derived value is LaTeX-escaped before
//!    it reaches the document
//!
//! ## Example
//!
//! ```rust
//! use trisolve_core::{analyze, render_document};
//!
//! let record = analyze("FINAL ANSWER: e^x(x-1) + C\nFINAL CONFIDENCE: 97%");
//! assert_eq!(record.confidence.value, 97);
//!
//! let latex = render_document(&record);
//! assert!(latex.contains(r"\begin{document}"));
//! ```

pub mod knowledge;
pub mod message;
pub mod parser;
pub mod render;
pub mod traps;
pub mod types;

pub use knowledge::{KnowledgeBase, KnowledgeError};
pub use parser::{parse_response, parse_response_at};
pub use render::{clean_text, escape_latex, render_document, LatexDocument};
pub use traps::{check_traps, TrapKind, TrapWarning};
pub use types::{ExtractionSource, Extracted, SolutionRecord, StrategyId};

/// Parse a raw model reply and run the trap checks.
///
/// Alias for [`parse_response`], kept as the crate's main entry point.
pub fn analyze(raw_text: &str) -> SolutionRecord {
    parse_response(raw_text)
}
