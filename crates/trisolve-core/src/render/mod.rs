//! LaTeX rendering of a parsed solution.

pub mod escape;
mod template;

pub use escape::{clean_text, escape_latex, sanitize, RESERVED_CHARS};
pub use template::{LatexDocument, MISSING_SECTION};

use crate::types::SolutionRecord;

/// Render with the default template.
pub fn render_document(record: &SolutionRecord) -> String {
    LatexDocument::default().render(record)
}
