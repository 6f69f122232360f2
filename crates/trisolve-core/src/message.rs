//! User-facing text: the artifact caption and failure replies.

use std::fmt::Display;

use crate::types::SolutionRecord;

/// Error details longer than this are truncated.
pub const MAX_ERROR_CHARS: usize = 150;

/// Characters Telegram MarkdownV2 requires to be escaped.
const MARKDOWN_V2_RESERVED: &[char] = &[
    '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Plain-text caption delivered alongside the PDF.
pub fn caption(record: &SolutionRecord) -> String {
    let mut caption = format!(
        "SOLUTION READY\n\nConfidence: {}%\nAnswer: {}\n{}",
        record.confidence.value, record.final_answer.value, record.reason.value
    );
    if !record.warnings.is_empty() {
        caption.push_str(&format!("\nWarnings: {}", record.warnings.len()));
    }
    caption.push_str("\n\nComplete analysis in the attached PDF.");
    caption
}

/// Escape text for Telegram MarkdownV2.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if MARKDOWN_V2_RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Truncate to [`MAX_ERROR_CHARS`] characters, appending `...` when cut.
pub fn truncate_detail(detail: &str) -> String {
    match detail.char_indices().nth(MAX_ERROR_CHARS) {
        Some((idx, _)) => format!("{}...", &detail[..idx]),
        None => detail.to_string(),
    }
}

/// MarkdownV2 failure reply for an error of any type.
pub fn user_error_message(error: &dyn Display) -> String {
    let detail = escape_markdown_v2(&truncate_detail(&error.to_string()));
    format!(
        "*ERROR*\n\nFailed to process image\\.\n\nError: {}\n\nPlease try again with a clearer image\\.",
        detail
    )
}
