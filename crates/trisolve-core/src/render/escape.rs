//! LaTeX escaping for arbitrary model text.
//!
//! One canonical policy, applied in a single pass:
//! 1. Reserved ASCII characters become LaTeX escapes.
//! 2. Known Unicode glyphs map to text or math-mode equivalents.
//! 3. Latin-1 letters pass through (the preamble loads `inputenc`/`fontenc`).
//! 4. Any other non-ASCII code point becomes a single space.
//!
//! Because the pass is single, an escape is never re-escaped within one call.
//! Calling it twice on the same text does escape the first call's output.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EXCESS_NEWLINES: Regex = Regex::new(r"\n{3,}").unwrap();
}

/// Characters with special meaning in LaTeX text mode.
pub const RESERVED_CHARS: [char; 10] = ['&', '%', '$', '#', '_', '{', '}', '~', '^', '\\'];

/// Normalize line endings, collapse runs of three or more newlines to two,
/// and drop control characters other than newline. Tabs become spaces.
pub fn clean_text(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let collapsed = EXCESS_NEWLINES.replace_all(&normalized, "\n\n");

    collapsed
        .chars()
        .filter_map(|c| match c {
            '\n' => Some('\n'),
            '\t' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Escape text for inclusion in a LaTeX document body.
pub fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);

    for c in text.chars() {
        match c {
            '\\' => out.push_str(r"\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            '\n' => out.push('\n'),
            c if c.is_ascii_control() => out.push(' '),
            c if c.is_ascii() => out.push(c),
            c => match unicode_replacement(c) {
                Some(replacement) => out.push_str(replacement),
                None if is_latin1_letter(c) => out.push(c),
                None => out.push(' '),
            },
        }
    }

    out
}

/// `clean_text` followed by `escape_latex`.
pub fn sanitize(text: &str) -> String {
    escape_latex(&clean_text(text))
}

/// À through ÿ, minus the multiplication and division signs.
fn is_latin1_letter(c: char) -> bool {
    matches!(c, '\u{00C0}'..='\u{00FF}') && c != '\u{00D7}' && c != '\u{00F7}'
}

fn unicode_replacement(c: char) -> Option<&'static str> {
    let replacement = match c {
        // Typography
        '\u{2018}' | '\u{2019}' => "'",
        '\u{201C}' | '\u{201D}' => "\"",
        '\u{2013}' => "--",
        '\u{2014}' => "---",
        '\u{2026}' => "...",
        '\u{00A0}' => " ",
        '\u{2022}' => r"\textbullet{}",
        '\u{2713}' | '\u{2714}' => r"$\checkmark$",

        // Operators and relations
        '\u{00B0}' => r"$^\circ$",
        '\u{00B2}' => r"$^2$",
        '\u{00B3}' => r"$^3$",
        '\u{00B1}' => r"$\pm$",
        '\u{00D7}' => r"$\times$",
        '\u{00F7}' => r"$\div$",
        '\u{00B7}' | '\u{22C5}' => r"$\cdot$",
        '\u{221E}' => r"$\infty$",
        '\u{222B}' => r"$\int$",
        '\u{222E}' => r"$\oint$",
        '\u{2211}' => r"$\sum$",
        '\u{220F}' => r"$\prod$",
        '\u{221A}' => r"$\sqrt{}$",
        '\u{2202}' => r"$\partial$",
        '\u{2207}' => r"$\nabla$",
        '\u{2264}' => r"$\leq$",
        '\u{2265}' => r"$\geq$",
        '\u{2260}' => r"$\neq$",
        '\u{2248}' => r"$\approx$",
        '\u{2261}' => r"$\equiv$",
        '\u{221D}' => r"$\propto$",
        '\u{2192}' => r"$\rightarrow$",
        '\u{2190}' => r"$\leftarrow$",
        '\u{21D2}' => r"$\Rightarrow$",
        '\u{21D4}' => r"$\Leftrightarrow$",
        '\u{2208}' => r"$\in$",
        '\u{2209}' => r"$\notin$",
        '\u{2200}' => r"$\forall$",
        '\u{2203}' => r"$\exists$",
        '\u{2212}' => "-",

        // Greek lowercase
        '\u{03B1}' => r"$\alpha$",
        '\u{03B2}' => r"$\beta$",
        '\u{03B3}' => r"$\gamma$",
        '\u{03B4}' => r"$\delta$",
        '\u{03B5}' | '\u{03F5}' => r"$\epsilon$",
        '\u{03B6}' => r"$\zeta$",
        '\u{03B7}' => r"$\eta$",
        '\u{03B8}' => r"$\theta$",
        '\u{03D1}' => r"$\vartheta$",
        '\u{03B9}' => r"$\iota$",
        '\u{03BA}' => r"$\kappa$",
        '\u{03BB}' => r"$\lambda$",
        '\u{03BC}' | '\u{00B5}' => r"$\mu$",
        '\u{03BD}' => r"$\nu$",
        '\u{03BE}' => r"$\xi$",
        '\u{03BF}' => "o",
        '\u{03C0}' => r"$\pi$",
        '\u{03C1}' => r"$\rho$",
        '\u{03C2}' => r"$\varsigma$",
        '\u{03C3}' => r"$\sigma$",
        '\u{03C4}' => r"$\tau$",
        '\u{03C5}' => r"$\upsilon$",
        '\u{03C6}' | '\u{03D5}' => r"$\phi$",
        '\u{03C7}' => r"$\chi$",
        '\u{03C8}' => r"$\psi$",
        '\u{03C9}' => r"$\omega$",

        // Greek uppercase with their own glyphs
        '\u{0393}' => r"$\Gamma$",
        '\u{0394}' | '\u{2206}' => r"$\Delta$",
        '\u{0398}' => r"$\Theta$",
        '\u{039B}' => r"$\Lambda$",
        '\u{039E}' => r"$\Xi$",
        '\u{03A0}' => r"$\Pi$",
        '\u{03A3}' => r"$\Sigma$",
        '\u{03A5}' => r"$\Upsilon$",
        '\u{03A6}' => r"$\Phi$",
        '\u{03A8}' => r"$\Psi$",
        '\u{03A9}' | '\u{2126}' => r"$\Omega$",

        // Greek uppercase that share Latin glyphs
        '\u{0391}' => "A",
        '\u{0392}' => "B",
        '\u{0395}' => "E",
        '\u{0396}' => "Z",
        '\u{0397}' => "H",
        '\u{0399}' => "I",
        '\u{039A}' => "K",
        '\u{039C}' => "M",
        '\u{039D}' => "N",
        '\u{039F}' => "O",
        '\u{03A1}' => "P",
        '\u{03A4}' => "T",
        '\u{03A7}' => "X",

        _ => return None,
    };
    Some(replacement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Known escape sequences, longest first.
    const ESCAPES: [&str; 10] = [
        r"\textbackslash{}",
        r"\textasciitilde{}",
        r"\textasciicircum{}",
        r"\&",
        r"\%",
        r"\$",
        r"\#",
        r"\_",
        r"\{",
        r"\}",
    ];

    /// Walk the output and fail on a reserved character that is not part
    /// of an escape sequence.
    fn bare_reserved(escaped: &str) -> Option<char> {
        let mut rest = escaped;
        while let Some(c) = rest.chars().next() {
            if let Some(esc) = ESCAPES.iter().find(|e| rest.starts_with(*e)) {
                rest = &rest[esc.len()..];
                continue;
            }
            if RESERVED_CHARS.contains(&c) {
                return Some(c);
            }
            rest = &rest[c.len_utf8()..];
        }
        None
    }

    #[test]
    fn test_reserved_characters() {
        assert_eq!(escape_latex("&"), r"\&");
        assert_eq!(escape_latex("%"), r"\%");
        assert_eq!(escape_latex("$"), r"\$");
        assert_eq!(escape_latex("#"), r"\#");
        assert_eq!(escape_latex("_"), r"\_");
        assert_eq!(escape_latex("{"), r"\{");
        assert_eq!(escape_latex("}"), r"\}");
        assert_eq!(escape_latex("~"), r"\textasciitilde{}");
        assert_eq!(escape_latex("^"), r"\textasciicircum{}");
        assert_eq!(escape_latex("\\"), r"\textbackslash{}");
    }

    #[test]
    fn test_scenario_mixed_reserved() {
        let escaped = escape_latex("50% & $5_{x}");
        for expected in [r"\%", r"\&", r"\$", r"\_", r"\{", r"\}"] {
            assert!(escaped.contains(expected), "missing {expected} in {escaped}");
        }
        assert_eq!(bare_reserved(&escaped), None);
        assert_eq!(escaped, r"50\% \& \$5\_\{x\}");
    }

    #[test]
    fn test_backslash_not_double_escaped() {
        // The braces emitted for \textbackslash{} must not be escaped again.
        assert_eq!(escape_latex(r"\frac"), r"\textbackslash{}frac");
    }

    #[test]
    fn test_second_pass_escapes_again() {
        // Single-pass design: escaping is not idempotent.
        let once = escape_latex("50% of x_1");
        let twice = escape_latex(&once);
        let count = |s: &str| s.matches('\\').count();
        assert!(count(&twice) > count(&once));
        assert_ne!(once, twice);
    }

    #[test]
    fn test_unicode_math_glyphs() {
        assert_eq!(escape_latex("∫"), r"$\int$");
        assert_eq!(escape_latex("x²"), r"x$^2$");
        assert_eq!(escape_latex("x ≤ π"), r"x $\leq$ $\pi$");
        assert_eq!(escape_latex("90°"), r"90$^\circ$");
        assert_eq!(escape_latex("θ → ∞"), r"$\theta$ $\rightarrow$ $\infty$");
        assert_eq!(escape_latex("Δy"), r"$\Delta$y");
    }

    #[test]
    fn test_unmapped_unicode_becomes_space() {
        assert_eq!(escape_latex("a🧮b"), "a b");
        assert_eq!(escape_latex("x\u{2A0C}y"), "x y");
        assert_eq!(escape_latex("日本"), "  ");
    }

    #[test]
    fn test_latin1_letters_pass_through() {
        assert_eq!(escape_latex("Poincaré"), "Poincaré");
        assert_eq!(escape_latex("3×4÷2"), r"3$\times$4$\div$2");
    }

    #[test]
    fn test_clean_text_collapses_newlines() {
        assert_eq!(clean_text("a\n\n\n\nb\n\n\nc\n\nd"), "a\n\nb\n\nc\n\nd");
        assert_eq!(clean_text("a\r\n\r\n\r\nb"), "a\n\nb");
        assert_eq!(clean_text("  a\tb\u{0007}c  "), "a bc");
    }

    proptest! {
        #[test]
        fn prop_no_bare_reserved_chars(text in "[ -~\n]*") {
            let escaped = escape_latex(&text);
            prop_assert_eq!(bare_reserved(&escaped), None);
        }

        #[test]
        fn prop_reserved_char_always_escaped(c in proptest::sample::select(RESERVED_CHARS.to_vec()), pad in "[a-z ]{0,6}") {
            let escaped = escape_latex(&format!("{pad}{c}{pad}"));
            prop_assert_eq!(bare_reserved(&escaped), None);
            prop_assert!(escaped.contains('\\'));
        }

        #[test]
        fn prop_output_is_ascii_or_latin1(text in "\\PC*") {
            let escaped = sanitize(&text);
            prop_assert!(escaped.chars().all(|c| c.is_ascii() || is_latin1_letter(c)));
        }
    }
}
