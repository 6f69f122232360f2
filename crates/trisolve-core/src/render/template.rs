//! The fixed LaTeX template for a solution document.

use std::fmt::Write as _;

use super::escape::sanitize;
use crate::types::{SolutionRecord, StrategyId};

/// Text used when a section marker was not found in the reply.
pub const MISSING_SECTION: &str = "This section was not found in the model response.";

const PREAMBLE: &str = r"\documentclass[11pt,a4paper]{article}
\usepackage[utf8]{inputenc}
\usepackage[T1]{fontenc}
\usepackage{lmodern}
\usepackage{amsmath,amssymb}
\usepackage[margin=2.2cm]{geometry}
\usepackage{parskip}
\usepackage{array}
\usepackage[table]{xcolor}
\usepackage{hyperref}
\hypersetup{colorlinks=true,linkcolor=blue!50!black}
\definecolor{strategyone}{RGB}{25,90,160}
\definecolor{strategytwo}{RGB}{30,130,70}
\definecolor{strategythree}{RGB}{140,60,150}
\definecolor{warn}{RGB}{190,80,20}
\sloppy
";

/// Renders a [`SolutionRecord`] into a complete LaTeX document.
///
/// Every value taken from the record passes through `clean_text` and
/// `escape_latex`; the template itself is the only raw LaTeX in the output.
#[derive(Debug, Clone)]
pub struct LatexDocument {
    title: String,
    include_toc: bool,
}

impl Default for LatexDocument {
    fn default() -> Self {
        Self {
            title: "Calculus Solution: Three Independent Strategies".to_string(),
            include_toc: true,
        }
    }
}

impl LatexDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the document title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Drop the table of contents (a single compile pass then suffices).
    pub fn without_toc(mut self) -> Self {
        self.include_toc = false;
        self
    }

    /// Produce the full document.
    pub fn render(&self, record: &SolutionRecord) -> String {
        let mut doc = String::with_capacity(record.raw_text.len() * 2 + PREAMBLE.len() + 2048);

        doc.push_str(PREAMBLE);
        let _ = writeln!(doc, r"\title{{{}}}", sanitize(&self.title));
        let _ = writeln!(
            doc,
            r"\date{{{}}}",
            record.received_at.format("%Y-%m-%d %H:%M UTC")
        );
        doc.push_str("\\author{}\n\\begin{document}\n\\maketitle\n");
        if self.include_toc {
            doc.push_str("\\tableofcontents\n\\bigskip\n");
        }

        self.write_final_answer_box(&mut doc, record);

        for strategy in StrategyId::ALL {
            self.write_strategy(&mut doc, record, strategy);
        }
        self.write_synthesis(&mut doc, record);
        self.write_answer_table(&mut doc, record);
        self.write_warnings(&mut doc, record);
        self.write_conclusion(&mut doc, record);

        doc.push_str("\\end{document}\n");
        doc
    }

    fn write_final_answer_box(&self, doc: &mut String, record: &SolutionRecord) {
        doc.push_str("\\begin{center}\n\\fcolorbox{black}{yellow!15}{\\parbox{0.85\\textwidth}{\\centering\n");
        let _ = writeln!(
            doc,
            r"\textbf{{Final Answer:}} {}\\[4pt]",
            sanitize(&record.final_answer.value)
        );
        let _ = writeln!(doc, r"Confidence: {}\%", record.confidence.value);
        doc.push_str("}}\n\\end{center}\n\n");
    }

    fn write_strategy(&self, doc: &mut String, record: &SolutionRecord, strategy: StrategyId) {
        let color = match strategy {
            StrategyId::Systematic => "strategyone",
            StrategyId::Shortcut => "strategytwo",
            StrategyId::Elegant => "strategythree",
        };
        let _ = writeln!(
            doc,
            r"\section{{\textcolor{{{color}}}{{{}}}}}",
            sanitize(&strategy.to_string())
        );
        write_body(doc, record.section(strategy));
    }

    fn write_synthesis(&self, doc: &mut String, record: &SolutionRecord) {
        doc.push_str("\\section{Synthesis and Verification}\n");
        write_body(doc, &record.synthesis.value);
    }

    fn write_answer_table(&self, doc: &mut String, record: &SolutionRecord) {
        doc.push_str("\\section{Answer Comparison}\n");
        doc.push_str("\\begin{center}\n\\begin{tabular}{|l|p{0.6\\textwidth}|}\n\\hline\n");
        doc.push_str("\\rowcolor{gray!15}\\textbf{Strategy} & \\textbf{Answer} \\\\\n\\hline\n");
        for strategy in StrategyId::ALL {
            let answer = record
                .strategy_answers
                .get(&strategy)
                .map(|a| sanitize(a))
                .unwrap_or_else(|| r"\textit{not stated}".to_string());
            let _ = writeln!(doc, r"{} & {} \\", sanitize(strategy.title()), answer);
            doc.push_str("\\hline\n");
        }
        doc.push_str("\\end{tabular}\n\\end{center}\n");
        let _ = writeln!(
            doc,
            r"Model-reported agreement: {}.",
            if record.all_agree { "yes" } else { "no" }
        );
        doc.push('\n');
    }

    fn write_warnings(&self, doc: &mut String, record: &SolutionRecord) {
        doc.push_str("\\section{Trap Checks}\n");
        if record.warnings.is_empty() {
            doc.push_str("No known trap patterns matched.\n\n");
            return;
        }
        doc.push_str("\\begin{itemize}\n");
        for warning in &record.warnings {
            let _ = writeln!(
                doc,
                r"\item \textcolor{{warn}}{{{}}}",
                sanitize(&warning.message)
            );
        }
        doc.push_str("\\end{itemize}\n\n");
    }

    fn write_conclusion(&self, doc: &mut String, record: &SolutionRecord) {
        doc.push_str("\\section{Final Answer}\n");
        doc.push_str("\\begin{center}\n");
        let _ = writeln!(
            doc,
            r"\fbox{{\parbox{{0.8\textwidth}}{{\centering\Large {}}}}}",
            sanitize(&record.final_answer.value)
        );
        doc.push_str("\\end{center}\n");
        let _ = writeln!(doc, r"\textbf{{Reason:}} {}", sanitize(&record.reason.value));
        doc.push('\n');
        let _ = writeln!(doc, r"\textbf{{Confidence:}} {}\%", record.confidence.value);
        doc.push('\n');
    }
}

/// Write a narrative with one paragraph per non-blank line.
fn write_body(doc: &mut String, text: &str) {
    let cleaned = sanitize(text);
    if cleaned.is_empty() {
        let _ = writeln!(doc, r"\textit{{{}}}", MISSING_SECTION);
        doc.push('\n');
        return;
    }
    for line in cleaned.lines().map(str::trim).filter(|l| !l.is_empty()) {
        doc.push_str(line);
        doc.push_str("\n\n");
    }
}
