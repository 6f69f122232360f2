//! The triple-strategy solver prompt.
//!
//! Layout:
//! 1. Role and the embedded knowledge digest
//! 2. One block per strategy, each ending in `ANSWER n:` / `CONFIDENCE n:`
//! 3. Synthesis, trap checklist, and the ultimate-answer block
//!
//! Every label the parser slices on is taken from
//! [`trisolve_core::parser::markers`], never typed out here.

use std::fmt::Write;

use trisolve_core::parser::markers::{
    answer_label, confidence_label, strategy_markers, ALL_THREE_AGREE, FINAL_ANSWER,
    FINAL_CONFIDENCE, FINAL_SYNTHESIS, ONE_SENTENCE, ULTIMATE_ANSWER,
};
use trisolve_core::{KnowledgeBase, StrategyId};

/// Opening role statement.
pub const ROLE_PROMPT: &str = r#"
You are an expert calculus solver preparing a worked solution for a student
facing a competitive entrance exam.

Read the problem in the attached image. Solve it three separate ways, then
compare the three results and commit to one final answer.
"#;

/// Guidance for the textbook strategy.
pub const SYSTEMATIC_GUIDANCE: &str = r#"
Goal: a systematic, fully rigorous solution using standard rules.

Step 1: Observe. Identify the function, whether to differentiate or
integrate, every given value, and any domain restriction.
Step 2: Classify. Polynomial, trigonometric, exponential, logarithmic,
product, quotient or composite.
Step 3: Select a technique. Power, chain, product or quotient rule for
derivatives. Direct formula, substitution, by parts or partial fractions
for integrals.
Step 4: Execute. Show every algebraic manipulation and simplify as you go.
Step 5: Finalize. Add +C for indefinite integrals, evaluate limits for
definite integrals, and confirm the domain.
"#;

/// Guidance for the shortcut strategy.
pub const SHORTCUT_GUIDANCE: &str = r#"
Goal: reach the answer in seconds through pattern recognition.

Ask: Is this a memorized standard form? Does King's property
(integral of f(x) over [a,b] equals integral of f(a+b-x)) apply? Is the
integrand even or odd? Is f'(x) sitting in the numerator? Is it
(f(x))^n f'(x)?

Name the shortcut from the knowledge base you used and execute it in as
few steps as possible.
"#;

/// Guidance for the insight strategy.
pub const ELEGANT_GUIDANCE: &str = r#"
Goal: an insightful, elegant solution.

Consider differentiation under the integral sign, the Weierstrass
substitution t = tan(x/2), complex-variable methods, hidden symmetry,
a geometric reading, or a series expansion.

State what makes this problem special, then apply the technique.
"#;

/// Exam trap checklist included in the synthesis block.
pub const TRAP_CHECKLIST: &str = r#"
TRAP CHECKLIST:
- Did I add +C for an indefinite integral?
- Did I check domain restrictions (ln, sqrt, tan)?
- Did I use ln|x| where the integrand is 1/x?
- Did I evaluate limits correctly for a definite integral?
- Did I simplify completely?
"#;

/// Closing rules.
pub const CRITICAL_INSTRUCTIONS: &str = r#"
CRITICAL INSTRUCTIONS:
1. Provide all three strategies, even when they are similar.
2. Show actual calculation steps, not descriptions of steps.
3. Use precise notation for every formula.
4. Check for the exam traps above.
5. If the strategies disagree, lower your confidence and explain why.
6. Give one clear, definitive answer at the end.
7. Keep every label above exactly as written, each at the start of its own line.
"#;

fn guidance(strategy: StrategyId) -> &'static str {
    match strategy {
        StrategyId::Systematic => SYSTEMATIC_GUIDANCE,
        StrategyId::Shortcut => SHORTCUT_GUIDANCE,
        StrategyId::Elegant => ELEGANT_GUIDANCE,
    }
}

/// Heading line for a strategy block, e.g. `STRATEGY 1 - TEXTBOOK RIGOR`.
pub fn strategy_heading(strategy: StrategyId) -> String {
    format!(
        "{} - {}",
        strategy_markers(strategy).start,
        strategy.title().to_uppercase()
    )
}

/// Build the full solver prompt around a knowledge base.
pub fn build_solver_prompt(knowledge: &KnowledgeBase) -> String {
    let mut prompt = String::with_capacity(8 * 1024);

    prompt.push_str(ROLE_PROMPT);
    prompt.push_str("\nKNOWLEDGE BASE:\n\n");
    prompt.push_str(&knowledge.prompt_digest());
    prompt.push_str("\n\nTRIPLE-STRATEGY ANALYSIS\n");

    for strategy in StrategyId::ALL {
        let _ = writeln!(prompt, "\n{}", strategy_heading(strategy));
        prompt.push_str(guidance(strategy));
        let _ = writeln!(prompt, "\n{} [your answer]", answer_label(strategy));
        let _ = writeln!(prompt, "{} [70-100%]", confidence_label(strategy));
    }

    let _ = writeln!(prompt, "\n{} & VERIFICATION:", FINAL_SYNTHESIS);
    prompt.push_str("\nCompare the answer of each strategy above.\n");
    let _ = writeln!(prompt, "DO {}? [YES/NO]", ALL_THREE_AGREE);
    prompt.push_str("If NO, identify the discrepancy and recheck the calculation.\n");
    prompt.push_str(TRAP_CHECKLIST);

    let _ = writeln!(prompt, "\n{}:\n", ULTIMATE_ANSWER);
    let _ = writeln!(prompt, "{} [option letter or value]\n", FINAL_ANSWER);
    let _ = writeln!(prompt, "{} CLEAR REASON:", ONE_SENTENCE);
    prompt.push_str("[one sentence explaining why this is the answer]\n\n");
    let _ = writeln!(prompt, "{} [85-100%]", FINAL_CONFIDENCE);

    prompt.push_str(CRITICAL_INSTRUCTIONS);
    prompt
}
