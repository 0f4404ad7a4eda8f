//! Bounded chat context assembly.
//!
//! Turns a normalized analysis plus a user question into a prompt context that
//! stays within a token budget. Token costs use the `cl100k_base` encoding via
//! `tiktoken-rs`, falling back to a `ceil(chars / 4)` estimate when the
//! tokenizer cannot be constructed. Assembly is fully deterministic: no
//! randomness, no external calls.

use crate::ingest::AnalysisResult;
use std::sync::OnceLock;
use tiktoken_rs::{CoreBPE, cl100k_base};

/// Token charged for each `\n\n` joint between sections.
const SEPARATOR_COST: usize = 1;

/// Bounded context assembled for one chat completion.
///
/// `document_context` holds the selected analysis sections and is empty for an
/// all-empty analysis, in which case the context carries only the question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    /// Analysis sections selected under the token budget, joined by blank lines.
    pub document_context: String,
    /// The user question, included verbatim and never truncated.
    pub question: String,
    /// Estimated token cost of the assembled context including the question.
    pub token_estimate: usize,
}

/// Assemble a bounded context from an analysis and a user question.
///
/// Sections are admitted in priority order: narrative summary, file summary,
/// extracted-text prefix, keywords, then document metadata. A section is only
/// included when its full cost fits the remaining budget, except extracted
/// text, which is truncated on a token boundary to whatever budget remains.
/// The question is always included; analysis sections share `max_tokens` minus
/// the question's cost.
pub fn build_context(
    analysis: &AnalysisResult,
    question: &str,
    max_tokens: usize,
) -> PromptContext {
    let question_line = format!("User Question: {question}");
    let question_cost = estimate_tokens(&question_line);
    let mut remaining = max_tokens.saturating_sub(question_cost + SEPARATOR_COST);

    let mut sections: Vec<String> = Vec::new();

    admit_whole(
        labeled("Narrative Summary: ", &analysis.narrative_summary),
        &mut remaining,
        &mut sections,
    );
    admit_whole(
        labeled("Summary: ", &analysis.file_summary),
        &mut remaining,
        &mut sections,
    );
    admit_truncated(
        "Document Content: ",
        &analysis.extracted_text,
        &mut remaining,
        &mut sections,
    );
    if !analysis.keywords.is_empty() {
        admit_whole(
            Some(format!("Keywords: {}", analysis.keywords.join(", "))),
            &mut remaining,
            &mut sections,
        );
    }
    admit_whole(
        labeled("File Type: ", &analysis.file_type),
        &mut remaining,
        &mut sections,
    );
    admit_whole(
        labeled("Language: ", &analysis.language),
        &mut remaining,
        &mut sections,
    );

    let document_context = sections.join("\n\n");
    let token_estimate = if document_context.is_empty() {
        question_cost
    } else {
        estimate_tokens(&document_context) + SEPARATOR_COST + question_cost
    };

    PromptContext {
        document_context,
        question: question.to_string(),
        token_estimate,
    }
}

fn labeled(label: &str, content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("{label}{trimmed}"))
    }
}

/// Admit a section only when its full cost fits the remaining budget.
fn admit_whole(section: Option<String>, remaining: &mut usize, sections: &mut Vec<String>) {
    let Some(section) = section else {
        return;
    };
    let cost = estimate_tokens(&section) + SEPARATOR_COST;
    if cost <= *remaining {
        *remaining -= cost;
        sections.push(section);
    }
}

/// Admit a section truncated to the remaining budget instead of dropping it whole.
fn admit_truncated(label: &str, content: &str, remaining: &mut usize, sections: &mut Vec<String>) {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return;
    }
    let label_cost = estimate_tokens(label) + SEPARATOR_COST;
    let Some(body_budget) = remaining.checked_sub(label_cost) else {
        return;
    };
    if body_budget == 0 {
        return;
    }

    let mut body = truncate_to_tokens(trimmed, body_budget);
    // Token estimates over a concatenation are not exactly additive; pop
    // trailing words until the composed section provably fits.
    loop {
        if body.trim().is_empty() {
            return;
        }
        let section = format!("{label}{}", body.trim_end());
        let cost = estimate_tokens(&section) + SEPARATOR_COST;
        if cost <= *remaining {
            *remaining -= cost;
            sections.push(section);
            return;
        }
        body = match body.trim_end().rsplit_once(char::is_whitespace) {
            Some((head, _)) => head.to_string(),
            None => return,
        };
    }
}

fn bpe() -> Option<&'static CoreBPE> {
    static BPE: OnceLock<Option<CoreBPE>> = OnceLock::new();
    BPE.get_or_init(|| cl100k_base().ok()).as_ref()
}

/// Estimate the token cost of a string.
pub(crate) fn estimate_tokens(text: &str) -> usize {
    match bpe() {
        Some(bpe) => bpe.encode_ordinary(text).len(),
        None => text.chars().count().div_ceil(4),
    }
}

/// Truncate text to at most `budget` tokens, on a token boundary when the
/// tokenizer is available and on a character boundary otherwise.
fn truncate_to_tokens(text: &str, budget: usize) -> String {
    if estimate_tokens(text) <= budget {
        return text.to_string();
    }

    match bpe() {
        Some(bpe) => {
            let mut tokens = bpe.encode_ordinary(text);
            tokens.truncate(budget);
            // A truncated token sequence can split a multi-byte character; keep
            // dropping the trailing token until it decodes cleanly.
            loop {
                match bpe.decode(tokens.clone()) {
                    Ok(decoded) => return decoded,
                    Err(_) if !tokens.is_empty() => {
                        tokens.pop();
                    }
                    Err(_) => return String::new(),
                }
            }
        }
        None => text.chars().take(budget.saturating_mul(4)).collect(),
    }
}
