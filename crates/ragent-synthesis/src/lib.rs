//! ABOUTME: Synthesizer-facing helpers — system prompt, request assembly, citation validation
//! ABOUTME: Implements spec.md §4.7's contract around the Synthesizer collaborator trait

use ragent_core::error::{CoreError, Result};
use ragent_core::traits::{SynthesisRequest, SynthesisResponse, Synthesizer};
use ragent_core::types::Reference;

pub const DEFAULT_SYSTEM_PROMPT: &str = "Answer only from the provided context. Cite inline using \
[k] where k is the 1-based position of the supporting reference. If the context is insufficient, \
say \"I don't have enough information.\" Never invent references.";

/// Assembles a [`SynthesisRequest`] from orchestrator-level inputs.
/// `revision_notes` are appended as directives and must never change
/// citation numbering: callers always pass the same `citations` slice
/// across a critic-loop's revise attempts.
pub fn build_request(
    question: &str,
    context: &str,
    citations: Vec<Reference>,
    revision_notes: Vec<String>,
    model: &str,
    max_tokens: u32,
    system_prompt: Option<String>,
) -> SynthesisRequest {
    SynthesisRequest {
        question: question.to_string(),
        context: context.to_string(),
        citations,
        revision_notes,
        model: model.to_string(),
        max_tokens,
        system_prompt: system_prompt.or_else(|| Some(DEFAULT_SYSTEM_PROMPT.to_string())),
    }
}

/// Runs one synthesis attempt. Does not validate inline citation markers:
/// an out-of-range `[k]` is not a synthesizer-level failure (spec.md §7
/// treats it as non-fatal), so the critique loop is the one that calls
/// [`validate_citations`] and decides what to do about it.
pub async fn synthesize(
    synthesizer: &dyn Synthesizer,
    request: SynthesisRequest,
    on_token: &(dyn Fn(&str) + Send + Sync),
) -> Result<SynthesisResponse> {
    synthesizer.synthesize(request, on_token).await
}

/// Checks that every `[k]` marker in `answer` references a valid 1-based
/// position in `citations`. Does not require every citation be used.
pub fn validate_citations(answer: &str, citations: &[Reference]) -> Result<()> {
    let max = citations.len();
    for index in extract_citation_markers(answer) {
        if index == 0 || index > max {
            return Err(CoreError::InvalidCitation { index, max });
        }
    }
    Ok(())
}

/// Removes every out-of-range or zero `[k]` marker from `answer`, leaving
/// in-range markers untouched. Used at the critic retry ceiling, where an
/// unresolved invalid citation must not block the session from completing
/// (spec.md §7).
pub fn strip_invalid_citations(answer: &str, citations: &[Reference]) -> (String, Vec<usize>) {
    let max = citations.len();
    let mut cleaned = String::with_capacity(answer.len());
    let mut removed = Vec::new();
    let bytes = answer.as_bytes();
    let mut i = 0;
    let mut segment_start = 0;
    while i < bytes.len() {
        if bytes[i] == b'[' {
            let start = i + 1;
            let mut j = start;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j > start && j < bytes.len() && bytes[j] == b']' {
                if let Ok(n) = answer[start..j].parse::<usize>() {
                    if n == 0 || n > max {
                        cleaned.push_str(&answer[segment_start..i]);
                        removed.push(n);
                        i = j + 1;
                        segment_start = i;
                        continue;
                    }
                }
            }
        }
        i += 1;
    }
    cleaned.push_str(&answer[segment_start..]);
    (cleaned, removed)
}

/// Concatenates the effective bodies of every reference `draft` cites,
/// in order of first appearance, for use as the Critic's `evidence` input.
/// Out-of-range markers are skipped; citation validation is this
/// function's caller's job, not this one's.
pub fn cited_bodies(draft: &str, citations: &[Reference]) -> String {
    let mut seen = std::collections::HashSet::new();
    extract_citation_markers(draft)
        .into_iter()
        .filter(|&k| k >= 1 && k <= citations.len() && seen.insert(k))
        .map(|k| citations[k - 1].effective_body().to_string())
        .filter(|body| !body.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Extracts the numeric contents of every `[<digits>]` marker in `text`,
/// in order of appearance, ignoring non-numeric bracketed content.
pub fn extract_citation_markers(text: &str) -> Vec<usize> {
    let mut markers = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'[' {
            let start = i + 1;
            let mut j = start;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j > start && j < bytes.len() && bytes[j] == b']' {
                if let Ok(n) = text[start..j].parse::<usize>() {
                    markers.push(n);
                }
                i = j + 1;
                continue;
            }
        }
        i += 1;
    }
    markers
}
