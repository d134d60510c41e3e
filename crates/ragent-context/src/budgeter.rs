//! ABOUTME: Token Budgeter — per-section token caps enforced via suffix-drop truncation
//! ABOUTME: Pure, idempotent function honoring spec.md §4.1's contract

use std::collections::HashMap;

/// Pluggable token estimation. A model-specific tokenizer can be plugged
/// in later; [`HeuristicEstimator`] is the deterministic character→token
/// fallback the contract requires when no tokenizer is available.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str, model_id: &str) -> u32;
}

/// Deterministic character→token heuristic: ~4 characters per token,
/// rounded up, matching the common cl100k-family rule of thumb.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicEstimator;

impl TokenEstimator for HeuristicEstimator {
    fn estimate(&self, text: &str, _model_id: &str) -> u32 {
        let chars = text.chars().count() as u32;
        chars.div_ceil(4)
    }
}

/// One named, capped section of text, in priority order.
#[derive(Debug, Clone)]
pub struct Section {
    pub name: String,
    pub text: String,
    pub cap: u32,
}

/// Truncates `text` by dropping a suffix at a token boundary until it fits
/// within `cap` tokens, preserving the earliest content (the contract's
/// tie-break rule). Returns an empty string if `cap` is 0.
pub fn truncate_to_budget(text: &str, cap: u32, model_id: &str, estimator: &dyn TokenEstimator) -> String {
    if cap == 0 || text.is_empty() {
        return String::new();
    }
    if estimator.estimate(text, model_id) <= cap {
        return text.to_string();
    }

    // Binary search over char-boundary prefixes for the longest prefix
    // that fits the cap; this keeps the earliest content as required.
    let char_indices: Vec<usize> = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
    let mut lo = 0usize;
    let mut hi = char_indices.len() - 1;
    let mut best = 0usize;

    while lo <= hi {
        let mid = lo + (hi - lo) / 2;
        let candidate = &text[..char_indices[mid]];
        if estimator.estimate(candidate, model_id) <= cap {
            best = mid;
            if mid == char_indices.len() - 1 {
                break;
            }
            lo = mid + 1;
        } else {
            if mid == 0 {
                break;
            }
            hi = mid - 1;
        }
    }

    text[..char_indices[best]].to_string()
}

/// Applies per-section caps to `sections`, in order, returning only the
/// sections that remain non-empty after truncation. Pure and idempotent:
/// re-budgeting an already-budgeted output is a no-op.
pub fn budget(
    sections: &[Section],
    model_id: &str,
    estimator: &dyn TokenEstimator,
) -> HashMap<String, String> {
    let mut out = HashMap::with_capacity(sections.len());
    for section in sections {
        if section.cap == 0 || section.text.is_empty() {
            continue;
        }
        let truncated = truncate_to_budget(&section.text, section.cap, model_id, estimator);
        if !truncated.is_empty() {
            out.insert(section.name.clone(), truncated);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_section_or_zero_cap_is_dropped() {
        let sections = vec![
            Section {
                name: "history".into(),
                text: String::new(),
                cap: 100,
            },
            Section {
                name: "summary".into(),
                text: "something".into(),
                cap: 0,
            },
        ];
        let out = budget(&sections, "gpt", &HeuristicEstimator);
        assert!(out.is_empty());
    }

    #[test]
    fn section_under_cap_is_untouched() {
        let sections = vec![Section {
            name: "salience".into(),
            text: "short fact".into(),
            cap: 1000,
        }];
        let out = budget(&sections, "gpt", &HeuristicEstimator);
        assert_eq!(out["salience"], "short fact");
    }

    #[test]
    fn truncation_respects_cap_and_keeps_earliest_content() {
        let text = "a".repeat(400); // ~100 tokens under the heuristic
        let truncated = truncate_to_budget(&text, 10, "gpt", &HeuristicEstimator);
        assert!(HeuristicEstimator.estimate(&truncated, "gpt") <= 10);
        assert!(text.starts_with(&truncated));
    }

    #[test]
    fn budgeting_is_idempotent() {
        let text = "word ".repeat(50);
        let once = truncate_to_budget(&text, 20, "gpt", &HeuristicEstimator);
        let twice = truncate_to_budget(&once, 20, "gpt", &HeuristicEstimator);
        assert_eq!(once, twice);
    }

    #[test]
    fn every_output_section_satisfies_its_cap() {
        let sections = vec![
            Section {
                name: "history".into(),
                text: "the quick brown fox ".repeat(30),
                cap: 15,
            },
            Section {
                name: "summary".into(),
                text: "jumps over the lazy dog ".repeat(10),
                cap: 8,
            },
        ];
        let out = budget(&sections, "gpt", &HeuristicEstimator);
        for section in &sections {
            if let Some(text) = out.get(&section.name) {
                assert!(HeuristicEstimator.estimate(text, "gpt") <= section.cap);
            }
        }
    }
}
