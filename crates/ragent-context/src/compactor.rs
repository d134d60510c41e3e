//! ABOUTME: Context Compactor — partitions history into recent/summary/salience (spec.md §4.2)

use crate::budgeter::{self, Section, TokenEstimator};
use crate::error::Result;
use async_trait::async_trait;
use ragent_core::types::{ContextBudget, Message, SalienceNote, SummaryItem};
use std::collections::HashMap;

/// Contiguous-window size for summarization; implementation-chosen per
/// spec.md §4.2 step 2.
const SUMMARY_WINDOW: usize = 4;

/// Summarizes one contiguous window of older messages into prose. In
/// production this is backed by the LLM collaborator; tests use a
/// deterministic double.
#[async_trait]
pub trait HistorySummarizer: Send + Sync {
    async fn summarize_window(&self, messages: &[Message]) -> Result<String>;
}

/// Extracts durable facts (named entities, stable preferences,
/// commitments) from one candidate message.
#[async_trait]
pub trait SalienceExtractor: Send + Sync {
    async fn extract(&self, message: &Message, turn: u32) -> Result<Vec<SalienceNote>>;
}

#[derive(Debug, Clone, Copy)]
pub struct CompactionCaps {
    pub max_recent_turns: usize,
    pub max_summary_items: usize,
    pub max_salience_items: usize,
    pub history_cap: u32,
    pub summary_cap: u32,
    pub salience_cap: u32,
}

#[derive(Debug, Clone)]
pub struct CompactedContext {
    pub history_text: String,
    pub summary_text: String,
    pub salience_text: String,
    pub recent_messages: Vec<Message>,
    pub budget: ContextBudget,
    pub summary_items: Vec<SummaryItem>,
    pub salience_notes: Vec<SalienceNote>,
}

/// Runs the five-step algorithm in spec.md §4.2. `prior` is whatever
/// prior-session salience/summaries the memory collaborator supplied
/// (step 4); pass empty slices when there is none.
pub async fn compact(
    messages: &[Message],
    caps: CompactionCaps,
    summarizer: &dyn HistorySummarizer,
    salience_extractor: &dyn SalienceExtractor,
    prior_summaries: &[SummaryItem],
    prior_salience: &[SalienceNote],
    model_id: &str,
    estimator: &dyn TokenEstimator,
) -> Result<CompactedContext> {
    let split_at = messages.len().saturating_sub(caps.max_recent_turns);
    let candidates = &messages[..split_at];
    let recent_messages = messages[split_at..].to_vec();

    // Step 2: summarize candidates in disjoint, turn-ordered windows.
    let mut summary_items = Vec::new();
    let mut window_start = 0usize;
    while window_start < candidates.len() {
        let window_end = (window_start + SUMMARY_WINDOW).min(candidates.len());
        let window = &candidates[window_start..window_end];
        let text = summarizer.summarize_window(window).await?;
        summary_items.push(SummaryItem {
            text,
            turn_range: (window_start as u32, (window_end - 1) as u32),
            embedding: None,
        });
        window_start = window_end;
    }
    summary_items.extend(prior_summaries.iter().cloned());
    summary_items.truncate(caps.max_summary_items);

    // Step 3: extract salience notes, deduplicated by fact (newest wins).
    let mut salience_by_fact: HashMap<String, SalienceNote> = HashMap::new();
    let mut insertion_order: Vec<String> = Vec::new();
    for (turn, message) in candidates.iter().enumerate() {
        for note in salience_extractor.extract(message, turn as u32).await? {
            if let Some(existing) = salience_by_fact.get(&note.fact) {
                if note.last_seen_turn >= existing.last_seen_turn {
                    salience_by_fact.insert(note.fact.clone(), note.clone());
                }
            } else {
                insertion_order.push(note.fact.clone());
                salience_by_fact.insert(note.fact.clone(), note);
            }
        }
    }
    // Step 4: merge prior-session salience (treated as already-seen facts).
    for note in prior_salience {
        match salience_by_fact.get(&note.fact) {
            Some(existing) if existing.last_seen_turn >= note.last_seen_turn => {}
            _ => {
                if !insertion_order.contains(&note.fact) {
                    insertion_order.push(note.fact.clone());
                }
                salience_by_fact.insert(note.fact.clone(), note.clone());
            }
        }
    }

    // Order-stable by last_seen_turn descending, then first insertion.
    let mut salience_notes: Vec<SalienceNote> = insertion_order
        .iter()
        .map(|fact| salience_by_fact[fact].clone())
        .collect();
    let insertion_index: HashMap<&str, usize> = insertion_order
        .iter()
        .enumerate()
        .map(|(i, f)| (f.as_str(), i))
        .collect();
    salience_notes.sort_by(|a, b| {
        b.last_seen_turn
            .cmp(&a.last_seen_turn)
            .then_with(|| insertion_index[a.fact.as_str()].cmp(&insertion_index[b.fact.as_str()]))
    });
    salience_notes.truncate(caps.max_salience_items);

    // Step 5: apply the Token Budgeter.
    let history_text = candidates
        .iter()
        .map(|m| format!("{:?}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n");
    let summary_text = summary_items
        .iter()
        .map(|s| s.text.clone())
        .collect::<Vec<_>>()
        .join("\n");
    let salience_text = salience_notes
        .iter()
        .map(|s| s.fact.clone())
        .collect::<Vec<_>>()
        .join("\n");

    let sections = vec![
        Section {
            name: "history".into(),
            text: history_text,
            cap: caps.history_cap,
        },
        Section {
            name: "summary".into(),
            text: summary_text,
            cap: caps.summary_cap,
        },
        Section {
            name: "salience".into(),
            text: salience_text,
            cap: caps.salience_cap,
        },
    ];
    let budgeted = budgeter::budget(&sections, model_id, estimator);

    let budget = ContextBudget {
        history_tokens: budgeted
            .get("history")
            .map(|t| estimator.estimate(t, model_id))
            .unwrap_or(0),
        summary_tokens: budgeted
            .get("summary")
            .map(|t| estimator.estimate(t, model_id))
            .unwrap_or(0),
        salience_tokens: budgeted
            .get("salience")
            .map(|t| estimator.estimate(t, model_id))
            .unwrap_or(0),
        web_tokens: 0,
    };

    Ok(CompactedContext {
        history_text: budgeted.get("history").cloned().unwrap_or_default(),
        summary_text: budgeted.get("summary").cloned().unwrap_or_default(),
        salience_text: budgeted.get("salience").cloned().unwrap_or_default(),
        recent_messages,
        budget,
        summary_items,
        salience_notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budgeter::HeuristicEstimator;

    struct EchoSummarizer;
    #[async_trait]
    impl HistorySummarizer for EchoSummarizer {
        async fn summarize_window(&self, messages: &[Message]) -> Result<String> {
            Ok(messages.iter().map(|m| m.content.clone()).collect::<Vec<_>>().join(" / "))
        }
    }

    struct NoSalience;
    #[async_trait]
    impl SalienceExtractor for NoSalience {
        async fn extract(&self, _message: &Message, _turn: u32) -> Result<Vec<SalienceNote>> {
            Ok(vec![])
        }
    }

    struct FixedSalience;
    #[async_trait]
    impl SalienceExtractor for FixedSalience {
        async fn extract(&self, message: &Message, turn: u32) -> Result<Vec<SalienceNote>> {
            if message.content.contains("prefers") {
                Ok(vec![SalienceNote {
                    fact: message.content.clone(),
                    last_seen_turn: turn,
                }])
            } else {
                Ok(vec![])
            }
        }
    }

    fn caps() -> CompactionCaps {
        CompactionCaps {
            max_recent_turns: 2,
            max_summary_items: 10,
            max_salience_items: 10,
            history_cap: 1_000,
            summary_cap: 1_000,
            salience_cap: 1_000,
        }
    }

    #[tokio::test]
    async fn recent_messages_kept_verbatim() {
        let messages: Vec<Message> = (0..6).map(|i| Message::user(format!("turn {i}"))).collect();
        let result = compact(
            &messages,
            caps(),
            &EchoSummarizer,
            &NoSalience,
            &[],
            &[],
            "gpt",
            &HeuristicEstimator,
        )
        .await
        .unwrap();
        assert_eq!(result.recent_messages.len(), 2);
        assert_eq!(result.recent_messages[0].content, "turn 4");
        assert_eq!(result.recent_messages[1].content, "turn 5");
    }

    #[tokio::test]
    async fn summary_items_cover_disjoint_monotonic_ranges() {
        let messages: Vec<Message> = (0..10).map(|i| Message::user(format!("turn {i}"))).collect();
        let result = compact(
            &messages,
            caps(),
            &EchoSummarizer,
            &NoSalience,
            &[],
            &[],
            "gpt",
            &HeuristicEstimator,
        )
        .await
        .unwrap();
        let mut last_end: i64 = -1;
        for item in &result.summary_items {
            assert!(item.turn_range.0 as i64 > last_end);
            assert!(item.turn_range.0 <= item.turn_range.1);
            last_end = item.turn_range.1 as i64;
        }
    }

    #[tokio::test]
    async fn salience_dedup_keeps_newest_last_seen_turn() {
        struct RepeatedSalience;
        #[async_trait]
        impl SalienceExtractor for RepeatedSalience {
            async fn extract(&self, _m: &Message, turn: u32) -> Result<Vec<SalienceNote>> {
                Ok(vec![SalienceNote {
                    fact: "likes rust".into(),
                    last_seen_turn: turn,
                }])
            }
        }
        let messages: Vec<Message> = (0..5).map(|i| Message::user(format!("turn {i}"))).collect();
        let result = compact(
            &messages,
            caps(),
            &EchoSummarizer,
            &RepeatedSalience,
            &[],
            &[],
            "gpt",
            &HeuristicEstimator,
        )
        .await
        .unwrap();
        assert_eq!(result.salience_notes.len(), 1);
        // Only turns 0..3 are candidates (last 2 are recent); newest is turn 2.
        assert_eq!(result.salience_notes[0].last_seen_turn, 2);
    }

    #[tokio::test]
    async fn salience_ordered_by_last_seen_turn_descending() {
        let messages = vec![
            Message::user("alice prefers dark mode"),
            Message::user("unrelated"),
            Message::user("bob prefers light mode"),
            Message::user("turn 3"),
            Message::user("turn 4"),
        ];
        let result = compact(
            &messages,
            caps(),
            &EchoSummarizer,
            &FixedSalience,
            &[],
            &[],
            "gpt",
            &HeuristicEstimator,
        )
        .await
        .unwrap();
        assert_eq!(result.salience_notes.len(), 2);
        assert!(result.salience_notes[0].last_seen_turn >= result.salience_notes[1].last_seen_turn);
    }

    #[tokio::test]
    async fn every_output_section_satisfies_its_cap() {
        let messages: Vec<Message> = (0..20)
            .map(|i| Message::user("word ".repeat(50) + &i.to_string()))
            .collect();
        let mut tight_caps = caps();
        tight_caps.history_cap = 20;
        tight_caps.summary_cap = 10;
        tight_caps.salience_cap = 5;
        let result = compact(
            &messages,
            tight_caps,
            &EchoSummarizer,
            &NoSalience,
            &[],
            &[],
            "gpt",
            &HeuristicEstimator,
        )
        .await
        .unwrap();
        assert!(HeuristicEstimator.estimate(&result.history_text, "gpt") <= tight_caps.history_cap);
        assert!(HeuristicEstimator.estimate(&result.summary_text, "gpt") <= tight_caps.summary_cap);
    }
}
