//! ABOUTME: Dependency-free HistorySummarizer/SalienceExtractor for demos and tests
//! ABOUTME: Production deployments back these with the LLM collaborator instead

use crate::compactor::{HistorySummarizer, SalienceExtractor};
use crate::error::Result;
use async_trait::async_trait;
use ragent_core::types::{Message, SalienceNote};

/// Summarizes a window by concatenating each message's content, prefixed
/// by role. Not semantically compressive; a stand-in for an LLM-backed
/// summarizer when none is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcatSummarizer;

#[async_trait]
impl HistorySummarizer for ConcatSummarizer {
    async fn summarize_window(&self, messages: &[Message]) -> Result<String> {
        Ok(messages
            .iter()
            .map(|m| format!("{:?}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join(" "))
    }
}

/// Extracts salience notes from simple textual cues ("prefers", "always",
/// "my name is", "remember that") rather than model judgment. A stand-in
/// for an LLM-backed extractor when none is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordSalienceExtractor;

const CUES: &[&str] = &["prefers", "always", "never", "my name is", "remember that", "i work"];

#[async_trait]
impl SalienceExtractor for KeywordSalienceExtractor {
    async fn extract(&self, message: &Message, turn: u32) -> Result<Vec<SalienceNote>> {
        let lower = message.content.to_ascii_lowercase();
        if CUES.iter().any(|cue| lower.contains(cue)) {
            Ok(vec![SalienceNote {
                fact: message.content.clone(),
                last_seen_turn: turn,
            }])
        } else {
            Ok(vec![])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn concat_summarizer_joins_messages_with_role() {
        let messages = vec![Message::user("hello"), Message::assistant("hi there")];
        let text = ConcatSummarizer.summarize_window(&messages).await.unwrap();
        assert!(text.contains("hello"));
        assert!(text.contains("hi there"));
    }

    #[tokio::test]
    async fn keyword_extractor_matches_preference_cue() {
        let message = Message::user("I always drink coffee in the morning");
        let notes = KeywordSalienceExtractor.extract(&message, 3).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].last_seen_turn, 3);
    }

    #[tokio::test]
    async fn keyword_extractor_ignores_unrelated_message() {
        let message = Message::user("what time is it");
        let notes = KeywordSalienceExtractor.extract(&message, 1).await.unwrap();
        assert!(notes.is_empty());
    }
}
