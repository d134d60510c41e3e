//! ABOUTME: Reference MemoryStore — cosine-similarity recall over stored successful patterns
//! ABOUTME: Not production-grade; a stand-in for a vector-backed long-term memory

use async_trait::async_trait;
use parking_lot::RwLock;
use ragent_core::error::Result;
use ragent_core::traits::MemoryStore;
use ragent_core::types::{Reference, SummaryItem};
use std::sync::Arc;

/// A previously synthesized answer worth recalling for a similar future
/// question. `add_successful_pattern` carries no session scope (spec.md
/// §6.2), so storage here is session-agnostic; `recall`'s `session_id`
/// parameter is accepted for interface parity but does not filter.
#[derive(Debug, Clone)]
struct StoredPattern {
    question: String,
    answer: String,
    embedding: Vec<f32>,
}

/// Deterministic, dependency-free text embedding for the in-memory store.
/// Mirrors the character-histogram approach used by test-only memory
/// backends: not semantically meaningful, just stable and cheap.
fn text_to_embedding(text: &str) -> Vec<f32> {
    let mut embedding = vec![0.0f32; 128];
    for (i, ch) in text.chars().take(128).enumerate() {
        embedding[i] = (ch as u32 as f32) / 1000.0;
    }
    let word_count = text.split_whitespace().count() as f32;
    let char_count = text.chars().count() as f32;
    if embedding.len() > 1 {
        embedding[0] += word_count / 100.0;
        embedding[1] += char_count / 1000.0;
    }
    embedding
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryMemoryStore {
    patterns: RwLock<Vec<StoredPattern>>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.patterns.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn recall(
        &self,
        question: &str,
        _session_id: &str,
        k: usize,
        similarity_floor: f32,
    ) -> Result<Vec<SummaryItem>> {
        let query_embedding = text_to_embedding(question);
        let patterns = self.patterns.read();
        let mut scored: Vec<(f32, &StoredPattern)> = patterns
            .iter()
            .map(|p| (cosine_similarity(&query_embedding, &p.embedding), p))
            .filter(|(score, _)| *score >= similarity_floor)
            .collect();
        scored.sort_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, p)| SummaryItem {
                text: format!("Q: {}\nA: {}", p.question, p.answer),
                turn_range: (0, 0),
                embedding: Some(p.embedding.clone()),
            })
            .collect())
    }

    async fn add_successful_pattern(
        &self,
        question: &str,
        answer: &str,
        _citations: &[Reference],
    ) -> Result<()> {
        let embedding = text_to_embedding(question);
        self.patterns.write().push(StoredPattern {
            question: question.to_string(),
            answer: answer.to_string(),
            embedding,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recall_is_empty_when_store_is_empty() {
        let store = InMemoryMemoryStore::new();
        let result = store.recall("anything", "sess-1", 3, 0.0).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn recall_returns_similar_patterns_above_floor() {
        let store = InMemoryMemoryStore::new();
        store
            .add_successful_pattern(
                "How do I configure the retriever?",
                "Set retriever_strategy in the routing profile.",
                &[],
            )
            .await
            .unwrap();
        store
            .add_successful_pattern(
                "What's the weather tomorrow?",
                "I can't answer that, it's outside scope.",
                &[],
            )
            .await
            .unwrap();

        let result = store
            .recall("How do I configure the retriever?", "sess-1", 5, 0.0)
            .await
            .unwrap();
        assert!(!result.is_empty());
        assert!(result[0].text.contains("retriever_strategy"));
    }

    #[tokio::test]
    async fn recall_respects_k_and_similarity_floor() {
        let store = InMemoryMemoryStore::new();
        for i in 0..5 {
            store
                .add_successful_pattern(&format!("question {i}"), &format!("answer {i}"), &[])
                .await
                .unwrap();
        }
        let result = store.recall("question 0", "sess-1", 2, 0.0).await.unwrap();
        assert!(result.len() <= 2);

        let none = store.recall("question 0", "sess-1", 5, 0.999_999).await.unwrap();
        assert!(none.len() <= 1);
    }

    #[tokio::test]
    async fn add_successful_pattern_increments_store_length() {
        let store = InMemoryMemoryStore::new();
        assert!(store.is_empty());
        store
            .add_successful_pattern("q", "a", &[])
            .await
            .unwrap();
        assert_eq!(store.len(), 1);
    }
}
