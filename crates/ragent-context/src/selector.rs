//! ABOUTME: Summary Selector — ranks summaries by semantic similarity, falls back to recency
//! ABOUTME: Implements spec.md §4.3's Mode A / Mode B selection and statistics

use crate::error::Result;
use ragent_core::traits::Embedder;
use ragent_core::types::SummaryItem;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    Semantic,
    Recency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionStats {
    pub mode: SelectionMode,
    pub total_candidates: usize,
    pub selected_count: usize,
    pub discarded_count: usize,
    pub used_fallback: bool,
    pub max_score: Option<f32>,
    pub min_score: Option<f32>,
    pub mean_score: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct SelectionResult {
    pub selected: Vec<SummaryItem>,
    pub stats: SelectionStats,
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

/// Selects up to `k` summaries most relevant to `question`. Falls back to
/// the `k` most recent items (by `turn_range.1`) when embedding fails.
pub async fn select(
    question: &str,
    candidates: &[SummaryItem],
    k: usize,
    similarity_floor: f32,
    embedder: Option<&dyn Embedder>,
) -> Result<SelectionResult> {
    let total_candidates = candidates.len();

    let embedder = match embedder {
        Some(e) => e,
        None => return Ok(recency_fallback(candidates, k, total_candidates)),
    };

    let mut texts = vec![question.to_string()];
    texts.extend(candidates.iter().map(|c| c.text.clone()));

    let embeddings = match embedder.embed(&texts).await {
        Ok(e) if e.len() == texts.len() => e,
        _ => return Ok(recency_fallback(candidates, k, total_candidates)),
    };

    let question_vec = &embeddings[0];
    let mut scored: Vec<(usize, f32)> = candidates
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let candidate_vec = candidates[i]
                .embedding
                .as_deref()
                .unwrap_or(&embeddings[i + 1]);
            (i, cosine_similarity(question_vec, candidate_vec))
        })
        .collect();

    let above_floor: Vec<(usize, f32)> = scored
        .iter()
        .copied()
        .filter(|(_, score)| *score >= similarity_floor)
        .collect();
    scored = above_floor;

    // Sort descending by score; tie-break by recency (later turn_range wins).
    scored.sort_by(|(i_a, score_a), (i_b, score_b)| {
        score_b
            .partial_cmp(score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| candidates[*i_b].turn_range.1.cmp(&candidates[*i_a].turn_range.1))
    });

    let selected_indices: Vec<usize> = scored.iter().take(k).map(|(i, _)| *i).collect();
    let scores: Vec<f32> = scored.iter().take(k).map(|(_, s)| *s).collect();

    let stats = SelectionStats {
        mode: SelectionMode::Semantic,
        total_candidates,
        selected_count: selected_indices.len(),
        discarded_count: total_candidates - selected_indices.len(),
        used_fallback: false,
        max_score: scores.iter().cloned().fold(None, |acc, s| Some(acc.map_or(s, |m: f32| m.max(s)))),
        min_score: scores.iter().cloned().fold(None, |acc, s| Some(acc.map_or(s, |m: f32| m.min(s)))),
        mean_score: if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f32>() / scores.len() as f32)
        },
    };

    Ok(SelectionResult {
        selected: selected_indices.into_iter().map(|i| candidates[i].clone()).collect(),
        stats,
    })
}

fn recency_fallback(candidates: &[SummaryItem], k: usize, total_candidates: usize) -> SelectionResult {
    let mut ordered: Vec<&SummaryItem> = candidates.iter().collect();
    ordered.sort_by(|a, b| b.turn_range.1.cmp(&a.turn_range.1));
    let selected: Vec<SummaryItem> = ordered.into_iter().take(k).cloned().collect();
    let selected_count = selected.len();
    SelectionResult {
        selected,
        stats: SelectionStats {
            mode: SelectionMode::Recency,
            total_candidates,
            selected_count,
            discarded_count: total_candidates - selected_count,
            used_fallback: true,
            max_score: None,
            min_score: None,
            mean_score: None,
        },
    }
}
