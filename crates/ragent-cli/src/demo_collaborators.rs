//! ABOUTME: Dependency-free Retriever/Synthesizer stand-ins for the CLI demo
//! ABOUTME: No real index or model is wired up; these just make the pipeline runnable end to end

use async_trait::async_trait;
use ragent_core::error::Result;
use ragent_core::traits::{Retriever, SynthesisRequest, SynthesisResponse, Synthesizer};
use ragent_core::types::Reference;

/// Returns a single canned reference built from the query itself, so the
/// rest of the pipeline (citations, critique, hydration checks) has
/// something real to operate over without a configured index.
pub struct EchoRetriever;

#[async_trait]
impl Retriever for EchoRetriever {
    async fn hybrid_search(&self, query: &str, top_k: usize, _reranker_threshold: f32) -> Result<Vec<Reference>> {
        self.vector_search(query, top_k).await
    }

    async fn vector_search(&self, query: &str, top_k: usize) -> Result<Vec<Reference>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let body = format!(
            "No retrieval backend is configured for this demo. The question was: \"{query}\"."
        );
        let reference = Reference {
            id: "demo-1".into(),
            title: Some("Demo placeholder document".into()),
            body,
            url: None,
            page: None,
            score: Some(1.0),
            source: None,
            summary: None,
            hydrate: None,
        };
        Ok(vec![reference])
    }
}

/// Answers by quoting the first reference's body verbatim with a `[1]`
/// marker, so `validate_citations`/`cited_bodies` have real content to
/// work with. Not an LLM — just enough to exercise the full pipeline.
pub struct EchoSynthesizer;

#[async_trait]
impl Synthesizer for EchoSynthesizer {
    async fn synthesize(
        &self,
        request: SynthesisRequest,
        on_token: &(dyn Fn(&str) + Send + Sync),
    ) -> Result<SynthesisResponse> {
        let answer = if request.citations.is_empty() {
            "I don't have enough information.".to_string()
        } else {
            format!("{} [1]", request.citations[0].effective_body())
        };
        for word in answer.split_inclusive(' ') {
            on_token(word);
        }
        Ok(SynthesisResponse {
            answer,
            citations: request.citations,
        })
    }
}
