//! ABOUTME: Collaborator interfaces consumed by the orchestrator (spec.md §6.2)
//! ABOUTME: Dynamic-tool-dispatch from the source patterns replaced by explicit async traits

use crate::error::Result;
use crate::types::{CriticReport, Reference, SummaryItem};
use async_trait::async_trait;
use serde_json::Value;

/// A single web search hit.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WebResult {
    pub title: Option<String>,
    pub url: String,
    pub snippet: String,
    pub rank: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebSearchMode {
    Summary,
    Full,
}

#[derive(Debug, Clone)]
pub struct WebSearchRequest {
    pub query: String,
    pub count: u32,
    pub mode: WebSearchMode,
}

#[derive(Debug, Clone)]
pub struct WebSearchResponse {
    pub results: Vec<WebResult>,
    pub context_text: String,
    pub tokens: u32,
    pub trimmed: bool,
}

/// Index-backed hybrid retrieval. Distinct method names for each tier so
/// the Dispatcher can fall through tiers explicitly (spec.md §4.6).
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Primary hybrid semantic search: vector + keyword + reranker.
    async fn hybrid_search(
        &self,
        query: &str,
        top_k: usize,
        reranker_threshold: f32,
    ) -> Result<Vec<Reference>>;

    /// Pure k-nearest-neighbour vector search, no reranker.
    async fn vector_search(&self, query: &str, top_k: usize) -> Result<Vec<Reference>>;
}

/// Lazy variant of [`Retriever`]: returns summary-only bodies plus
/// hydrate handles, and can later hydrate specific references.
#[async_trait]
pub trait LazyRetriever: Send + Sync {
    async fn lazy_hybrid_search(
        &self,
        query: &str,
        top_k: usize,
        reranker_threshold: f32,
    ) -> Result<(Vec<Reference>, u32)>;

    /// Replace summary bodies with full bodies for the given references.
    /// Idempotent per reference id; must not re-fetch an already-hydrated
    /// reference (spec.md §4.6, §4.9).
    async fn hydrate(&self, references: &mut [Reference]) -> Result<()>;
}

#[async_trait]
pub trait WebSearcher: Send + Sync {
    async fn web_search(&self, request: WebSearchRequest) -> Result<WebSearchResponse>;
}

#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub question: String,
    pub context: String,
    pub citations: Vec<Reference>,
    pub revision_notes: Vec<String>,
    pub model: String,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SynthesisResponse {
    pub answer: String,
    pub citations: Vec<Reference>,
}

/// LLM-backed answer synthesis. `stream` drives chunked delivery through
/// `on_token`; non-streaming callers pass a no-op sink.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(
        &self,
        request: SynthesisRequest,
        on_token: &(dyn Fn(&str) + Send + Sync),
    ) -> Result<SynthesisResponse>;
}

#[derive(Debug, Clone)]
pub struct CriticRequest {
    pub draft: String,
    pub evidence: String,
    pub question: String,
}

/// LLM-backed draft evaluation. Structured-output parse failure is
/// reported as `Ok(None)` so the caller can apply the documented
/// heuristic fallback rather than unwind (spec.md §9).
#[async_trait]
pub trait CriticModel: Send + Sync {
    async fn evaluate(&self, request: CriticRequest) -> Result<Option<CriticReport>>;
}

/// Embedding generation used by the Summary Selector and lazy hydration.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Classifier backing the Intent Router. `Ok(None)` models a parse
/// failure/timeout/disabled flag, triggering the default profile.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, recent: &[crate::types::Message]) -> Result<Option<ClassifiedIntent>>;
}

#[derive(Debug, Clone)]
pub struct ClassifiedIntent {
    pub intent: crate::types::Intent,
    pub confidence: f32,
    pub reasoning: String,
}

/// Structured-plan generator backing the Planner. `Ok(None)` models
/// malformed model output, triggering the heuristic fallback plan.
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    async fn generate_plan(
        &self,
        question: &str,
        compacted_context: &str,
        profile: &crate::types::RoutingProfile,
    ) -> Result<Option<crate::types::Plan>>;
}

/// Persistence for finalized session telemetry (spec.md §6.2, §6.4).
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save_trace(&self, trace: &crate::types::SessionTrace) -> Result<()>;
}

/// Long-lived semantic memory, outside this session's lifetime.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn recall(
        &self,
        question: &str,
        session_id: &str,
        k: usize,
        similarity_floor: f32,
    ) -> Result<Vec<SummaryItem>>;

    async fn add_successful_pattern(
        &self,
        question: &str,
        answer: &str,
        citations: &[Reference],
    ) -> Result<()>;
}

/// Per-request overrides for any of the four core operations, merged with
/// defaults in priority order `request > persisted session > config
/// default` (spec.md §6.3, §9).
#[derive(Default)]
pub struct CollaboratorOverrides {
    pub feature_flags: Value,
}
