//! ABOUTME: The bundle of pluggable collaborators a session needs (spec.md §6.2)
//! ABOUTME: Required vs. optional mirrors which stages have a documented fallback

use ragent_context::{HistorySummarizer, SalienceExtractor};
use ragent_core::traits::{
    CriticModel, Embedder, IntentClassifier, LazyRetriever, MemoryStore, PlanGenerator, Retriever,
    SessionStore, Synthesizer, WebSearcher,
};
use std::sync::Arc;

/// Every external dependency `Orchestrator::run_session` may call.
///
/// `retriever` and `synthesizer` are the only two without a documented
/// degrade-gracefully path in spec.md — everything else has an explicit
/// fallback (default profile, heuristic plan, force-accept, recency
/// selection, skipped memory/persistence).
pub struct Collaborators {
    pub retriever: Arc<dyn Retriever>,
    pub lazy_retriever: Option<Arc<dyn LazyRetriever>>,
    pub web_searcher: Option<Arc<dyn WebSearcher>>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub critic_model: Option<Arc<dyn CriticModel>>,
    pub intent_classifier: Option<Arc<dyn IntentClassifier>>,
    pub plan_generator: Option<Arc<dyn PlanGenerator>>,
    pub embedder: Option<Arc<dyn Embedder>>,
    pub summarizer: Arc<dyn HistorySummarizer>,
    pub salience_extractor: Arc<dyn SalienceExtractor>,
    pub session_store: Option<Arc<dyn SessionStore>>,
    pub memory_store: Option<Arc<dyn MemoryStore>>,
}
