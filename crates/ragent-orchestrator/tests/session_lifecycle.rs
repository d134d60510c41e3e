//! ABOUTME: End-to-end Orchestrator::run_session scenarios from spec.md §8
//! ABOUTME: Hand-rolled collaborator mocks; no index or model is real here

use async_trait::async_trait;
use ragent_config::OrchestratorConfig;
use ragent_context::{ConcatSummarizer, KeywordSalienceExtractor};
use ragent_core::error::Result;
use ragent_core::traits::{
    ClassifiedIntent, CriticModel, CriticRequest, IntentClassifier, LazyRetriever, Retriever,
    SynthesisRequest, SynthesisResponse, Synthesizer,
};
use ragent_core::types::{
    ChatRequest, CriticAction, CriticReport, Intent, Message, OrchestratorEvent, PlanAction,
    Reference, SessionMode,
};
use ragent_events::EventEmitter;
use ragent_orchestrator::{Collaborators, Orchestrator};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn reference(id: &str, body: &str) -> Reference {
    Reference {
        id: id.into(),
        title: None,
        body: body.into(),
        url: None,
        page: None,
        score: Some(0.9),
        source: None,
        summary: None,
        hydrate: None,
    }
}

struct OneDocRetriever;

#[async_trait]
impl Retriever for OneDocRetriever {
    async fn hybrid_search(&self, query: &str, top_k: usize, _t: f32) -> Result<Vec<Reference>> {
        self.vector_search(query, top_k).await
    }

    async fn vector_search(&self, _query: &str, _top_k: usize) -> Result<Vec<Reference>> {
        Ok(vec![reference("r1", "Rust ownership prevents data races at compile time.")])
    }
}

/// Always answers by citing the first reference once.
struct CitingSynthesizer;

#[async_trait]
impl Synthesizer for CitingSynthesizer {
    async fn synthesize(
        &self,
        request: SynthesisRequest,
        on_token: &(dyn Fn(&str) + Send + Sync),
    ) -> Result<SynthesisResponse> {
        let answer = format!("{} [1]", request.citations[0].effective_body());
        on_token(&answer);
        Ok(SynthesisResponse { answer, citations: request.citations })
    }
}

fn base_collaborators() -> Collaborators {
    Collaborators {
        retriever: Arc::new(OneDocRetriever),
        lazy_retriever: None,
        web_searcher: None,
        synthesizer: Arc::new(CitingSynthesizer),
        critic_model: None,
        intent_classifier: None,
        plan_generator: None,
        embedder: None,
        summarizer: Arc::new(ConcatSummarizer),
        salience_extractor: Arc::new(KeywordSalienceExtractor),
        session_store: None,
        memory_store: None,
    }
}

fn request(message: &str) -> ChatRequest {
    ChatRequest {
        messages: vec![Message::user(message)],
        session_id: Some("test-session".into()),
        feature_overrides: Default::default(),
    }
}

async fn drain(mut receiver: ragent_events::EventReceiver) -> Vec<OrchestratorEvent> {
    let mut events = Vec::new();
    while let Some(event) = receiver.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn high_confidence_vector_path_accepts_on_first_synthesis() {
    let mut collaborators = base_collaborators();
    collaborators.critic_model = Some(Arc::new(AlwaysAcceptingCritic));
    let orchestrator = Orchestrator::new(collaborators, OrchestratorConfig::default());
    let (emitter, receiver) = EventEmitter::channel(32);
    let handle = tokio::spawn(drain(receiver));

    let response = orchestrator
        .run_session(request("How does Rust prevent data races?"), SessionMode::Sync, emitter, CancellationToken::new())
        .await
        .expect("session should complete");

    assert!(response.answer.contains("[1]"));
    assert_eq!(response.citations.len(), 1);
    assert_eq!(response.metadata.critique_history.len(), 1);
    assert_eq!(response.metadata.critique_history[0].action, CriticAction::Accept);

    let events = handle.await.unwrap();
    let names: Vec<&str> = events.iter().map(OrchestratorEvent::name).collect();
    assert!(names.contains(&"citations"));
    assert!(names.contains(&"complete"));
    assert!(names.contains(&"done"));
    let citations_at = names.iter().position(|n| *n == "citations").unwrap();
    let complete_at = names.iter().position(|n| *n == "complete").unwrap();
    assert!(citations_at < complete_at, "citations must be emitted before synthesis completes");
}

struct AlwaysAcceptingCritic;

#[async_trait]
impl CriticModel for AlwaysAcceptingCritic {
    async fn evaluate(&self, _request: CriticRequest) -> Result<Option<CriticReport>> {
        Ok(Some(CriticReport {
            grounded: true,
            coverage: 0.95,
            issues: vec![],
            action: CriticAction::Accept,
            forced: false,
        }))
    }
}

/// Critic rejects the first draft once, then accepts the revision.
struct OnceRejectingCritic {
    calls: AtomicU32,
}

#[async_trait]
impl CriticModel for OnceRejectingCritic {
    async fn evaluate(&self, _request: CriticRequest) -> Result<Option<CriticReport>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            Ok(Some(CriticReport {
                grounded: false,
                coverage: 0.2,
                issues: vec!["missing detail on borrow checker".into()],
                action: CriticAction::Revise,
                forced: false,
            }))
        } else {
            Ok(Some(CriticReport {
                grounded: true,
                coverage: 0.95,
                issues: vec![],
                action: CriticAction::Accept,
                forced: false,
            }))
        }
    }
}

#[tokio::test]
async fn critic_revise_then_accept_runs_two_synthesis_attempts() {
    let mut collaborators = base_collaborators();
    collaborators.critic_model = Some(Arc::new(OnceRejectingCritic { calls: AtomicU32::new(0) }));
    let orchestrator = Orchestrator::new(collaborators, OrchestratorConfig::default());
    let (emitter, receiver) = EventEmitter::channel(32);
    let handle = tokio::spawn(drain(receiver));

    let response = orchestrator
        .run_session(request("Explain ownership."), SessionMode::Sync, emitter, CancellationToken::new())
        .await
        .expect("session should complete after one revision");

    assert_eq!(response.metadata.critique_history.len(), 2);
    assert_eq!(response.metadata.critique_history[0].action, CriticAction::Revise);
    assert_eq!(response.metadata.critique_history[1].action, CriticAction::Accept);
    assert!(!response.metadata.critique_history[1].forced);

    let events = handle.await.unwrap();
    let critique_count = events.iter().filter(|e| e.name() == "critique").count();
    assert_eq!(critique_count, 2);
}

/// Always rejects; the orchestrator must force-accept once the retry
/// ceiling (`critic_max_retries`) is reached rather than loop forever.
struct AlwaysRejectingCritic;

#[async_trait]
impl CriticModel for AlwaysRejectingCritic {
    async fn evaluate(&self, _request: CriticRequest) -> Result<Option<CriticReport>> {
        Ok(Some(CriticReport {
            grounded: false,
            coverage: 0.1,
            issues: vec!["still missing coverage".into()],
            action: CriticAction::Revise,
            forced: false,
        }))
    }
}

#[tokio::test]
async fn retry_ceiling_forces_accept_instead_of_looping_forever() {
    let mut config = OrchestratorConfig::default();
    config.critic_max_retries = 2;
    let mut collaborators = base_collaborators();
    collaborators.critic_model = Some(Arc::new(AlwaysRejectingCritic));
    let orchestrator = Orchestrator::new(collaborators, config);
    let (emitter, receiver) = EventEmitter::channel(32);
    let handle = tokio::spawn(drain(receiver));

    let response = orchestrator
        .run_session(request("Explain the borrow checker."), SessionMode::Sync, emitter, CancellationToken::new())
        .await
        .expect("ceiling must force an accept, not an error");

    let history = &response.metadata.critique_history;
    assert_eq!(history.len(), 3, "attempts 0, 1, and the ceiling attempt 2");
    assert_eq!(history.last().unwrap().action, CriticAction::Accept);
    assert!(history.last().unwrap().forced, "last attempt must be force-accepted at the ceiling");

    drop(handle);
}

/// No evidence is cited by the draft: the Critic must not be asked to
/// assert groundedness over nothing, so it must never even run.
struct PanicIfCalledCritic;

#[async_trait]
impl CriticModel for PanicIfCalledCritic {
    async fn evaluate(&self, _request: CriticRequest) -> Result<Option<CriticReport>> {
        panic!("critic must not be invoked when cited evidence is empty");
    }
}

struct UncitedSynthesizer;

#[async_trait]
impl Synthesizer for UncitedSynthesizer {
    async fn synthesize(
        &self,
        request: SynthesisRequest,
        on_token: &(dyn Fn(&str) + Send + Sync),
    ) -> Result<SynthesisResponse> {
        let answer = "I don't have enough information.".to_string();
        on_token(&answer);
        Ok(SynthesisResponse { answer, citations: request.citations })
    }
}

#[tokio::test]
async fn empty_evidence_short_circuits_to_vacuous_accept_without_calling_critic() {
    let mut collaborators = base_collaborators();
    collaborators.synthesizer = Arc::new(UncitedSynthesizer);
    collaborators.critic_model = Some(Arc::new(PanicIfCalledCritic));
    let orchestrator = Orchestrator::new(collaborators, OrchestratorConfig::default());
    let (emitter, receiver) = EventEmitter::channel(32);
    let handle = tokio::spawn(drain(receiver));

    let response = orchestrator
        .run_session(request("Anything?"), SessionMode::Sync, emitter, CancellationToken::new())
        .await
        .expect("session should still complete");

    assert_eq!(response.metadata.critique_history.len(), 1);
    assert_eq!(response.metadata.critique_history[0].action, CriticAction::Accept);
    assert!(!response.metadata.critique_history[0].forced);
    drop(handle);
}

#[tokio::test]
async fn streaming_mode_emits_tokens_before_complete() {
    let mut collaborators = base_collaborators();
    collaborators.critic_model = Some(Arc::new(AlwaysAcceptingCritic));
    let orchestrator = Orchestrator::new(collaborators, OrchestratorConfig::default());
    let (emitter, receiver) = EventEmitter::channel(64);
    let handle = tokio::spawn(drain(receiver));

    let response = orchestrator
        .run_session(request("Stream this please."), SessionMode::Stream, emitter, CancellationToken::new())
        .await
        .expect("streaming session should complete");

    assert!(response.answer.contains("[1]"));
    let events = handle.await.unwrap();
    let names: Vec<&str> = events.iter().map(OrchestratorEvent::name).collect();
    let tokens_at = names.iter().position(|n| *n == "tokens");
    let complete_at = names.iter().position(|n| *n == "complete").unwrap();
    assert!(tokens_at.is_some(), "stream mode must emit at least one tokens event");
    assert!(tokens_at.unwrap() < complete_at);
}

/// Classifies every turn as Faq, which the default routing table maps to
/// a vector-only profile -- the only strategy `escalation()` can upgrade.
/// Always cites a reference index that does not exist.
struct OverCitingSynthesizer;

#[async_trait]
impl Synthesizer for OverCitingSynthesizer {
    async fn synthesize(
        &self,
        request: SynthesisRequest,
        on_token: &(dyn Fn(&str) + Send + Sync),
    ) -> Result<SynthesisResponse> {
        let answer = format!("{} [2].", request.citations[0].effective_body());
        on_token(&answer);
        Ok(SynthesisResponse { answer, citations: request.citations })
    }
}

#[tokio::test]
async fn out_of_range_citation_revises_then_is_stripped_at_the_ceiling() {
    let mut config = OrchestratorConfig::default();
    config.critic_max_retries = 1;
    let mut collaborators = base_collaborators();
    collaborators.synthesizer = Arc::new(OverCitingSynthesizer);
    let orchestrator = Orchestrator::new(collaborators, config);
    let (emitter, receiver) = EventEmitter::channel(32);
    let handle = tokio::spawn(drain(receiver));

    let response = orchestrator
        .run_session(request("What does ownership prevent?"), SessionMode::Sync, emitter, CancellationToken::new())
        .await
        .expect("an out-of-range citation must not be session-fatal");

    let history = &response.metadata.critique_history;
    assert_eq!(history.len(), 2, "attempt 0 revises, attempt 1 is the ceiling");
    assert_eq!(history[0].action, CriticAction::Revise);
    assert_eq!(history[1].action, CriticAction::Accept);
    assert!(history[1].forced);
    assert!(!response.answer.contains("[2]"), "the invalid marker must be stripped: {}", response.answer);

    drop(handle);
}

struct FaqClassifier;

#[async_trait]
impl IntentClassifier for FaqClassifier {
    async fn classify(&self, _recent: &[Message]) -> Result<Option<ClassifiedIntent>> {
        Ok(Some(ClassifiedIntent {
            intent: Intent::Faq,
            confidence: 0.9,
            reasoning: "looks like a short factual question".into(),
        }))
    }
}

#[tokio::test]
async fn low_confidence_heuristic_plan_escalates_to_dual_retrieval() {
    let mut collaborators = base_collaborators();
    collaborators.intent_classifier = Some(Arc::new(FaqClassifier));
    collaborators.critic_model = Some(Arc::new(AlwaysAcceptingCritic));
    // No plan_generator is configured, so the planner always returns the
    // confidence-0.4 heuristic plan, which sits below both thresholds for
    // a vector-only profile.
    let orchestrator = Orchestrator::new(collaborators, OrchestratorConfig::default());
    let (emitter, receiver) = EventEmitter::channel(32);
    let handle = tokio::spawn(drain(receiver));

    let response = orchestrator
        .run_session(request("What is Rust?"), SessionMode::Sync, emitter, CancellationToken::new())
        .await
        .expect("session should complete");

    assert_eq!(response.metadata.route.profile.retriever_strategy, ragent_core::types::RetrieverStrategy::Vector);
    assert_eq!(response.metadata.plan.first_action(), Some(PlanAction::VectorSearch));
    assert!((response.metadata.plan.confidence - 0.4).abs() < f32::EPSILON);

    let events = handle.await.unwrap();
    assert!(
        events.iter().any(|e| matches!(e, OrchestratorEvent::Activity(step) if step.kind == "confidence_escalation")),
        "low-confidence vector plan must emit a confidence_escalation activity step"
    );
}

struct MockLazyRetriever;

#[async_trait]
impl LazyRetriever for MockLazyRetriever {
    async fn lazy_hybrid_search(&self, _query: &str, _top_k: usize, _t: f32) -> Result<(Vec<Reference>, u32)> {
        Ok((
            vec![Reference {
                id: "lr1".into(),
                title: None,
                body: String::new(),
                url: None,
                page: None,
                score: Some(0.9),
                source: None,
                summary: Some("Ownership prevents data races (summary only).".into()),
                hydrate: None,
            }],
            12,
        ))
    }

    async fn hydrate(&self, references: &mut [Reference]) -> Result<()> {
        for r in references.iter_mut() {
            r.body = "Full hydrated body: the borrow checker forbids simultaneous mutable aliasing.".into();
        }
        Ok(())
    }
}

#[tokio::test]
async fn lazy_hydration_runs_before_the_revision_that_needs_full_content() {
    let mut config = OrchestratorConfig::default();
    config.enable_lazy_retrieval = true;
    let mut collaborators = base_collaborators();
    collaborators.lazy_retriever = Some(Arc::new(MockLazyRetriever));
    collaborators.critic_model = Some(Arc::new(OnceRejectingCritic { calls: AtomicU32::new(0) }));
    let orchestrator = Orchestrator::new(collaborators, config);
    let (emitter, receiver) = EventEmitter::channel(32);
    let handle = tokio::spawn(drain(receiver));

    let response = orchestrator
        .run_session(request("How does Rust prevent races?"), SessionMode::Sync, emitter, CancellationToken::new())
        .await
        .expect("session should complete after hydrating and revising");

    assert_eq!(response.metadata.critique_history.len(), 2);
    assert!(response.citations[0].body.contains("Full hydrated body"));
    assert!(response.answer.contains("Full hydrated body"));

    let events = handle.await.unwrap();
    assert!(
        events.iter().any(|e| matches!(e, OrchestratorEvent::Activity(step) if step.kind == "hydrate_cited")),
        "revision after a summary-only citation must hydrate before re-synthesizing"
    );
}
