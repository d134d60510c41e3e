//! ABOUTME: Orchestrator — runs one session through every stage to completion
//! ABOUTME: Implements spec.md §4.9's pseudocode contract and retry-loop invariants

use crate::collaborators::Collaborators;
use crate::retrying::{
    RetryContext, RetryingCriticModel, RetryingEmbedder, RetryingIntentClassifier,
    RetryingMemoryStore, RetryingPlanGenerator, RetryingSessionStore,
};
use ragent_config::{FeatureOverrides, OrchestratorConfig};
use ragent_context::{
    compact, select, CompactionCaps, HeuristicEstimator, SelectionMode, TokenEstimator,
};
use ragent_core::cache::{EmbeddingCache, RetryTelemetryLog};
use ragent_core::error::{CoreError, Result};
use ragent_core::retry::{with_retry, RetryPolicy};
use ragent_core::traits::{CriticRequest, Embedder, SynthesisRequest, SynthesisResponse, WebSearchMode};
use ragent_core::types::{
    ActivityStep, ChatRequest, ChatResponse, ChatResponseMetadata, CritiqueAttempt, DoneStatus,
    Message, OrchestratorEvent, PlanAction, Role, SessionMode, SessionTrace,
};
use ragent_events::EventEmitter;
use ragent_retrieval::{DispatchParams, Dispatcher};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Cosine-similarity floor used when reranking compacted summary items
/// against the question (spec.md §4.3 names the parameter but leaves its
/// value to the implementer; 0.15 keeps loosely-related windows out
/// without discarding anything a keyword match would have kept).
const SUMMARY_SIMILARITY_FLOOR: f32 = 0.15;

pub struct Orchestrator {
    collaborators: Collaborators,
    config: OrchestratorConfig,
    dispatcher: Dispatcher,
    embedding_cache: Arc<EmbeddingCache>,
    retry_log: Arc<RetryTelemetryLog>,
}

impl Orchestrator {
    pub fn new(collaborators: Collaborators, config: OrchestratorConfig) -> Self {
        let retry_log = RetryTelemetryLog::new(config.retry_log_capacity);
        let embedding_cache = EmbeddingCache::new(config.embedding_cache_capacity);
        let dispatcher = Dispatcher::new(
            Arc::clone(&collaborators.retriever),
            collaborators.lazy_retriever.clone(),
            collaborators.web_searcher.clone(),
            config.retry_policy.into(),
            Arc::clone(&retry_log),
        );
        Self {
            collaborators,
            config,
            dispatcher,
            embedding_cache,
            retry_log,
        }
    }

    /// Runs one request to completion, emitting every event on `emitter`
    /// in stage order and returning the final response. Returns `Err` only
    /// for session-fatal conditions (spec.md §7); every other failure is
    /// absorbed into `activity`/`retrievalDiagnostics` and the session
    /// still completes.
    pub async fn run_session(
        &self,
        request: ChatRequest,
        mode: SessionMode,
        emitter: EventEmitter,
        cancel: CancellationToken,
    ) -> Result<ChatResponse> {
        let session_id = request
            .session_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut trace = SessionTrace::new(session_id.clone(), mode);

        match self.run_inner(request, mode, &session_id, &emitter, &cancel, &mut trace).await {
            Ok(response) => {
                trace.completed_at = Some(chrono::Utc::now());
                self.finish(&emitter, trace, DoneStatus::Complete).await;
                Ok(response)
            }
            Err(err) => {
                trace.completed_at = Some(chrono::Utc::now());
                trace.error = Some(err.to_string());
                let _ = emitter
                    .emit(OrchestratorEvent::Error {
                        message: err.to_string(),
                        code: error_code(&err),
                    })
                    .await;
                self.finish(&emitter, trace, DoneStatus::Error).await;
                Err(err)
            }
        }
    }

    async fn finish(&self, emitter: &EventEmitter, trace: SessionTrace, status: DoneStatus) {
        let _ = emitter.emit(OrchestratorEvent::Trace(trace.clone())).await;
        let _ = emitter.emit(OrchestratorEvent::Done { status }).await;

        if let Some(store) = &self.collaborators.session_store {
            let cancel = NOOP_CANCEL.get_or_init(CancellationToken::new);
            let wrapped = RetryingSessionStore {
                inner: Arc::clone(store),
                ctx: self.retry_ctx(cancel),
            };
            if let Err(err) = ragent_core::traits::SessionStore::save_trace(&wrapped, &trace).await {
                warn!(%err, "failed to persist session trace");
            }
        }
    }

    fn retry_ctx<'a>(&'a self, cancel: &'a CancellationToken) -> RetryContext<'a> {
        RetryContext {
            policy: self.config.retry_policy.into(),
            cancel,
            log: &self.retry_log,
        }
    }

    async fn run_inner(
        &self,
        request: ChatRequest,
        mode: SessionMode,
        session_id: &str,
        emitter: &EventEmitter,
        cancel: &CancellationToken,
        trace: &mut SessionTrace,
    ) -> Result<ChatResponse> {
        let config = FeatureOverrides(request.feature_overrides.clone()).resolve(&self.config, None);
        let question = last_user_message(&request.messages);

        // --- Route ---
        emitter.emit(OrchestratorEvent::Status { stage: "route".into() }).await.ok();
        let classifier = self.collaborators.intent_classifier.as_ref().map(|c| RetryingIntentClassifier {
            inner: Arc::clone(c),
            ctx: self.retry_ctx(cancel),
        });
        let route_decision = ragent_router::route(
            &request.messages,
            config.enable_intent_routing,
            classifier.as_ref().map(|c| c as &dyn ragent_core::traits::IntentClassifier),
            |intent| config.profile_for(intent),
            ragent_config::RoutingTable::default_profile(),
        )
        .await;
        emitter.emit(OrchestratorEvent::Route(route_decision.clone())).await.ok();
        trace.route = Some(route_decision.clone());
        let model_id = route_decision.profile.model_id.clone();

        // --- Compact ---
        emitter.emit(OrchestratorEvent::Status { stage: "context".into() }).await.ok();
        let prior_summaries = if config.enable_semantic_memory {
            match &self.collaborators.memory_store {
                Some(store) => {
                    let wrapped = RetryingMemoryStore {
                        inner: Arc::clone(store),
                        ctx: self.retry_ctx(cancel),
                    };
                    match ragent_core::traits::MemoryStore::recall(
                        &wrapped,
                        &question,
                        session_id,
                        config.context_max_summary_items as usize,
                        SUMMARY_SIMILARITY_FLOOR,
                    )
                    .await
                    {
                        Ok(items) => items,
                        Err(err) => {
                            warn!(%err, "semantic memory recall failed");
                            trace.activity.push(ActivityStep::new(
                                "memory_recall_failed",
                                format!("semantic memory recall failed: {err}"),
                            ));
                            Vec::new()
                        }
                    }
                }
                None => Vec::new(),
            }
        } else {
            Vec::new()
        };

        let caps = CompactionCaps {
            max_recent_turns: config.context_max_recent_turns as usize,
            max_summary_items: config.context_max_summary_items as usize,
            max_salience_items: config.context_max_salience_items as usize,
            history_cap: config.context_history_token_cap,
            summary_cap: config.context_summary_token_cap,
            salience_cap: config.context_salience_token_cap,
        };
        let mut compacted = compact(
            &request.messages,
            caps,
            self.collaborators.summarizer.as_ref(),
            self.collaborators.salience_extractor.as_ref(),
            &prior_summaries,
            &[],
            &model_id,
            &HeuristicEstimator,
        )
        .await
        .map_err(|err| CoreError::Internal(err.to_string()))?;

        if config.enable_semantic_summary && !compacted.summary_items.is_empty() {
            let embedder = self.collaborators.embedder.as_ref().map(|e| {
                let retrying = RetryingEmbedder {
                    inner: Arc::clone(e),
                    ctx: self.retry_ctx(cancel),
                };
                CachingEmbedder {
                    inner: retrying,
                    cache: Arc::clone(&self.embedding_cache),
                }
            });
            let selection = select(
                &question,
                &compacted.summary_items,
                caps.max_summary_items,
                SUMMARY_SIMILARITY_FLOOR,
                embedder.as_ref().map(|e| e as &dyn Embedder),
            )
            .await
            .map_err(|err| CoreError::Internal(err.to_string()))?;
            if selection.stats.mode == SelectionMode::Semantic || selection.stats.used_fallback {
                let refined_text = selection
                    .selected
                    .iter()
                    .map(|s| s.text.clone())
                    .collect::<Vec<_>>()
                    .join("\n");
                compacted.summary_text =
                    ragent_context::truncate_to_budget(&refined_text, caps.summary_cap, &model_id, &HeuristicEstimator);
                compacted.summary_items = selection.selected;
                compacted.budget.summary_tokens = HeuristicEstimator.estimate(&compacted.summary_text, &model_id);
            }
        }

        emitter
            .emit(OrchestratorEvent::Context {
                history: compacted.history_text.clone(),
                summary: compacted.summary_text.clone(),
                salience: compacted.salience_text.clone(),
                budget: compacted.budget,
            })
            .await
            .ok();
        trace.context_budget = Some(compacted.budget);
        let compacted_context = assemble_sections(&[
            &compacted.history_text,
            &compacted.summary_text,
            &compacted.salience_text,
        ]);

        // --- Plan ---
        emitter.emit(OrchestratorEvent::Status { stage: "plan".into() }).await.ok();
        let generator = self.collaborators.plan_generator.as_ref().map(|g| RetryingPlanGenerator {
            inner: Arc::clone(g),
            ctx: self.retry_ctx(cancel),
        });
        let plan = ragent_planner::plan(
            &question,
            &compacted_context,
            &route_decision.profile,
            generator.as_ref().map(|g| g as &dyn ragent_core::traits::PlanGenerator),
        )
        .await;
        emitter
            .emit(OrchestratorEvent::Plan {
                confidence: plan.confidence,
                steps: plan.steps.clone(),
            })
            .await
            .ok();
        trace.plan = Some(plan.clone());

        // --- Escalate ---
        let escalation = ragent_planner::escalation(
            &plan,
            &route_decision.profile,
            config.confidence_escalation,
            config.confidence_dual,
        );
        let want_web = escalation.upgrade_to_hybrid_web || escalation.force_dual_retrieval;
        if want_web {
            let step = ActivityStep::new(
                "confidence_escalation",
                format!(
                    "plan confidence {:.2} triggered escalation (upgrade_to_hybrid_web={}, force_dual_retrieval={})",
                    plan.confidence, escalation.upgrade_to_hybrid_web, escalation.force_dual_retrieval
                ),
            );
            emitter.emit(OrchestratorEvent::Activity(step.clone())).await.ok();
            trace.activity.push(step);
        }

        // --- Dispatch ---
        emitter.emit(OrchestratorEvent::Status { stage: "dispatch".into() }).await.ok();
        let query = plan
            .steps
            .first()
            .and_then(|s| s.query.clone())
            .unwrap_or_else(|| question.clone());
        let action = plan.first_action().unwrap_or(PlanAction::VectorSearch);
        let dispatch_params = DispatchParams {
            top_k: config.rag_top_k as usize,
            reranker_threshold: config.reranker_threshold,
            fallback_reranker_threshold: config.fallback_reranker_threshold,
            retrieval_min_docs: config.retrieval_min_docs as usize,
            web_context_max_tokens: config.web_context_max_tokens,
            web_results_max: config.web_results_max,
            web_mode: match config.web_search_mode {
                ragent_config::WebSearchModeConfig::Summary => WebSearchMode::Summary,
                ragent_config::WebSearchModeConfig::Full => WebSearchMode::Full,
            },
            lazy_enabled: config.enable_lazy_retrieval,
        };
        let dispatch_result = self
            .dispatcher
            .run(&query, action, dispatch_params, want_web, cancel)
            .await?;
        for step in &dispatch_result.activity {
            emitter.emit(OrchestratorEvent::Activity(step.clone())).await.ok();
        }
        trace.activity.extend(dispatch_result.activity.clone());
        trace.retrieval_diagnostics = Some(dispatch_result.diagnostics.clone());
        emitter
            .emit(OrchestratorEvent::Tool {
                name: "retrieval_dispatch".into(),
                args: serde_json::json!({ "query": query, "action": format!("{action:?}") }),
                result_summary: format!(
                    "{} references via {}",
                    dispatch_result.references.len(),
                    dispatch_result.diagnostics.tier_reached
                ),
            })
            .await
            .ok();

        // Citations are ground truth from this point on: fixed identity
        // and order for the rest of the session (spec.md §4.6, §4.9).
        let citations = dispatch_result.references;
        emitter.emit(OrchestratorEvent::Citations(citations.clone())).await.ok();

        // --- Synthesize ---
        emitter.emit(OrchestratorEvent::Status { stage: "synthesize".into() }).await.ok();
        let request0 = ragent_synthesis::build_request(
            &question,
            &dispatch_result.context_text,
            citations.clone(),
            Vec::new(),
            &model_id,
            route_decision.profile.max_output_tokens,
            None,
        );
        let mut draft = self.run_synthesis(mode, emitter, request0, cancel).await?.answer;

        // --- Critique loop ---
        let mut references = citations;
        let mut critique_history: Vec<CritiqueAttempt> = Vec::new();
        let mut hydrations_performed = 0u32;
        let mut attempt = 0u32;
        loop {
            let is_ceiling = attempt == config.critic_max_retries;

            if let Err(CoreError::InvalidCitation { index, max }) =
                ragent_synthesis::validate_citations(&draft, &references)
            {
                if is_ceiling {
                    let (cleaned, removed) = ragent_synthesis::strip_invalid_citations(&draft, &references);
                    draft = cleaned;
                    warn!(%index, %max, ?removed, "stripped invalid citation marker(s) at retry ceiling");
                    let record = CritiqueAttempt {
                        attempt,
                        coverage: 1.0,
                        grounded: true,
                        action: ragent_core::types::CriticAction::Accept,
                        issues: vec![format!("citation [{index}] missing (max {max}); marker removed")],
                        used_full_content: hydrations_performed > 0,
                        forced: true,
                    };
                    emitter.emit(OrchestratorEvent::Critique(record.clone())).await.ok();
                    critique_history.push(record);
                    break;
                }

                let record = CritiqueAttempt {
                    attempt,
                    coverage: 0.0,
                    grounded: false,
                    action: ragent_core::types::CriticAction::Revise,
                    issues: vec![format!("citation [{index}] is out of range (max {max}); revise without it")],
                    used_full_content: hydrations_performed > 0,
                    forced: false,
                };
                emitter.emit(OrchestratorEvent::Critique(record.clone())).await.ok();
                critique_history.push(record.clone());

                let revise_request = ragent_synthesis::build_request(
                    &question,
                    &dispatch_result.context_text,
                    references.clone(),
                    record.issues.clone(),
                    &model_id,
                    route_decision.profile.max_output_tokens,
                    None,
                );
                draft = self.run_synthesis(mode, emitter, revise_request, cancel).await?.answer;
                attempt += 1;
                continue;
            }

            let used_full_content = hydrations_performed > 0;
            let evidence = ragent_synthesis::cited_bodies(&draft, &references);
            let report = if evidence.is_empty() {
                // The Critic must not assert groundedness over zero
                // evidence; this bypasses the model entirely rather than
                // asking it to judge an empty context (spec.md §4.6).
                ragent_core::types::CriticReport {
                    grounded: true,
                    coverage: 1.0,
                    issues: Vec::new(),
                    action: ragent_core::types::CriticAction::Accept,
                    forced: false,
                }
            } else {
                let critic_model = self.collaborators.critic_model.as_ref().map(|m| RetryingCriticModel {
                    inner: Arc::clone(m),
                    ctx: self.retry_ctx(cancel),
                });
                ragent_critic::evaluate(
                    critic_model.as_ref().map(|m| m as &dyn ragent_core::traits::CriticModel),
                    CriticRequest {
                        draft: draft.clone(),
                        evidence,
                        question: question.clone(),
                    },
                    config.critic_threshold,
                    attempt == config.critic_max_retries,
                )
                .await
            };

            let mut report = report;
            if report.action != ragent_core::types::CriticAction::Accept && is_ceiling {
                report.forced = true;
                report.action = ragent_core::types::CriticAction::Accept;
            }

            let record = CritiqueAttempt {
                attempt,
                coverage: report.coverage,
                grounded: report.grounded,
                action: report.action,
                issues: report.issues.clone(),
                used_full_content,
                forced: report.forced,
            };
            emitter.emit(OrchestratorEvent::Critique(record.clone())).await.ok();
            critique_history.push(record);

            if report.action == ragent_core::types::CriticAction::Accept || is_ceiling {
                break;
            }

            if config.enable_lazy_retrieval {
                let cited_ids = ragent_synthesis::extract_citation_markers(&draft)
                    .into_iter()
                    .filter(|&k| k >= 1 && k <= references.len())
                    .map(|k| references[k - 1].id.clone())
                    .collect::<std::collections::HashSet<_>>();
                let any_summary_only = references
                    .iter()
                    .any(|r| cited_ids.contains(&r.id) && r.is_summary_only());
                if any_summary_only {
                    self.dispatcher
                        .hydrate(&mut references, |r| cited_ids.contains(&r.id), cancel)
                        .await?;
                    hydrations_performed += 1;
                    let step = ActivityStep::new(
                        "hydrate_cited",
                        format!("hydrated {} cited reference(s) before revision", cited_ids.len()),
                    );
                    emitter.emit(OrchestratorEvent::Activity(step.clone())).await.ok();
                    trace.activity.push(step);
                }
            }

            let revise_request = ragent_synthesis::build_request(
                &question,
                &dispatch_result.context_text,
                references.clone(),
                report.issues.clone(),
                &model_id,
                route_decision.profile.max_output_tokens,
                None,
            );
            draft = self.run_synthesis(mode, emitter, revise_request, cancel).await?.answer;
            attempt += 1;
        }

        // Every loop exit path above validated (and, at the ceiling, cleaned)
        // `draft`'s citation markers before breaking, so `draft` here is
        // always citation-valid.
        trace.critique_history = critique_history.clone();

        if config.enable_semantic_memory {
            if let Some(store) = &self.collaborators.memory_store {
                let wrapped = RetryingMemoryStore {
                    inner: Arc::clone(store),
                    ctx: self.retry_ctx(cancel),
                };
                if let Err(err) =
                    ragent_core::traits::MemoryStore::add_successful_pattern(&wrapped, &question, &draft, &references).await
                {
                    warn!(%err, "failed to record successful pattern in semantic memory");
                }
            }
        }

        emitter
            .emit(OrchestratorEvent::Complete {
                answer: draft.clone(),
                citations: references.clone(),
            })
            .await
            .ok();
        info!(session_id = %session_id, attempts = attempt + 1, "session completed");

        Ok(ChatResponse {
            answer: draft,
            citations: references.clone(),
            activity: trace.activity.clone(),
            metadata: ChatResponseMetadata {
                plan,
                route: route_decision,
                context_budget: compacted.budget,
                critique_history,
                retrieval_diagnostics: dispatch_result.diagnostics,
            },
        })
    }

    /// Runs one synthesis attempt under retry/timeout, bridging the
    /// synchronous `on_token` callback to the async event emitter through
    /// an unbounded channel drained concurrently with the synthesis call.
    /// In [`SessionMode::Sync`] no `tokens` events are emitted (spec.md §6.1).
    async fn run_synthesis(
        &self,
        mode: SessionMode,
        emitter: &EventEmitter,
        request: SynthesisRequest,
        cancel: &CancellationToken,
    ) -> Result<SynthesisResponse> {
        let synthesizer = Arc::clone(&self.collaborators.synthesizer);
        let policy: RetryPolicy = self.config.retry_policy.into();
        let log = Arc::clone(&self.retry_log);

        if mode != SessionMode::Stream {
            return with_retry("synthesizer", policy, cancel, &log, || {
                let synthesizer = Arc::clone(&synthesizer);
                let request = request.clone();
                async move { ragent_synthesis::synthesize(synthesizer.as_ref(), request, &|_| {}).await }
            })
            .await;
        }

        let (token_tx, mut token_rx) = mpsc::unbounded_channel::<String>();
        let call = with_retry("synthesizer", policy, cancel, &log, move || {
            let synthesizer = Arc::clone(&synthesizer);
            let request = request.clone();
            let token_tx = token_tx.clone();
            async move {
                let on_token = move |chunk: &str| {
                    let _ = token_tx.send(chunk.to_string());
                };
                ragent_synthesis::synthesize(synthesizer.as_ref(), request, &on_token).await
            }
        });
        tokio::pin!(call);

        loop {
            tokio::select! {
                biased;
                Some(chunk) = token_rx.recv() => {
                    emitter.emit(OrchestratorEvent::Tokens { content: chunk }).await.ok();
                }
                result = &mut call => {
                    while let Ok(chunk) = token_rx.try_recv() {
                        emitter.emit(OrchestratorEvent::Tokens { content: chunk }).await.ok();
                    }
                    return result;
                }
            }
        }
    }
}

/// Thin adapter composing the embedding cache in front of a retrying
/// embedder: cache hits skip the collaborator call entirely, only misses
/// go through retry (spec.md §5's process-wide embedding cache).
struct CachingEmbedder<'a> {
    inner: RetryingEmbedder<'a>,
    cache: Arc<EmbeddingCache>,
}

#[async_trait::async_trait]
impl Embedder for CachingEmbedder<'_> {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut missing_idx = Vec::new();
        let mut missing_texts = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            match self.cache.get(text) {
                Some(v) => results[i] = Some(v),
                None => {
                    missing_idx.push(i);
                    missing_texts.push(text.clone());
                }
            }
        }
        if !missing_texts.is_empty() {
            let embedded = self.inner.embed(&missing_texts).await?;
            for (slot, idx) in missing_idx.into_iter().enumerate() {
                let vector = embedded.get(slot).cloned().unwrap_or_default();
                self.cache.insert(texts[idx].clone(), vector.clone());
                results[idx] = Some(vector);
            }
        }
        Ok(results.into_iter().map(|v| v.unwrap_or_default()).collect())
    }
}

fn last_user_message(messages: &[Message]) -> String {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

fn assemble_sections(sections: &[&str]) -> String {
    sections
        .iter()
        .copied()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn error_code(err: &CoreError) -> u16 {
    match err {
        CoreError::DeadlineExceeded { .. } => 408,
        CoreError::Cancelled => 499,
        CoreError::Configuration(_) | CoreError::InvalidCitation { .. } => 400,
        _ => 500,
    }
}

/// A never-cancelled token used only for the trace-persistence call at
/// session end, which must run even if the caller cancelled mid-session.
static NOOP_CANCEL: std::sync::OnceLock<CancellationToken> = std::sync::OnceLock::new();
