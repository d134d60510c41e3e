//! ABOUTME: Tiered retrieval with fail-isolated fallback, lazy mode, and web augmentation

use ragent_core::cache::RetryTelemetryLog;
use ragent_core::error::Result;
use ragent_core::retry::{with_retry, RetryPolicy};
use ragent_core::traits::{LazyRetriever, Retriever, WebSearchMode, WebSearchRequest, WebSearcher};
use ragent_core::types::{
    ActivityStep, PlanAction, Reference, RetrievalDiagnostics, RetrievalMode, SourceTag,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Numeric configuration the Dispatcher needs, lifted out of
/// `ragent-config::OrchestratorConfig` by the caller so this crate stays
/// decoupled from the config crate.
#[derive(Debug, Clone, Copy)]
pub struct DispatchParams {
    pub top_k: usize,
    pub reranker_threshold: f32,
    pub fallback_reranker_threshold: f32,
    pub retrieval_min_docs: usize,
    pub web_context_max_tokens: u32,
    pub web_results_max: u32,
    pub web_mode: WebSearchMode,
    pub lazy_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub references: Vec<Reference>,
    pub context_text: String,
    pub web_context_text: String,
    pub web_results_count: usize,
    pub activity: Vec<ActivityStep>,
    pub diagnostics: RetrievalDiagnostics,
    pub summary_tokens: Option<u32>,
    pub retrieval_mode: RetrievalMode,
}

pub struct Dispatcher {
    retriever: Arc<dyn Retriever>,
    lazy_retriever: Option<Arc<dyn LazyRetriever>>,
    web_searcher: Option<Arc<dyn WebSearcher>>,
    retry_policy: RetryPolicy,
    retry_log: Arc<RetryTelemetryLog>,
}

impl Dispatcher {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        lazy_retriever: Option<Arc<dyn LazyRetriever>>,
        web_searcher: Option<Arc<dyn WebSearcher>>,
        retry_policy: RetryPolicy,
        retry_log: Arc<RetryTelemetryLog>,
    ) -> Self {
        Self {
            retriever,
            lazy_retriever,
            web_searcher,
            retry_policy,
            retry_log,
        }
    }

    /// Runs the plan's first retrieval step through the tiered fallback
    /// chain, then augments with web search per spec.md §4.6.
    ///
    /// `want_web` / `escalated_dual` reflect the orchestrator's decision
    /// rule (spec.md §4.5): the dispatcher itself does not read plan
    /// confidence, it only reacts to the booleans it is handed.
    pub async fn run(
        &self,
        query: &str,
        action: PlanAction,
        params: DispatchParams,
        want_web: bool,
        cancel: &CancellationToken,
    ) -> Result<DispatchResult> {
        let mut activity = Vec::new();
        let (mut references, mut diagnostics, retrieval_mode, summary_tokens) =
            self.run_tiers(query, params, cancel, &mut activity).await?;
        let kb_reference_count = references.len();

        let run_web = want_web || matches!(action, PlanAction::WebSearch | PlanAction::Both);

        let mut web_context_text = String::new();
        let mut web_results_count = 0usize;
        if run_web {
            match &self.web_searcher {
                Some(searcher) => {
                    let request = WebSearchRequest {
                        query: query.to_string(),
                        count: params.web_results_max,
                        mode: params.web_mode,
                    };
                    let outcome = with_retry(
                        "web_searcher",
                        self.retry_policy,
                        cancel,
                        &self.retry_log,
                        || {
                            let searcher = Arc::clone(searcher);
                            let request = request.clone();
                            async move { searcher.web_search(request).await }
                        },
                    )
                    .await;
                    match outcome {
                        Ok(response) => {
                            web_results_count = response.results.len();
                            web_context_text =
                                truncate_web_context(&response.context_text, params.web_context_max_tokens);
                            activity.push(ActivityStep::new(
                                "web_search",
                                format!("web search returned {} results", response.results.len()),
                            ));
                            for (rank, hit) in response.results.into_iter().enumerate() {
                                references.push(Reference {
                                    id: format!("web-{rank}"),
                                    title: hit.title,
                                    body: hit.snippet,
                                    url: Some(hit.url),
                                    page: None,
                                    score: None,
                                    source: Some(SourceTag::Web),
                                    summary: None,
                                    hydrate: None,
                                });
                            }
                        }
                        Err(err) => {
                            activity.push(ActivityStep::new(
                                "web_search_failed",
                                format!("web search failed: {err}"),
                            ));
                        }
                    }
                }
                None => {
                    activity.push(ActivityStep::new(
                        "web_unavailable",
                        "web search requested but no web collaborator is configured".to_string(),
                    ));
                    diagnostics.web_unavailable = true;
                }
            }
        }

        if references.is_empty() && web_results_count == 0 {
            diagnostics.succeeded = false;
            if diagnostics.fallback_reason.is_none() {
                diagnostics.fallback_reason = Some("no references and no web results".to_string());
            }
        }

        let kb_context = references
            .iter()
            .filter(|r| r.source != Some(SourceTag::Web))
            .map(|r| r.effective_body())
            .filter(|b| !b.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        let context_text = [kb_context.as_str(), web_context_text.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        // A genuine web-only collapse: the KB tiers surfaced nothing and
        // the answer rests entirely on web results (spec.md §4.6).
        let retrieval_mode = if kb_reference_count == 0 && web_results_count > 0 {
            RetrievalMode::WebOnly
        } else {
            retrieval_mode
        };

        Ok(DispatchResult {
            references,
            context_text,
            web_context_text,
            web_results_count,
            activity,
            diagnostics,
            summary_tokens,
            retrieval_mode,
        })
    }

    async fn run_tiers(
        &self,
        query: &str,
        params: DispatchParams,
        cancel: &CancellationToken,
        activity: &mut Vec<ActivityStep>,
    ) -> Result<(Vec<Reference>, RetrievalDiagnostics, RetrievalMode, Option<u32>)> {
        if params.lazy_enabled {
            if let Some(lazy) = &self.lazy_retriever {
                let outcome = with_retry(
                    "lazy_retriever",
                    self.retry_policy,
                    cancel,
                    &self.retry_log,
                    || {
                        let lazy = Arc::clone(lazy);
                        let query = query.to_string();
                        async move {
                            lazy.lazy_hybrid_search(&query, params.top_k, params.reranker_threshold)
                                .await
                        }
                    },
                )
                .await;
                match outcome {
                    Ok((refs, tokens)) if refs.len() >= params.retrieval_min_docs => {
                        activity.push(ActivityStep::new(
                            "retrieval_primary_lazy",
                            format!("lazy hybrid search returned {} references", refs.len()),
                        ));
                        return Ok((
                            sort_by_score(refs),
                            RetrievalDiagnostics {
                                tier_reached: "primary_hybrid_lazy".into(),
                                ..Default::default()
                            },
                            RetrievalMode::Lazy,
                            Some(tokens),
                        ));
                    }
                    Ok((refs, _)) => {
                        activity.push(ActivityStep::new(
                            "retrieval_primary_lazy_below_min",
                            format!("lazy hybrid search returned only {} references", refs.len()),
                        ));
                    }
                    Err(err) => {
                        activity.push(ActivityStep::new(
                            "retrieval_primary_lazy_failed",
                            format!("lazy hybrid search failed: {err}"),
                        ));
                    }
                }
            }
        }

        // Tier 1: primary hybrid semantic.
        let tier1 = with_retry("retriever", self.retry_policy, cancel, &self.retry_log, || {
            let retriever = Arc::clone(&self.retriever);
            let query = query.to_string();
            async move {
                retriever
                    .hybrid_search(&query, params.top_k, params.reranker_threshold)
                    .await
            }
        })
        .await;
        match tier1 {
            Ok(refs) if refs.len() >= params.retrieval_min_docs => {
                activity.push(ActivityStep::new(
                    "retrieval_primary",
                    format!("primary hybrid search returned {} references", refs.len()),
                ));
                return Ok((
                    sort_by_score(refs),
                    RetrievalDiagnostics::default(),
                    RetrievalMode::Direct,
                    None,
                ));
            }
            Ok(refs) => activity.push(ActivityStep::new(
                "retrieval_primary_below_min",
                format!("primary hybrid search returned only {} references", refs.len()),
            )),
            Err(err) => {
                warn!(%err, "primary hybrid search failed");
                activity.push(ActivityStep::new(
                    "retrieval_primary_failed",
                    format!("primary hybrid search failed: {err}"),
                ));
            }
        }

        // Tier 2: relaxed hybrid.
        let tier2 = with_retry("retriever", self.retry_policy, cancel, &self.retry_log, || {
            let retriever = Arc::clone(&self.retriever);
            let query = query.to_string();
            async move {
                retriever
                    .hybrid_search(&query, params.top_k, params.fallback_reranker_threshold)
                    .await
            }
        })
        .await;
        match tier2 {
            Ok(refs) if refs.len() >= params.retrieval_min_docs => {
                activity.push(ActivityStep::new(
                    "retrieval_relaxed",
                    format!("relaxed hybrid search returned {} references", refs.len()),
                ));
                return Ok((
                    sort_by_score(refs),
                    RetrievalDiagnostics {
                        tier_reached: "relaxed_hybrid".into(),
                        fallback_reason: Some("primary threshold yielded too few documents".into()),
                        ..Default::default()
                    },
                    RetrievalMode::Direct,
                    None,
                ));
            }
            Ok(refs) => activity.push(ActivityStep::new(
                "retrieval_relaxed_below_min",
                format!("relaxed hybrid search returned only {} references", refs.len()),
            )),
            Err(err) => {
                warn!(%err, "relaxed hybrid search failed");
                activity.push(ActivityStep::new(
                    "retrieval_relaxed_failed",
                    format!("relaxed hybrid search failed: {err}"),
                ));
            }
        }

        // Tier 3: pure vector, no reranker.
        let tier3 = with_retry("retriever", self.retry_policy, cancel, &self.retry_log, || {
            let retriever = Arc::clone(&self.retriever);
            let query = query.to_string();
            async move { retriever.vector_search(&query, params.top_k).await }
        })
        .await;
        match tier3 {
            Ok(refs) if !refs.is_empty() => {
                activity.push(ActivityStep::new(
                    "retrieval_vector_only",
                    format!("pure vector search returned {} references", refs.len()),
                ));
                return Ok((
                    sort_by_score(refs),
                    RetrievalDiagnostics {
                        tier_reached: "pure_vector".into(),
                        fallback_reason: Some("hybrid tiers yielded no documents".into()),
                        ..Default::default()
                    },
                    RetrievalMode::Direct,
                    None,
                ));
            }
            Ok(_) => activity.push(ActivityStep::new(
                "retrieval_vector_only_empty",
                "pure vector search returned zero references".to_string(),
            )),
            Err(err) => {
                warn!(%err, "pure vector search failed");
                activity.push(ActivityStep::new(
                    "retrieval_vector_only_failed",
                    format!("pure vector search failed: {err}"),
                ));
            }
        }

        // Tier 4: empty.
        Ok((
            Vec::new(),
            RetrievalDiagnostics {
                succeeded: false,
                tier_reached: "empty".into(),
                fallback_reason: Some("all retrieval tiers exhausted".into()),
                web_unavailable: false,
            },
            RetrievalMode::Direct,
            None,
        ))
    }

    /// Replaces summary bodies with full bodies for references matching
    /// `selector`. Idempotent and serialized per reference: a reference
    /// already hydrated is skipped rather than re-fetched.
    pub async fn hydrate(
        &self,
        references: &mut [Reference],
        selector: impl Fn(&Reference) -> bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(lazy) = &self.lazy_retriever else {
            return Ok(());
        };
        let mut to_hydrate: Vec<usize> = references
            .iter()
            .enumerate()
            .filter(|(_, r)| {
                selector(r)
                    && r.is_summary_only()
                    && !r.hydrate.as_ref().map(|h| h.hydrated).unwrap_or(false)
            })
            .map(|(i, _)| i)
            .collect();
        if to_hydrate.is_empty() {
            return Ok(());
        }
        to_hydrate.sort_unstable();
        let original: Vec<Reference> = to_hydrate.iter().map(|&i| references[i].clone()).collect();
        let batch = with_retry("lazy_retriever", self.retry_policy, cancel, &self.retry_log, || {
            let lazy = Arc::clone(lazy);
            let mut attempt_batch = original.clone();
            async move {
                lazy.hydrate(&mut attempt_batch).await?;
                Ok(attempt_batch)
            }
        })
        .await?;
        for (slot, idx) in to_hydrate.into_iter().enumerate() {
            references[idx] = batch[slot].clone();
            if let Some(handle) = references[idx].hydrate.as_mut() {
                handle.hydrated = true;
            }
        }
        Ok(())
    }
}

fn sort_by_score(mut refs: Vec<Reference>) -> Vec<Reference> {
    let original: Vec<(usize, Reference)> = refs.drain(..).enumerate().collect();
    let mut indexed = original;
    indexed.sort_by(|(i_a, a), (i_b, b)| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| i_a.cmp(i_b))
    });
    indexed.into_iter().map(|(_, r)| r).collect()
}

fn truncate_web_context(text: &str, max_tokens: u32) -> String {
    let approx_chars = (max_tokens as usize).saturating_mul(4);
    if text.chars().count() <= approx_chars {
        text.to_string()
    } else {
        text.chars().take(approx_chars).collect()
    }
}
