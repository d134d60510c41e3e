//! ABOUTME: Retry/timeout/cancellation adapters around collaborator traits (spec.md §5)
//! ABOUTME: Each wraps one real collaborator so the sub-crate helpers stay retry-agnostic

use async_trait::async_trait;
use ragent_core::cache::RetryTelemetryLog;
use ragent_core::error::Result;
use ragent_core::retry::{with_retry, RetryPolicy};
use ragent_core::traits::{
    ClassifiedIntent, CriticModel, CriticRequest, Embedder, IntentClassifier, MemoryStore,
    PlanGenerator, SessionStore,
};
use ragent_core::types::{
    CriticReport, Message, Plan, Reference, RoutingProfile, SessionTrace, SummaryItem,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared context every wrapper needs; borrowed for the lifetime of one
/// `run_session` call.
pub struct RetryContext<'a> {
    pub policy: RetryPolicy,
    pub cancel: &'a CancellationToken,
    pub log: &'a Arc<RetryTelemetryLog>,
}

pub struct RetryingIntentClassifier<'a> {
    pub inner: Arc<dyn IntentClassifier>,
    pub ctx: RetryContext<'a>,
}

#[async_trait]
impl IntentClassifier for RetryingIntentClassifier<'_> {
    async fn classify(&self, recent: &[Message]) -> Result<Option<ClassifiedIntent>> {
        let recent = recent.to_vec();
        with_retry("intent_classifier", self.ctx.policy, self.ctx.cancel, self.ctx.log, || {
            let inner = Arc::clone(&self.inner);
            let recent = recent.clone();
            async move { inner.classify(&recent).await }
        })
        .await
    }
}

pub struct RetryingPlanGenerator<'a> {
    pub inner: Arc<dyn PlanGenerator>,
    pub ctx: RetryContext<'a>,
}

#[async_trait]
impl PlanGenerator for RetryingPlanGenerator<'_> {
    async fn generate_plan(
        &self,
        question: &str,
        compacted_context: &str,
        profile: &RoutingProfile,
    ) -> Result<Option<Plan>> {
        with_retry("plan_generator", self.ctx.policy, self.ctx.cancel, self.ctx.log, || {
            let inner = Arc::clone(&self.inner);
            let question = question.to_string();
            let compacted_context = compacted_context.to_string();
            let profile = profile.clone();
            async move { inner.generate_plan(&question, &compacted_context, &profile).await }
        })
        .await
    }
}

pub struct RetryingCriticModel<'a> {
    pub inner: Arc<dyn CriticModel>,
    pub ctx: RetryContext<'a>,
}

#[async_trait]
impl CriticModel for RetryingCriticModel<'_> {
    async fn evaluate(&self, request: CriticRequest) -> Result<Option<CriticReport>> {
        with_retry("critic_model", self.ctx.policy, self.ctx.cancel, self.ctx.log, || {
            let inner = Arc::clone(&self.inner);
            let request = request.clone();
            async move { inner.evaluate(request).await }
        })
        .await
    }
}

pub struct RetryingEmbedder<'a> {
    pub inner: Arc<dyn Embedder>,
    pub ctx: RetryContext<'a>,
}

#[async_trait]
impl Embedder for RetryingEmbedder<'_> {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let texts = texts.to_vec();
        with_retry("embedder", self.ctx.policy, self.ctx.cancel, self.ctx.log, || {
            let inner = Arc::clone(&self.inner);
            let texts = texts.clone();
            async move { inner.embed(&texts).await }
        })
        .await
    }
}

pub struct RetryingMemoryStore<'a> {
    pub inner: Arc<dyn MemoryStore>,
    pub ctx: RetryContext<'a>,
}

#[async_trait]
impl MemoryStore for RetryingMemoryStore<'_> {
    async fn recall(
        &self,
        question: &str,
        session_id: &str,
        k: usize,
        similarity_floor: f32,
    ) -> Result<Vec<SummaryItem>> {
        with_retry("memory_store", self.ctx.policy, self.ctx.cancel, self.ctx.log, || {
            let inner = Arc::clone(&self.inner);
            let question = question.to_string();
            let session_id = session_id.to_string();
            async move { inner.recall(&question, &session_id, k, similarity_floor).await }
        })
        .await
    }

    async fn add_successful_pattern(
        &self,
        question: &str,
        answer: &str,
        citations: &[Reference],
    ) -> Result<()> {
        let citations = citations.to_vec();
        with_retry("memory_store", self.ctx.policy, self.ctx.cancel, self.ctx.log, || {
            let inner = Arc::clone(&self.inner);
            let question = question.to_string();
            let answer = answer.to_string();
            let citations = citations.clone();
            async move { inner.add_successful_pattern(&question, &answer, &citations).await }
        })
        .await
    }
}

pub struct RetryingSessionStore<'a> {
    pub inner: Arc<dyn SessionStore>,
    pub ctx: RetryContext<'a>,
}

#[async_trait]
impl SessionStore for RetryingSessionStore<'_> {
    async fn save_trace(&self, trace: &SessionTrace) -> Result<()> {
        let trace = trace.clone();
        with_retry("session_store", self.ctx.policy, self.ctx.cancel, self.ctx.log, || {
            let inner = Arc::clone(&self.inner);
            let trace = trace.clone();
            async move { inner.save_trace(&trace).await }
        })
        .await
    }
}
