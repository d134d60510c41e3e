//! ABOUTME: Core data model shared by every stage of the session orchestrator
//! ABOUTME: Message, Reference, Plan, RoutingProfile, budgets, traces, and events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single conversation turn. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// The source tier a [`Reference`] was retrieved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    Kb,
    Web,
}

/// An opaque handle a summary-only [`Reference`] carries so the Dispatcher
/// can later load its full body. Modeled as data (not a captured closure)
/// so references stay serializable for telemetry; see spec.md §9.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydrateHandle {
    /// Key the Dispatcher uses to look up the full body (usually the
    /// underlying index's document id, which may differ from the
    /// citation-facing `Reference::id`).
    pub lookup_key: String,
    /// Set once hydration has completed for this handle; hydrate() is a
    /// no-op when this is already true.
    pub hydrated: bool,
}

/// A single piece of retrieved evidence.
///
/// Invariant: every reference cited in a final answer has a non-empty
/// `body` (after any hydration) at the time of citation validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    pub title: Option<String>,
    pub body: String,
    pub url: Option<String>,
    pub page: Option<u32>,
    pub score: Option<f32>,
    pub source: Option<SourceTag>,
    pub summary: Option<String>,
    pub hydrate: Option<HydrateHandle>,
}

impl Reference {
    /// The text that should be treated as this reference's current body
    /// for grounding/coverage checks: full body if present, else the
    /// summary (lazy mode), else empty.
    pub fn effective_body(&self) -> &str {
        if !self.body.is_empty() {
            &self.body
        } else if let Some(s) = &self.summary {
            s
        } else {
            ""
        }
    }

    pub fn is_summary_only(&self) -> bool {
        self.body.is_empty() && self.summary.is_some()
    }
}

/// The retrieval action a [`PlanStep`] requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    VectorSearch,
    WebSearch,
    Both,
    Answer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub action: PlanAction,
    pub query: Option<String>,
    pub k: Option<u32>,
}

/// A structured retrieval/answer plan. `confidence` drives escalation
/// (spec.md §4.5). Only the last step may have action `Answer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub confidence: f32,
    pub steps: Vec<PlanStep>,
}

impl Plan {
    /// Validates the structural invariants spec.md §4.5/§8 require.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.steps.is_empty() {
            return Err("plan has no steps".into());
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("confidence {} out of [0,1]", self.confidence));
        }
        for (i, step) in self.steps.iter().enumerate() {
            let is_last = i == self.steps.len() - 1;
            if step.action == PlanAction::Answer && !is_last {
                return Err("only the last step may have action Answer".into());
            }
            if step.action != PlanAction::Answer {
                match &step.query {
                    Some(q) if !q.trim().is_empty() => {}
                    _ => return Err(format!("step {i} has no non-empty query")),
                }
            }
        }
        Ok(())
    }

    pub fn first_action(&self) -> Option<PlanAction> {
        self.steps.first().map(|s| s.action)
    }
}

/// Fixed intent classification set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Faq,
    Factual,
    Research,
    Conversational,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrieverStrategy {
    Vector,
    Hybrid,
    HybridWeb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingProfile {
    pub model_id: String,
    pub max_output_tokens: u32,
    pub retriever_strategy: RetrieverStrategy,
}

/// Telemetry payload returned alongside a [`RoutingProfile`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecision {
    pub intent: Intent,
    pub confidence: f32,
    pub reasoning: String,
    pub profile: RoutingProfile,
}

/// Per-section token caps and the resulting allocation for one session.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ContextBudget {
    pub history_tokens: u32,
    pub summary_tokens: u32,
    pub salience_tokens: u32,
    pub web_tokens: u32,
}

/// A durable fact extracted from conversation history. Deduplicated by
/// `fact`; the latest `last_seen_turn` wins (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalienceNote {
    pub fact: String,
    pub last_seen_turn: u32,
}

/// A summarized window of conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryItem {
    pub text: String,
    pub turn_range: (u32, u32),
    pub embedding: Option<Vec<f32>>,
}

/// Output of the Critic for one synthesis attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticReport {
    pub grounded: bool,
    pub coverage: f32,
    pub issues: Vec<String>,
    pub action: CriticAction,
    pub forced: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriticAction {
    Accept,
    Revise,
}

/// One row of the per-session critic-loop audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CritiqueAttempt {
    pub attempt: u32,
    pub coverage: f32,
    pub grounded: bool,
    pub action: CriticAction,
    pub issues: Vec<String>,
    pub used_full_content: bool,
    pub forced: bool,
}

/// One entry of the append-only activity audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityStep {
    pub kind: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl ActivityStep {
    pub fn new(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            description: description.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Sync,
    Stream,
}

/// Which retrieval tier the Dispatcher ultimately satisfied the request
/// from, for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    Direct,
    Lazy,
    KnowledgeAgent,
    WebOnly,
}

/// Non-fatal diagnostics from one retrieval run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalDiagnostics {
    pub succeeded: bool,
    pub fallback_reason: Option<String>,
    pub tier_reached: String,
    pub web_unavailable: bool,
}

impl Default for RetrievalDiagnostics {
    fn default() -> Self {
        Self {
            succeeded: true,
            fallback_reason: None,
            tier_reached: "primary_hybrid".into(),
            web_unavailable: false,
        }
    }
}

/// Aggregate record of one session, finalized at the end and optionally
/// persisted via the `SessionStore` collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTrace {
    pub session_id: String,
    pub mode: SessionMode,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub plan: Option<Plan>,
    pub route: Option<RouteDecision>,
    pub context_budget: Option<ContextBudget>,
    pub retrieval_diagnostics: Option<RetrievalDiagnostics>,
    pub critique_history: Vec<CritiqueAttempt>,
    pub activity: Vec<ActivityStep>,
    pub error: Option<String>,
}

impl SessionTrace {
    pub fn new(session_id: impl Into<String>, mode: SessionMode) -> Self {
        Self {
            session_id: session_id.into(),
            mode,
            started_at: Utc::now(),
            completed_at: None,
            plan: None,
            route: None,
            context_budget: None,
            retrieval_diagnostics: None,
            critique_history: Vec::new(),
            activity: Vec::new(),
            error: None,
        }
    }
}

/// Typed event stream emitted by the orchestrator, in stage-completion
/// order (spec.md §6.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name", content = "payload", rename_all = "lowercase")]
pub enum OrchestratorEvent {
    Status {
        stage: String,
    },
    Route(RouteDecision),
    Plan {
        confidence: f32,
        steps: Vec<PlanStep>,
    },
    Context {
        history: String,
        summary: String,
        salience: String,
        budget: ContextBudget,
    },
    Tool {
        name: String,
        args: serde_json::Value,
        result_summary: String,
    },
    Activity(ActivityStep),
    Citations(Vec<Reference>),
    Tokens {
        content: String,
    },
    Critique(CritiqueAttempt),
    Complete {
        answer: String,
        citations: Vec<Reference>,
    },
    Telemetry {
        summary: String,
    },
    Trace(SessionTrace),
    Done {
        status: DoneStatus,
    },
    Error {
        message: String,
        code: u16,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoneStatus {
    Complete,
    Error,
}

impl OrchestratorEvent {
    /// Name as it appears in the `event: <name>` SSE line (spec.md §6.1).
    pub fn name(&self) -> &'static str {
        match self {
            OrchestratorEvent::Status { .. } => "status",
            OrchestratorEvent::Route(_) => "route",
            OrchestratorEvent::Plan { .. } => "plan",
            OrchestratorEvent::Context { .. } => "context",
            OrchestratorEvent::Tool { .. } => "tool",
            OrchestratorEvent::Activity(_) => "activity",
            OrchestratorEvent::Citations(_) => "citations",
            OrchestratorEvent::Tokens { .. } => "tokens",
            OrchestratorEvent::Critique(_) => "critique",
            OrchestratorEvent::Complete { .. } => "complete",
            OrchestratorEvent::Telemetry { .. } => "telemetry",
            OrchestratorEvent::Trace(_) => "trace",
            OrchestratorEvent::Done { .. } => "done",
            OrchestratorEvent::Error { .. } => "error",
        }
    }

    /// Whether this event may be dropped under backpressure (spec.md §5:
    /// only `status` may be dropped before anything else).
    pub fn is_droppable(&self) -> bool {
        matches!(self, OrchestratorEvent::Status { .. })
    }
}

/// A request to the synchronous or streaming inbound endpoint (spec.md
/// §6.1). Transport-agnostic: the HTTP layer itself is out of scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub session_id: Option<String>,
    #[serde(default)]
    pub feature_overrides: HashMap<String, serde_json::Value>,
}

/// Final sync response shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub citations: Vec<Reference>,
    pub activity: Vec<ActivityStep>,
    pub metadata: ChatResponseMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponseMetadata {
    pub plan: Plan,
    pub route: RouteDecision,
    pub context_budget: ContextBudget,
    pub critique_history: Vec<CritiqueAttempt>,
    pub retrieval_diagnostics: RetrievalDiagnostics,
}
