//! ABOUTME: Planner — structured plan generation with a heuristic fallback
//! ABOUTME: Implements spec.md §4.5's plan contract and orchestrator escalation rule

use ragent_core::traits::PlanGenerator;
use ragent_core::types::{Plan, PlanAction, PlanStep, RetrieverStrategy, RoutingProfile};
use tracing::warn;

const FALLBACK_CONFIDENCE: f32 = 0.4;

fn action_for_strategy(strategy: RetrieverStrategy) -> PlanAction {
    match strategy {
        RetrieverStrategy::Vector | RetrieverStrategy::Hybrid => PlanAction::VectorSearch,
        RetrieverStrategy::HybridWeb => PlanAction::Both,
    }
}

fn heuristic_plan(question: &str, profile: &RoutingProfile) -> Plan {
    Plan {
        confidence: FALLBACK_CONFIDENCE,
        steps: vec![PlanStep {
            action: action_for_strategy(profile.retriever_strategy),
            query: Some(question.to_string()),
            k: None,
        }],
    }
}

/// Produces a [`Plan`] for `question`. Falls back to a single-step
/// heuristic plan (confidence 0.4, action derived from the profile's
/// retriever strategy) whenever no generator is configured, the
/// generator reports malformed output (`Ok(None)`), errors, or returns a
/// plan that fails [`Plan::validate`].
pub async fn plan(
    question: &str,
    compacted_context: &str,
    profile: &RoutingProfile,
    generator: Option<&dyn PlanGenerator>,
) -> Plan {
    let Some(generator) = generator else {
        return heuristic_plan(question, profile);
    };

    match generator.generate_plan(question, compacted_context, profile).await {
        Ok(Some(candidate)) => match candidate.validate() {
            Ok(()) => candidate,
            Err(reason) => {
                warn!(%reason, "plan generator returned an invalid plan, using heuristic fallback");
                heuristic_plan(question, profile)
            }
        },
        Ok(None) => {
            warn!("plan generator returned malformed output, using heuristic fallback");
            heuristic_plan(question, profile)
        }
        Err(err) => {
            warn!(%err, "plan generator call failed, using heuristic fallback");
            heuristic_plan(question, profile)
        }
    }
}

/// Orchestrator escalation rule (spec.md §4.5): low-confidence plans on a
/// vector-only profile are upgraded to hybrid+web, and sufficiently
/// uncertain plans whose first action is `vector_search` force dual
/// retrieval (vector search run alongside web search) for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationDecision {
    pub upgrade_to_hybrid_web: bool,
    pub force_dual_retrieval: bool,
}

pub fn escalation(
    plan: &Plan,
    profile: &RoutingProfile,
    confidence_escalation: f32,
    confidence_dual: f32,
) -> EscalationDecision {
    let upgrade_to_hybrid_web =
        plan.confidence < confidence_escalation && profile.retriever_strategy == RetrieverStrategy::Vector;

    let force_dual_retrieval =
        plan.confidence < confidence_dual && plan.first_action() == Some(PlanAction::VectorSearch);

    EscalationDecision {
        upgrade_to_hybrid_web,
        force_dual_retrieval,
    }
}
