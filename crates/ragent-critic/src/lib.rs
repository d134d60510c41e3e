//! ABOUTME: Critic — grounded/coverage evaluation and the accept/revise decision
//! ABOUTME: Implements spec.md §4.8's decision rule and force-accept-on-parse-failure behavior

use ragent_core::traits::{CriticModel, CriticRequest};
use ragent_core::types::{CriticAction, CriticReport};
use tracing::warn;

/// `action = accept` iff `grounded ∧ coverage ≥ threshold`; otherwise `revise`.
pub fn decide_action(grounded: bool, coverage: f32, threshold: f32) -> CriticAction {
    if grounded && coverage >= threshold {
        CriticAction::Accept
    } else {
        CriticAction::Revise
    }
}

/// Evaluates one synthesis draft.
///
/// `is_final_attempt` marks whether the orchestrator's retry ceiling has
/// been reached; on a parse failure on the final attempt the critic
/// force-accepts to prevent an infinite loop, otherwise it requests a
/// revision with an empty-evidence report so another pass can run.
pub async fn evaluate(
    model: Option<&dyn CriticModel>,
    request: CriticRequest,
    threshold: f32,
    is_final_attempt: bool,
) -> CriticReport {
    let Some(model) = model else {
        return on_parse_failure(is_final_attempt);
    };

    match model.evaluate(request).await {
        Ok(Some(report)) => {
            let action = decide_action(report.grounded, report.coverage, threshold);
            CriticReport {
                grounded: report.grounded,
                coverage: report.coverage,
                issues: report.issues,
                action,
                forced: false,
            }
        }
        Ok(None) => {
            warn!("critic model reported a parse failure");
            on_parse_failure(is_final_attempt)
        }
        Err(err) => {
            warn!(%err, "critic model call failed");
            on_parse_failure(is_final_attempt)
        }
    }
}

fn on_parse_failure(is_final_attempt: bool) -> CriticReport {
    if is_final_attempt {
        CriticReport {
            grounded: true,
            coverage: 1.0,
            issues: vec!["critic output could not be parsed; force-accepted at retry ceiling".into()],
            action: CriticAction::Accept,
            forced: true,
        }
    } else {
        CriticReport {
            grounded: false,
            coverage: 0.0,
            issues: vec!["critic output could not be parsed".into()],
            action: CriticAction::Revise,
            forced: false,
        }
    }
}
