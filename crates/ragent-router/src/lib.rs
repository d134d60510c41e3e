//! ABOUTME: Intent Router — classifies a turn and selects a routing profile
//! ABOUTME: Implements spec.md §4.4's classify-then-select-profile contract

use ragent_core::traits::IntentClassifier;
use ragent_core::types::{Intent, Message, RouteDecision, RoutingProfile};
use tracing::warn;

/// Routes a turn to a [`RouteDecision`].
///
/// `profile_for` is the caller's routing table lookup (kept out of this
/// crate so it stays decoupled from `ragent-config`). `default_profile` is
/// returned, paired with [`Intent::Research`], whenever routing is
/// disabled or classification fails — the "research-like: hybrid+web,
/// high token cap" fallback spec.md §4.4 documents.
pub async fn route(
    recent: &[Message],
    enabled: bool,
    classifier: Option<&dyn IntentClassifier>,
    profile_for: impl Fn(Intent) -> RoutingProfile,
    default_profile: RoutingProfile,
) -> RouteDecision {
    if !enabled {
        return RouteDecision {
            intent: Intent::Research,
            confidence: 0.0,
            reasoning: "intent routing disabled by configuration".to_string(),
            profile: default_profile,
        };
    }

    let Some(classifier) = classifier else {
        return RouteDecision {
            intent: Intent::Research,
            confidence: 0.0,
            reasoning: "no intent classifier configured".to_string(),
            profile: default_profile,
        };
    };

    match classifier.classify(recent).await {
        Ok(Some(classified)) => {
            let profile = profile_for(classified.intent);
            RouteDecision {
                intent: classified.intent,
                confidence: classified.confidence,
                reasoning: classified.reasoning,
                profile,
            }
        }
        Ok(None) => {
            warn!("intent classifier reported a parse failure, timeout, or refusal");
            RouteDecision {
                intent: Intent::Research,
                confidence: 0.0,
                reasoning: "classifier returned no result; using default profile".to_string(),
                profile: default_profile,
            }
        }
        Err(err) => {
            warn!(%err, "intent classifier call failed");
            RouteDecision {
                intent: Intent::Research,
                confidence: 0.0,
                reasoning: format!("classifier error: {err}"),
                profile: default_profile,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ragent_core::traits::ClassifiedIntent;
    use ragent_core::types::RetrieverStrategy;
    use ragent_core::CoreError;

    fn profile_for(intent: Intent) -> RoutingProfile {
        match intent {
            Intent::Faq | Intent::Conversational => RoutingProfile {
                model_id: "fast-chat".into(),
                max_output_tokens: 512,
                retriever_strategy: RetrieverStrategy::Vector,
            },
            Intent::Factual => RoutingProfile {
                model_id: "balanced-chat".into(),
                max_output_tokens: 1024,
                retriever_strategy: RetrieverStrategy::Hybrid,
            },
            Intent::Research => default_profile(),
        }
    }

    fn default_profile() -> RoutingProfile {
        RoutingProfile {
            model_id: "deep-research".into(),
            max_output_tokens: 2048,
            retriever_strategy: RetrieverStrategy::HybridWeb,
        }
    }

    struct FixedClassifier(Option<ClassifiedIntent>);

    #[async_trait]
    impl IntentClassifier for FixedClassifier {
        async fn classify(&self, _recent: &[Message]) -> ragent_core::Result<Option<ClassifiedIntent>> {
            Ok(self.0.clone())
        }
    }

    struct FailingClassifier;
    #[async_trait]
    impl IntentClassifier for FailingClassifier {
        async fn classify(&self, _recent: &[Message]) -> ragent_core::Result<Option<ClassifiedIntent>> {
            Err(CoreError::DeadlineExceeded { elapsed_ms: 5_000 })
        }
    }

    #[tokio::test]
    async fn disabled_routing_uses_default_profile_and_research_intent() {
        let recent = vec![Message::user("hi")];
        let decision = route(&recent, false, None, profile_for, default_profile()).await;
        assert_eq!(decision.intent, Intent::Research);
        assert_eq!(decision.profile.model_id, "deep-research");
    }

    #[tokio::test]
    async fn successful_classification_selects_matching_profile() {
        let recent = vec![Message::user("What's your return policy?")];
        let classifier = FixedClassifier(Some(ClassifiedIntent {
            intent: Intent::Faq,
            confidence: 0.92,
            reasoning: "matches FAQ pattern".into(),
        }));
        let decision = route(&recent, true, Some(&classifier), profile_for, default_profile()).await;
        assert_eq!(decision.intent, Intent::Faq);
        assert_eq!(decision.profile.model_id, "fast-chat");
        assert!((decision.confidence - 0.92).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn parse_failure_falls_back_to_default_profile() {
        let recent = vec![Message::user("???")];
        let classifier = FixedClassifier(None);
        let decision = route(&recent, true, Some(&classifier), profile_for, default_profile()).await;
        assert_eq!(decision.intent, Intent::Research);
        assert_eq!(decision.profile.retriever_strategy, RetrieverStrategy::HybridWeb);
    }

    #[tokio::test]
    async fn classifier_error_falls_back_to_default_profile() {
        let recent = vec![Message::user("q")];
        let decision = route(&recent, true, Some(&FailingClassifier), profile_for, default_profile()).await;
        assert_eq!(decision.intent, Intent::Research);
        assert!(decision.reasoning.contains("classifier error"));
    }

    #[tokio::test]
    async fn no_classifier_configured_falls_back_to_default_profile() {
        let recent = vec![Message::user("q")];
        let decision = route(&recent, true, None, profile_for, default_profile()).await;
        assert_eq!(decision.intent, Intent::Research);
    }
}
