//! ABOUTME: Static intent → RoutingProfile table (spec.md §4.4, §6.3)

use ragent_core::types::{Intent, RetrieverStrategy, RoutingProfile};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingTable {
    entries: HashMap<Intent, RoutingProfile>,
    #[serde(skip)]
    default_profile: Option<RoutingProfile>,
}

impl Default for RoutingTable {
    fn default() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            Intent::Faq,
            RoutingProfile {
                model_id: "fast-chat".into(),
                max_output_tokens: 512,
                retriever_strategy: RetrieverStrategy::Vector,
            },
        );
        entries.insert(
            Intent::Factual,
            RoutingProfile {
                model_id: "balanced-chat".into(),
                max_output_tokens: 1_024,
                retriever_strategy: RetrieverStrategy::Hybrid,
            },
        );
        entries.insert(
            Intent::Research,
            RoutingProfile {
                model_id: "deep-research".into(),
                max_output_tokens: 2_048,
                retriever_strategy: RetrieverStrategy::HybridWeb,
            },
        );
        entries.insert(
            Intent::Conversational,
            RoutingProfile {
                model_id: "fast-chat".into(),
                max_output_tokens: 512,
                retriever_strategy: RetrieverStrategy::Vector,
            },
        );
        Self {
            entries,
            default_profile: None,
        }
    }
}

impl RoutingTable {
    /// The spec's documented fallback when classification fails: a
    /// research-like profile (hybrid+web, high token cap).
    pub fn default_profile() -> RoutingProfile {
        RoutingProfile {
            model_id: "deep-research".into(),
            max_output_tokens: 2_048,
            retriever_strategy: RetrieverStrategy::HybridWeb,
        }
    }

    pub fn profile_for(&self, intent: Intent) -> RoutingProfile {
        self.entries
            .get(&intent)
            .cloned()
            .unwrap_or_else(Self::default_profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_intent_has_a_profile() {
        let table = RoutingTable::default();
        for intent in [
            Intent::Faq,
            Intent::Factual,
            Intent::Research,
            Intent::Conversational,
        ] {
            let profile = table.profile_for(intent);
            assert!(profile.max_output_tokens > 0);
        }
    }

    #[test]
    fn faq_routes_to_vector_only() {
        let table = RoutingTable::default();
        assert_eq!(
            table.profile_for(Intent::Faq).retriever_strategy,
            RetrieverStrategy::Vector
        );
    }
}
