//! ABOUTME: Per-request feature overrides, resolved request > session > config default

use crate::OrchestratorConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One request's `feature_overrides` bag (spec.md §6.3). Only the flags
/// this system recognizes are applied; unknown keys are ignored rather
/// than rejected, since the caller may be running a newer client.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FeatureOverrides(pub HashMap<String, serde_json::Value>);

impl FeatureOverrides {
    /// Resolve an effective config for one session: start from `base`,
    /// apply `persisted` (from the session store), then `self` (the
    /// current request) — later layers win, matching spec.md §6.3's
    /// priority order `request > persisted session > config default`.
    pub fn resolve(
        &self,
        base: &OrchestratorConfig,
        persisted: Option<&FeatureOverrides>,
    ) -> OrchestratorConfig {
        let mut config = base.clone();
        if let Some(persisted) = persisted {
            apply(&mut config, persisted);
        }
        apply(&mut config, self);
        config
    }
}

fn apply(config: &mut OrchestratorConfig, overrides: &FeatureOverrides) {
    for (key, value) in &overrides.0 {
        match key.as_str() {
            "enable_lazy_retrieval" => {
                if let Some(b) = value.as_bool() {
                    config.enable_lazy_retrieval = b;
                }
            }
            "enable_intent_routing" => {
                if let Some(b) = value.as_bool() {
                    config.enable_intent_routing = b;
                }
            }
            "enable_semantic_summary" => {
                if let Some(b) = value.as_bool() {
                    config.enable_semantic_summary = b;
                }
            }
            "enable_semantic_memory" => {
                if let Some(b) = value.as_bool() {
                    config.enable_semantic_memory = b;
                }
            }
            "critic_max_retries" => {
                if let Some(n) = value.as_u64() {
                    config.critic_max_retries = n as u32;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_overrides_win_over_persisted() {
        let base = OrchestratorConfig::default();
        let persisted = FeatureOverrides(HashMap::from([(
            "enable_lazy_retrieval".to_string(),
            serde_json::json!(true),
        )]));
        let request = FeatureOverrides(HashMap::from([(
            "enable_lazy_retrieval".to_string(),
            serde_json::json!(false),
        )]));

        let resolved = request.resolve(&base, Some(&persisted));
        assert!(!resolved.enable_lazy_retrieval);
    }

    #[test]
    fn persisted_overrides_win_over_default() {
        let base = OrchestratorConfig::default();
        let persisted = FeatureOverrides(HashMap::from([(
            "critic_max_retries".to_string(),
            serde_json::json!(5),
        )]));
        let request = FeatureOverrides::default();

        let resolved = request.resolve(&base, Some(&persisted));
        assert_eq!(resolved.critic_max_retries, 5);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let base = OrchestratorConfig::default();
        let request = FeatureOverrides(HashMap::from([(
            "not_a_real_flag".to_string(),
            serde_json::json!(true),
        )]));
        let resolved = request.resolve(&base, None);
        assert_eq!(resolved.rag_top_k, base.rag_top_k);
    }
}
