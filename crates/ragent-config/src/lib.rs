//! ABOUTME: Central configuration management for the RAG session orchestrator
//! ABOUTME: TOML file + environment variable layering, plus per-request overrides

pub mod env;
pub mod overrides;
pub mod routing;

pub use overrides::FeatureOverrides;
pub use routing::RoutingTable;

use ragent_core::types::{Intent, RetrieverStrategy, RoutingProfile};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

const CONFIG_SEARCH_PATHS: &[&str] = &["ragent.toml", ".ragent.toml", "config/ragent.toml"];

/// Retry/backoff parameters, serializable mirror of `ragent_core::retry::RetryPolicy`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryPolicyConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub per_call_timeout_ms: u64,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 4_000,
            per_call_timeout_ms: 15_000,
        }
    }
}

impl From<RetryPolicyConfig> for ragent_core::retry::RetryPolicy {
    fn from(c: RetryPolicyConfig) -> Self {
        Self {
            max_attempts: c.max_attempts,
            base_delay_ms: c.base_delay_ms,
            max_delay_ms: c.max_delay_ms,
            per_call_timeout_ms: c.per_call_timeout_ms,
        }
    }
}

/// Central orchestrator configuration. Every item named in spec.md §6.3.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub confidence_escalation: f32,
    pub confidence_dual: f32,
    pub critic_max_retries: u32,
    pub critic_threshold: f32,

    pub rag_top_k: u32,
    pub reranker_threshold: f32,
    pub fallback_reranker_threshold: f32,
    pub retrieval_min_docs: u32,

    pub context_history_token_cap: u32,
    pub context_summary_token_cap: u32,
    pub context_salience_token_cap: u32,
    pub context_max_recent_turns: u32,
    pub context_max_summary_items: u32,
    pub context_max_salience_items: u32,

    pub web_context_max_tokens: u32,
    pub web_results_max: u32,
    pub web_search_mode: WebSearchModeConfig,

    pub enable_lazy_retrieval: bool,
    pub enable_intent_routing: bool,
    pub enable_semantic_summary: bool,
    pub enable_semantic_memory: bool,

    pub routing_table: RoutingTable,

    pub request_timeout_ms: u64,
    pub retry_policy: RetryPolicyConfig,

    pub embedding_cache_capacity: usize,
    pub retry_log_capacity: usize,
    pub event_channel_capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WebSearchModeConfig {
    Summary,
    Full,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            confidence_escalation: 0.5,
            confidence_dual: 0.6,
            critic_max_retries: 2,
            critic_threshold: 0.75,

            rag_top_k: 8,
            reranker_threshold: 0.55,
            fallback_reranker_threshold: 0.3,
            retrieval_min_docs: 1,

            context_history_token_cap: 2_000,
            context_summary_token_cap: 800,
            context_salience_token_cap: 400,
            context_max_recent_turns: 6,
            context_max_summary_items: 8,
            context_max_salience_items: 20,

            web_context_max_tokens: 1_200,
            web_results_max: 5,
            web_search_mode: WebSearchModeConfig::Summary,

            enable_lazy_retrieval: false,
            enable_intent_routing: true,
            enable_semantic_summary: true,
            enable_semantic_memory: true,

            routing_table: RoutingTable::default(),

            request_timeout_ms: 30_000,
            retry_policy: RetryPolicyConfig::default(),

            embedding_cache_capacity: 4_096,
            retry_log_capacity: 1_024,
            event_channel_capacity: 256,
        }
    }
}

impl OrchestratorConfig {
    /// Load defaults, then a TOML file (first one found on
    /// [`CONFIG_SEARCH_PATHS`] or an explicit path), then environment
    /// variable overrides.
    pub fn load(explicit_path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        let path = explicit_path
            .map(Path::to_path_buf)
            .or_else(|| CONFIG_SEARCH_PATHS.iter().map(Path::new).find(|p| p.exists()).map(Path::to_path_buf));

        if let Some(path) = path {
            debug!(?path, "loading orchestrator config file");
            let text = std::fs::read_to_string(&path)?;
            config = toml::from_str(&text)?;
        }

        env::apply_env_overrides(&mut config);
        Ok(config)
    }

    pub fn profile_for(&self, intent: Intent) -> RoutingProfile {
        self.routing_table.profile_for(intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_documented_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.critic_max_retries, 2);
        assert!((config.critic_threshold - 0.75).abs() < f32::EPSILON);
        assert!(!config.enable_lazy_retrieval);
    }

    #[test]
    fn load_without_file_or_env_returns_defaults() {
        let config = OrchestratorConfig::load(Some(Path::new("/nonexistent/ragent.toml"))).unwrap();
        assert_eq!(config.rag_top_k, 8);
    }

    #[test]
    fn load_from_toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragent.toml");
        std::fs::write(&path, "critic_max_retries = 5\nrag_top_k = 12\n").unwrap();

        let config = OrchestratorConfig::load(Some(&path)).unwrap();
        assert_eq!(config.critic_max_retries, 5);
        assert_eq!(config.rag_top_k, 12);
        // Unspecified fields keep their defaults.
        assert!((config.critic_threshold - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn profile_for_intent_uses_routing_table() {
        let config = OrchestratorConfig::default();
        let profile = config.profile_for(Intent::Research);
        assert_eq!(profile.retriever_strategy, RetrieverStrategy::HybridWeb);
    }
}
