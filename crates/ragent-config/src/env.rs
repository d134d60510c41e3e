//! ABOUTME: Environment variable overrides for OrchestratorConfig
//! ABOUTME: Applied after file config, before per-request overrides (spec.md §6.3)

use crate::{OrchestratorConfig, WebSearchModeConfig};

const PREFIX: &str = "RAGENT_";

fn env_f32(name: &str) -> Option<f32> {
    std::env::var(format!("{PREFIX}{name}")).ok()?.parse().ok()
}

fn env_u32(name: &str) -> Option<u32> {
    std::env::var(format!("{PREFIX}{name}")).ok()?.parse().ok()
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(format!("{PREFIX}{name}")).ok()?.parse().ok()
}

fn env_bool(name: &str) -> Option<bool> {
    std::env::var(format!("{PREFIX}{name}")).ok()?.parse().ok()
}

/// Mutates `config` in place for every recognized `RAGENT_*` variable that
/// is set and parses. Unset or unparsable variables leave the existing
/// value untouched.
pub fn apply_env_overrides(config: &mut OrchestratorConfig) {
    if let Some(v) = env_f32("CONFIDENCE_ESCALATION") {
        config.confidence_escalation = v;
    }
    if let Some(v) = env_f32("CONFIDENCE_DUAL") {
        config.confidence_dual = v;
    }
    if let Some(v) = env_u32("CRITIC_MAX_RETRIES") {
        config.critic_max_retries = v;
    }
    if let Some(v) = env_f32("CRITIC_THRESHOLD") {
        config.critic_threshold = v;
    }
    if let Some(v) = env_u32("RAG_TOP_K") {
        config.rag_top_k = v;
    }
    if let Some(v) = env_f32("RERANKER_THRESHOLD") {
        config.reranker_threshold = v;
    }
    if let Some(v) = env_f32("FALLBACK_RERANKER_THRESHOLD") {
        config.fallback_reranker_threshold = v;
    }
    if let Some(v) = env_u32("RETRIEVAL_MIN_DOCS") {
        config.retrieval_min_docs = v;
    }
    if let Some(v) = env_u32("WEB_CONTEXT_MAX_TOKENS") {
        config.web_context_max_tokens = v;
    }
    if let Some(v) = env_u32("WEB_RESULTS_MAX") {
        config.web_results_max = v;
    }
    if let Ok(mode) = std::env::var(format!("{PREFIX}WEB_SEARCH_MODE")) {
        config.web_search_mode = match mode.to_ascii_lowercase().as_str() {
            "full" => WebSearchModeConfig::Full,
            _ => WebSearchModeConfig::Summary,
        };
    }
    if let Some(v) = env_bool("ENABLE_LAZY_RETRIEVAL") {
        config.enable_lazy_retrieval = v;
    }
    if let Some(v) = env_bool("ENABLE_INTENT_ROUTING") {
        config.enable_intent_routing = v;
    }
    if let Some(v) = env_bool("ENABLE_SEMANTIC_SUMMARY") {
        config.enable_semantic_summary = v;
    }
    if let Some(v) = env_bool("ENABLE_SEMANTIC_MEMORY") {
        config.enable_semantic_memory = v;
    }
    if let Some(v) = env_u64("REQUEST_TIMEOUT_MS") {
        config.request_timeout_ms = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn overrides_recognized_vars_only() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("RAGENT_CRITIC_MAX_RETRIES", "9");
        std::env::set_var("RAGENT_ENABLE_LAZY_RETRIEVAL", "true");

        let mut config = OrchestratorConfig::default();
        apply_env_overrides(&mut config);

        assert_eq!(config.critic_max_retries, 9);
        assert!(config.enable_lazy_retrieval);

        std::env::remove_var("RAGENT_CRITIC_MAX_RETRIES");
        std::env::remove_var("RAGENT_ENABLE_LAZY_RETRIEVAL");
    }

    #[test]
    fn unparsable_value_leaves_default_untouched() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("RAGENT_RAG_TOP_K", "not-a-number");
        let mut config = OrchestratorConfig::default();
        apply_env_overrides(&mut config);
        assert_eq!(config.rag_top_k, OrchestratorConfig::default().rag_top_k);
        std::env::remove_var("RAGENT_RAG_TOP_K");
    }
}
