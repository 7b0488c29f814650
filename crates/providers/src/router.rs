//! Provider selection from configuration.

use crate::openai_compat::OpenAiCompatProvider;
use roadclaim_config::AppConfig;
use roadclaim_core::provider::Provider;
use std::sync::Arc;

/// Build the configured reasoning model provider.
///
/// A missing API key is not an error here: the provider reports
/// `NotConfigured` on first use so the gateway can still serve queries.
pub fn build_from_config(config: &AppConfig) -> Arc<dyn Provider> {
    let provider = &config.provider;
    let base_url = provider
        .api_url
        .clone()
        .unwrap_or_else(|| default_base_url(&provider.name));
    let api_key = provider.api_key.clone().unwrap_or_default();

    if api_key.is_empty() {
        tracing::warn!(provider = %provider.name, "No API key configured; model calls will fail");
    }

    Arc::new(OpenAiCompatProvider::new(&provider.name, base_url, api_key))
}

/// Get the default base URL for well-known OpenAI-compatible providers.
pub fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8001/v1".into(),
        _ => "https://api.openai.com/v1".into(),
    }
}
