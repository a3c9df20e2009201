// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::env;

fn default_provider() -> String {
    "groq".to_string()
}
fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}
fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_snippet_chars() -> usize {
    1000
}
fn default_feedback_hints() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// "groq" | "openai" | "mock" | "disabled" (case-insensitive).
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// OpenAI-compatible base URL (`.../v1`).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// "ENV" means: read from LLM_API_KEY, then the provider's own variable.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Max characters of each source body placed in the prompt.
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
    /// Max bookmarked / dismissed gaps (each) passed as preference hints.
    #[serde(default = "default_feedback_hints")]
    pub feedback_hints: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: default_base_url(),
            api_key: default_api_key(),
            timeout_secs: default_timeout_secs(),
            snippet_chars: default_snippet_chars(),
            feedback_hints: default_feedback_hints(),
        }
    }
}

impl ExtractionConfig {
    pub fn provider_normalized(&self) -> String {
        self.provider.trim().to_lowercase()
    }

    /// Resolve the API key; "ENV" looks up `LLM_API_KEY`, then
    /// `GROQ_API_KEY` / `OPENAI_API_KEY` by provider.
    pub fn resolved_api_key(&self) -> anyhow::Result<String> {
        if !self.api_key.trim().eq_ignore_ascii_case("env") {
            return Ok(self.api_key.trim().to_string());
        }
        if let Ok(k) = env::var("LLM_API_KEY") {
            if !k.trim().is_empty() {
                return Ok(k.trim().to_string());
            }
        }
        let var = match self.provider_normalized().as_str() {
            "groq" => "GROQ_API_KEY",
            "openai" => "OPENAI_API_KEY",
            other => anyhow::bail!("no API key variable for provider: {other}"),
        };
        env::var(var)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty() && !k.contains("your_"))
            .ok_or_else(|| anyhow::anyhow!("Missing {var} env var"))
    }
}
