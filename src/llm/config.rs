//! LLM client configuration.

use serde::{Deserialize, Serialize};

use super::prompts::{DEFAULT_DRAFT_PROMPT, DEFAULT_SUMMARY_PROMPT};

/// LLM provider type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Ollama API (local, default)
    #[default]
    Ollama,
    /// OpenAI-compatible API (OpenAI, Groq, OpenRouter, Together.ai)
    OpenAI,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "openai" | "groq" | "openrouter" | "together" => Some(Self::OpenAI),
            _ => None,
        }
    }
}

/// Configuration for the LLM client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Whether LLM calls are enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// LLM provider (ollama or openai)
    #[serde(default)]
    pub provider: LlmProvider,
    /// API endpoint (provider-specific defaults apply)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// API key for OpenAI-compatible providers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum tokens in response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Temperature for generation (0.0 - 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Custom company summary prompt ({company}, {source}, {content})
    #[serde(default)]
    pub summary_prompt: Option<String>,
    /// Custom cover email prompt ({job_details}, {company_research}, {resume})
    #[serde(default)]
    pub draft_prompt: Option<String>,
    /// Maximum characters of page text sent per summary request
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout() -> u64 {
    300
}

fn default_max_content_chars() -> usize {
    12000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::base_default().with_env_overrides()
    }
}

impl LlmConfig {
    /// Base default without env overrides.
    fn base_default() -> Self {
        Self {
            enabled: default_enabled(),
            provider: LlmProvider::default(),
            endpoint: default_endpoint(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout(),
            summary_prompt: None,
            draft_prompt: None,
            max_content_chars: default_max_content_chars(),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `LLM_ENABLED`: "true" or "false"
    /// - `LLM_PROVIDER`: "ollama" (default), "openai", "groq", "openrouter" or "together"
    /// - `LLM_ENDPOINT`: API endpoint (defaults based on provider)
    /// - `LLM_API_KEY`: API key for OpenAI-compatible providers
    /// - `LLM_MODEL`, `LLM_MAX_TOKENS`, `LLM_TEMPERATURE`, `LLM_MAX_CONTENT_CHARS`
    ///
    /// Without `LLM_PROVIDER`, a provider is picked from whichever of
    /// `OPENROUTER_API_KEY`, `GROQ_API_KEY` or `OPENAI_API_KEY` is set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("LLM_ENABLED") {
            self.enabled = val.eq_ignore_ascii_case("true") || val == "1";
        }

        let explicit_provider = std::env::var("LLM_PROVIDER").ok();
        if let Some(provider) = explicit_provider.as_deref().and_then(LlmProvider::from_str) {
            self.provider = provider;
        }

        let explicit_endpoint = std::env::var("LLM_ENDPOINT").ok();
        if let Some(ref endpoint) = explicit_endpoint {
            self.endpoint = endpoint.clone();
        }

        if let Ok(val) = std::env::var("LLM_API_KEY") {
            self.api_key = Some(val);
        }

        if let Some(ref provider_str) = explicit_provider {
            let provider = provider_str.to_lowercase();
            if explicit_endpoint.is_none() {
                if let Some(endpoint) = hosted_endpoint(&provider) {
                    self.endpoint = endpoint.to_string();
                }
            }
            if self.api_key.is_none() {
                self.api_key = provider_key_var(&provider).and_then(|var| std::env::var(var).ok());
            }
        } else if self.api_key.is_none() {
            for provider in ["openrouter", "groq", "openai"] {
                let Some(key) = provider_key_var(provider).and_then(|var| std::env::var(var).ok())
                else {
                    continue;
                };
                self.api_key = Some(key);
                self.provider = LlmProvider::OpenAI;
                if explicit_endpoint.is_none() {
                    if let Some(endpoint) = hosted_endpoint(provider) {
                        self.endpoint = endpoint.to_string();
                    }
                }
                break;
            }
        }

        if let Ok(val) = std::env::var("LLM_MODEL") {
            self.model = val;
        }
        if let Ok(val) = std::env::var("LLM_MAX_TOKENS") {
            if let Ok(n) = val.parse() {
                self.max_tokens = n;
            }
        }
        if let Ok(val) = std::env::var("LLM_TEMPERATURE") {
            if let Ok(t) = val.parse() {
                self.temperature = t;
            }
        }
        if let Ok(val) = std::env::var("LLM_MAX_CONTENT_CHARS") {
            if let Ok(n) = val.parse() {
                self.max_content_chars = n;
            }
        }
        self
    }

    /// Get the summary prompt, using custom or default.
    pub fn get_summary_prompt(&self) -> &str {
        self.summary_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SUMMARY_PROMPT)
    }

    /// Get the draft prompt, using custom or default.
    pub fn get_draft_prompt(&self) -> &str {
        self.draft_prompt.as_deref().unwrap_or(DEFAULT_DRAFT_PROMPT)
    }
}

fn hosted_endpoint(provider: &str) -> Option<&'static str> {
    match provider {
        "groq" => Some("https://api.groq.com/openai"),
        "openai" => Some("https://api.openai.com"),
        "openrouter" => Some("https://openrouter.ai/api"),
        "together" => Some("https://api.together.xyz"),
        _ => None,
    }
}

fn provider_key_var(provider: &str) -> Option<&'static str> {
    match provider {
        "groq" => Some("GROQ_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        "openrouter" => Some("OPENROUTER_API_KEY"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_aliases() {
        assert_eq!(LlmProvider::from_str("Ollama"), Some(LlmProvider::Ollama));
        assert_eq!(LlmProvider::from_str("openrouter"), Some(LlmProvider::OpenAI));
        assert_eq!(LlmProvider::from_str("groq"), Some(LlmProvider::OpenAI));
        assert_eq!(LlmProvider::from_str("bard"), None);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: LlmConfig = toml::from_str("model = \"mistral\"").unwrap();
        assert_eq!(config.model, "mistral");
        assert_eq!(config.endpoint, "http://localhost:11434");
        assert_eq!(config.max_content_chars, 12000);
        assert!(config.get_draft_prompt().contains("{resume}"));
    }
}
