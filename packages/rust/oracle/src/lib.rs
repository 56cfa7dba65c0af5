//! Natural-language oracles that turn an instruction prompt into JSON text.
//!
//! Each provider implements [`Oracle`]. The [`OracleRegistry`] selects one by
//! provider name and falls back to the default provider when the name is
//! unknown.

mod anthropic;
mod http;
mod ollama;
mod openai;
mod registry;
mod static_oracle;

use async_trait::async_trait;

use flowsmith_shared::Result;

pub use anthropic::AnthropicOracle;
pub use ollama::OllamaOracle;
pub use openai::OpenAiCompatibleOracle;
pub use registry::{OracleRegistry, ProviderInfo};
pub use static_oracle::StaticOracle;

/// One oracle call.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    /// Standing instructions, sent as the system message where supported.
    pub system: Option<String>,
    /// The user-facing prompt.
    pub prompt: String,
    pub model: String,
    /// Resolved API key, for providers that need one.
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl OracleRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            model: model.into(),
            api_key: None,
            temperature: 0.1,
            max_tokens: 4096,
        }
    }
}

/// Capability interface implemented once per provider.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Provider name, e.g. `openai`.
    fn name(&self) -> &str;

    /// Name of the credential (env var / stored secret) this provider needs.
    fn credential_name(&self) -> Option<&str> {
        None
    }

    /// Model suggested when listing providers.
    fn default_model(&self) -> Option<&str> {
        None
    }

    /// Send the prompt and return the raw completion text.
    async fn dispatch(&self, request: &OracleRequest) -> Result<String>;
}
