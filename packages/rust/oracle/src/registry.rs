//! Provider-name → oracle lookup.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use flowsmith_shared::{AppConfig, FlowsmithError, Result};

use crate::{AnthropicOracle, OllamaOracle, OpenAiCompatibleOracle, Oracle};

/// Listing entry for `providers list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    pub requires_credential: bool,
    pub is_default: bool,
}

/// Registered oracles keyed by provider name.
pub struct OracleRegistry {
    oracles: BTreeMap<String, Arc<dyn Oracle>>,
    default_provider: String,
}

impl OracleRegistry {
    /// An empty registry whose fallback is `default_provider`.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            oracles: BTreeMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Build one oracle per `[providers.<name>]` entry.
    ///
    /// `anthropic` and `ollama` get their native APIs; every other name is
    /// treated as OpenAI-compatible.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.oracle.timeout_secs);
        let mut registry = Self::new(&config.defaults.provider);

        for (name, provider) in &config.providers {
            let oracle: Arc<dyn Oracle> = match name.as_str() {
                "anthropic" => {
                    let credential = provider.api_key_env.clone().ok_or_else(|| {
                        FlowsmithError::config("provider 'anthropic' requires api_key_env")
                    })?;
                    Arc::new(
                        AnthropicOracle::new(&provider.base_url, credential, timeout)?
                            .with_default_model(&provider.default_model),
                    )
                }
                "ollama" => Arc::new(
                    OllamaOracle::new(&provider.base_url, timeout)?
                        .with_default_model(&provider.default_model),
                ),
                _ => Arc::new(
                    OpenAiCompatibleOracle::new(
                        name,
                        &provider.base_url,
                        provider.api_key_env.clone(),
                        timeout,
                    )?
                    .with_default_model(&provider.default_model),
                ),
            };
            registry.register_as(name, oracle);
        }

        Ok(registry)
    }

    /// Register under the oracle's own name.
    pub fn register(&mut self, oracle: Arc<dyn Oracle>) {
        let name = oracle.name().to_string();
        self.register_as(&name, oracle);
    }

    pub fn register_as(&mut self, name: &str, oracle: Arc<dyn Oracle>) {
        self.oracles.insert(name.to_string(), oracle);
    }

    /// The oracle for `provider`, or the default provider's oracle when the
    /// name is unknown.
    pub fn resolve(&self, provider: &str) -> Result<(String, Arc<dyn Oracle>)> {
        self.resolve_or(provider, &self.default_provider)
    }

    /// The oracle for `provider`, or `fallback`'s oracle when the name is
    /// unknown.
    pub fn resolve_or(&self, provider: &str, fallback: &str) -> Result<(String, Arc<dyn Oracle>)> {
        if let Some(oracle) = self.oracles.get(provider) {
            return Ok((provider.to_string(), Arc::clone(oracle)));
        }

        warn!(
            requested = provider,
            fallback,
            "unknown oracle provider, falling back to default"
        );
        self.oracles
            .get(fallback)
            .map(|oracle| (fallback.to_string(), Arc::clone(oracle)))
            .ok_or_else(|| {
                FlowsmithError::config(format!("default provider '{fallback}' is not registered"))
            })
    }

    /// The oracle registered as `provider`, without fallback.
    pub fn get(&self, provider: &str) -> Option<&Arc<dyn Oracle>> {
        self.oracles.get(provider)
    }

    pub fn contains(&self, provider: &str) -> bool {
        self.oracles.contains_key(provider)
    }

    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }

    pub fn providers(&self) -> Vec<ProviderInfo> {
        self.oracles
            .iter()
            .map(|(name, oracle)| ProviderInfo {
                name: name.clone(),
                default_model: oracle.default_model().map(str::to_string),
                requires_credential: oracle.credential_name().is_some(),
                is_default: *name == self.default_provider,
            })
            .collect()
    }
}
