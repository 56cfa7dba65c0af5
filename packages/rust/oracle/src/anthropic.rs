//! Anthropic messages API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, instrument};

use flowsmith_shared::{FlowsmithError, Result};

use crate::http::{build_client, endpoint, read_json, require_key, transport_error};
use crate::{Oracle, OracleRequest};

/// API version header value sent with every request.
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicOracle {
    endpoint: String,
    credential_name: String,
    default_model: Option<String>,
    client: Client,
}

impl AnthropicOracle {
    pub fn new(base_url: &str, credential_name: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            endpoint: endpoint(base_url, "messages")?,
            credential_name: credential_name.into(),
            default_model: None,
            client: build_client(timeout)?,
        })
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }
}

#[async_trait]
impl Oracle for AnthropicOracle {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn credential_name(&self) -> Option<&str> {
        Some(&self.credential_name)
    }

    fn default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    #[instrument(skip_all, fields(provider = "anthropic", model = %request.model))]
    async fn dispatch(&self, request: &OracleRequest) -> Result<String> {
        let key = require_key(self.name(), request.api_key.as_deref())?;

        let mut body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [{"role": "user", "content": request.prompt}],
        });
        if let Some(system) = &request.system {
            body["system"] = json!(system);
        }

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(self.name(), e))?;
        let payload = read_json(self.name(), response).await?;

        let blocks = payload["content"].as_array().ok_or_else(|| {
            FlowsmithError::Oracle("anthropic: response has no content blocks".into())
        })?;
        let text: String = blocks
            .iter()
            .filter(|block| block["type"] == "text")
            .filter_map(|block| block["text"].as_str())
            .collect();

        if text.is_empty() {
            return Err(FlowsmithError::Oracle(
                "anthropic: response has no text content".into(),
            ));
        }

        debug!(chars = text.len(), "oracle responded");
        Ok(text)
    }
}
