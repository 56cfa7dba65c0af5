//! OpenAI chat-completions wire format (also spoken by OpenRouter and most
//! self-hosted gateways).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, instrument};

use flowsmith_shared::{FlowsmithError, Result};

use crate::http::{build_client, endpoint, read_json, require_key, transport_error};
use crate::{Oracle, OracleRequest};

/// Oracle for any endpoint implementing `POST /chat/completions`.
pub struct OpenAiCompatibleOracle {
    name: String,
    endpoint: String,
    credential_name: Option<String>,
    default_model: Option<String>,
    client: Client,
}

impl OpenAiCompatibleOracle {
    pub fn new(
        name: impl Into<String>,
        base_url: &str,
        credential_name: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            endpoint: endpoint(base_url, "chat/completions")?,
            credential_name,
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
impl Oracle for OpenAiCompatibleOracle {
    fn name(&self) -> &str {
        &self.name
    }

    fn credential_name(&self) -> Option<&str> {
        self.credential_name.as_deref()
    }

    fn default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    #[instrument(skip_all, fields(provider = %self.name, model = %request.model))]
    async fn dispatch(&self, request: &OracleRequest) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": request.prompt}));

        let body = json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let mut builder = self.client.post(&self.endpoint).json(&body);
        if self.credential_name.is_some() {
            builder = builder.bearer_auth(require_key(&self.name, request.api_key.as_deref())?);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(&self.name, e))?;
        let payload = read_json(&self.name, response).await?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                FlowsmithError::Oracle(format!("{}: response has no message content", self.name))
            })?;

        debug!(chars = content.len(), "oracle responded");
        Ok(content.to_string())
    }
}
