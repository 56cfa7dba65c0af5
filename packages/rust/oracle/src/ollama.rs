//! Local Ollama server. Needs no credential.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::instrument;

use flowsmith_shared::{FlowsmithError, Result};

use crate::http::{build_client, endpoint, read_json, transport_error};
use crate::{Oracle, OracleRequest};

pub struct OllamaOracle {
    endpoint: String,
    default_model: Option<String>,
    client: Client,
}

impl OllamaOracle {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            endpoint: endpoint(base_url, "api/chat")?,
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
impl Oracle for OllamaOracle {
    fn name(&self) -> &str {
        "ollama"
    }

    fn default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    #[instrument(skip_all, fields(provider = "ollama", model = %request.model))]
    async fn dispatch(&self, request: &OracleRequest) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": request.prompt}));

        let body = json!({
            "model": request.model,
            "messages": messages,
            "stream": false,
            "format": "json",
            "options": {"temperature": request.temperature},
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(self.name(), e))?;
        let payload = read_json(self.name(), response).await?;

        payload["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| FlowsmithError::Oracle("ollama: response has no message content".into()))
    }
}
