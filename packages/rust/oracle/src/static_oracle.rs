//! Canned-response oracle for tests and offline runs.

use std::sync::Mutex;

use async_trait::async_trait;

use flowsmith_shared::{FlowsmithError, Result};

use crate::{Oracle, OracleRequest};

/// Replies with a fixed text (or a fixed failure) and remembers what it was asked.
pub struct StaticOracle {
    name: String,
    credential_name: Option<String>,
    reply: std::result::Result<String, String>,
    requests: Mutex<Vec<OracleRequest>>,
}

impl StaticOracle {
    /// Always answer with `reply`.
    pub fn new(name: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            credential_name: None,
            reply: Ok(reply.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always fail with an oracle error carrying `message`.
    pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            reply: Err(message.into()),
            ..Self::new(name, "")
        }
    }

    /// Demand a credential, as a hosted provider would.
    pub fn with_credential(mut self, credential_name: impl Into<String>) -> Self {
        self.credential_name = Some(credential_name.into());
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<OracleRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Oracle for StaticOracle {
    fn name(&self) -> &str {
        &self.name
    }

    fn credential_name(&self) -> Option<&str> {
        self.credential_name.as_deref()
    }

    async fn dispatch(&self, request: &OracleRequest) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.reply
            .clone()
            .map_err(|message| FlowsmithError::Oracle(format!("{}: {message}", self.name)))
    }
}
