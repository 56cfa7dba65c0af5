//! Instruction parsing: oracle call, response decoding, validation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use flowsmith_knowledge::KnowledgeBase;
use flowsmith_oracle::{OracleRegistry, OracleRequest};
use flowsmith_shared::{AppConfig, FlowsmithError, ParsedInstruction, Result};

use crate::credentials::CredentialResolver;
use crate::prompt::{SYSTEM_PROMPT, build_prompt, strip_code_fences};
use crate::validate::validate;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Sampling and timeout settings applied to every oracle call.
#[derive(Debug, Clone)]
pub struct ParserSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    /// Model used when neither the request nor the provider names one.
    pub default_model: String,
}

impl ParserSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            temperature: config.oracle.temperature,
            max_tokens: config.oracle.max_tokens,
            timeout: Duration::from_secs(config.oracle.timeout_secs),
            default_model: config.defaults.model.clone(),
        }
    }
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// One instruction to parse, with the caller's provider selection.
#[derive(Debug, Clone)]
pub struct ParseRequest {
    pub instruction: String,
    pub provider: String,
    pub model: Option<String>,
    pub user_id: String,
    /// Provider used when `provider` is unknown; the registry default if unset.
    pub fallback_provider: Option<String>,
}

/// Progress of a single parse, logged as it advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    Received,
    OracleQueried,
    ResponseParsed,
    Validated,
    Done,
    NeedsClarification,
    Error,
}

impl fmt::Display for ParseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            Self::Received => "received",
            Self::OracleQueried => "oracle_queried",
            Self::ResponseParsed => "response_parsed",
            Self::Validated => "validated",
            Self::Done => "done",
            Self::NeedsClarification => "needs_clarification",
            Self::Error => "error",
        };
        f.write_str(stage)
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Turns natural-language instructions into validated [`ParsedInstruction`]s.
#[derive(Clone)]
pub struct InstructionParser {
    oracles: Arc<OracleRegistry>,
    credentials: CredentialResolver,
    settings: ParserSettings,
}

impl InstructionParser {
    pub fn new(
        oracles: Arc<OracleRegistry>,
        credentials: CredentialResolver,
        settings: ParserSettings,
    ) -> Self {
        Self {
            oracles,
            credentials,
            settings,
        }
    }

    pub fn oracles(&self) -> &OracleRegistry {
        &self.oracles
    }

    pub fn credentials(&self) -> &CredentialResolver {
        &self.credentials
    }

    /// Parse `request.instruction` against `kb`.
    ///
    /// Configuration and oracle failures are returned as errors. Any other
    /// failure, including an undecodable oracle reply, yields an instruction
    /// carrying a single `error` clarification question.
    #[instrument(skip_all, fields(provider = %request.provider, user = %request.user_id))]
    pub async fn parse(&self, kb: &KnowledgeBase, request: ParseRequest) -> Result<ParsedInstruction> {
        debug!(stage = %ParseStage::Received, "parsing instruction");

        match self.run(kb, &request).await {
            Ok(parsed) => Ok(parsed),
            Err(e @ (FlowsmithError::Config { .. } | FlowsmithError::Oracle(_))) => {
                warn!(stage = %ParseStage::Error, error = %e, "instruction parsing failed");
                Err(e)
            }
            Err(e) => {
                warn!(stage = %ParseStage::Error, error = %e, "oracle reply unusable");
                Ok(ParsedInstruction::error(&request.instruction, e.to_string()))
            }
        }
    }

    async fn run(&self, kb: &KnowledgeBase, request: &ParseRequest) -> Result<ParsedInstruction> {
        let (provider, oracle) = match &request.fallback_provider {
            Some(fallback) => self.oracles.resolve_or(&request.provider, fallback)?,
            None => self.oracles.resolve(&request.provider)?,
        };

        // Credential lookup and dispatch share one deadline.
        let timeout = self.settings.timeout;
        let deadline = Instant::now() + timeout;

        let api_key = match oracle.credential_name() {
            Some(name) => {
                let lookup = self.credentials.resolve(&request.user_id, name);
                let value = tokio::time::timeout_at(deadline, lookup).await.map_err(|_| {
                    FlowsmithError::Storage(format!(
                        "credential lookup for {name} did not finish within {}s",
                        timeout.as_secs()
                    ))
                })??;
                Some(value)
            }
            None => None,
        };

        let model = request
            .model
            .clone()
            .or_else(|| oracle.default_model().map(str::to_string))
            .unwrap_or_else(|| self.settings.default_model.clone());

        let oracle_request = OracleRequest {
            system: Some(SYSTEM_PROMPT.to_string()),
            prompt: build_prompt(kb, &request.instruction),
            model,
            api_key,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let reply = tokio::time::timeout_at(deadline, oracle.dispatch(&oracle_request))
            .await
            .map_err(|_| {
                FlowsmithError::Oracle(format!(
                    "{provider} did not answer within {}s",
                    timeout.as_secs()
                ))
            })??;
        debug!(stage = %ParseStage::OracleQueried, %provider, bytes = reply.len(), "oracle replied");

        let mut parsed = decode_reply(&reply)?;
        parsed.original_instruction = request.instruction.clone();
        debug!(
            stage = %ParseStage::ResponseParsed,
            components = parsed.components.len(),
            connections = parsed.connections.len(),
            "oracle reply decoded"
        );

        let questions = validate(kb, &parsed);
        debug!(stage = %ParseStage::Validated, questions = questions.len(), "proposal validated");
        if !questions.is_empty() {
            parsed.clarification_needed = true;
            parsed.clarification_questions.extend(questions);
        }

        let stage = if parsed.clarification_needed {
            ParseStage::NeedsClarification
        } else {
            ParseStage::Done
        };
        info!(
            %stage,
            components = parsed.components.len(),
            questions = parsed.clarification_questions.len(),
            "instruction parsed"
        );
        Ok(parsed)
    }
}

/// Decode an oracle reply, tolerating a surrounding code fence.
pub fn decode_reply(reply: &str) -> Result<ParsedInstruction> {
    serde_json::from_str(strip_code_fences(reply))
        .map_err(|e| FlowsmithError::decode(format!("oracle reply is not a valid flow proposal: {e}")))
}
