//! Request-level API over the knowledge base, parser and constructor.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use flowsmith_knowledge::{
    CompatibleComponent, ComponentDescriptor, KnowledgeBase, KnowledgeHandle, KnowledgeStats,
    RegistrySource,
};
use flowsmith_oracle::{OracleRegistry, ProviderInfo};
use flowsmith_shared::{
    AppConfig, ClarificationAnswer, CredentialStore, ErrorKind, FlowGraph, FlowsmithError,
    LayoutConfig, ParsedInstruction, Result,
};

use crate::constructor::FlowConstructor;
use crate::credentials::CredentialResolver;
use crate::parser::{InstructionParser, ParseRequest, ParserSettings};

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Provider and model used when a request names none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderSelection {
    pub provider: String,
    pub model: Option<String>,
}

/// Classified failure attached to a request result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&FlowsmithError> for FailureReport {
    fn from(err: &FlowsmithError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result of interpreting one instruction.
#[derive(Debug, Clone, Serialize)]
pub struct Interpretation {
    pub interpretation: ParsedInstruction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReport>,
}

/// Result of interpreting one instruction and building its flow.
#[derive(Debug, Clone, Serialize)]
pub struct FlowBuild {
    pub interpretation: ParsedInstruction,
    pub graph: FlowGraph,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReport>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Owns the knowledge base lifecycle and serves requests against it.
///
/// Requests read the current knowledge base snapshot without locking.
/// Initialization and refresh are serialized with each other and publish a
/// fully built replacement in one swap.
pub struct FlowOrchestrator {
    source: Arc<dyn RegistrySource>,
    knowledge: KnowledgeHandle,
    build_lock: Mutex<()>,
    parser: InstructionParser,
    constructor: FlowConstructor,
    selection: ArcSwap<ProviderSelection>,
}

impl FlowOrchestrator {
    pub fn new(
        source: Arc<dyn RegistrySource>,
        oracles: Arc<OracleRegistry>,
        credentials: Arc<dyn CredentialStore>,
        settings: ParserSettings,
        layout: LayoutConfig,
    ) -> Self {
        let provider = oracles.default_provider().to_string();
        let selection = ProviderSelection {
            model: oracles
                .get(&provider)
                .and_then(|oracle| oracle.default_model())
                .map(str::to_string),
            provider,
        };
        Self {
            source,
            knowledge: KnowledgeHandle::new(),
            build_lock: Mutex::new(()),
            parser: InstructionParser::new(oracles, CredentialResolver::new(credentials), settings),
            constructor: FlowConstructor::new(layout),
            selection: ArcSwap::from_pointee(selection),
        }
    }

    /// Wire everything from `config`, with oracles for every configured provider.
    pub fn from_config(
        config: &AppConfig,
        source: Arc<dyn RegistrySource>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self> {
        let oracles = OracleRegistry::from_config(config)?;
        Ok(Self::new(
            source,
            Arc::new(oracles),
            credentials,
            ParserSettings::from_config(config),
            config.layout,
        ))
    }

    // -- knowledge base lifecycle ------------------------------------------

    /// Build and publish the knowledge base unless one is already published.
    pub async fn initialize(&self) -> Result<KnowledgeStats> {
        if let Some(kb) = self.knowledge.current() {
            return Ok(kb.stats());
        }

        let _guard = self.build_lock.lock().await;
        if let Some(kb) = self.knowledge.current() {
            return Ok(kb.stats());
        }

        let kb = KnowledgeBase::build(self.source.as_ref()).await?;
        Ok(self.knowledge.replace(kb).stats())
    }

    /// Rebuild from the source and swap the result in. On failure the
    /// previous knowledge base stays published.
    #[instrument(skip_all, fields(source = self.source.name()))]
    pub async fn refresh_knowledge_base(&self) -> Result<KnowledgeStats> {
        let _guard = self.build_lock.lock().await;
        let kb = KnowledgeBase::build(self.source.as_ref()).await?;
        let stats = self.knowledge.replace(kb).stats();
        info!(
            categories = stats.categories,
            components = stats.components,
            edges = stats.compatibility_edges,
            "knowledge base refreshed"
        );
        Ok(stats)
    }

    /// The published snapshot, building it first if needed.
    pub async fn knowledge_base(&self) -> Result<Arc<KnowledgeBase>> {
        if let Some(kb) = self.knowledge.current() {
            return Ok(kb);
        }
        self.initialize().await?;
        self.knowledge
            .current()
            .ok_or_else(|| FlowsmithError::Construction("knowledge base was not published".into()))
    }

    /// Stats of the published snapshot, if any.
    pub fn stats(&self) -> Option<KnowledgeStats> {
        self.knowledge.current().map(|kb| kb.stats())
    }

    // -- requests ----------------------------------------------------------

    /// Parse `instruction` into a validated interpretation.
    #[instrument(skip_all, fields(user = user_id))]
    pub async fn interpret_instruction(
        &self,
        user_id: &str,
        instruction: &str,
        provider: Option<&str>,
        model: Option<&str>,
    ) -> Interpretation {
        match self.interpret(user_id, instruction, provider, model).await {
            Ok((_, interpretation)) => Interpretation {
                interpretation,
                failure: None,
            },
            Err(e) => Interpretation {
                interpretation: ParsedInstruction::error(instruction, e.to_string()),
                failure: Some(FailureReport::from(&e)),
            },
        }
    }

    /// Parse `instruction` and, when nothing needs clarifying, build its flow.
    #[instrument(skip_all, fields(user = user_id))]
    pub async fn build_flow_from_instruction(
        &self,
        user_id: &str,
        instruction: &str,
        provider: Option<&str>,
        model: Option<&str>,
    ) -> FlowBuild {
        let (kb, interpretation) = match self.interpret(user_id, instruction, provider, model).await {
            Ok(parsed) => parsed,
            Err(e) => {
                return FlowBuild {
                    interpretation: ParsedInstruction::error(instruction, e.to_string()),
                    graph: FlowGraph::default(),
                    failure: Some(FailureReport::from(&e)),
                };
            }
        };

        let graph = if interpretation.clarification_needed {
            info!(
                questions = interpretation.clarification_questions.len(),
                "clarification needed, not building a flow"
            );
            FlowGraph::default()
        } else {
            self.constructor.build_flow(&kb, &interpretation)
        };

        FlowBuild {
            interpretation,
            graph,
            failure: None,
        }
    }

    /// Acknowledge an answer to a clarification question.
    ///
    /// The answer is echoed back and marked processed; the instruction is not
    /// re-interpreted.
    pub fn process_clarification_response(
        &self,
        question_id: &str,
        response: &str,
        instruction: &str,
    ) -> ClarificationAnswer {
        info!(question_id, "clarification response received");
        ClarificationAnswer {
            question_id: question_id.to_string(),
            response: response.to_string(),
            instruction: instruction.to_string(),
            processed: true,
        }
    }

    async fn interpret(
        &self,
        user_id: &str,
        instruction: &str,
        provider: Option<&str>,
        model: Option<&str>,
    ) -> Result<(Arc<KnowledgeBase>, ParsedInstruction)> {
        let kb = self.knowledge_base().await?;
        let request = self.parse_request(user_id, instruction, provider, model);
        let parsed = self.parser.parse(&kb, request).await?;
        Ok((kb, parsed))
    }

    fn parse_request(
        &self,
        user_id: &str,
        instruction: &str,
        provider: Option<&str>,
        model: Option<&str>,
    ) -> ParseRequest {
        let selection = self.selection.load();
        let provider = provider.unwrap_or(selection.provider.as_str());
        let model = match model {
            Some(model) => Some(model.to_string()),
            None if provider == selection.provider => selection.model.clone(),
            None => None,
        };
        ParseRequest {
            instruction: instruction.to_string(),
            provider: provider.to_string(),
            model,
            user_id: user_id.to_string(),
            fallback_provider: Some(selection.provider.clone()),
        }
    }

    // -- lookups -----------------------------------------------------------

    /// Descriptor of `category/name`; empty when unknown or not loaded.
    pub async fn get_component_info(&self, category: &str, name: &str) -> ComponentDescriptor {
        match self.knowledge_base().await {
            Ok(kb) => kb.component_info(category, name),
            Err(e) => {
                warn!(error = %e, "knowledge base unavailable");
                ComponentDescriptor::default()
            }
        }
    }

    /// Components `category/name` can feed; empty when unknown or not loaded.
    pub async fn get_compatible_components(&self, category: &str, name: &str) -> Vec<CompatibleComponent> {
        match self.knowledge_base().await {
            Ok(kb) => kb.compatible_components(category, name),
            Err(e) => {
                warn!(error = %e, "knowledge base unavailable");
                Vec::new()
            }
        }
    }

    // -- providers ---------------------------------------------------------

    /// Registered providers, flagging the current selection as default.
    pub fn list_providers(&self) -> Vec<ProviderInfo> {
        let selection = self.selection.load();
        self.parser
            .oracles()
            .providers()
            .into_iter()
            .map(|info| ProviderInfo {
                is_default: info.name == selection.provider,
                ..info
            })
            .collect()
    }

    pub fn current_provider(&self) -> ProviderSelection {
        self.selection.load().as_ref().clone()
    }

    /// Make `provider` (and optionally `model`) the default for later requests.
    pub fn set_provider(&self, provider: &str, model: Option<&str>) -> Result<ProviderSelection> {
        if !self.parser.oracles().contains(provider) {
            return Err(FlowsmithError::config(format!(
                "unknown provider '{provider}'"
            )));
        }
        let selection = ProviderSelection {
            provider: provider.to_string(),
            model: model.map(str::to_string),
        };
        self.selection.store(Arc::new(selection.clone()));
        info!(provider, model = ?selection.model, "provider selected");
        Ok(selection)
    }

    // -- credentials -------------------------------------------------------

    pub async fn save_credential(&self, user_id: &str, name: &str, value: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(FlowsmithError::validation("credential name must not be empty"));
        }
        self.parser.credentials().store().set(user_id, name, value).await?;
        info!(user_id, name, "credential saved");
        Ok(())
    }

    pub async fn list_credential_names(&self, user_id: &str) -> Result<Vec<String>> {
        self.parser.credentials().store().list_names(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowsmith_knowledge::StaticSource;
    use flowsmith_oracle::StaticOracle;
    use flowsmith_shared::MemoryCredentialStore;

    const CATALOG: &str = r#"{
        "inputs": {"ChatInput": {"output_types": ["Message"]}},
        "models": {"OpenAIModel": {"inputs": {"input_value": "Message"}, "output_types": ["Message"]}}
    }"#;

    fn orchestrator(oracles: OracleRegistry) -> FlowOrchestrator {
        FlowOrchestrator::new(
            Arc::new(StaticSource::from_json(CATALOG).unwrap()),
            Arc::new(oracles),
            Arc::new(MemoryCredentialStore::new()),
            ParserSettings::default(),
            LayoutConfig::default(),
        )
    }

    fn registry() -> OracleRegistry {
        let mut registry = OracleRegistry::new("one");
        registry.register(Arc::new(StaticOracle::new("one", "{}")));
        registry.register(Arc::new(StaticOracle::new("two", "{}")));
        registry
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let orch = orchestrator(registry());
        assert!(orch.stats().is_none());
        let first = orch.initialize().await.unwrap();
        let second = orch.initialize().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.components, 2);
    }

    #[tokio::test]
    async fn lookups_load_lazily() {
        let orch = orchestrator(registry());
        let info = orch.get_component_info("models", "OpenAIModel").await;
        assert_eq!(info.name, "OpenAIModel");
        assert!(orch.get_component_info("models", "Nope").await.is_empty());

        let compatible = orch.get_compatible_components("inputs", "ChatInput").await;
        assert_eq!(compatible.len(), 1);
        assert_eq!(compatible[0].descriptor.name, "OpenAIModel");
    }

    #[tokio::test]
    async fn set_provider_changes_default_selection() {
        let orch = orchestrator(registry());
        assert_eq!(orch.current_provider().provider, "one");

        orch.set_provider("two", Some("m2")).unwrap();
        let providers = orch.list_providers();
        let default: Vec<&str> = providers
            .iter()
            .filter(|p| p.is_default)
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(default, vec!["two"]);

        let request = orch.parse_request("u", "x", None, None);
        assert_eq!(request.provider, "two");
        assert_eq!(request.model.as_deref(), Some("m2"));

        let request = orch.parse_request("u", "x", Some("one"), None);
        assert_eq!(request.model, None);
    }

    #[tokio::test]
    async fn default_provider_starts_with_its_own_model() {
        let mut config = AppConfig::default();
        config.defaults.provider = "anthropic".into();
        let orch = FlowOrchestrator::from_config(
            &config,
            Arc::new(StaticSource::from_json(CATALOG).unwrap()),
            Arc::new(MemoryCredentialStore::new()),
        )
        .unwrap();

        let request = orch.parse_request("u", "x", None, None);
        assert_eq!(request.provider, "anthropic");
        assert_eq!(request.model.as_deref(), Some("claude-3-5-sonnet-latest"));

        let request = orch.parse_request("u", "x", Some("ollama"), None);
        assert_eq!(request.model, None);
    }

    #[tokio::test]
    async fn unknown_provider_falls_back_to_selection() {
        let orch = orchestrator(registry());
        orch.set_provider("two", None).unwrap();
        let request = orch.parse_request("u", "x", Some("mystery"), None);
        assert_eq!(request.provider, "mystery");
        assert_eq!(request.fallback_provider.as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn set_provider_rejects_unknown() {
        let orch = orchestrator(registry());
        let err = orch.set_provider("nope", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(orch.current_provider().provider, "one");
    }

    #[tokio::test]
    async fn clarification_is_echoed() {
        let orch = orchestrator(registry());
        let answer = orch.process_clarification_response("component_0_name", "OpenAIModel", "chat");
        assert_eq!(answer.question_id, "component_0_name");
        assert_eq!(answer.response, "OpenAIModel");
        assert_eq!(answer.instruction, "chat");
        assert!(answer.processed);
    }

    #[tokio::test]
    async fn credentials_are_scoped_by_user() {
        let orch = orchestrator(registry());
        orch.save_credential("alice", "OPENAI_API_KEY", "sk-a").await.unwrap();
        orch.save_credential("bob", "ANTHROPIC_API_KEY", "sk-b").await.unwrap();
        assert_eq!(
            orch.list_credential_names("alice").await.unwrap(),
            vec!["OPENAI_API_KEY"]
        );
        assert!(orch.save_credential("alice", " ", "x").await.is_err());
    }
}
