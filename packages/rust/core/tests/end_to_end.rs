//! End-to-end runs of the orchestrator with canned oracle replies.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::json;

use flowsmith_core::{FlowOrchestrator, ParserSettings};
use flowsmith_knowledge::{RegistryCatalog, RegistrySource, StaticSource};
use flowsmith_oracle::{OracleRegistry, StaticOracle};
use flowsmith_shared::{ErrorKind, FlowsmithError, LayoutConfig, MemoryCredentialStore, Result};

const CATALOG: &str = r#"{
    "sources": {
        "A": {"display_name": "Source A", "output_types": ["TA"]},
        "B": {"display_name": "Source B", "output_types": ["TB"]}
    },
    "sinks": {
        "C": {"display_name": "Combiner", "inputs": {"in1": "TA", "in2": "TB"}, "output_types": ["TC"],
              "template": {"separator": {"value": ","}}}
    },
    "models": {
        "OpenAIModel": {"display_name": "OpenAI", "description": "Generates text with OpenAI models", "inputs": {"input_value": "TC"}, "output_types": ["TA"]},
        "OllamaModel": {"display_name": "Ollama", "description": "Generates text with local models", "inputs": {"input_value": "TC"}, "output_types": ["TA"]}
    }
}"#;

const ABC_REPLY: &str = r#"{
    "components": [
        {"component_type": "sources", "component_name": "A"},
        {"component_type": "sources", "component_name": "B"},
        {"component_type": "sinks", "component_name": "C", "parameters": {"separator": ";"}}
    ],
    "connections": [
        {"source_component_idx": 0, "target_component_idx": 2, "source_field": "output", "target_field": "in1"},
        {"source_component_idx": 1, "target_component_idx": 2, "source_field": "output", "target_field": "in2"}
    ],
    "parameters": {},
    "clarification_needed": false,
    "clarification_questions": [],
    "flow_description": "Combine A and B in C"
}"#;

fn orchestrator_with(oracle: StaticOracle) -> FlowOrchestrator {
    let mut oracles = OracleRegistry::new("static");
    oracles.register(Arc::new(oracle));
    FlowOrchestrator::new(
        Arc::new(StaticSource::from_json(CATALOG).unwrap()),
        Arc::new(oracles),
        Arc::new(MemoryCredentialStore::new()),
        ParserSettings::default(),
        LayoutConfig::default(),
    )
}

fn orchestrator(reply: &str) -> FlowOrchestrator {
    orchestrator_with(StaticOracle::new("static", reply))
}

#[tokio::test]
async fn three_components_two_connections() {
    let orch = orchestrator(ABC_REPLY);
    let build = orch
        .build_flow_from_instruction("alice", "combine a and b", None, None)
        .await;

    assert!(build.failure.is_none());
    assert!(!build.interpretation.clarification_needed);
    assert!(build.interpretation.clarification_questions.is_empty());
    assert_eq!(build.interpretation.original_instruction, "combine a and b");

    let graph = build.graph;
    assert_eq!(graph.nodes.len(), 3);
    assert_eq!(graph.edges.len(), 2);

    let c = &graph.nodes[2];
    assert_eq!(c.name, "C");
    assert_eq!(c.template["separator"], json!({"value": ";"}));

    let fields: Vec<(&str, &str, &str)> = graph
        .edges
        .iter()
        .map(|e| {
            (
                e.binding.source_field.as_str(),
                e.binding.target_field.as_str(),
                e.target.as_str(),
            )
        })
        .collect();
    assert_eq!(
        fields,
        vec![("output", "in1", c.id.as_str()), ("output", "in2", c.id.as_str())]
    );
    assert_eq!(graph.edges[0].source, graph.nodes[0].id);
    assert_eq!(graph.edges[1].source, graph.nodes[1].id);
}

#[tokio::test]
async fn fenced_reply_matches_plain_reply() {
    let plain = orchestrator(ABC_REPLY)
        .interpret_instruction("alice", "combine", None, None)
        .await;
    let fenced = orchestrator(&format!("```json\n{ABC_REPLY}\n```"))
        .interpret_instruction("alice", "combine", None, None)
        .await;
    assert_eq!(plain.interpretation, fenced.interpretation);

    let bare_fence = orchestrator(&format!("```\n{ABC_REPLY}```"))
        .interpret_instruction("alice", "combine", None, None)
        .await;
    assert_eq!(plain.interpretation, bare_fence.interpretation);
}

#[tokio::test]
async fn out_of_range_target_asks_one_question() {
    let reply = r#"{
        "components": [
            {"component_type": "sources", "component_name": "A"},
            {"component_type": "sinks", "component_name": "C"}
        ],
        "connections": [
            {"source_component_idx": 0, "target_component_idx": 99, "target_field": "in1"}
        ]
    }"#;
    let build = orchestrator(reply)
        .build_flow_from_instruction("alice", "a into c", None, None)
        .await;

    assert!(build.failure.is_none());
    assert!(build.interpretation.clarification_needed);
    let questions = &build.interpretation.clarification_questions;
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].id, "connection_0_target");
    assert!(questions[0].question.contains("invalid target"));
    assert!(questions[0].question.contains("99"));
    assert!(build.graph.is_empty());
}

#[tokio::test]
async fn unknown_category_offers_every_category() {
    let reply = r#"{"components": [{"component_type": "llms", "component_name": "GPT"}]}"#;
    let result = orchestrator(reply)
        .interpret_instruction("alice", "use gpt", None, None)
        .await;

    let questions = &result.interpretation.clarification_questions;
    assert_eq!(questions.len(), 1);
    let mut options = questions[0].options.clone();
    options.sort();
    assert_eq!(options, vec!["models", "sinks", "sources"]);
}

#[tokio::test]
async fn unknown_name_offers_category_names() {
    let reply = r#"{"components": [{"component_type": "models", "component_name": "LocalLlama", "description": "local ollama model"}]}"#;
    let result = orchestrator(reply)
        .interpret_instruction("alice", "use a local model", None, None)
        .await;

    let questions = &result.interpretation.clarification_questions;
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].id, "component_0_name");
    assert_eq!(questions[0].options, vec!["OllamaModel", "OpenAIModel"]);
}

#[tokio::test]
async fn undecodable_reply_becomes_error_question() {
    let build = orchestrator("Sure! Here is your flow.")
        .build_flow_from_instruction("alice", "anything", None, None)
        .await;

    assert!(build.failure.is_none());
    assert!(build.interpretation.clarification_needed);
    assert_eq!(build.interpretation.clarification_questions.len(), 1);
    assert_eq!(build.interpretation.clarification_questions[0].id, "error");
    assert!(build.graph.is_empty());
}

#[tokio::test]
async fn missing_credential_is_a_client_error() {
    let orch = orchestrator_with(
        StaticOracle::new("static", ABC_REPLY).with_credential("FLOWSMITH_E2E_UNSET_KEY"),
    );
    let result = orch.interpret_instruction("alice", "combine", None, None).await;

    let failure = result.failure.unwrap();
    assert_eq!(failure.kind, ErrorKind::Configuration);
    assert!(failure.kind.is_client_error());
    assert!(failure.message.contains("FLOWSMITH_E2E_UNSET_KEY"));
    assert!(result.interpretation.clarification_needed);
}

#[tokio::test]
async fn saved_credential_unlocks_provider() {
    let orch = orchestrator_with(
        StaticOracle::new("static", ABC_REPLY).with_credential("FLOWSMITH_E2E_SAVED_KEY"),
    );
    orch.save_credential("alice", "FLOWSMITH_E2E_SAVED_KEY", "sk-live")
        .await
        .unwrap();
    let result = orch.interpret_instruction("alice", "combine", None, None).await;
    assert!(result.failure.is_none());

    let other = orch.interpret_instruction("bob", "combine", None, None).await;
    assert_eq!(other.failure.unwrap().kind, ErrorKind::Configuration);
}

#[tokio::test]
async fn dummy_credential_counts_as_missing() {
    let orch = orchestrator_with(
        StaticOracle::new("static", ABC_REPLY).with_credential("FLOWSMITH_E2E_DUMMY_KEY"),
    );
    orch.save_credential("alice", "FLOWSMITH_E2E_DUMMY_KEY", "dummy")
        .await
        .unwrap();
    let result = orch.interpret_instruction("alice", "combine", None, None).await;
    assert_eq!(result.failure.unwrap().kind, ErrorKind::Configuration);
}

#[tokio::test]
async fn oracle_failure_is_reported() {
    let result = orchestrator_with(StaticOracle::failing("static", "503 upstream"))
        .interpret_instruction("alice", "combine", None, None)
        .await;
    let failure = result.failure.unwrap();
    assert_eq!(failure.kind, ErrorKind::Oracle);
    assert!(!failure.kind.is_client_error());
}

#[tokio::test]
async fn unknown_provider_falls_back_to_default() {
    let result = orchestrator(ABC_REPLY)
        .interpret_instruction("alice", "combine", Some("no-such-provider"), None)
        .await;
    assert!(result.failure.is_none());
    assert_eq!(result.interpretation.components.len(), 3);
}

#[tokio::test]
async fn clarification_response_is_acknowledged() {
    let answer = orchestrator(ABC_REPLY).process_clarification_response(
        "component_0_category",
        "models",
        "use gpt",
    );
    assert!(answer.processed);
    assert_eq!(answer.response, "models");
}

// ---------------------------------------------------------------------------
// Refresh under concurrent reads
// ---------------------------------------------------------------------------

/// Serves a chain `N0 -> N1 -> ... -> Nk`, one component longer per load.
struct GrowingChain {
    loads: AtomicUsize,
}

#[async_trait]
impl RegistrySource for GrowingChain {
    fn name(&self) -> &str {
        "growing-chain"
    }

    async fn load(&self) -> Result<RegistryCatalog> {
        let len = self.loads.fetch_add(1, Ordering::SeqCst) + 2;
        let mut chain = serde_json::Map::new();
        for i in 0..len {
            let mut descriptor = json!({"output_types": [format!("T{i}")]});
            if i > 0 {
                descriptor["inputs"] = json!({"input": format!("T{}", i - 1)});
            }
            chain.insert(format!("N{i}"), descriptor);
        }
        let catalog = json!({ "chain": chain });
        serde_json::from_value(catalog).map_err(|e| FlowsmithError::decode(e.to_string()))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn refresh_never_exposes_a_partial_knowledge_base() {
    let orch = Arc::new(FlowOrchestrator::new(
        Arc::new(GrowingChain {
            loads: AtomicUsize::new(0),
        }),
        Arc::new(OracleRegistry::new("static")),
        Arc::new(MemoryCredentialStore::new()),
        ParserSettings::default(),
        LayoutConfig::default(),
    ));
    orch.initialize().await.unwrap();

    let writer = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move {
            for _ in 0..50 {
                orch.refresh_knowledge_base().await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let orch = Arc::clone(&orch);
        readers.push(tokio::spawn(async move {
            for _ in 0..200 {
                let kb = orch.knowledge_base().await.unwrap();
                let names = kb.names("chain");
                let last = names.len() - 1;
                assert_eq!(kb.compatibility().edge_count(), last);
                for i in 0..last {
                    let next = kb.compatible_components("chain", &format!("N{i}"));
                    assert_eq!(next.len(), 1);
                    assert_eq!(next[0].descriptor.name, format!("N{}", i + 1));
                }
                tokio::task::yield_now().await;
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
    assert_eq!(orch.stats().unwrap().components, 52);
}
