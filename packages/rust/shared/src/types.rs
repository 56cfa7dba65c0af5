//! Wire and domain types shared by the parser, constructor and callers.
//!
//! Field names here are a stable contract with oracle prompts and API
//! clients; renames must keep the serialized names intact.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Field name assumed on the source side of a connection when none is given.
pub const DEFAULT_SOURCE_FIELD: &str = "output";

/// Treat an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_source_field() -> String {
    DEFAULT_SOURCE_FIELD.to_string()
}

/// Like [`null_as_default`], but `null` means [`DEFAULT_SOURCE_FIELD`].
fn null_as_source_field<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_source_field))
}

// ---------------------------------------------------------------------------
// Intermediate representation
// ---------------------------------------------------------------------------

/// One component the instruction asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRequirement {
    /// Registry category, e.g. `models`.
    #[serde(rename = "component_type")]
    pub category: String,
    /// Component name within the category, e.g. `OpenAIModel`.
    #[serde(rename = "component_name")]
    pub name: String,
    /// Template parameter overrides.
    #[serde(default, deserialize_with = "null_as_default")]
    pub parameters: Map<String, Value>,
    /// Why the oracle picked this component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A requested link between two entries of the component list.
///
/// Indices are signed so that a negative index from the oracle is reported
/// as out of range instead of failing the whole decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRequirement {
    #[serde(rename = "source_component_idx")]
    pub source_index: i64,
    #[serde(rename = "target_component_idx")]
    pub target_index: i64,
    #[serde(default = "default_source_field", deserialize_with = "null_as_source_field")]
    pub source_field: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub target_field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ConnectionRequirement {
    /// Resolve `index` against a list of `len` entries.
    pub fn resolve(index: i64, len: usize) -> Option<usize> {
        usize::try_from(index).ok().filter(|i| *i < len)
    }
}

/// A structured question handed back to the caller.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClarificationQuestion {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub question: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub options: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub context: Map<String, Value>,
}

impl ClarificationQuestion {
    pub fn new(id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            ..Default::default()
        }
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    pub fn with_context(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}

/// The validated intermediate representation of one instruction.
///
/// The same struct decodes the oracle's JSON proposal; `original_instruction`
/// is filled in by the parser.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParsedInstruction {
    #[serde(default, deserialize_with = "null_as_default")]
    pub original_instruction: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub components: Vec<ComponentRequirement>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub connections: Vec<ConnectionRequirement>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parameters: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub clarification_needed: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub clarification_questions: Vec<ClarificationQuestion>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub flow_description: String,
}

impl ParsedInstruction {
    /// The recovery result: no components, one synthetic `error` question.
    pub fn error(instruction: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            original_instruction: instruction.to_string(),
            clarification_needed: true,
            clarification_questions: vec![
                ClarificationQuestion::new(
                    "error",
                    format!("The instruction could not be interpreted: {message}. Please rephrase it."),
                )
                .with_context("error", message),
            ],
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Flow graph
// ---------------------------------------------------------------------------

/// Canvas coordinates of a node's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    pub category: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Template with defaults and overrides applied.
    pub template: Map<String, Value>,
    pub position: Position,
}

/// Which fields an edge wires together, with the types they carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldBinding {
    pub source_field: String,
    pub target_field: String,
    /// Output types of the source component.
    pub output_types: Vec<String>,
    /// Declared type of the target input field, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub binding: FieldBinding,
}

/// Nodes plus edges, ready for execution or persistence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlowGraph {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

impl FlowGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// Echo returned for a clarification answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationAnswer {
    pub question_id: String,
    pub response: String,
    pub instruction: String,
    pub processed: bool,
}
