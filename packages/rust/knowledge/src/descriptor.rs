//! Component descriptors and the purpose taxonomy.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity of a component: `(category, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId {
    pub category: String,
    pub name: String,
}

impl ComponentId {
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.name)
    }
}

/// Static metadata for one selectable component.
///
/// `category` and `name` are filled in from the registry keys when the
/// knowledge base is built. Keys this struct does not model are kept in
/// `extra` so newer registry files still load.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Input field name → accepted type.
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    /// Types this component can emit, in declaration order.
    #[serde(default)]
    pub output_types: Vec<String>,
    /// Parameter slots with their default values.
    #[serde(default)]
    pub template: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ComponentDescriptor {
    pub fn id(&self) -> ComponentId {
        ComponentId::new(&self.category, &self.name)
    }

    /// True for the placeholder returned on lookup misses.
    pub fn is_empty(&self) -> bool {
        self.category.is_empty() && self.name.is_empty()
    }

    /// Input fields declared with exactly `data_type`.
    pub fn inputs_accepting<'a>(&'a self, data_type: &'a str) -> impl Iterator<Item = &'a str> {
        self.inputs
            .iter()
            .filter(move |(_, ty)| ty.as_str() == data_type)
            .map(|(field, _)| field.as_str())
    }
}

/// What role a component category plays in a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    LanguageModel,
    Prompt,
    Chain,
    Agent,
    Tool,
    Memory,
    Embedding,
    VectorStore,
    DocumentLoader,
    TextSplitter,
    Retriever,
    Input,
    Output,
    Unknown,
}

/// Category keyword → purpose, checked in order. More specific keywords come
/// first so that e.g. `embedding_models` is not read as a language model.
const PURPOSE_KEYWORDS: &[(&str, Purpose)] = &[
    ("embedding", Purpose::Embedding),
    ("vectorstore", Purpose::VectorStore),
    ("vectordb", Purpose::VectorStore),
    ("textsplitter", Purpose::TextSplitter),
    ("splitter", Purpose::TextSplitter),
    ("documentloader", Purpose::DocumentLoader),
    ("loader", Purpose::DocumentLoader),
    ("retriever", Purpose::Retriever),
    ("memor", Purpose::Memory),
    ("prompt", Purpose::Prompt),
    ("chain", Purpose::Chain),
    ("agent", Purpose::Agent),
    ("tool", Purpose::Tool),
    ("llm", Purpose::LanguageModel),
    ("model", Purpose::LanguageModel),
    ("input", Purpose::Input),
    ("output", Purpose::Output),
];

impl Purpose {
    /// Map a registry category name onto the taxonomy.
    pub fn classify(category: &str) -> Self {
        let normalized: String = category
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();

        PURPOSE_KEYWORDS
            .iter()
            .find(|(keyword, _)| normalized.contains(keyword))
            .map(|(_, purpose)| *purpose)
            .unwrap_or(Self::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LanguageModel => "language_model",
            Self::Prompt => "prompt",
            Self::Chain => "chain",
            Self::Agent => "agent",
            Self::Tool => "tool",
            Self::Memory => "memory",
            Self::Embedding => "embedding",
            Self::VectorStore => "vector_store",
            Self::DocumentLoader => "document_loader",
            Self::TextSplitter => "text_splitter",
            Self::Retriever => "retriever",
            Self::Input => "input",
            Self::Output => "output",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_common_categories() {
        assert_eq!(Purpose::classify("llms"), Purpose::LanguageModel);
        assert_eq!(Purpose::classify("models"), Purpose::LanguageModel);
        assert_eq!(Purpose::classify("prompts"), Purpose::Prompt);
        assert_eq!(Purpose::classify("chains"), Purpose::Chain);
        assert_eq!(Purpose::classify("agents"), Purpose::Agent);
        assert_eq!(Purpose::classify("toolkits"), Purpose::Tool);
        assert_eq!(Purpose::classify("memories"), Purpose::Memory);
        assert_eq!(Purpose::classify("embeddings"), Purpose::Embedding);
        assert_eq!(Purpose::classify("vector_stores"), Purpose::VectorStore);
        assert_eq!(Purpose::classify("documentloaders"), Purpose::DocumentLoader);
        assert_eq!(Purpose::classify("Text Splitters"), Purpose::TextSplitter);
        assert_eq!(Purpose::classify("retrievers"), Purpose::Retriever);
        assert_eq!(Purpose::classify("inputs"), Purpose::Input);
        assert_eq!(Purpose::classify("outputs"), Purpose::Output);
        assert_eq!(Purpose::classify("helpers"), Purpose::Unknown);
    }

    #[test]
    fn embedding_models_are_embeddings() {
        assert_eq!(Purpose::classify("embedding_models"), Purpose::Embedding);
    }

    #[test]
    fn purpose_serializes_snake_case() {
        let json = serde_json::to_string(&Purpose::VectorStore).unwrap();
        assert_eq!(json, r#""vector_store""#);
        assert_eq!(Purpose::DocumentLoader.to_string(), "document_loader");
    }

    #[test]
    fn descriptor_keeps_unknown_keys() {
        let json = r#"{
            "display_name": "Chat Output",
            "inputs": {"input_value": "Message"},
            "output_types": ["Message"],
            "template": {"sender": {"value": "Machine"}},
            "beta": true
        }"#;
        let desc: ComponentDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(desc.display_name.as_deref(), Some("Chat Output"));
        assert_eq!(desc.extra["beta"], true);
        assert_eq!(desc.inputs_accepting("Message").collect::<Vec<_>>(), vec!["input_value"]);
        assert!(desc.inputs_accepting("Data").next().is_none());
    }
}
