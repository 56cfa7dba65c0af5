//! Component knowledge base for Flowsmith.
//!
//! The [`KnowledgeBase`] holds every known component descriptor together with
//! the derived [`CompatibilityGraph`] and [`SemanticIndex`]. All three are
//! built together and never mutated afterwards; a refresh builds a new
//! instance and publishes it through a [`KnowledgeHandle`].

mod compatibility;
mod descriptor;
mod handle;
mod semantic;
mod source;

use std::collections::HashMap;

use serde::Serialize;
use tracing::{info, instrument, warn};

use flowsmith_shared::Result;

pub use compatibility::{CompatibilityGraph, FieldMapping};
pub use descriptor::{ComponentDescriptor, ComponentId, Purpose};
pub use handle::KnowledgeHandle;
pub use semantic::{SemanticIndex, tokenize};
pub use source::{JsonFileSource, RegistryCatalog, RegistrySource, StaticSource};

// ---------------------------------------------------------------------------
// Query results
// ---------------------------------------------------------------------------

/// A descriptor reachable from some component, with the fields that link them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompatibleComponent {
    pub descriptor: ComponentDescriptor,
    pub mappings: Vec<FieldMapping>,
}

/// Size summary of a built knowledge base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KnowledgeStats {
    pub categories: usize,
    pub components: usize,
    pub compatibility_edges: usize,
    pub indexed_words: usize,
}

// ---------------------------------------------------------------------------
// KnowledgeBase
// ---------------------------------------------------------------------------

/// Immutable snapshot of the component registry and its derived indexes.
#[derive(Debug, Default)]
pub struct KnowledgeBase {
    components: HashMap<String, HashMap<String, ComponentDescriptor>>,
    compatibility: CompatibilityGraph,
    semantic_index: SemanticIndex,
}

impl KnowledgeBase {
    /// Load descriptors from `source` and derive the indexes.
    #[instrument(skip_all, fields(source = source.name()))]
    pub async fn build(source: &dyn RegistrySource) -> Result<Self> {
        let catalog = source.load().await?;
        if catalog.values().all(|names| names.is_empty()) {
            warn!("component registry is empty; every instruction will need clarification");
        }
        let kb = Self::from_catalog(catalog);
        let stats = kb.stats();
        info!(
            categories = stats.categories,
            components = stats.components,
            edges = stats.compatibility_edges,
            "knowledge base built"
        );
        Ok(kb)
    }

    /// Build from an in-memory catalog, stamping identities from the map keys.
    pub fn from_catalog(mut catalog: RegistryCatalog) -> Self {
        for (category, names) in catalog.iter_mut() {
            for (name, descriptor) in names.iter_mut() {
                descriptor.category = category.clone();
                descriptor.name = name.clone();
            }
        }

        let ordered = || catalog.values().flat_map(|names| names.values());
        let compatibility = CompatibilityGraph::analyze(ordered());
        let semantic_index = SemanticIndex::build(ordered());

        let components = catalog
            .into_iter()
            .map(|(category, names)| (category, names.into_iter().collect()))
            .collect();

        Self {
            components,
            compatibility,
            semantic_index,
        }
    }

    /// Known categories, sorted.
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = self.components.keys().map(String::as_str).collect();
        categories.sort_unstable();
        categories
    }

    /// Known names in `category`, sorted. Empty for an unknown category.
    pub fn names(&self, category: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .components
            .get(category)
            .map(|names| names.keys().map(String::as_str).collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.components.contains_key(category)
    }

    pub fn get(&self, category: &str, name: &str) -> Option<&ComponentDescriptor> {
        self.components.get(category)?.get(name)
    }

    /// Descriptor lookup that yields an empty record on a miss.
    pub fn component_info(&self, category: &str, name: &str) -> ComponentDescriptor {
        self.get(category, name).cloned().unwrap_or_default()
    }

    /// Descriptors reachable in one compatibility step from `(category, name)`.
    pub fn compatible_components(&self, category: &str, name: &str) -> Vec<CompatibleComponent> {
        let source = ComponentId::new(category, name);
        self.compatibility
            .targets(&source)
            .filter_map(|(target, mappings)| {
                self.get(&target.category, &target.name)
                    .map(|descriptor| CompatibleComponent {
                        descriptor: descriptor.clone(),
                        mappings: mappings.to_vec(),
                    })
            })
            .collect()
    }

    pub fn compatibility(&self) -> &CompatibilityGraph {
        &self.compatibility
    }

    /// Components whose indexed words appear in `text`, best match first.
    pub fn search(&self, text: &str) -> Vec<(ComponentId, usize)> {
        self.semantic_index.rank(text)
    }

    pub fn classify_purpose(category: &str) -> Purpose {
        Purpose::classify(category)
    }

    pub fn stats(&self) -> KnowledgeStats {
        KnowledgeStats {
            categories: self.components.len(),
            components: self.components.values().map(HashMap::len).sum(),
            compatibility_edges: self.compatibility.edge_count(),
            indexed_words: self.semantic_index.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.components.values().all(HashMap::is_empty)
    }
}
