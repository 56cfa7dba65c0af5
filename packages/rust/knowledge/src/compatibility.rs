//! Type-compatibility graph between component descriptors.
//!
//! An edge `source → target` exists when some output type of `source` is
//! accepted, by exact string match, on an input field of `target`.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::descriptor::{ComponentDescriptor, ComponentId};

/// One way an output of the source can feed an input of the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Output type emitted by the source.
    pub output_type: String,
    /// Input field on the target that accepts it.
    pub input_field: String,
}

/// Directed compatibility edges, derived from descriptors and never edited.
#[derive(Debug, Clone, Default)]
pub struct CompatibilityGraph {
    edges: HashMap<ComponentId, BTreeMap<ComponentId, Vec<FieldMapping>>>,
    edge_count: usize,
}

impl CompatibilityGraph {
    /// Compare every ordered pair of distinct descriptors. O(C²·F).
    pub fn analyze<'a, I>(descriptors: I) -> Self
    where
        I: IntoIterator<Item = &'a ComponentDescriptor>,
    {
        let descriptors: Vec<&ComponentDescriptor> = descriptors.into_iter().collect();
        let mut graph = Self::default();

        for source in &descriptors {
            let source_id = source.id();
            for target in &descriptors {
                let target_id = target.id();
                if source_id == target_id {
                    continue;
                }

                let mut mappings = Vec::new();
                for output_type in &source.output_types {
                    for field in target.inputs_accepting(output_type) {
                        mappings.push(FieldMapping {
                            output_type: output_type.clone(),
                            input_field: field.to_string(),
                        });
                    }
                }

                if !mappings.is_empty() {
                    graph
                        .edges
                        .entry(source_id.clone())
                        .or_default()
                        .insert(target_id, mappings);
                    graph.edge_count += 1;
                }
            }
        }

        debug!(
            components = descriptors.len(),
            edges = graph.edge_count,
            "compatibility analysis complete"
        );
        graph
    }

    /// Field mappings for `source → target`, if the edge exists.
    pub fn mappings(&self, source: &ComponentId, target: &ComponentId) -> Option<&[FieldMapping]> {
        self.edges
            .get(source)
            .and_then(|targets| targets.get(target))
            .map(Vec::as_slice)
    }

    pub fn has_edge(&self, source: &ComponentId, target: &ComponentId) -> bool {
        self.mappings(source, target).is_some()
    }

    /// All targets reachable in one step from `source`, in identity order.
    pub fn targets(&self, source: &ComponentId) -> impl Iterator<Item = (&ComponentId, &[FieldMapping])> {
        self.edges
            .get(source)
            .into_iter()
            .flat_map(|targets| targets.iter().map(|(id, m)| (id, m.as_slice())))
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(
        category: &str,
        name: &str,
        inputs: &[(&str, &str)],
        outputs: &[&str],
    ) -> ComponentDescriptor {
        ComponentDescriptor {
            category: category.into(),
            name: name.into(),
            inputs: inputs
                .iter()
                .map(|(f, t)| (f.to_string(), t.to_string()))
                .collect(),
            output_types: outputs.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn edge_recorded_for_matching_type() {
        let model = descriptor("models", "OpenAI", &[("prompt", "Message")], &["Message"]);
        let output = descriptor("outputs", "ChatOutput", &[("input_value", "Message")], &[]);
        let graph = CompatibilityGraph::analyze([&model, &output]);

        let mappings = graph.mappings(&model.id(), &output.id()).expect("edge");
        assert_eq!(
            mappings,
            &[FieldMapping {
                output_type: "Message".into(),
                input_field: "input_value".into()
            }]
        );
        assert!(!graph.has_edge(&output.id(), &model.id()));
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn no_self_edges() {
        let looping = descriptor("chains", "Loop", &[("in", "Data")], &["Data"]);
        let graph = CompatibilityGraph::analyze([&looping]);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn type_match_is_exact() {
        let a = descriptor("a", "A", &[], &["Message"]);
        let b = descriptor("b", "B", &[("in", "message")], &[]);
        let graph = CompatibilityGraph::analyze([&a, &b]);
        assert!(!graph.has_edge(&a.id(), &b.id()));
    }

    #[test]
    fn every_matching_field_is_recorded() {
        let a = descriptor("a", "A", &[], &["Text", "Data"]);
        let b = descriptor("b", "B", &[("x", "Text"), ("y", "Text"), ("z", "Data")], &[]);
        let graph = CompatibilityGraph::analyze([&a, &b]);
        let mappings = graph.mappings(&a.id(), &b.id()).unwrap();
        assert_eq!(mappings.len(), 3);
        assert_eq!(graph.targets(&a.id()).count(), 1);
    }
}
