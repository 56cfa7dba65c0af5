//! Flow graph construction from a validated instruction.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use flowsmith_knowledge::{ComponentDescriptor, KnowledgeBase};
use flowsmith_shared::{
    ConnectionRequirement, FieldBinding, FlowEdge, FlowGraph, FlowNode, FlowsmithError,
    LayoutConfig, ParsedInstruction, Position, Result,
};

use crate::layout::position_nodes;

/// Builds [`FlowGraph`]s. Holds only layout settings, so one instance can
/// serve concurrent requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowConstructor {
    layout: LayoutConfig,
}

/// Nodes selected for the graph plus the mapping from requirement index to
/// node index (`None` for dropped requirements).
struct Selection<'kb> {
    nodes: Vec<FlowNode>,
    descriptors: Vec<&'kb ComponentDescriptor>,
    remap: Vec<Option<usize>>,
}

impl FlowConstructor {
    pub fn new(layout: LayoutConfig) -> Self {
        Self { layout }
    }

    /// Build the graph for `parsed`, or an empty graph if construction fails.
    #[instrument(skip_all, fields(components = parsed.components.len(), connections = parsed.connections.len()))]
    pub fn build_flow(&self, kb: &KnowledgeBase, parsed: &ParsedInstruction) -> FlowGraph {
        match self.try_build(kb, parsed) {
            Ok(graph) => {
                info!(nodes = graph.nodes.len(), edges = graph.edges.len(), "flow built");
                graph
            }
            Err(e) => {
                error!(error = %e, "flow construction failed, returning empty graph");
                FlowGraph::default()
            }
        }
    }

    fn try_build(&self, kb: &KnowledgeBase, parsed: &ParsedInstruction) -> Result<FlowGraph> {
        let mut selection = select_components(kb, parsed)?;
        let edges = create_connections(kb, &selection, &parsed.connections)?;
        configure_parameters(&mut selection, parsed);

        for (node, position) in selection
            .nodes
            .iter_mut()
            .zip(position_nodes(selection.descriptors.len(), &self.layout))
        {
            node.position = position;
        }

        Ok(FlowGraph {
            nodes: selection.nodes,
            edges,
        })
    }
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

fn select_components<'kb>(kb: &'kb KnowledgeBase, parsed: &ParsedInstruction) -> Result<Selection<'kb>> {
    let mut used_ids = HashSet::new();
    let mut selection = Selection {
        nodes: Vec::with_capacity(parsed.components.len()),
        descriptors: Vec::with_capacity(parsed.components.len()),
        remap: Vec::with_capacity(parsed.components.len()),
    };

    for (i, requirement) in parsed.components.iter().enumerate() {
        let Some(descriptor) = kb.get(&requirement.category, &requirement.name) else {
            warn!(
                index = i,
                category = %requirement.category,
                name = %requirement.name,
                "requirement does not resolve, dropping it and its connections"
            );
            selection.remap.push(None);
            continue;
        };

        let id = allocate_node_id(&descriptor.name, &mut used_ids)?;
        selection.remap.push(Some(selection.nodes.len()));
        selection.nodes.push(FlowNode {
            id,
            category: descriptor.category.clone(),
            name: descriptor.name.clone(),
            display_name: descriptor.display_name.clone(),
            template: descriptor.template.clone(),
            position: Position::default(),
        });
        selection.descriptors.push(descriptor);
    }

    Ok(selection)
}

/// `<name>-<8 hex>`, unique within one graph.
fn allocate_node_id(name: &str, used: &mut HashSet<String>) -> Result<String> {
    for _ in 0..16 {
        let suffix = Uuid::now_v7().simple().to_string();
        let id = format!("{name}-{}", &suffix[suffix.len() - 8..]);
        if used.insert(id.clone()) {
            return Ok(id);
        }
    }
    Err(FlowsmithError::Construction(format!(
        "could not allocate a unique node id for {name}"
    )))
}

fn create_connections(
    kb: &KnowledgeBase,
    selection: &Selection<'_>,
    connections: &[ConnectionRequirement],
) -> Result<Vec<FlowEdge>> {
    let requirement_count = selection.remap.len();
    let mut edges = Vec::with_capacity(connections.len());
    let mut used_ids = HashSet::new();

    for (j, connection) in connections.iter().enumerate() {
        let source = ConnectionRequirement::resolve(connection.source_index, requirement_count)
            .and_then(|i| selection.remap[i]);
        let target = ConnectionRequirement::resolve(connection.target_index, requirement_count)
            .and_then(|i| selection.remap[i]);

        let (Some(source), Some(target)) = (source, target) else {
            debug!(connection = j, "skipping connection with an unusable endpoint");
            continue;
        };
        if source == target {
            debug!(connection = j, "skipping self-loop");
            continue;
        }

        let (Some(source_desc), Some(target_desc)) =
            (selection.descriptors.get(source), selection.descriptors.get(target))
        else {
            return Err(FlowsmithError::Construction(format!(
                "connection {j} points past the selected nodes"
            )));
        };

        if !kb.compatibility().has_edge(&source_desc.id(), &target_desc.id()) {
            debug!(connection = j, "skipping connection without a compatibility edge");
            continue;
        }

        let source_id = &selection.nodes[source].id;
        let target_id = &selection.nodes[target].id;
        let base = format!(
            "{source_id}:{}->{target_id}:{}",
            connection.source_field, connection.target_field
        );
        edges.push(FlowEdge {
            id: allocate_edge_id(base, &mut used_ids),
            source: source_id.clone(),
            target: target_id.clone(),
            binding: FieldBinding {
                source_field: connection.source_field.clone(),
                target_field: connection.target_field.clone(),
                output_types: source_desc.output_types.clone(),
                input_type: target_desc.inputs.get(&connection.target_field).cloned(),
            },
        });
    }

    Ok(edges)
}

/// `base`, or `base#<n>` when a repeated connection already took it.
fn allocate_edge_id(base: String, used: &mut HashSet<String>) -> String {
    if used.insert(base.clone()) {
        return base;
    }
    let mut n = 2;
    loop {
        let id = format!("{base}#{n}");
        if used.insert(id.clone()) {
            return id;
        }
        n += 1;
    }
}

fn configure_parameters(selection: &mut Selection<'_>, parsed: &ParsedInstruction) {
    let resolved = parsed
        .components
        .iter()
        .zip(&selection.remap)
        .filter_map(|(requirement, slot)| slot.map(|node| (requirement, node)));

    for (requirement, index) in resolved {
        let node = &mut selection.nodes[index];

        for (key, value) in &requirement.parameters {
            set_slot(&mut node.template, key, value.clone());
        }

        for (key, value) in &parsed.parameters {
            if requirement.parameters.contains_key(key) {
                continue;
            }
            if node.template.contains_key(key) {
                set_slot(&mut node.template, key, value.clone());
            } else {
                debug!(key = %key, node = %node.id, "global parameter not in template");
            }
        }
    }
}

/// Replace a template slot, keeping the `{value: ..}` wrapper when present.
fn set_slot(template: &mut Map<String, Value>, key: &str, value: Value) {
    match template.get_mut(key) {
        Some(Value::Object(slot)) if slot.contains_key("value") => {
            slot.insert("value".to_string(), value);
        }
        Some(slot) => *slot = value,
        None => {
            template.insert(key.to_string(), value);
        }
    }
}
