//! Validation of an oracle proposal against the knowledge base.
//!
//! Problems never abort validation: every one found becomes a
//! [`ClarificationQuestion`] and the full list is returned in one pass.

use std::collections::HashMap;

use flowsmith_knowledge::{ComponentId, KnowledgeBase};
use flowsmith_shared::{ClarificationQuestion, ConnectionRequirement, ParsedInstruction};

/// Which end of a connection an index belongs to.
#[derive(Debug, Clone, Copy)]
enum Endpoint {
    Source,
    Target,
}

impl Endpoint {
    fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Target => "target",
        }
    }
}

/// Collect every problem with `parsed` as a clarification question.
pub fn validate(kb: &KnowledgeBase, parsed: &ParsedInstruction) -> Vec<ClarificationQuestion> {
    let mut questions = Vec::new();
    let count = parsed.components.len();

    // Identity of each requirement that resolves in the knowledge base.
    let mut resolved: Vec<Option<ComponentId>> = Vec::with_capacity(count);

    for (i, requirement) in parsed.components.iter().enumerate() {
        let hint = format!(
            "{} {} {}",
            requirement.category,
            requirement.name,
            requirement.description.as_deref().unwrap_or_default()
        );

        if !kb.has_category(&requirement.category) {
            questions.push(
                ClarificationQuestion::new(
                    format!("component_{i}_category"),
                    format!(
                        "Component {} uses the unknown category '{}'. Which category did you mean?",
                        i + 1,
                        requirement.category
                    ),
                )
                .with_options(ranked_categories(kb, &hint))
                .with_context("component_index", i)
                .with_context("component_type", requirement.category.as_str())
                .with_context("component_name", requirement.name.as_str()),
            );
            resolved.push(None);
        } else if kb.get(&requirement.category, &requirement.name).is_none() {
            questions.push(
                ClarificationQuestion::new(
                    format!("component_{i}_name"),
                    format!(
                        "There is no '{}' component in category '{}'. Which one did you mean?",
                        requirement.name, requirement.category
                    ),
                )
                .with_options(ranked_names(kb, &requirement.category, &hint))
                .with_context("component_index", i)
                .with_context("component_type", requirement.category.as_str())
                .with_context("component_name", requirement.name.as_str()),
            );
            resolved.push(None);
        } else {
            resolved.push(Some(ComponentId::new(
                &requirement.category,
                &requirement.name,
            )));
        }
    }

    for (j, connection) in parsed.connections.iter().enumerate() {
        let source = ConnectionRequirement::resolve(connection.source_index, count);
        let target = ConnectionRequirement::resolve(connection.target_index, count);

        if source.is_none() {
            questions.push(index_question(j, Endpoint::Source, connection.source_index, count));
        }
        if target.is_none() {
            questions.push(index_question(j, Endpoint::Target, connection.target_index, count));
        }

        let (Some(source), Some(target)) = (source, target) else {
            continue;
        };
        // Unresolved components already have their own question.
        let (Some(source_id), Some(target_id)) = (&resolved[source], &resolved[target]) else {
            continue;
        };

        if !kb.compatibility().has_edge(source_id, target_id) {
            questions.push(
                ClarificationQuestion::new(
                    format!("connection_{j}_invalid"),
                    format!(
                        "Connection {} from {} to {} is not valid.",
                        j + 1,
                        source_id,
                        target_id
                    ),
                )
                .with_context("connection_index", j)
                .with_context("source", source_id.to_string())
                .with_context("target", target_id.to_string()),
            );
        }
    }

    questions
}

fn index_question(j: usize, endpoint: Endpoint, index: i64, count: usize) -> ClarificationQuestion {
    ClarificationQuestion::new(
        format!("connection_{j}_{}", endpoint.as_str()),
        format!(
            "Connection {} has an invalid {} component index {index}; there are {count} components.",
            j + 1,
            endpoint.as_str()
        ),
    )
    .with_context("connection_index", j)
    .with_context("endpoint", endpoint.as_str())
    .with_context("index", index)
}

/// All categories, those the hint text points at first.
fn ranked_categories(kb: &KnowledgeBase, hint: &str) -> Vec<String> {
    let mut scores: HashMap<String, usize> = HashMap::new();
    for (id, score) in kb.search(hint) {
        let best = scores.entry(id.category).or_default();
        *best = (*best).max(score);
    }
    rank(kb.categories(), &scores)
}

/// All names in `category`, those the hint text points at first.
fn ranked_names(kb: &KnowledgeBase, category: &str, hint: &str) -> Vec<String> {
    let scores: HashMap<String, usize> = kb
        .search(hint)
        .into_iter()
        .filter(|(id, _)| id.category == category)
        .map(|(id, score)| (id.name, score))
        .collect();
    rank(kb.names(category), &scores)
}

fn rank(options: Vec<&str>, scores: &HashMap<String, usize>) -> Vec<String> {
    let mut options: Vec<String> = options.into_iter().map(str::to_string).collect();
    options.sort_by(|a, b| {
        let score_a = scores.get(a).copied().unwrap_or(0);
        let score_b = scores.get(b).copied().unwrap_or(0);
        score_b.cmp(&score_a).then_with(|| a.cmp(b))
    });
    options
}
