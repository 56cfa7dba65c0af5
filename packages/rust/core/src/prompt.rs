//! Oracle prompt construction and response unwrapping.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value, json};

use flowsmith_knowledge::{KnowledgeBase, Purpose};

/// Standing instructions sent as the system message.
pub const SYSTEM_PROMPT: &str = "You design component flows. \
Reply with exactly one JSON object and nothing else. \
Only use component categories and names from the catalog you are given.";

/// Serialized catalog: `{category: {purpose, components: [names]}}`.
pub fn catalog_summary(kb: &KnowledgeBase) -> Value {
    let mut summary = Map::new();
    for category in kb.categories() {
        summary.insert(
            category.to_string(),
            json!({
                "purpose": Purpose::classify(category),
                "components": kb.names(category),
            }),
        );
    }
    Value::Object(summary)
}

/// The user prompt for one instruction.
pub fn build_prompt(kb: &KnowledgeBase, instruction: &str) -> String {
    let catalog = serde_json::to_string_pretty(&catalog_summary(kb)).unwrap_or_else(|_| "{}".into());

    format!(
        r#"Available components, grouped by category:
{catalog}

Turn the instruction below into a flow. Respond with a JSON object of this shape:
{{
  "components": [
    {{"component_type": "<category>", "component_name": "<name>", "parameters": {{}}, "description": "<why>"}}
  ],
  "connections": [
    {{"source_component_idx": 0, "target_component_idx": 1, "source_field": "output", "target_field": "<input field>", "description": "<why>"}}
  ],
  "parameters": {{}},
  "clarification_needed": false,
  "clarification_questions": [
    {{"id": "<id>", "question": "<question>", "options": [], "context": {{}}}}
  ],
  "flow_description": "<one paragraph>"
}}

Connection indices refer to positions in the "components" array.
Set "clarification_needed" to true and ask questions only when the instruction is ambiguous.

Instruction: {instruction}"#
    )
}

/// Remove a surrounding Markdown code fence, with or without a language tag.
pub fn strip_code_fences(text: &str) -> &str {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)^\s*```[\w+-]*[ \t]*\r?\n?(.*?)\s*```\s*$").expect("valid regex")
    });

    match FENCE_RE.captures(text).and_then(|caps| caps.get(1)) {
        Some(body) => body.as_str().trim(),
        None => text.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowsmith_knowledge::StaticSource;

    #[test]
    fn strips_tagged_fence() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(raw), r#"{"a": 1}"#);
    }

    #[test]
    fn strips_untagged_fence() {
        let raw = "  ```\n{\"a\": 1}\n```  \n";
        assert_eq!(strip_code_fences(raw), r#"{"a": 1}"#);
    }

    #[test]
    fn leaves_plain_json_alone() {
        assert_eq!(strip_code_fences("  {\"a\": 1}\n"), r#"{"a": 1}"#);
    }

    #[test]
    fn fence_on_single_line() {
        assert_eq!(strip_code_fences("```json {\"a\": 1}```"), r#"{"a": 1}"#);
    }

    #[tokio::test]
    async fn prompt_lists_catalog_and_instruction() {
        let source = StaticSource::from_json(
            r#"{"models": {"OpenAIModel": {}}, "outputs": {"ChatOutput": {}}}"#,
        )
        .unwrap();
        let kb = KnowledgeBase::build(&source).await.unwrap();

        let summary = catalog_summary(&kb);
        assert_eq!(summary["models"]["purpose"], "language_model");
        assert_eq!(summary["outputs"]["components"][0], "ChatOutput");

        let prompt = build_prompt(&kb, "answer questions with gpt");
        assert!(prompt.contains("OpenAIModel"));
        assert!(prompt.contains("source_component_idx"));
        assert!(prompt.ends_with("Instruction: answer questions with gpt"));
    }
}
