use chrono::Utc;
use parley_ai::{FnTool, ToolRegistry};
use serde_json::{Value, json};

/// Tools offered by `parley chat --tools`.
pub fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(
        FnTool::from_fn("current_time", "Current UTC date and time (RFC 3339)", |_| {
            Ok(Value::String(Utc::now().to_rfc3339()))
        })
        .with_parameters(json!({ "type": "object", "properties": {} })),
    );

    registry.register(
        FnTool::from_fn("word_count", "Count the words in a text", |args| {
            let text = args
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| "missing string field 'text'".to_string())?;
            Ok(json!(text.split_whitespace().count()))
        })
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Text to count" }
            },
            "required": ["text"]
        })),
    );

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_word_count() {
        let registry = builtin_registry();
        let output = registry
            .execute("word_count", json!({ "text": "one two  three" }))
            .await
            .unwrap();
        assert_eq!(output.result, json!(3));
    }

    #[tokio::test]
    async fn test_word_count_requires_text() {
        let registry = builtin_registry();
        assert!(registry.execute("word_count", json!({})).await.is_err());
    }

    #[test]
    fn test_schemas_sorted() {
        let names: Vec<String> = builtin_registry()
            .schemas()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["current_time", "word_count"]);
    }
}
