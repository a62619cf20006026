use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use parley_ai::{MockLlmClient, MockStep, Settings, TurnExecutor, TurnRequest, TurnResponse};
use tracing::info;
use uuid::Uuid;

use super::tools::builtin_registry;
use crate::cli::ChatArgs;
use crate::output::OutputFormat;
use crate::output::json::print_json;

const SCRIPTED_MODEL: &str = "scripted";

pub async fn run(settings: Settings, args: ChatArgs, format: OutputFormat) -> Result<()> {
    let llm = match &args.script {
        Some(path) => load_script(path)?,
        None => MockLlmClient::new(SCRIPTED_MODEL),
    };

    let executor =
        TurnExecutor::new(Arc::new(llm), settings).with_tools(Arc::new(builtin_registry()));
    let request = build_request(args);
    info!(session_id = %request.session_id, "Starting turn");

    let response = executor.execute(request).await;
    print_response(&response, format)
}

fn load_script(path: &Path) -> Result<MockLlmClient> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script {}", path.display()))?;
    let steps: Vec<MockStep> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid script {}", path.display()))?;
    Ok(MockLlmClient::from_steps(SCRIPTED_MODEL, steps))
}

fn build_request(args: ChatArgs) -> TurnRequest {
    let session = args.session.unwrap_or_else(|| Uuid::new_v4().to_string());
    let mut request = TurnRequest::new(session, args.message).with_allowed_themes(args.themes);

    if let Some(system) = args.system {
        request = request.with_system_prompt(system);
    }
    if let Some(context) = args.context {
        request = request.with_context(context);
    }
    if let Some(agent) = args.agent {
        request = request.with_agent_id(agent);
    }
    if let Some(max) = args.max_tool_iterations {
        request = request.with_max_tool_iterations(max);
    }
    if args.tools {
        request = request.with_tools();
    }
    if args.mask_pii {
        request = request.with_pii_masking();
    }
    request
}

fn print_response(response: &TurnResponse, format: OutputFormat) -> Result<()> {
    if format.is_json() {
        return print_json(response);
    }

    println!("{}", response.content);
    if response.is_degraded() {
        let meta = &response.metadata;
        let reason = if meta.guardrail_violation {
            format!("guardrail ({})", meta.topic.as_deref().unwrap_or("blocked"))
        } else if meta.resilience_error {
            "backend unavailable".to_string()
        } else if meta.low_confidence {
            "low confidence".to_string()
        } else {
            meta.error.clone().unwrap_or_default()
        };
        eprintln!("[degraded: {reason}]");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_generates_session() {
        let args = ChatArgs {
            message: "hello".to_string(),
            themes: vec!["rust".to_string()],
            tools: true,
            ..Default::default()
        };
        let request = build_request(args);
        assert!(Uuid::parse_str(&request.session_id).is_ok());
        assert_eq!(request.allowed_themes, vec!["rust".to_string()]);
        assert!(request.use_tools);
        assert!(!request.mask_pii);
    }

    #[test]
    fn test_load_script() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.json");
        std::fs::write(&path, r#"[{"kind": "text", "content": "hi"}]"#).unwrap();
        assert!(load_script(&path).is_ok());

        std::fs::write(&path, "not json").unwrap();
        assert!(load_script(&path).is_err());
    }
}
