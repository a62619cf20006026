use anyhow::Result;
use parley_ai::{InputDecision, Settings};
use serde_json::json;

use crate::cli::CheckArgs;
use crate::output::OutputFormat;
use crate::output::json::print_json;

/// Keyword-level evaluation only. Messages that would go to the semantic
/// theme check are reported as such.
pub fn run(settings: &Settings, args: CheckArgs, format: OutputFormat) -> Result<()> {
    if !settings.guardrails_enabled {
        println!("allow: guardrails disabled");
        return Ok(());
    }

    let mut themes = args.themes;
    for theme in settings
        .default_allowed_themes
        .iter()
        .chain(&settings.guardrails.allowed_themes)
    {
        if !themes.iter().any(|t| t.eq_ignore_ascii_case(theme)) {
            themes.push(theme.clone());
        }
    }

    let (decision, reason, topic) = match settings.guardrails.evaluate_input(&args.message, &themes)
    {
        InputDecision::Allow => ("allow", None, None),
        InputDecision::Block(v) => ("block", Some(v.message), v.topic),
        InputDecision::NeedsSemanticCheck(v) => ("semantic_check", Some(v.message), v.topic),
    };

    if format.is_json() {
        return print_json(&json!({
            "decision": decision,
            "reason": reason,
            "topic": topic,
        }));
    }

    match reason {
        Some(reason) => println!("{decision}: {reason}"),
        None => println!("{decision}"),
    }
    Ok(())
}
