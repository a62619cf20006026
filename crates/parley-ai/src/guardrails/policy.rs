//! Guardrail policy: blocklist/allowlist, theme enforcement, output
//! confidence floor and per-agent tool restrictions.

use std::collections::BTreeMap;

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Result;

/// Key in `tool_restrictions` that applies to every agent without its own entry.
pub const GLOBAL_AGENT: &str = "*";

pub const OFF_TOPIC: &str = "off-topic";

pub const LOW_CONFIDENCE_FALLBACK: &str =
    "I'm sorry, but I'm not confident enough to answer that question accurately.";

/// Conversational filler that passes theme enforcement on its own.
const NEUTRAL_PHRASES: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    "thanks",
    "thank you",
    "ok",
    "okay",
    "yes",
    "no",
    "bye",
    "goodbye",
    "oi",
    "olá",
    "ola",
    "obrigado",
    "obrigada",
    "bom dia",
    "boa tarde",
    "boa noite",
    "tchau",
    "sim",
    "não",
];

/// Longest message (in words) still treated as a greeting when it starts with
/// a neutral phrase.
const NEUTRAL_MAX_WORDS: usize = 4;

/// A failed input check.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct GuardrailViolation {
    pub message: String,
    pub topic: Option<String>,
    /// Theme violations may still be rescued by the semantic check;
    /// blocklist and allowlist violations never are.
    pub is_theme_violation: bool,
}

impl GuardrailViolation {
    pub fn blocked(message: impl Into<String>, topic: Option<String>) -> Self {
        Self {
            message: message.into(),
            topic,
            is_theme_violation: false,
        }
    }

    pub fn off_topic(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            topic: Some(OFF_TOPIC.to_string()),
            is_theme_violation: true,
        }
    }
}

/// Result of evaluating user input against the policy.
#[derive(Debug, Clone, PartialEq)]
pub enum InputDecision {
    Allow,
    /// Hard violation; the turn must be blocked.
    Block(GuardrailViolation),
    /// Keyword theme check failed; block only if the semantic check agrees.
    NeedsSemanticCheck(GuardrailViolation),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailPolicy {
    pub blocklist: Vec<String>,
    pub allowlist: Vec<String>,
    pub min_confidence: f64,
    pub allowed_themes: Vec<String>,
    /// `agent_id -> allowed tool names`, with `"*"` as the global fallback.
    pub tool_restrictions: BTreeMap<String, Vec<String>>,
}

impl GuardrailPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an agent configuration object holding a `guardrails` key.
    /// Missing keys fall back to their defaults.
    pub fn from_config(config: &serde_json::Value) -> Result<Self> {
        match config.get("guardrails") {
            Some(section) => Ok(serde_json::from_value(section.clone())?),
            None => Ok(Self::default()),
        }
    }

    pub fn with_blocklist<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocklist = terms.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_allowlist<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowlist = terms.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_allowed_themes<I, S>(mut self, themes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_themes = themes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn with_tool_restriction<I, S>(mut self, agent_id: impl Into<String>, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tool_restrictions
            .insert(agent_id.into(), tools.into_iter().map(Into::into).collect());
        self
    }

    /// Blocklist and allowlist check. Matching is case-insensitive on whole words.
    pub fn validate_input(&self, text: &str) -> std::result::Result<(), GuardrailViolation> {
        if let Some(term) = self.blocklist.iter().find(|term| contains_term(text, term)) {
            let term = term.to_lowercase();
            return Err(GuardrailViolation::blocked(
                format!("Message contains blocked topic: {term}"),
                Some(term),
            ));
        }

        if !self.allowlist.is_empty() && !self.allowlist.iter().any(|term| contains_term(text, term))
        {
            return Err(GuardrailViolation::blocked(
                "Message does not contain any allowed topics",
                None,
            ));
        }

        Ok(())
    }

    /// Theme enforcement. Passes when `allowed_themes` is empty, when any theme
    /// appears in the text (case-insensitive), or when the text is a neutral
    /// greeting or acknowledgement.
    pub fn check_theme(
        &self,
        text: &str,
        allowed_themes: &[String],
    ) -> std::result::Result<(), GuardrailViolation> {
        if allowed_themes.is_empty() {
            return Ok(());
        }

        let lower = text.to_lowercase();
        let on_theme = allowed_themes
            .iter()
            .map(|theme| theme.trim().to_lowercase())
            .any(|theme| !theme.is_empty() && lower.contains(&theme));

        if on_theme || is_neutral_phrase(text) {
            return Ok(());
        }

        Err(GuardrailViolation::off_topic(format!(
            "Message is outside the main subject ({})",
            allowed_themes.join(", ")
        )))
    }

    /// Run the hard checks, then theme enforcement against `themes`.
    pub fn evaluate_input(&self, text: &str, themes: &[String]) -> InputDecision {
        if let Err(violation) = self.validate_input(text) {
            return InputDecision::Block(violation);
        }
        match self.check_theme(text, themes) {
            Ok(()) => InputDecision::Allow,
            Err(violation) => InputDecision::NeedsSemanticCheck(violation),
        }
    }

    /// Replace low-confidence content with a fixed fallback.
    pub fn validate_output(&self, content: &str, confidence: f64) -> String {
        if confidence < self.min_confidence {
            tracing::info!(
                confidence,
                min_confidence = self.min_confidence,
                "Output below confidence floor, using fallback"
            );
            return LOW_CONFIDENCE_FALLBACK.to_string();
        }
        content.to_string()
    }

    /// Whether `agent_id` may call `tool_name`.
    ///
    /// Restrictions are opt-in: an agent with neither its own entry nor a
    /// `"*"` entry may call anything.
    pub fn validate_tool_usage(&self, agent_id: &str, tool_name: &str) -> bool {
        match self.restriction_for(agent_id) {
            Some(allowed) => allowed.iter().any(|tool| tool == tool_name),
            None => true,
        }
    }

    /// Tools `agent_id` is restricted to, or `None` when unrestricted.
    pub fn get_allowed_tools(&self, agent_id: &str) -> Option<Vec<String>> {
        self.restriction_for(agent_id).map(|tools| tools.to_vec())
    }

    fn restriction_for(&self, agent_id: &str) -> Option<&[String]> {
        self.tool_restrictions
            .get(agent_id)
            .or_else(|| self.tool_restrictions.get(GLOBAL_AGENT))
            .map(Vec::as_slice)
    }
}

/// Case-insensitive whole-word search. Word boundaries are only enforced on
/// the sides of the term that start or end with a word character.
fn contains_term(text: &str, term: &str) -> bool {
    let term = term.trim();
    if term.is_empty() {
        return false;
    }

    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let leading = if term.starts_with(is_word) { r"\b" } else { "" };
    let trailing = if term.ends_with(is_word) { r"\b" } else { "" };
    let pattern = format!("{leading}{}{trailing}", regex::escape(term));

    match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(re) => re.is_match(text),
        Err(_) => text.to_lowercase().contains(&term.to_lowercase()),
    }
}

fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn is_neutral_phrase(text: &str) -> bool {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return false;
    }
    let words = normalized.split(' ').count();

    NEUTRAL_PHRASES.iter().any(|phrase| {
        normalized == *phrase
            || (words <= NEUTRAL_MAX_WORDS
                && normalized
                    .strip_prefix(phrase)
                    .is_some_and(|rest| rest.starts_with(' ')))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn themes(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_blocklist_names_term() {
        let policy = GuardrailPolicy::new().with_blocklist(["password"]);
        let violation = policy.validate_input("What is the PASSWORD?").unwrap_err();
        assert_eq!(violation.topic.as_deref(), Some("password"));
        assert!(!violation.is_theme_violation);
        assert_eq!(violation.to_string(), "Message contains blocked topic: password");
    }

    #[test]
    fn test_blocklist_matches_whole_words() {
        let policy = GuardrailPolicy::new().with_blocklist(["hate"]);
        assert!(policy.validate_input("I hate mondays").is_err());
        assert!(policy.validate_input("whatever happened").is_ok());
        assert!(policy.validate_input("hateful").is_ok());
    }

    #[test]
    fn test_blocklist_term_with_symbols() {
        let policy = GuardrailPolicy::new().with_blocklist(["c++"]);
        assert!(policy.validate_input("teach me C++ please").is_err());
    }

    #[test]
    fn test_allowlist_requires_a_match() {
        let policy = GuardrailPolicy::new().with_allowlist(["technology"]);
        assert!(policy.validate_input("This is about technology and frameworks.").is_ok());

        let violation = policy.validate_input("tell me a joke").unwrap_err();
        assert_eq!(violation.topic, None);
        assert!(!violation.is_theme_violation);
    }

    #[test]
    fn test_check_theme() {
        let policy = GuardrailPolicy::new();
        let allowed = themes(&["suporte", "Tech"]);

        assert!(policy.check_theme("Preciso de suporte técnico", &allowed).is_ok());
        assert!(policy.check_theme("any TECHNOLOGY news?", &allowed).is_ok());

        let violation = policy.check_theme("What's the weather today?", &allowed).unwrap_err();
        assert!(violation.is_theme_violation);
        assert_eq!(violation.topic.as_deref(), Some(OFF_TOPIC));
    }

    #[test]
    fn test_check_theme_without_themes_passes() {
        assert!(GuardrailPolicy::new().check_theme("anything", &[]).is_ok());
    }

    #[test]
    fn test_neutral_phrases_pass_theme_check() {
        let policy = GuardrailPolicy::new();
        let allowed = themes(&["billing"]);
        for text in ["Olá, tudo bem?", "Bom dia", "Obrigado", "thanks!", "Hi there", "ok"] {
            assert!(policy.check_theme(text, &allowed).is_ok(), "{text}");
        }
        assert!(
            policy
                .check_theme("hi can you write me a poem about the sea", &allowed)
                .is_err()
        );
        assert!(policy.check_theme("history of rome", &allowed).is_err());
    }

    #[test]
    fn test_evaluate_input_orders_checks() {
        let policy = GuardrailPolicy::new().with_blocklist(["violence"]);
        let allowed = themes(&["cooking"]);

        assert!(matches!(
            policy.evaluate_input("violence in cooking shows", &allowed),
            InputDecision::Block(_)
        ));
        assert!(matches!(
            policy.evaluate_input("football scores", &allowed),
            InputDecision::NeedsSemanticCheck(v) if v.is_theme_violation
        ));
        assert_eq!(
            policy.evaluate_input("cooking pasta", &allowed),
            InputDecision::Allow
        );
    }

    #[test]
    fn test_validate_output_confidence_floor() {
        let policy = GuardrailPolicy::new().with_min_confidence(0.8);
        assert_eq!(policy.validate_output("answer", 0.5), LOW_CONFIDENCE_FALLBACK);
        assert_eq!(policy.validate_output("answer", 0.8), "answer");
        assert_eq!(GuardrailPolicy::new().validate_output("answer", 0.0), "answer");
    }

    #[test]
    fn test_tool_usage_agent_specific() {
        let policy = GuardrailPolicy::new()
            .with_tool_restriction("agent1", ["search", "calculate"])
            .with_tool_restriction("agent2", ["translate"]);

        assert!(policy.validate_tool_usage("agent1", "search"));
        assert!(!policy.validate_tool_usage("agent1", "translate"));
        assert!(policy.validate_tool_usage("agent2", "translate"));
        assert!(!policy.validate_tool_usage("agent2", "search"));
    }

    #[test]
    fn test_tool_usage_is_opt_in() {
        let policy = GuardrailPolicy::new().with_tool_restriction("agent1", ["search"]);
        for tool in ["search", "delete_everything", ""] {
            assert!(policy.validate_tool_usage("agent3", tool), "{tool:?}");
        }
        assert!(GuardrailPolicy::new().validate_tool_usage("agent1", ""));
    }

    #[test]
    fn test_tool_usage_global_fallback() {
        let policy = GuardrailPolicy::new()
            .with_tool_restriction("*", ["basic_tool"])
            .with_tool_restriction("agent1", ["advanced_tool"]);

        assert!(policy.validate_tool_usage("agent1", "advanced_tool"));
        assert!(!policy.validate_tool_usage("agent1", "basic_tool"));
        assert!(policy.validate_tool_usage("agent2", "basic_tool"));
        assert!(!policy.validate_tool_usage("agent2", "advanced_tool"));
    }

    #[test]
    fn test_get_allowed_tools_returns_copy() {
        let policy = GuardrailPolicy::new()
            .with_tool_restriction("agent1", ["search", "calculate"])
            .with_tool_restriction("*", ["basic_tool"]);

        let mut tools = policy.get_allowed_tools("agent1").unwrap();
        assert_eq!(tools, vec!["search", "calculate"]);
        assert_eq!(policy.get_allowed_tools("agent2").unwrap(), vec!["basic_tool"]);

        tools[0] = "modified".to_string();
        assert_eq!(
            policy.get_allowed_tools("agent1").unwrap(),
            vec!["search", "calculate"]
        );
        assert_eq!(GuardrailPolicy::new().get_allowed_tools("agent1"), None);
    }

    #[test]
    fn test_from_config() {
        let policy = GuardrailPolicy::from_config(&json!({
            "guardrails": {
                "blocklist": ["spam"],
                "min_confidence": 0.6,
                "tool_restrictions": { "agent1": ["search"] }
            }
        }))
        .unwrap();
        assert_eq!(policy.blocklist, vec!["spam"]);
        assert!(policy.allowlist.is_empty());
        assert_eq!(policy.min_confidence, 0.6);
        assert!(policy.allowed_themes.is_empty());
        assert_eq!(policy.get_allowed_tools("agent1").unwrap(), vec!["search"]);

        assert_eq!(
            GuardrailPolicy::from_config(&json!({})).unwrap(),
            GuardrailPolicy::default()
        );
    }
}
