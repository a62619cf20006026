//! Turn request and response envelope.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::guardrails::GuardrailPolicy;
use crate::llm::{Message, Role, TokenUsage};
use crate::memory::MemoryStore;

pub const DEFAULT_AGENT_ID: &str = "default";

/// One user message to drive through the executor.
#[derive(Clone)]
pub struct TurnRequest {
    pub session_id: String,
    pub message: String,
    /// Explicit history. When set, the memory store is not read.
    pub history: Option<Vec<Message>>,
    pub system_prompt: Option<String>,
    /// Per-call policy, replacing the executor's default policy.
    pub guardrails: Option<GuardrailPolicy>,
    /// Themes merged with the configured defaults.
    pub allowed_themes: Vec<String>,
    pub use_tools: bool,
    /// Overrides `max_tool_iterations` from settings.
    pub max_tool_iterations: Option<usize>,
    /// Agent identity used for tool restrictions.
    pub agent_id: String,
    pub mask_pii: bool,
    /// Retrieved context appended to the system prompt.
    pub context: Option<String>,
    pub temperature: Option<f32>,
    /// Session-bound store, replacing the executor's default store.
    pub memory: Option<Arc<dyn MemoryStore>>,
    pub cancel: Option<CancellationToken>,
}

impl fmt::Debug for TurnRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnRequest")
            .field("session_id", &self.session_id)
            .field("message", &self.message)
            .field("history", &self.history.as_ref().map(Vec::len))
            .field("agent_id", &self.agent_id)
            .field("use_tools", &self.use_tools)
            .field("allowed_themes", &self.allowed_themes)
            .field("has_memory", &self.memory.is_some())
            .finish_non_exhaustive()
    }
}

impl TurnRequest {
    pub fn new(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            message: message.into(),
            history: None,
            system_prompt: None,
            guardrails: None,
            allowed_themes: Vec::new(),
            use_tools: false,
            max_tool_iterations: None,
            agent_id: DEFAULT_AGENT_ID.to_string(),
            mask_pii: false,
            context: None,
            temperature: None,
            memory: None,
            cancel: None,
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_guardrails(mut self, policy: GuardrailPolicy) -> Self {
        self.guardrails = Some(policy);
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

    pub fn with_tools(mut self) -> Self {
        self.use_tools = true;
        self
    }

    pub fn with_max_tool_iterations(mut self, max: usize) -> Self {
        self.max_tool_iterations = Some(max);
        self
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    pub fn with_pii_masking(mut self) -> Self {
        self.mask_pii = true;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Flags and accounting attached to every response. Degraded answers are
/// recognised by these flags, never by an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnMetadata {
    pub usage: TokenUsage,
    pub provider: String,
    pub model: String,
    pub guardrail_violation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub resilience_error: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub low_confidence: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub tool_iterations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResponse {
    pub content: String,
    pub session_id: String,
    pub role: Role,
    pub metadata: TurnMetadata,
    pub created_at: DateTime<Utc>,
}

impl TurnResponse {
    pub fn assistant(
        session_id: impl Into<String>,
        content: impl Into<String>,
        metadata: TurnMetadata,
    ) -> Self {
        Self {
            content: content.into(),
            session_id: session_id.into(),
            role: Role::Assistant,
            metadata,
            created_at: Utc::now(),
        }
    }

    /// True when the content is a fallback rather than a real backend answer.
    pub fn is_degraded(&self) -> bool {
        let meta = &self.metadata;
        meta.guardrail_violation || meta.resilience_error || meta.low_confidence || meta.error.is_some()
    }
}
