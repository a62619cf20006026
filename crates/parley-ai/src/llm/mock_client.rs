//! Deterministic mock LLM client for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::{Duration, sleep};

use crate::error::{AiError, Result};

use super::pricing::{calculate_cost, count_tokens};
use super::{CompletionRequest, CompletionResponse, LlmClient, Role, TokenUsage, ToolCall};

/// Deterministic step for scripted mock completions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MockStepKind {
    /// Return a plain assistant message.
    Text { content: String },
    /// Return a tool call response.
    ToolCall {
        #[serde(default)]
        id: String,
        name: String,
        #[serde(default)]
        arguments: serde_json::Value,
    },
    /// Return an LLM error.
    Error { message: String },
    /// Return a provider HTTP failure.
    HttpError { status: u16, message: String },
}

/// Scripted completion step with optional delay and confidence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MockStep {
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(flatten)]
    pub kind: MockStepKind,
}

impl MockStep {
    fn of(kind: MockStepKind) -> Self {
        Self {
            delay_ms: 0,
            confidence: None,
            kind,
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::of(MockStepKind::Text {
            content: content.into(),
        })
    }

    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self::of(MockStepKind::ToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::of(MockStepKind::Error {
            message: message.into(),
        })
    }

    pub fn http_error(status: u16, message: impl Into<String>) -> Self {
        Self::of(MockStepKind::HttpError {
            status,
            message: message.into(),
        })
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// A deterministic mock LLM client driven by scripted steps.
///
/// Once the script runs dry it echoes the last user message back.
#[derive(Debug, Clone)]
pub struct MockLlmClient {
    provider: String,
    model: String,
    script: Arc<Mutex<VecDeque<MockStep>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new("mock-model")
    }
}

impl MockLlmClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self::from_steps(model, Vec::new())
    }

    pub fn from_steps(model: impl Into<String>, steps: Vec<MockStep>) -> Self {
        Self {
            provider: "mock".to_string(),
            model: model.into(),
            script: Arc::new(Mutex::new(VecDeque::from(steps))),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Report a different provider id, e.g. to exercise per-backend breakers
    /// or the price table.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub async fn push_step(&self, step: MockStep) {
        self.script.lock().await.push_back(step);
    }

    /// Every request received so far, in order.
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    async fn next_step(&self) -> Option<MockStep> {
        self.script.lock().await.pop_front()
    }

    fn usage_for(&self, request: &CompletionRequest, content: &str) -> TokenUsage {
        let prompt_tokens = request
            .messages
            .iter()
            .map(|m| count_tokens(&m.content))
            .sum();
        let usage = TokenUsage::new(prompt_tokens, count_tokens(content));
        let cost = calculate_cost(&usage, &self.provider, &self.model);
        usage.with_cost(cost)
    }

    fn respond(&self, request: &CompletionRequest, content: String) -> CompletionResponse {
        let usage = self.usage_for(request, &content);
        CompletionResponse::text(&self.provider, &self.model, content).with_usage(usage)
    }

    fn fallback_response(&self, request: &CompletionRequest) -> CompletionResponse {
        let text = request
            .messages
            .iter()
            .rev()
            .find(|msg| msg.role == Role::User)
            .map(|msg| format!("mock-echo: {}", msg.content))
            .unwrap_or_else(|| "mock-ok".to_string());
        self.respond(request, text)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.requests.lock().await.push(request.clone());

        let Some(step) = self.next_step().await else {
            return Ok(self.fallback_response(&request));
        };

        if step.delay_ms > 0 {
            sleep(Duration::from_millis(step.delay_ms)).await;
        }

        let mut response = match step.kind {
            MockStepKind::Text { content } => self.respond(&request, content),
            MockStepKind::ToolCall {
                id,
                name,
                arguments,
            } => self
                .respond(&request, String::new())
                .with_tool_calls(vec![ToolCall {
                    id,
                    name,
                    arguments,
                }]),
            MockStepKind::Error { message } => return Err(AiError::Llm(message)),
            MockStepKind::HttpError { status, message } => {
                return Err(AiError::LlmHttp {
                    provider: self.provider.clone(),
                    status,
                    message,
                });
            }
        };
        response.metadata.confidence = step.confidence;
        Ok(response)
    }
}
