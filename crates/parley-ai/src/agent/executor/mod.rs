//! Turn executor - drives one user message through guardrails, the backend
//! and the tool loop to a single response envelope.
//!
//! Every failure inside a turn degrades to a textual response with flags in
//! [`TurnMetadata`]; nothing propagates to the caller as an error.

mod guard;
mod prompt;
mod tool_loop;

use std::sync::Arc;

use parley_traits::{ToolRegistry, ToolSchema};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agent::turn::{TurnMetadata, TurnRequest, TurnResponse};
use crate::config::Settings;
use crate::error::AiError;
use crate::guardrails::{GuardrailPolicy, InputDecision, SemanticThemeClassifier};
use crate::llm::{
    CompletionRequest, CompletionResponse, LlmClient, Message, Role, TokenUsage, calculate_cost,
    count_tokens,
};
use crate::memory::MemoryStore;
use crate::privacy::{PiiMasker, PiiProcessor};
use crate::resilience::{CircuitBreakerRegistry, ResilienceError, RetryPolicy, call_guarded};

use guard::ThemeVerdict;
use tool_loop::ToolLoop;

pub const SERVICE_UNAVAILABLE_MESSAGE: &str =
    "Sorry, the AI service is temporarily unavailable. Please try again in a few moments.";

pub const OFF_TOPIC_MESSAGE: &str =
    "Sorry, I can only help with questions about the main subject of this assistant.";

pub const CANCELLED_MESSAGE: &str = "The request was cancelled before it completed.";

/// Apology returned for a hard guardrail block.
pub fn blocked_message(topic: Option<&str>) -> String {
    format!(
        "Sorry, I can't help with that. (Blocked: {})",
        topic.unwrap_or("inappropriate content")
    )
}

/// Text returned when the backend keeps failing after retries.
pub fn error_message(error: &AiError) -> String {
    format!("An error occurred while processing your request: {error}")
}

/// Orchestrates a single conversational turn.
///
/// All collaborators are injected; nothing is looked up from global state.
/// Settings are captured at construction and are not re-read mid-turn.
pub struct TurnExecutor {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    breakers: Arc<CircuitBreakerRegistry>,
    settings: Arc<Settings>,
    retry: RetryPolicy,
    guardrails: Option<GuardrailPolicy>,
    pii: Arc<dyn PiiMasker>,
    memory: Option<Arc<dyn MemoryStore>>,
    classifier: SemanticThemeClassifier,
}

impl TurnExecutor {
    pub fn new(llm: Arc<dyn LlmClient>, settings: Settings) -> Self {
        Self {
            llm,
            tools: Arc::new(ToolRegistry::new()),
            breakers: Arc::new(CircuitBreakerRegistry::from_settings(&settings)),
            retry: RetryPolicy::from_settings(&settings),
            classifier: SemanticThemeClassifier::new(settings.semantic_history_turns),
            guardrails: Some(settings.guardrails.clone()),
            settings: Arc::new(settings),
            pii: Arc::new(PiiProcessor::new()),
            memory: None,
        }
    }

    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    /// Share breakers with other executors talking to the same backends.
    pub fn with_breakers(mut self, breakers: Arc<CircuitBreakerRegistry>) -> Self {
        self.breakers = breakers;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Default policy for requests that do not carry their own. Replaces the
    /// `[guardrails]` table from settings.
    pub fn with_guardrails(mut self, policy: GuardrailPolicy) -> Self {
        self.guardrails = Some(policy);
        self
    }

    pub fn with_pii_masker(mut self, pii: Arc<dyn PiiMasker>) -> Self {
        self.pii = pii;
        self
    }

    /// Default memory store for requests that do not carry their own.
    pub fn with_memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    /// Run one turn.
    pub async fn execute(&self, request: TurnRequest) -> TurnResponse {
        let cancel = request.cancel.clone().unwrap_or_default();
        let memory = request.memory.clone().or_else(|| self.memory.clone());
        let policy = request
            .guardrails
            .as_ref()
            .or(self.guardrails.as_ref())
            .filter(|_| self.settings.guardrails_enabled);
        let mut usage = TokenUsage::default();

        let history = self.resolve_history(&request, memory.as_ref()).await;

        let themes = policy
            .map(|p| {
                prompt::merge_themes([
                    request.allowed_themes.as_slice(),
                    self.settings.default_allowed_themes.as_slice(),
                    p.allowed_themes.as_slice(),
                ])
            })
            .unwrap_or_default();

        // Keyword checks see the raw text; every backend call sees the masked one.
        let outbound = if request.mask_pii {
            self.pii.mask(&request.message)
        } else {
            request.message.clone()
        };

        if let Some(policy) = policy {
            match policy.evaluate_input(&request.message, &themes) {
                InputDecision::Allow => {}
                InputDecision::Block(violation) => {
                    info!(
                        session_id = %request.session_id,
                        topic = ?violation.topic,
                        "Guardrail blocked message"
                    );
                    let content = blocked_message(violation.topic.as_deref());
                    return self.blocked_response(&request, content, violation.topic);
                }
                InputDecision::NeedsSemanticCheck(violation) => {
                    match self
                        .semantic_theme_check(&outbound, &themes, &history, &cancel)
                        .await
                    {
                        ThemeVerdict::OnTopic(check_usage) => usage.accumulate(&check_usage),
                        ThemeVerdict::OffTopic => {
                            info!(
                                session_id = %request.session_id,
                                themes = ?themes,
                                "Guardrail blocked off-topic message"
                            );
                            return self.blocked_response(
                                &request,
                                OFF_TOPIC_MESSAGE.to_string(),
                                violation.topic,
                            );
                        }
                        ThemeVerdict::Cancelled => return self.cancelled_response(&request, usage),
                    }
                }
            }
        }

        let tool_schemas = if request.use_tools {
            self.tools.schemas()
        } else {
            Vec::new()
        };

        let system = prompt::build_system_prompt(
            request.system_prompt.as_deref(),
            &themes,
            request.context.as_deref(),
        );
        let mut messages = prompt::build_messages(system, history, &outbound);

        let completion = self.completion_request(&messages, &tool_schemas, request.temperature);
        let first = match self.call_backend(completion, &cancel).await {
            Ok(response) => response,
            Err(err) => return self.failure_response(&request, err, usage),
        };
        if let Some(call_usage) = &first.usage {
            usage.accumulate(call_usage);
        }
        let provider = first.provider.clone();
        let model = first.model.clone();

        let tool_loop = ToolLoop {
            policy,
            agent_id: &request.agent_id,
            tool_schemas: &tool_schemas,
            temperature: request.temperature,
            max_iterations: request
                .max_tool_iterations
                .unwrap_or(self.settings.max_tool_iterations),
            cancel: &cancel,
        };
        let outcome = match self
            .run_tool_loop(&tool_loop, &mut messages, first, &mut usage)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => return self.failure_response(&request, err, usage),
        };

        let confidence = outcome.response.confidence();
        let (content, low_confidence) = match policy {
            Some(policy) => (
                policy.validate_output(&outcome.response.content, confidence),
                confidence < policy.min_confidence,
            ),
            None => (outcome.response.content, false),
        };

        if let Some(memory) = &memory {
            self.remember(memory.as_ref(), &request.message, &content).await;
        }

        info!(
            session_id = %request.session_id,
            total_tokens = usage.total_tokens,
            cost = usage.cost,
            tool_iterations = outcome.iterations,
            "Turn completed"
        );

        TurnResponse::assistant(
            &request.session_id,
            content,
            TurnMetadata {
                usage,
                provider,
                model,
                low_confidence,
                tool_iterations: outcome.iterations,
                ..Default::default()
            },
        )
    }

    async fn resolve_history(
        &self,
        request: &TurnRequest,
        memory: Option<&Arc<dyn MemoryStore>>,
    ) -> Vec<Message> {
        if let Some(history) = &request.history {
            return history.clone();
        }
        let Some(memory) = memory else {
            return Vec::new();
        };
        match memory.get_messages().await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(
                    session_id = %request.session_id,
                    error = %e,
                    "Failed to read memory, continuing without history"
                );
                Vec::new()
            }
        }
    }

    async fn remember(&self, memory: &dyn MemoryStore, user: &str, assistant: &str) {
        for (role, content) in [(Role::User, user), (Role::Assistant, assistant)] {
            if let Err(e) = memory.add_message(role, content).await {
                warn!(role = %role, error = %e, "Failed to write memory");
            }
        }
    }

    fn completion_request(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        temperature: Option<f32>,
    ) -> CompletionRequest {
        let mut request = CompletionRequest::new(messages.to_vec()).with_tools(tools.to_vec());
        request.temperature = temperature;
        request
    }

    /// One backend call behind the provider's breaker and the retry policy.
    /// The returned response always carries usage.
    async fn call_backend(
        &self,
        request: CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<CompletionResponse, ResilienceError<AiError>> {
        let breaker = self.breakers.get_or_create(self.llm.provider());
        let llm = self.llm.as_ref();
        let pending = &request;

        let mut response = call_guarded(&breaker, &self.retry, cancel, AiError::is_retryable, move || {
            llm.chat(pending.clone())
        })
        .await?;

        let usage = response
            .usage
            .unwrap_or_else(|| estimate_usage(&request.messages, &response.content));
        let usage = if usage.cost == 0.0 {
            usage.with_cost(calculate_cost(&usage, &response.provider, &response.model))
        } else {
            usage
        };
        response.usage = Some(usage);
        Ok(response)
    }

    fn failure_response(
        &self,
        request: &TurnRequest,
        err: ResilienceError<AiError>,
        usage: TokenUsage,
    ) -> TurnResponse {
        let mut metadata = self.base_metadata(usage);
        let content = match err {
            ResilienceError::Cancelled => return self.cancelled_response(request, usage),
            ResilienceError::CircuitOpen { ref backend } => {
                warn!(session_id = %request.session_id, backend = %backend, "Backend unavailable");
                metadata.resilience_error = true;
                metadata.error = Some(err.to_string());
                SERVICE_UNAVAILABLE_MESSAGE.to_string()
            }
            ResilienceError::Failed(e) => {
                warn!(session_id = %request.session_id, error = %e, "Backend call failed");
                metadata.error = Some(e.to_string());
                error_message(&e)
            }
        };
        TurnResponse::assistant(&request.session_id, content, metadata)
    }

    fn cancelled_response(&self, request: &TurnRequest, usage: TokenUsage) -> TurnResponse {
        info!(session_id = %request.session_id, "Turn cancelled");
        let mut metadata = self.base_metadata(usage);
        metadata.error = Some(AiError::Cancelled.to_string());
        TurnResponse::assistant(&request.session_id, CANCELLED_MESSAGE, metadata)
    }

    fn base_metadata(&self, usage: TokenUsage) -> TurnMetadata {
        TurnMetadata {
            usage,
            provider: self.llm.provider().to_string(),
            model: self.llm.model().to_string(),
            ..Default::default()
        }
    }
}

fn estimate_usage(messages: &[Message], completion: &str) -> TokenUsage {
    let prompt_tokens = messages.iter().map(|m| count_tokens(&m.content)).sum();
    TokenUsage::new(prompt_tokens, count_tokens(completion))
}
