//! Parley AI - turn orchestration around an LLM backend
//!
//! This crate provides:
//! - A turn executor that runs one user message through guardrails, the
//!   backend and a bounded tool loop
//! - Guardrail policies (blocklist, allowlist, themes, confidence floor, tool ACL)
//! - Circuit breakers and exponential backoff retry for backend calls
//! - PII masking for outbound messages
//! - Session memory stores (buffer, window, summary)

pub mod agent;
pub mod config;
pub mod error;
pub mod guardrails;
pub mod llm;
pub mod memory;
pub mod privacy;
pub mod resilience;

// Re-export commonly used types
pub use agent::{TurnExecutor, TurnMetadata, TurnRequest, TurnResponse};
pub use config::Settings;
pub use error::{AiError, Result};
pub use guardrails::{GuardrailPolicy, GuardrailViolation, InputDecision, SemanticThemeClassifier};
pub use llm::{
    CompletionRequest, CompletionResponse, LlmClient, Message, MockLlmClient, MockStep, Role,
    TokenUsage, ToolCall,
};
pub use memory::{BufferMemory, MemoryStore, MemoryStrategy, SummaryMemory, WindowMemory};
pub use privacy::{PiiMasker, PiiProcessor};
pub use resilience::{
    CircuitBreaker, CircuitBreakerRegistry, CircuitState, ResilienceError, RetryPolicy,
    call_guarded, retry_with_backoff,
};
pub use parley_traits::{FnTool, Tool, ToolError, ToolOutput, ToolRegistry, ToolSchema};
