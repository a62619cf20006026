//! LLM module - backend abstraction, usage accounting and a scripted mock

mod client;
mod mock_client;
pub mod pricing;

pub use client::{
    CompletionRequest, CompletionResponse, FinishReason, LlmClient, Message, ResponseMetadata,
    Role, TokenUsage, ToolCall,
};
pub use mock_client::{MockLlmClient, MockStep, MockStepKind};
pub use pricing::{calculate_cost, count_tokens};
