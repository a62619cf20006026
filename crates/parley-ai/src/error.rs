//! Error types for the AI module

use parley_traits::ToolError;
use thiserror::Error;

/// AI module error types
#[derive(Error, Debug)]
pub enum AiError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("{provider} returned HTTP {status}: {message}")]
    LlmHttp {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Backend '{0}' is currently unavailable (circuit breaker open)")]
    CircuitOpen(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Memory error: {0}")]
    Memory(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

const TRANSIENT_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "rate limit",
    "too many requests",
    "connection",
    "temporarily",
    "unavailable",
    "overloaded",
];

impl AiError {
    /// Whether a failed backend call is worth attempting again.
    ///
    /// Circuit-open and cancellation are never retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::LlmHttp { status, .. } => {
                matches!(*status, 408 | 429) || (500..=599).contains(status)
            }
            AiError::Llm(message) => {
                let lower = message.to_lowercase();
                TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker))
            }
            AiError::Io(_) => true,
            _ => false,
        }
    }
}

/// Result type alias for AI operations
pub type Result<T> = std::result::Result<T, AiError>;
