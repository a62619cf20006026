//! Agent module - per-turn orchestration around an LLM backend

mod executor;
pub mod turn;

pub use executor::{
    CANCELLED_MESSAGE, OFF_TOPIC_MESSAGE, SERVICE_UNAVAILABLE_MESSAGE, TurnExecutor,
    blocked_message, error_message,
};
pub use turn::{DEFAULT_AGENT_ID, TurnMetadata, TurnRequest, TurnResponse};
