//! Memory - Session-bound conversation stores
//!
//! A [`MemoryStore`] supplies history to the turn executor and receives the
//! user message and final answer once a turn completes. Three strategies are
//! provided:
//!
//! - [`BufferMemory`] keeps everything
//! - [`WindowMemory`] keeps the last `k` exchanges
//! - [`SummaryMemory`] folds older messages into a running summary

mod buffer;
mod summary;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AiError, Result};
use crate::llm::{LlmClient, Message, Role};

pub use buffer::{BufferMemory, WindowMemory};
pub use summary::{DEFAULT_SUMMARY_MAX_MESSAGES, SummaryMemory};

/// Conversation store for one session.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn get_messages(&self) -> Result<Vec<Message>>;

    async fn add_message(&self, role: Role, content: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// Which store to build for a new session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum MemoryStrategy {
    #[default]
    Buffer,
    Window { k: usize },
    Summary { max_messages: usize },
}

impl MemoryStrategy {
    /// Build a store. The summary strategy needs a backend to summarize with.
    pub fn create(&self, llm: Option<Arc<dyn LlmClient>>) -> Result<Arc<dyn MemoryStore>> {
        match self {
            MemoryStrategy::Buffer => Ok(Arc::new(BufferMemory::new())),
            MemoryStrategy::Window { k } => Ok(Arc::new(WindowMemory::new(*k))),
            MemoryStrategy::Summary { max_messages } => {
                let llm = llm.ok_or_else(|| {
                    AiError::Config("summary memory requires an LLM client".to_string())
                })?;
                Ok(Arc::new(SummaryMemory::new(llm, *max_messages)))
            }
        }
    }
}
