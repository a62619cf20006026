//! Summarizing store.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::MemoryStore;
use crate::error::Result;
use crate::llm::{CompletionRequest, LlmClient, Message, Role};

pub const DEFAULT_SUMMARY_MAX_MESSAGES: usize = 15;

#[derive(Debug, Default)]
struct SummaryState {
    summary: Option<String>,
    recent: Vec<Message>,
}

/// Keeps recent messages verbatim and folds them into a running summary once
/// `max_messages` accumulate. If summarization fails the messages are kept
/// and summarization is retried on the next write.
pub struct SummaryMemory {
    llm: Arc<dyn LlmClient>,
    max_messages: usize,
    state: Mutex<SummaryState>,
}

impl SummaryMemory {
    pub fn new(llm: Arc<dyn LlmClient>, max_messages: usize) -> Self {
        Self {
            llm,
            max_messages: max_messages.max(1),
            state: Mutex::new(SummaryState::default()),
        }
    }

    /// Start from an existing summary, e.g. one restored from storage.
    pub fn with_summary(self, summary: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(SummaryState {
                summary: Some(summary.into()),
                recent: Vec::new(),
            }),
            ..self
        }
    }

    pub async fn summary(&self) -> Option<String> {
        self.state.lock().await.summary.clone()
    }

    fn summarize_request(previous: Option<&str>, messages: &[Message]) -> CompletionRequest {
        let transcript = messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");
        CompletionRequest::new(vec![
            Message::system(
                "You summarize conversations. Progressively fold the new lines into the \
                 existing summary. Be concise but keep important details.",
            ),
            Message::user(format!(
                "Current summary: {}\n\nNew lines to include:\n{}\n\nReply with the updated summary only.",
                previous.unwrap_or("No summary yet."),
                transcript
            )),
        ])
        .with_temperature(0.0)
    }

    async fn summarize(&self) {
        let (previous, pending) = {
            let state = self.state.lock().await;
            (state.summary.clone(), state.recent.clone())
        };
        info!(messages = pending.len(), "Summarizing conversation memory");

        let request = Self::summarize_request(previous.as_deref(), &pending);
        match self.llm.chat(request).await {
            Ok(response) => {
                let mut state = self.state.lock().await;
                state.summary = Some(response.content);
                // Messages added while the backend was busy stay in the buffer.
                let folded = pending.len().min(state.recent.len());
                state.recent.drain(..folded);
            }
            Err(e) => warn!(error = %e, "Memory summarization failed, keeping messages"),
        }
    }
}

#[async_trait]
impl MemoryStore for SummaryMemory {
    async fn get_messages(&self) -> Result<Vec<Message>> {
        let state = self.state.lock().await;
        let mut messages = Vec::with_capacity(state.recent.len() + 1);
        if let Some(summary) = &state.summary {
            messages.push(Message::system(format!(
                "Summary of the earlier conversation: {summary}"
            )));
        }
        messages.extend(state.recent.iter().cloned());
        Ok(messages)
    }

    async fn add_message(&self, role: Role, content: &str) -> Result<()> {
        let should_summarize = {
            let mut state = self.state.lock().await;
            state.recent.push(Message::new(role, content));
            state.recent.len() >= self.max_messages
        };
        if should_summarize {
            self.summarize().await;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.summary = None;
        state.recent.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLlmClient, MockStep};

    #[tokio::test]
    async fn test_summarizes_at_threshold() {
        let llm = MockLlmClient::from_steps("m", vec![MockStep::text("user asked about rust")]);
        let memory = SummaryMemory::new(Arc::new(llm.clone()), 3);

        memory.add_message(Role::User, "what is rust").await.unwrap();
        memory.add_message(Role::Assistant, "a language").await.unwrap();
        assert_eq!(llm.call_count().await, 0);

        memory.add_message(Role::User, "is it fast").await.unwrap();
        assert_eq!(llm.call_count().await, 1);

        let request = &llm.requests().await[0];
        assert!(request.messages[1].content.contains("user: what is rust"));
        assert_eq!(request.temperature, Some(0.0));

        let messages = memory.get_messages().await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("user asked about rust"));
    }

    #[tokio::test]
    async fn test_failure_keeps_messages() {
        let llm = MockLlmClient::from_steps("m", vec![MockStep::error("down")]);
        let memory = SummaryMemory::new(Arc::new(llm), 2);

        memory.add_message(Role::User, "one").await.unwrap();
        memory.add_message(Role::Assistant, "two").await.unwrap();

        let messages = memory.get_messages().await.unwrap();
        assert_eq!(messages.len(), 2);
        assert!(memory.summary().await.is_none());
    }

    #[tokio::test]
    async fn test_clear_drops_summary() {
        let llm = MockLlmClient::default();
        let memory = SummaryMemory::new(Arc::new(llm), 10).with_summary("old");
        memory.add_message(Role::User, "hi").await.unwrap();
        assert_eq!(memory.get_messages().await.unwrap().len(), 2);

        memory.clear().await.unwrap();
        assert!(memory.get_messages().await.unwrap().is_empty());
    }
}
