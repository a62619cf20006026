//! In-process buffer and sliding-window stores.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::MemoryStore;
use crate::error::Result;
use crate::llm::{Message, Role};

/// Stores the full conversation without pruning.
#[derive(Debug, Default)]
pub struct BufferMemory {
    messages: Mutex<Vec<Message>>,
}

impl BufferMemory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for BufferMemory {
    async fn get_messages(&self) -> Result<Vec<Message>> {
        Ok(self.messages.lock().await.clone())
    }

    async fn add_message(&self, role: Role, content: &str) -> Result<()> {
        self.messages.lock().await.push(Message::new(role, content));
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.messages.lock().await.clear();
        Ok(())
    }
}

/// Sliding window over the most recent exchanges.
///
/// `k` counts exchanges, so up to `2 * k` messages (one user plus one
/// assistant message per exchange) are retained. Oldest messages are evicted
/// first.
///
/// # Example
///
/// ```ignore
/// use parley_ai::memory::{MemoryStore, WindowMemory};
/// use parley_ai::llm::Role;
///
/// let memory = WindowMemory::new(1);
/// memory.add_message(Role::User, "first").await?;
/// memory.add_message(Role::Assistant, "reply").await?;
/// memory.add_message(Role::User, "second").await?;
/// assert_eq!(memory.get_messages().await?.len(), 2);
/// ```
#[derive(Debug)]
pub struct WindowMemory {
    k: usize,
    messages: Mutex<VecDeque<Message>>,
}

impl WindowMemory {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            messages: Mutex::new(VecDeque::with_capacity(k * 2)),
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    fn limit(&self) -> usize {
        self.k * 2
    }
}

#[async_trait]
impl MemoryStore for WindowMemory {
    async fn get_messages(&self) -> Result<Vec<Message>> {
        Ok(self.messages.lock().await.iter().cloned().collect())
    }

    async fn add_message(&self, role: Role, content: &str) -> Result<()> {
        let mut messages = self.messages.lock().await;
        messages.push_back(Message::new(role, content));
        while messages.len() > self.limit() {
            messages.pop_front();
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.messages.lock().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_buffer_keeps_everything_in_order() {
        let memory = BufferMemory::new();
        for i in 0..20 {
            memory.add_message(Role::User, &format!("m{i}")).await.unwrap();
        }
        let messages = memory.get_messages().await.unwrap();
        assert_eq!(messages.len(), 20);
        assert_eq!(messages[0].content, "m0");
        assert_eq!(messages[19].content, "m19");

        memory.clear().await.unwrap();
        assert!(memory.get_messages().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_window_keeps_last_two_k() {
        let memory = WindowMemory::new(2);
        for (role, text) in [
            (Role::User, "q1"),
            (Role::Assistant, "a1"),
            (Role::User, "q2"),
            (Role::Assistant, "a2"),
            (Role::User, "q3"),
            (Role::Assistant, "a3"),
        ] {
            memory.add_message(role, text).await.unwrap();
        }

        let contents: Vec<String> = memory
            .get_messages()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["q2", "a2", "q3", "a3"]);
    }

    #[tokio::test]
    async fn test_window_of_zero_keeps_nothing() {
        let memory = WindowMemory::new(0);
        memory.add_message(Role::User, "hi").await.unwrap();
        assert!(memory.get_messages().await.unwrap().is_empty());
    }
}
