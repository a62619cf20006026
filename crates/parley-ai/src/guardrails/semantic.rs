//! LLM-backed fallback for theme enforcement.
//!
//! Keyword matching misses messages such as "how do I reset it?" that only
//! relate to a theme through earlier turns. Before an off-topic message is
//! blocked, the backend is asked a yes/no question about it.

use crate::llm::{CompletionRequest, Message, Role};

const AFFIRMATIVE: &[&str] = &["yes", "sim", "y"];

#[derive(Debug, Clone)]
pub struct SemanticThemeClassifier {
    history_turns: usize,
}

impl Default for SemanticThemeClassifier {
    fn default() -> Self {
        Self::new(3)
    }
}

impl SemanticThemeClassifier {
    /// `history_turns` user/assistant exchanges of history are shown to the classifier.
    pub fn new(history_turns: usize) -> Self {
        Self { history_turns }
    }

    pub fn build_request(
        &self,
        message: &str,
        themes: &[String],
        history: &[Message],
    ) -> CompletionRequest {
        let theme_list = themes.join(", ");
        let system = format!(
            "You are a topic classifier. Decide whether the user's latest message is related to \
             any of these themes: {theme_list}. The message may refer back to earlier turns of \
             the conversation. Answer with a single word: yes or no."
        );

        let recent: Vec<&Message> = history
            .iter()
            .filter(|m| m.role != Role::System)
            .collect();
        let keep = self.history_turns.saturating_mul(2);
        let recent = &recent[recent.len().saturating_sub(keep)..];

        let mut prompt = String::new();
        if !recent.is_empty() {
            prompt.push_str("Recent conversation:\n");
            for m in recent {
                prompt.push_str(&format!("{}: {}\n", m.role, m.content));
            }
            prompt.push('\n');
        }
        prompt.push_str(&format!(
            "Message: {message}\n\nIs this message related to {theme_list}? Answer yes or no."
        ));

        CompletionRequest::new(vec![Message::system(system), Message::user(prompt)])
            .with_temperature(0.0)
    }

    /// Accept only an explicit affirmative as the first word of the answer.
    pub fn parse_answer(content: &str) -> bool {
        content
            .split(|c: char| !c.is_alphanumeric())
            .find(|word| !word.is_empty())
            .map(|word| AFFIRMATIVE.contains(&word.to_lowercase().as_str()))
            .unwrap_or(false)
    }
}
