use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::agent::turn::{TurnMetadata, TurnRequest, TurnResponse};
use crate::guardrails::SemanticThemeClassifier;
use crate::llm::{Message, TokenUsage};
use crate::resilience::ResilienceError;

use super::TurnExecutor;

/// Result of asking the backend whether an off-keyword message is on topic.
pub(super) enum ThemeVerdict {
    /// On topic; carries the classifier call's usage.
    OnTopic(TokenUsage),
    OffTopic,
    Cancelled,
}

impl TurnExecutor {
    /// Semantic fallback for theme violations. A "no" answer and a failed
    /// classifier call both block.
    pub(super) async fn semantic_theme_check(
        &self,
        message: &str,
        themes: &[String],
        history: &[Message],
        cancel: &CancellationToken,
    ) -> ThemeVerdict {
        let request = self.classifier.build_request(message, themes, history);

        match self.call_backend(request, cancel).await {
            Ok(response) => {
                let on_topic = SemanticThemeClassifier::parse_answer(&response.content);
                debug!(on_topic, answer = %response.content, "Semantic theme check");
                if on_topic {
                    ThemeVerdict::OnTopic(response.usage.unwrap_or_default())
                } else {
                    ThemeVerdict::OffTopic
                }
            }
            Err(ResilienceError::Cancelled) => ThemeVerdict::Cancelled,
            Err(e) => {
                warn!(error = %e, "Semantic theme check failed, treating message as off-topic");
                ThemeVerdict::OffTopic
            }
        }
    }

    /// Blocked turns succeed from the caller's point of view: zero usage and
    /// `guardrail_violation` set.
    pub(super) fn blocked_response(
        &self,
        request: &TurnRequest,
        content: String,
        topic: Option<String>,
    ) -> TurnResponse {
        TurnResponse::assistant(
            &request.session_id,
            content,
            TurnMetadata {
                guardrail_violation: true,
                topic,
                ..self.base_metadata(TokenUsage::default())
            },
        )
    }
}
