//! Resilience layer: circuit breakers and backoff retry.
//!
//! [`call_guarded`] composes the two the way every backend call uses them:
//! the breaker sits outside the retry loop, gating whether the loop runs at
//! all, and the loop's final outcome is what the breaker records.

mod breaker;
mod registry;
mod retry;

use std::fmt::Display;
use std::future::Future;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use breaker::{
    CircuitBreaker, CircuitBreakerState, CircuitState, DEFAULT_FAILURE_THRESHOLD,
    DEFAULT_RECOVERY_TIMEOUT,
};
pub use registry::{CircuitBreakerRegistry, KNOWN_BACKENDS};
pub use retry::{RetryError, RetryPolicy, retry_with_backoff};

/// Outcome of a guarded call that did not succeed.
#[derive(Error, Debug, PartialEq)]
pub enum ResilienceError<E> {
    /// The breaker refused the call; it was never attempted.
    #[error("Backend '{backend}' is currently unavailable (circuit breaker open)")]
    CircuitOpen { backend: String },

    #[error("Request cancelled")]
    Cancelled,

    /// The last error from the backend, unchanged.
    #[error("{0}")]
    Failed(E),
}

/// Run `operation` behind `breaker` and the retry policy.
///
/// Success closes the breaker, a final failure counts one breaker failure,
/// and cancellation records nothing.
pub async fn call_guarded<T, E, F, Fut, P>(
    breaker: &CircuitBreaker,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    is_retryable: P,
    operation: F,
) -> Result<T, ResilienceError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    if cancel.is_cancelled() {
        return Err(ResilienceError::Cancelled);
    }
    if !breaker.can_execute() {
        debug!(backend = %breaker.name(), "Call rejected by open circuit breaker");
        return Err(ResilienceError::CircuitOpen {
            backend: breaker.name().to_string(),
        });
    }

    match retry_with_backoff(policy, cancel, is_retryable, operation).await {
        Ok(value) => {
            breaker.record_success();
            Ok(value)
        }
        Err(RetryError::Failed(err)) => {
            breaker.record_failure();
            Err(ResilienceError::Failed(err))
        }
        Err(RetryError::Cancelled) => Err(ResilienceError::Cancelled),
    }
}
