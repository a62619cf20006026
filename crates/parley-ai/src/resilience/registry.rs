//! Breakers keyed by backend id.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::time::Duration;

use super::breaker::{
    CircuitBreaker, CircuitBreakerState, DEFAULT_FAILURE_THRESHOLD, DEFAULT_RECOVERY_TIMEOUT,
};
use crate::config::Settings;

/// Backends that get a breaker up front.
pub const KNOWN_BACKENDS: [&str; 4] = ["openai", "anthropic", "ollama", "gemini"];

/// Owns one [`CircuitBreaker`] per logical backend. Constructed explicitly and
/// passed to whatever needs it, so tests and tenants never share breaker state.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    failure_threshold: u32,
    recovery_timeout: Duration,
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl CircuitBreakerRegistry {
    /// Empty registry; breakers are created lazily with the given parameters.
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            breakers: DashMap::new(),
            failure_threshold,
            recovery_timeout,
        }
    }

    /// Registry pre-populated for the known backends with default parameters.
    pub fn with_defaults() -> Self {
        let registry = Self::new(DEFAULT_FAILURE_THRESHOLD, DEFAULT_RECOVERY_TIMEOUT);
        for backend in KNOWN_BACKENDS {
            registry.get_or_create(backend);
        }
        registry
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let registry = Self::new(
            settings.breaker_failure_threshold,
            Duration::from_secs(settings.breaker_recovery_timeout_secs),
        );
        for backend in KNOWN_BACKENDS {
            registry.get_or_create(backend);
        }
        registry
    }

    pub fn get(&self, backend: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(backend).map(|entry| entry.value().clone())
    }

    pub fn get_or_create(&self, backend: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(backend.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    backend,
                    self.failure_threshold,
                    self.recovery_timeout,
                ))
            })
            .value()
            .clone()
    }

    /// Install a breaker with custom parameters, replacing any existing one.
    pub fn insert(&self, breaker: CircuitBreaker) -> Arc<CircuitBreaker> {
        let breaker = Arc::new(breaker);
        self.breakers
            .insert(breaker.name().to_string(), breaker.clone());
        breaker
    }

    /// State of every breaker, sorted by backend id.
    pub fn snapshot(&self) -> Vec<(String, CircuitBreakerState)> {
        let mut states: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }
}
