//! Guardrails - input/output policy checks and semantic theme fallback

mod policy;
mod semantic;

pub use policy::{
    GLOBAL_AGENT, GuardrailPolicy, GuardrailViolation, InputDecision, LOW_CONFIDENCE_FALLBACK,
    OFF_TOPIC, is_neutral_phrase,
};
pub use semantic::SemanticThemeClassifier;
