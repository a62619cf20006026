//! Token counting and cost calculation for LLM calls.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::TokenUsage;

/// Pricing per 1 thousand tokens (USD).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub cost_per_1k_prompt: f64,
    pub cost_per_1k_completion: f64,
}

const fn price(prompt: f64, completion: f64) -> ModelPricing {
    ModelPricing {
        cost_per_1k_prompt: prompt,
        cost_per_1k_completion: completion,
    }
}

static PRICING: Lazy<HashMap<(&'static str, &'static str), ModelPricing>> = Lazy::new(|| {
    HashMap::from([
        (("openai", "gpt-3.5-turbo"), price(0.0005, 0.0015)),
        (("openai", "gpt-4"), price(0.03, 0.06)),
        (("openai", "gpt-4o"), price(0.005, 0.015)),
        (("openai", "gpt-4o-mini"), price(0.00015, 0.0006)),
        (("anthropic", "claude-3-opus"), price(0.015, 0.075)),
        (("anthropic", "claude-3-sonnet"), price(0.003, 0.015)),
        (("anthropic", "claude-3-haiku"), price(0.00025, 0.00125)),
    ])
});

/// Look up the price table entry for a provider/model pair.
pub fn get_pricing(provider: &str, model: &str) -> Option<ModelPricing> {
    let provider = provider.trim().to_ascii_lowercase();
    let model = model.trim().to_ascii_lowercase();
    PRICING.get(&(provider.as_str(), model.as_str())).copied()
}

/// Naive word-based token count. Non-empty text counts as at least one token.
pub fn count_tokens(text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }
    text.split_whitespace().count().max(1) as u32
}

/// Approximate cost of a call, rounded to six decimals. Unknown models are free.
pub fn calculate_cost(usage: &TokenUsage, provider: &str, model: &str) -> f64 {
    let Some(pricing) = get_pricing(provider, model) else {
        return 0.0;
    };
    let prompt = usage.prompt_tokens as f64 / 1000.0 * pricing.cost_per_1k_prompt;
    let completion = usage.completion_tokens as f64 / 1000.0 * pricing.cost_per_1k_completion;
    ((prompt + completion) * 1_000_000.0).round() / 1_000_000.0
}
