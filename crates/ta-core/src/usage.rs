//! Token-usage accounting and cost estimation.

use serde::{Deserialize, Serialize};

/// Token counts reported by the language model for one call.
///
/// Accumulated component-wise across batches; the `total_tokens = prompt +
/// completion` relationship is trusted from the upstream engine rather than
/// re-derived here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Creates a usage record from its components.
    pub fn new(prompt_tokens: u64, completion_tokens: u64, total_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        }
    }

    /// Adds another usage record component-wise.
    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }

    /// Returns true if no tokens were consumed.
    pub fn is_zero(&self) -> bool {
        self.prompt_tokens == 0 && self.completion_tokens == 0 && self.total_tokens == 0
    }
}

/// Estimated inference cost for an accumulated usage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub usd: f64,
    pub brl: f64,
}

/// Per-model input cost in USD per million tokens.
const INPUT_COST_PER_MILLION_USD: &[(&str, f64)] = &[("gemini-2.0-flash-001", 0.15)];
/// Per-model output cost in USD per million tokens.
const OUTPUT_COST_PER_MILLION_USD: &[(&str, f64)] = &[("gemini-2.0-flash-001", 0.6)];

const DEFAULT_INPUT_COST_PER_MILLION_USD: f64 = 0.50;
const DEFAULT_OUTPUT_COST_PER_MILLION_USD: f64 = 1.50;

/// Conversion rate applied for the BRL estimate.
pub const USD_TO_BRL_RATE: f64 = 5.6;

fn rate_for(table: &[(&str, f64)], model: &str, fallback: f64) -> f64 {
    table
        .iter()
        .find(|(id, _)| *id == model)
        .map(|(_, rate)| *rate)
        .unwrap_or(fallback)
}

/// Estimates the inference cost of `usage` under the given model's pricing.
///
/// Unknown model ids fall back to a conservative default rate.
pub fn estimate_cost(usage: &TokenUsage, model: &str) -> CostEstimate {
    let input_rate = rate_for(
        INPUT_COST_PER_MILLION_USD,
        model,
        DEFAULT_INPUT_COST_PER_MILLION_USD,
    );
    let output_rate = rate_for(
        OUTPUT_COST_PER_MILLION_USD,
        model,
        DEFAULT_OUTPUT_COST_PER_MILLION_USD,
    );

    let usd = (usage.prompt_tokens as f64 / 1_000_000.0) * input_rate
        + (usage.completion_tokens as f64 / 1_000_000.0) * output_rate;

    CostEstimate {
        usd,
        brl: usd * USD_TO_BRL_RATE,
    }
}
