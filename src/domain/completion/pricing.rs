//! Model pricing for cost accounting

use serde::{Deserialize, Serialize};

/// Per-model token prices, stored in micro-dollars per 1K tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub model_id: String,
    pub input_price_per_1k_micros: i64,
    pub output_price_per_1k_micros: i64,
}

impl ModelPricing {
    /// Prices given in USD per 1K tokens
    pub fn new(model_id: impl Into<String>, input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            model_id: model_id.into(),
            input_price_per_1k_micros: (input_per_1k * 1_000_000.0).round() as i64,
            output_price_per_1k_micros: (output_per_1k * 1_000_000.0).round() as i64,
        }
    }

    /// Pricing that makes every call free
    pub fn free(model_id: impl Into<String>) -> Self {
        Self::new(model_id, 0.0, 0.0)
    }

    /// Cost in micro-dollars
    pub fn calculate_cost(&self, input_tokens: u32, output_tokens: u32) -> i64 {
        let input_cost = (i64::from(input_tokens) * self.input_price_per_1k_micros) / 1000;
        let output_cost = (i64::from(output_tokens) * self.output_price_per_1k_micros) / 1000;

        input_cost + output_cost
    }

    pub fn calculate_cost_usd(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        self.calculate_cost(input_tokens, output_tokens) as f64 / 1_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_cost() {
        // $0.03 / 1K input, $0.06 / 1K output
        let pricing = ModelPricing::new("gpt-4", 0.03, 0.06);

        assert_eq!(pricing.calculate_cost(1000, 500), 60_000);
        assert!((pricing.calculate_cost_usd(1000, 500) - 0.06).abs() < 1e-9);
    }

    #[test]
    fn test_free_pricing() {
        assert_eq!(ModelPricing::free("local").calculate_cost(10_000, 10_000), 0);
    }
}
