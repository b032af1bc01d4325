//! Backend descriptors.

use std::time::Duration;

/// Name of the OpenAI backend.
pub const OPENAI: &str = "openai";

/// Name of the Gemini backend.
pub const GEMINI: &str = "gemini";

/// Per-token cost weights, used for reporting only.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CostWeights {
    /// Cost per 1k prompt tokens (USD)
    pub input_per_1k: f64,
    /// Cost per 1k completion tokens (USD)
    pub output_per_1k: f64,
}

impl CostWeights {
    /// Estimated cost of one exchange.
    pub fn estimate(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        (prompt_tokens as f64 / 1000.0) * self.input_per_1k
            + (completion_tokens as f64 / 1000.0) * self.output_per_1k
    }
}

/// Static description of one AI backend.
///
/// Built once at process start and never mutated.
#[derive(Debug, Clone)]
pub struct BackendDescriptor {
    /// Backend identity used in logs, config and `used_backend`
    pub name: String,

    /// Provider model identifier
    pub model: String,

    /// Minimum spacing between two granted calls
    pub min_interval: Duration,

    /// Upper bound on completion tokens per call
    pub max_tokens: u32,

    /// Cost weights for reporting
    pub cost: CostWeights,
}

impl BackendDescriptor {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            min_interval: Duration::from_secs(2),
            max_tokens: 4096,
            cost: CostWeights::default(),
        }
    }

    /// OpenAI defaults: 2s floor.
    pub fn openai(model: impl Into<String>) -> Self {
        Self::new(OPENAI, model)
            .with_min_interval(Duration::from_secs(2))
            .with_cost(CostWeights {
                input_per_1k: 0.00015,
                output_per_1k: 0.0006,
            })
    }

    /// Gemini defaults: the free quota is tighter, so the floor is 4s.
    pub fn gemini(model: impl Into<String>) -> Self {
        Self::new(GEMINI, model)
            .with_min_interval(Duration::from_secs(4))
            .with_cost(CostWeights {
                input_per_1k: 0.0001,
                output_per_1k: 0.0004,
            })
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_cost(mut self, cost: CostWeights) -> Self {
        self.cost = cost;
        self
    }
}
