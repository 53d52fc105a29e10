/*!
 * Token usage and cost accounting for a run.
 */

use parking_lot::Mutex;
use std::time::Duration;

use crate::providers::{Completion, ProviderClient};

/// Token usage statistics for a translation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenUsageStats {
    /// Number of input (prompt) tokens
    pub input_tokens: u64,

    /// Number of output (completion) tokens
    pub output_tokens: u64,

    /// Total number of tokens
    pub total_tokens: u64,

    /// Provider requests that returned a completion
    pub provider_calls: u64,

    pub cache_hits: u64,

    pub cache_misses: u64,

    /// Cost estimated from provider prices (quoted per million tokens)
    pub estimated_cost: f64,

    /// Unit of `estimated_cost`, taken from the first priced provider
    pub price_unit: String,

    /// Total time spent waiting on providers
    pub api_duration: Duration,
}

impl TokenUsageStats {
    /// Add one completion priced at the given per-million rates
    pub fn add_completion(
        &mut self,
        completion: &Completion,
        input_price: f64,
        output_price: f64,
        elapsed: Duration,
    ) {
        self.input_tokens += completion.input_tokens;
        self.output_tokens += completion.output_tokens;
        self.total_tokens += completion.input_tokens + completion.output_tokens;
        self.provider_calls += 1;
        self.api_duration += elapsed;
        self.estimated_cost += (completion.input_tokens as f64 * input_price
            + completion.output_tokens as f64 * output_price)
            / 1_000_000.0;
    }

    /// Tokens per minute of provider time
    pub fn tokens_per_minute(&self) -> f64 {
        let minutes = self.api_duration.as_secs_f64() / 60.0;
        if minutes > 0.0 {
            self.total_tokens as f64 / minutes
        } else {
            0.0
        }
    }

    /// Share of cache lookups that hit, 0.0 without lookups
    pub fn cache_hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups > 0 {
            self.cache_hits as f64 / lookups as f64
        } else {
            0.0
        }
    }

    /// Generate a one-line summary of token usage
    pub fn summary(&self) -> String {
        let unit = if self.price_unit.is_empty() {
            "USD"
        } else {
            &self.price_unit
        };
        format!(
            "{} provider calls, {} tokens ({} in / {} out), cache hit rate {:.0}%, estimated cost {:.4} {}",
            self.provider_calls,
            self.total_tokens,
            self.input_tokens,
            self.output_tokens,
            self.cache_hit_rate() * 100.0,
            self.estimated_cost,
            unit
        )
    }
}

/// Thread-safe accumulator shared by all workers of a run
#[derive(Debug, Default)]
pub struct UsageTracker {
    stats: Mutex<TokenUsageStats>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_call(&self, client: &dyn ProviderClient, completion: &Completion, elapsed: Duration) {
        let mut stats = self.stats.lock();
        stats.add_completion(
            completion,
            client.input_token_price(),
            client.output_token_price(),
            elapsed,
        );
        let priced = client.input_token_price() > 0.0 || client.output_token_price() > 0.0;
        if stats.price_unit.is_empty() && priced {
            stats.price_unit = client.price_unit().to_string();
        }
    }

    pub fn record_cache_hit(&self) {
        self.stats.lock().cache_hits += 1;
    }

    pub fn record_cache_miss(&self) {
        self.stats.lock().cache_misses += 1;
    }

    pub fn snapshot(&self) -> TokenUsageStats {
        self.stats.lock().clone()
    }
}
