/*!
 * Mock provider for testing.
 *
 * Simulates the behaviors the engine has to cope with:
 * - `MockProvider::working()` - always succeeds with `[target] text`
 * - `MockProvider::failing()` - always fails with a retryable 503
 * - `MockProvider::fail_when(..)` - fails for requests matching a predicate
 * - `MockProvider::fail_times(n)` - fails the first `n` calls, then succeeds
 * - `MockProvider::slow(ms)` - succeeds after a delay
 * - `MockProvider::empty()` - succeeds with an empty body
 *
 * Clones share their counters, so a test can keep one handle while the
 * engine owns another.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::{ProviderError, TranslationError};
use crate::providers::{Completion, CompletionRequest, ProviderClient, ProviderType, estimate_tokens};

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Always fails with a retryable error
    Failing,
    /// Fails when the predicate matches the request
    FailWhen(fn(&CompletionRequest) -> bool),
    /// Fails the first `n` calls
    FailTimes(usize),
    /// Succeeds after `delay_ms`
    Slow { delay_ms: u64 },
    /// Succeeds with an empty response
    Empty,
}

#[derive(Debug, Default)]
struct Counters {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Scripted provider client
#[derive(Debug, Clone)]
pub struct MockProvider {
    behavior: MockBehavior,
    name: String,
    provider_type: ProviderType,
    max_input_tokens: u32,
    max_output_tokens: u32,
    input_token_price: f64,
    output_token_price: f64,
    counters: Arc<Counters>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockProvider {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            name: "mock".to_string(),
            provider_type: ProviderType::Raw,
            max_input_tokens: 0,
            max_output_tokens: 0,
            input_token_price: 0.0,
            output_token_price: 0.0,
            counters: Arc::new(Counters::default()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn fail_when(predicate: fn(&CompletionRequest) -> bool) -> Self {
        Self::new(MockBehavior::FailWhen(predicate))
    }

    pub fn fail_times(times: usize) -> Self {
        Self::new(MockBehavior::FailTimes(times))
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_type(mut self, provider_type: ProviderType) -> Self {
        self.provider_type = provider_type;
        self
    }

    pub fn with_limits(mut self, max_input_tokens: u32, max_output_tokens: u32) -> Self {
        self.max_input_tokens = max_input_tokens;
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn with_prices(mut self, input: f64, output: f64) -> Self {
        self.input_token_price = input;
        self.output_token_price = output;
        self
    }

    /// Number of `complete` calls that passed validation
    pub fn call_count(&self) -> usize {
        self.counters.calls.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously running calls
    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }

    /// Every request received, in arrival order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    fn respond(request: &CompletionRequest, text: String) -> Completion {
        let input = if request.prompt.is_empty() {
            &request.text
        } else {
            &request.prompt
        };
        Completion {
            input_tokens: estimate_tokens(input) as u64,
            output_tokens: estimate_tokens(&text) as u64,
            text,
        }
    }

    fn translated(request: &CompletionRequest) -> String {
        format!("[{}] {}", request.target_language, request.text)
    }

    fn simulated_failure(call: usize) -> ProviderError {
        ProviderError::ApiError {
            status_code: 503,
            message: format!("Simulated provider failure (request #{})", call + 1),
        }
    }
}

struct InFlightGuard<'a>(&'a Counters);

impl<'a> InFlightGuard<'a> {
    fn enter(counters: &'a Counters) -> Self {
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, TranslationError> {
        self.validate_request(request)?;

        let call = self.counters.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        let _guard = InFlightGuard::enter(&self.counters);

        match self.behavior {
            MockBehavior::Working => Ok(Self::respond(request, Self::translated(request))),
            MockBehavior::Failing => Err(Self::simulated_failure(call).into()),
            MockBehavior::FailWhen(predicate) => {
                if predicate(request) {
                    Err(Self::simulated_failure(call).into())
                } else {
                    Ok(Self::respond(request, Self::translated(request)))
                }
            }
            MockBehavior::FailTimes(times) => {
                if call < times {
                    Err(Self::simulated_failure(call).into())
                } else {
                    Ok(Self::respond(request, Self::translated(request)))
                }
            }
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(Self::respond(request, Self::translated(request)))
            }
            MockBehavior::Empty => Ok(Self::respond(request, String::new())),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn provider_type(&self) -> ProviderType {
        self.provider_type
    }

    fn max_input_tokens(&self) -> u32 {
        self.max_input_tokens
    }

    fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }

    fn input_token_price(&self) -> f64 {
        self.input_token_price
    }

    fn output_token_price(&self) -> f64 {
        self.output_token_price
    }

    fn price_unit(&self) -> &str {
        "USD"
    }
}
