/*!
 * Mock provider helpers for testing
 *
 * Builds provider registries around `MockProvider` so no test ever makes an
 * external request.
 */

use std::sync::Arc;

use nodeweave::providers::mock::MockProvider;
use nodeweave::providers::{CompletionRequest, ProviderRegistry};

/// Name every test step set uses for its provider
pub const MOCK_PROVIDER: &str = "mock";

/// Registry holding `provider` under `MOCK_PROVIDER`
pub fn registry_with(provider: &MockProvider) -> ProviderRegistry {
    ProviderRegistry::new().with_client(MOCK_PROVIDER, Arc::new(provider.clone()))
}

/// Fails every request whose input mentions "FAIL"
pub fn fails_on_marker(request: &CompletionRequest) -> bool {
    request.text.contains("FAIL")
}

/// Provider that always fails nodes containing "FAIL"
pub fn marker_failing_provider() -> MockProvider {
    MockProvider::fail_when(fails_on_marker)
}
