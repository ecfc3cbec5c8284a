//! Common test utilities for Pact integration tests
//!
//! Provides shared initialization code for all Pact tests, including
//! rustls crypto provider setup.

#![allow(dead_code, reason = "each test crate uses a different subset")]

use drone_secret_sync::provider::common::EndpointConfig;
use pact_consumer::prelude::*;
use std::sync::Once;

static RUSTLS_INIT: Once = Once::new();

/// Token every Pact interaction expects
pub const TEST_TOKEN: &str = "test-token";

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` to ensure it's only called once across all tests.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

/// Start the mock server and build an endpoint pointing at it
///
/// The mock server must be kept in scope for the duration of the test.
pub fn start_endpoint(
    pact_builder: &mut PactBuilder,
) -> (
    Box<dyn pact_consumer::mock_server::ValidatingMockServer>,
    EndpointConfig,
) {
    let mock_server = pact_builder.start_mock_server(None, None);
    let mut base_url = mock_server.url().to_string();
    if base_url.ends_with('/') {
        base_url.pop();
    }
    (mock_server, EndpointConfig::new(base_url, TEST_TOKEN, false))
}
