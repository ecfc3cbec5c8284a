//! # Common Provider Utilities
//!
//! HTTP plumbing shared by the Drone and Gitea adapters: endpoint settings,
//! client construction, error mapping and span bookkeeping.

use super::Platform;
use crate::constants::{DEFAULT_CONNECT_TIMEOUT_SECS, USER_AGENT};
use crate::error::SyncError;
use anyhow::anyhow;
use reqwest::{redirect, Client, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{warn, Span};
use zeroize::Zeroizing;

/// Server address and credential of the selected platform
#[derive(Clone)]
pub struct EndpointConfig {
    pub server: String,
    pub token: Zeroizing<String>,
    pub skip_verify: bool,
}

impl std::fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("server", &self.server)
            .field("skip_verify", &self.skip_verify)
            .finish_non_exhaustive()
    }
}

impl EndpointConfig {
    pub fn new(server: impl Into<String>, token: impl Into<String>, skip_verify: bool) -> Self {
        Self {
            server: server.into(),
            token: Zeroizing::new(token.into()),
            skip_verify,
        }
    }

    /// Server address without trailing slashes
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.server.trim_end_matches('/')
    }

    /// Fail with [`SyncError::MissingCredential`] unless server and token are set
    ///
    /// # Errors
    ///
    /// Returns the first missing field, server before token.
    pub fn require(&self, platform: Platform) -> Result<(), SyncError> {
        if self.base_url().trim().is_empty() {
            return Err(SyncError::MissingCredential {
                platform,
                field: "server",
            });
        }
        if self.token.trim().is_empty() {
            return Err(SyncError::MissingCredential {
                platform,
                field: "token",
            });
        }
        Ok(())
    }
}

/// Build the reqwest client used by an adapter
///
/// # Errors
///
/// Returns [`SyncError::ClientInit`] if the TLS backend cannot be set up.
pub fn build_http_client(
    platform: Platform,
    skip_verify: bool,
    redirects: redirect::Policy,
) -> Result<Client, SyncError> {
    if skip_verify {
        warn!(platform = %platform, "TLS certificate verification is disabled");
    }

    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
        .danger_accept_invalid_certs(skip_verify)
        .redirect(redirects)
        .build()
        .map_err(|e| SyncError::ClientInit {
            platform,
            cause: anyhow::Error::new(e).context("failed to create HTTP client"),
        })
}

/// Error body returned by both Drone and Gitea
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    message: String,
}

/// Turn a non-2xx response into an error carrying the status code
///
/// The platform's `message` is used when the body is JSON, otherwise the raw
/// body is kept.
pub fn error_from_response(platform: Platform, status: StatusCode, body: &str) -> anyhow::Error {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(error) if !error.message.is_empty() => anyhow!(
            "{platform} API error: {} (status: {status})",
            error.message
        ),
        _ if body.trim().is_empty() => {
            anyhow!("HTTP {} (status: {status})", status.as_u16())
        }
        _ => anyhow!(
            "HTTP {} (status: {status}): {}",
            status.as_u16(),
            body.trim()
        ),
    }
}

/// `info_span!` with the empty fields [`OperationTracker`] records into
macro_rules! operation_span {
    ($name:literal, $($fields:tt)*) => {
        tracing::info_span!(
            $name,
            $($fields)*,
            operation.success = tracing::field::Empty,
            operation.duration_ms = tracing::field::Empty,
            error.message = tracing::field::Empty
        )
    };
}

pub(crate) use operation_span;

/// Helper struct for tracking operation state
///
/// The span must be created with [`operation_span!`] for the recorded values
/// to show up.
#[derive(Debug)]
pub struct OperationTracker {
    start: Instant,
    span: Span,
}

impl OperationTracker {
    pub fn new(span: Span) -> Self {
        Self {
            start: Instant::now(),
            span,
        }
    }

    pub fn record_success(&self) {
        self.span.record("operation.success", true);
        self.span
            .record("operation.duration_ms", self.start.elapsed().as_millis() as u64);
    }

    pub fn record_error(&self, error: &anyhow::Error) {
        self.span.record("operation.success", false);
        self.span.record("error.message", format!("{error:#}"));
        self.span
            .record("operation.duration_ms", self.start.elapsed().as_millis() as u64);
    }

    /// Record the outcome of `result` and hand it back
    pub fn finish<T>(&self, result: anyhow::Result<T>) -> anyhow::Result<T> {
        match &result {
            Ok(_) => self.record_success(),
            Err(e) => self.record_error(e),
        }
        result
    }
}
