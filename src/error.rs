//! # Errors
//!
//! Typed error taxonomy for a sync run.
//!
//! Adapters report failures as `anyhow::Error` with context; the reconciler
//! wraps them into the scope/secret-aware variants below so the caller can
//! decide whether an error ends the run or is only recorded.

use crate::provider::Platform;
use crate::reconciler::Scope;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Endpoint or token for the selected platform was not configured
    #[error("missing {platform} {field}")]
    MissingCredential {
        platform: Platform,
        field: &'static str,
    },

    /// A configuration value could not be interpreted
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidConfig {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// The HTTP client for the platform could not be built
    #[error("failed to initialize {platform} client: {cause:#}")]
    ClientInit {
        platform: Platform,
        cause: anyhow::Error,
    },

    /// The platform rejected the credential during the login check
    #[error("{platform} login failed: {cause:#}")]
    Authentication {
        platform: Platform,
        cause: anyhow::Error,
    },

    #[error("failed to list secrets for {scope}: {cause:#}")]
    ScopeFetchFailed { scope: Scope, cause: anyhow::Error },

    #[error("failed to create secret {name} in {scope}: {cause:#}")]
    SecretCreateFailed {
        scope: Scope,
        name: String,
        cause: anyhow::Error,
    },

    #[error("failed to update secret {name} in {scope}: {cause:#}")]
    SecretUpdateFailed {
        scope: Scope,
        name: String,
        cause: anyhow::Error,
    },

    #[error("failed to delete secret {name} in {scope}: {cause:#}")]
    SecretDeleteFailed {
        scope: Scope,
        name: String,
        cause: anyhow::Error,
    },
}

impl SyncError {
    /// Short, stable identifier used as the `error.kind` log field
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::MissingCredential { .. } => "missing_credential",
            SyncError::InvalidConfig { .. } => "invalid_config",
            SyncError::ClientInit { .. } => "client_init",
            SyncError::Authentication { .. } => "authentication",
            SyncError::ScopeFetchFailed { .. } => "scope_fetch_failed",
            SyncError::SecretCreateFailed { .. } => "secret_create_failed",
            SyncError::SecretUpdateFailed { .. } => "secret_update_failed",
            SyncError::SecretDeleteFailed { .. } => "secret_delete_failed",
        }
    }

    /// Configuration errors are raised before any remote call is made
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SyncError::MissingCredential { .. }
                | SyncError::InvalidConfig { .. }
                | SyncError::ClientInit { .. }
        )
    }

    /// Scope the error happened in, if it is tied to one
    #[must_use]
    pub fn scope(&self) -> Option<&Scope> {
        match self {
            SyncError::ScopeFetchFailed { scope, .. }
            | SyncError::SecretCreateFailed { scope, .. }
            | SyncError::SecretUpdateFailed { scope, .. }
            | SyncError::SecretDeleteFailed { scope, .. } => Some(scope),
            _ => None,
        }
    }
}
