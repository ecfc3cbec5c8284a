//! # Provider Modules
//!
//! Secret store adapters for the supported CI platforms.
//!
//! Each platform implements [`SecretStoreProvider`]:
//! - [`drone::DroneClient`] for the Drone CI server
//! - [`gitea::GiteaClient`] for Gitea Actions

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::reconciler::{Scope, SecretValue};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

/// Platform a run syncs into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Drone,
    Gitea,
}

impl Platform {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Drone => "drone",
            Platform::Gitea => "gitea",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secrets currently stored in a scope, by name
///
/// Both platforms redact values, so values are usually empty. Only the
/// presence of a name matters to the reconciler.
pub type ExistingSecrets = HashMap<String, String>;

/// Provider trait for CI secret stores
#[async_trait]
pub trait SecretStoreProvider: Send + Sync {
    /// Platform this adapter talks to
    fn platform(&self) -> Platform;

    /// Login of the user owning the token
    async fn current_user(&self) -> Result<String>;

    /// List the secrets of a scope
    async fn list_secrets(&self, scope: &Scope) -> Result<ExistingSecrets>;

    /// Create a secret that is expected not to exist
    async fn create_secret(&self, scope: &Scope, name: &str, value: &SecretValue) -> Result<()>;

    /// Overwrite the value of an existing secret
    async fn update_secret(&self, scope: &Scope, name: &str, value: &SecretValue) -> Result<()>;

    /// Delete a secret; a secret that does not exist is not an error
    async fn delete_secret(&self, scope: &Scope, name: &str) -> Result<()>;
}

// Common utilities shared across providers
pub mod common;

// Provider implementations
pub mod drone;
pub mod gitea;

/// Build the adapter for the platform selected by `config`
///
/// # Errors
///
/// Returns [`SyncError::MissingCredential`] when the server or token is empty
/// and [`SyncError::ClientInit`] when the HTTP client cannot be built.
pub fn build_provider(config: &SyncConfig) -> Result<Box<dyn SecretStoreProvider>, SyncError> {
    match config.platform {
        Platform::Drone => Ok(Box::new(drone::DroneClient::new(&config.endpoint)?)),
        Platform::Gitea => Ok(Box::new(gitea::GiteaClient::new(&config.endpoint)?)),
    }
}
