//! Drone Secret Sync Library
//!
//! Reconciles a desired set of secrets into the organization and repository
//! secret stores of Drone CI or Gitea Actions.
//!
//! Tests are included in the module files (e.g., `reconciler/mod.rs`); the
//! HTTP contracts of the adapters are covered by the Pact tests in `tests/`.

pub mod config;
pub mod constants;
pub mod error;
pub mod observability;
pub mod provider;
pub mod reconciler;
pub mod runtime;

pub use config::{LogConfig, SyncConfig};
pub use error::SyncError;
pub use provider::{Platform, SecretStoreProvider};
pub use reconciler::{reconcile, DesiredSecrets, Scope, SecretValue, SyncPolicy, SyncReport};
