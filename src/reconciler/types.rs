//! # Types
//!
//! Core types for the reconciler.

use crate::error::SyncError;
use crate::provider::Platform;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Unit at which a platform stores secrets
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Organization { name: String },
    Repository { owner: String, name: String },
}

impl Scope {
    pub fn organization(name: impl Into<String>) -> Self {
        Scope::Organization { name: name.into() }
    }

    pub fn repository(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Scope::Repository {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse an `owner/name` entry from `repo_list`
    ///
    /// Returns `None` unless the entry splits into exactly two non-empty parts.
    #[must_use]
    pub fn parse_repository(entry: &str) -> Option<Self> {
        let mut parts = entry.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => {
                Some(Scope::repository(owner, name))
            }
            _ => None,
        }
    }

    /// `org` or `repo`, used in log messages
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Scope::Organization { .. } => "org",
            Scope::Repository { .. } => "repo",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Organization { name } => f.write_str(name),
            Scope::Repository { owner, name } => write!(f, "{owner}/{name}"),
        }
    }
}

/// Opaque secret value
///
/// The buffer is wiped on drop and never shows up in `Debug` output.
pub struct SecretValue(Zeroizing<String>);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Plaintext value, only to be used when serializing a request body
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl Clone for SecretValue {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl PartialEq for SecretValue {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for SecretValue {}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(***)")
    }
}

impl From<&str> for SecretValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SecretValue {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Secret name to value mapping every scope should end up with
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredSecrets(BTreeMap<String, SecretValue>);

impl DesiredSecrets {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SecretValue> {
        self.0.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SecretValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<K, V> FromIterator<(K, V)> for DesiredSecrets
where
    K: Into<String>,
    V: Into<SecretValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

/// How desired secrets are written into a scope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// List the scope, update names that exist and create the rest
    #[default]
    Upsert,
    /// Delete every desired name (missing is fine) and create it again, without listing
    Recreate,
    /// Create every desired name, without listing and without an update path
    CreateOnly,
}

impl SyncMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Upsert => "upsert",
            SyncMode::Recreate => "recreate",
            SyncMode::CreateOnly => "create_only",
        }
    }
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "upsert" => Ok(SyncMode::Upsert),
            "recreate" => Ok(SyncMode::Recreate),
            "create_only" | "create" => Ok(SyncMode::CreateOnly),
            _ => Err("expected one of: upsert, recreate, create_only".to_string()),
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a scope or secret failure ends the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// First failure aborts the run
    Strict,
    /// Failures are logged and recorded, the run continues with the next secret or scope
    Tolerant,
}

impl FailurePolicy {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::Strict => "strict",
            FailurePolicy::Tolerant => "tolerant",
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "strict" => Ok(FailurePolicy::Strict),
            "tolerant" => Ok(FailurePolicy::Tolerant),
            _ => Err("expected one of: strict, tolerant".to_string()),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reconciliation policy selected by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    pub mode: SyncMode,
    pub on_error: FailurePolicy,
}

impl SyncPolicy {
    /// Historical behavior of each platform: Drone aborted on the first
    /// failure, Gitea logged and moved on.
    #[must_use]
    pub fn for_platform(platform: Platform) -> Self {
        let on_error = match platform {
            Platform::Drone => FailurePolicy::Strict,
            Platform::Gitea => FailurePolicy::Tolerant,
        };
        Self {
            mode: SyncMode::Upsert,
            on_error,
        }
    }
}

/// Outcome of a reconciliation that was not aborted
#[derive(Debug, Default)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub recreated: usize,
    /// Scopes where every desired secret was attempted
    pub scopes_synced: usize,
    /// Scopes skipped because their secrets could not be listed
    pub scopes_skipped: usize,
    /// `repo_list` entries that were not `owner/name`
    pub repos_ignored: usize,
    /// Recoverable failures, in the order they happened
    pub errors: Vec<SyncError>,
}

impl SyncReport {
    /// Number of successful mutations
    #[must_use]
    pub fn applied(&self) -> usize {
        self.created + self.updated + self.recreated
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Scopes with at least one recorded error, sorted and without duplicates
    #[must_use]
    pub fn failed_scopes(&self) -> Vec<String> {
        let scopes: BTreeSet<String> = self
            .errors
            .iter()
            .filter_map(SyncError::scope)
            .map(ToString::to_string)
            .collect();
        scopes.into_iter().collect()
    }
}
