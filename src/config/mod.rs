//! # Configuration
//!
//! Settings are read from environment variables. Every key can be given as
//! `PLUGIN_<KEY>` (how CI plugin runners pass settings) or as bare `<KEY>`;
//! the prefixed form wins and an empty value counts as unset.
//!
//! [`SyncConfig::from_lookup`] takes the lookup as a closure so tests can run
//! without touching the process environment.

use crate::constants::*;
use crate::error::SyncError;
use crate::provider::common::EndpointConfig;
use crate::provider::Platform;
use crate::reconciler::{DesiredSecrets, FailurePolicy, SyncMode, SyncPolicy};

/// Resolve `key` as `PLUGIN_<KEY>`, falling back to `<KEY>`
pub fn lookup_value<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let key = key.to_uppercase();
    lookup(&format!("{PLUGIN_ENV_PREFIX}{key}"))
        .filter(|v| !v.is_empty())
        .or_else(|| lookup(&key).filter(|v| !v.is_empty()))
}

/// `"true"` in any case is true, everything else is false
#[must_use]
pub fn to_bool(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// Split a comma-separated list, trimming items and dropping empty ones
#[must_use]
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Build the desired secrets from the keys named in `key_list`
///
/// Each key is resolved like any other setting and stored under its
/// lower-cased name. Keys without a value are skipped.
pub fn resolve_secrets<F>(keys: &[String], lookup: &F) -> DesiredSecrets
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .filter_map(|key| lookup_value(lookup, key).map(|value| (key.to_lowercase(), value)))
        .collect()
}

fn lookup_bool<F>(lookup: &F, key: &str) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup_value(lookup, key).is_some_and(|v| to_bool(&v))
}

fn lookup_list<F>(lookup: &F, key: &str) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup_value(lookup, key)
        .map(|v| split_list(&v))
        .unwrap_or_default()
}

/// Read the process environment
fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Immutable configuration of a sync run
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Platform selected by `sync_to_gitea`
    pub platform: Platform,
    /// Server and token of the selected platform
    pub endpoint: EndpointConfig,
    /// Organizations from `org_list`
    pub organizations: Vec<String>,
    /// `owner/name` entries from `repo_list`, unvalidated
    pub repositories: Vec<String>,
    /// Secrets resolved from `key_list`
    pub secrets: DesiredSecrets,
    pub policy: SyncPolicy,
}

impl SyncConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// See [`SyncConfig::from_lookup`].
    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_lookup(env_lookup)
    }

    /// Load configuration through `lookup`
    ///
    /// Only the credentials of the selected platform are read.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MissingCredential`] if the selected platform has no
    /// server or token, and [`SyncError::InvalidConfig`] for an unknown
    /// `sync_mode` or `failure_policy`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SyncError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let platform = if lookup_bool(&lookup, KEY_SYNC_TO_GITEA) {
            Platform::Gitea
        } else {
            Platform::Drone
        };

        let (server_key, token_key, skip_verify_key) = match platform {
            Platform::Drone => (KEY_DRONE_SERVER, KEY_DRONE_TOKEN, KEY_DRONE_SKIP_VERIFY),
            Platform::Gitea => (KEY_GITEA_SERVER, KEY_GITEA_TOKEN, KEY_GITEA_SKIP_VERIFY),
        };
        let endpoint = EndpointConfig::new(
            lookup_value(&lookup, server_key).unwrap_or_default(),
            lookup_value(&lookup, token_key).unwrap_or_default(),
            lookup_bool(&lookup, skip_verify_key),
        );
        endpoint.require(platform)?;

        let mut policy = SyncPolicy::for_platform(platform);
        if let Some(value) = lookup_value(&lookup, KEY_SYNC_MODE) {
            policy.mode = value
                .parse::<SyncMode>()
                .map_err(|reason| SyncError::InvalidConfig {
                    key: KEY_SYNC_MODE,
                    value,
                    reason,
                })?;
        }
        if let Some(value) = lookup_value(&lookup, KEY_FAILURE_POLICY) {
            policy.on_error =
                value
                    .parse::<FailurePolicy>()
                    .map_err(|reason| SyncError::InvalidConfig {
                        key: KEY_FAILURE_POLICY,
                        value,
                        reason,
                    })?;
        }

        let keys = lookup_list(&lookup, KEY_KEY_LIST);

        Ok(Self {
            platform,
            endpoint,
            organizations: lookup_list(&lookup, KEY_ORG_LIST),
            repositories: lookup_list(&lookup, KEY_REPO_LIST),
            secrets: resolve_secrets(&keys, &lookup),
            policy,
        })
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging settings, read before anything else so configuration errors get logged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Global log level (error, warn, info, debug, trace)
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: LogFormat::Text,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let format = match lookup_value(&lookup, KEY_LOG_FORMAT) {
            Some(v) if v.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Self {
            level: lookup_value(&lookup, KEY_LOG_LEVEL)
                .map(|v| v.trim().to_lowercase())
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            format,
        }
    }
}
