//! # Constants
//!
//! Shared constants used throughout the sync tool.
//!
//! Configuration keys are listed in their lower-case form; the lookup in
//! [`crate::config`] upper-cases them and tries the `PLUGIN_` prefix first.

/// Prefix CI plugin runners put in front of every plugin setting
pub const PLUGIN_ENV_PREFIX: &str = "PLUGIN_";

/// Drone server address
pub const KEY_DRONE_SERVER: &str = "drone_server";
/// Drone personal token
pub const KEY_DRONE_TOKEN: &str = "drone_token";
/// Skip TLS verification for the Drone server
pub const KEY_DRONE_SKIP_VERIFY: &str = "drone_skip_verify";

/// Gitea server address
pub const KEY_GITEA_SERVER: &str = "gitea_server";
/// Gitea access token
pub const KEY_GITEA_TOKEN: &str = "gitea_token";
/// Skip TLS verification for the Gitea server
pub const KEY_GITEA_SKIP_VERIFY: &str = "gitea_skip_verify";

/// Sync into Gitea Actions instead of Drone
pub const KEY_SYNC_TO_GITEA: &str = "sync_to_gitea";

/// Comma-separated organization names
pub const KEY_ORG_LIST: &str = "org_list";
/// Comma-separated `owner/name` repositories
pub const KEY_REPO_LIST: &str = "repo_list";
/// Comma-separated environment keys whose values become secrets
pub const KEY_KEY_LIST: &str = "key_list";

/// Reconciliation mode (`upsert`, `recreate`, `create_only`)
pub const KEY_SYNC_MODE: &str = "sync_mode";
/// Failure policy (`strict`, `tolerant`)
pub const KEY_FAILURE_POLICY: &str = "failure_policy";

/// Global log level
pub const KEY_LOG_LEVEL: &str = "log_level";
/// Log format (`text`, `json`)
pub const KEY_LOG_FORMAT: &str = "log_format";

/// Default log level when neither `LOG_LEVEL` nor `RUST_LOG` is set
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default env file preloaded before configuration is resolved
pub const DEFAULT_ENV_FILE: &str = ".env";

/// TCP connect timeout for the Drone and Gitea HTTP clients (seconds)
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// User agent sent with every request
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
