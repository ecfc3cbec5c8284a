//! # Drone Secret Sync
//!
//! Syncs secrets into Drone CI or Gitea Actions organizations and repositories.
//!
//! ## Usage
//!
//! ```bash
//! # Drone
//! DRONE_SERVER=https://drone.example.com DRONE_TOKEN=... \
//! ORG_LIST=acme REPO_LIST=acme/api KEY_LIST=DB_PASS,API_KEY \
//! DB_PASS=... API_KEY=... drone-secret-sync
//!
//! # Gitea Actions, settings passed by a CI plugin runner
//! PLUGIN_SYNC_TO_GITEA=true PLUGIN_GITEA_SERVER=https://gitea.example.com ... drone-secret-sync
//!
//! # Load settings from a different env file
//! drone-secret-sync --env-file ci.env
//! ```

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use drone_secret_sync::config::{LogConfig, SyncConfig};
use drone_secret_sync::constants::DEFAULT_ENV_FILE;
use drone_secret_sync::observability::init_logging;
use drone_secret_sync::runtime;
use std::path::{Path, PathBuf};
use tokio::signal;
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "drone-secret-sync")]
#[command(
    about = "Sync secrets into Drone CI or Gitea Actions",
    disable_version_flag = true
)]
struct Cli {
    /// Env file loaded before configuration is read; a missing file is ignored
    #[arg(long = "env-file", value_name = "PATH", default_value = DEFAULT_ENV_FILE)]
    env_file: PathBuf,

    /// Print version information and exit
    #[arg(long)]
    version: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!(
            "Version: {} Commit: {}",
            env!("CARGO_PKG_VERSION"),
            env!("BUILD_GIT_HASH")
        );
        return Ok(());
    }

    // Env file first so LOG_LEVEL and LOG_FORMAT can come from it
    let env_file_loaded = load_env_file(&cli.env_file)?;

    init_logging(&LogConfig::from_env())?;
    if env_file_loaded {
        debug!(path = %cli.env_file.display(), "loaded env file");
    }

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        bail!("Failed to install rustls crypto provider");
    }

    info!(
        "Build info: version={}, datetime={}, git_hash={}",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    let config = SyncConfig::from_env().inspect_err(|e| {
        error!(error.kind = e.kind(), error = %e, "invalid configuration");
    })?;

    tokio::select! {
        result = runtime::run(&config) => match result {
            Ok(_) => Ok(()),
            Err(e) if e.is_configuration() => {
                error!(error.kind = e.kind(), error = %e, "invalid configuration");
                Err(e.into())
            }
            Err(e) => {
                error!(error.kind = e.kind(), error = %e, "secret sync failed");
                Err(e.into())
            }
        },
        received = shutdown_signal() => {
            error!(signal = received, "secret sync interrupted, remote state may be partially updated");
            Err(anyhow!("interrupted by {received}"))
        }
    }
}

/// Load `path` into the process environment without overriding set variables
///
/// Returns whether a file was found.
fn load_env_file(path: &Path) -> Result<bool> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to load env file {}", path.display())),
    }
}

/// Resolves with the name of the first termination signal received
async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}
