//! # Runtime
//!
//! One sync run: build the adapter, check the login, reconcile and log a
//! summary.

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::provider::{build_provider, SecretStoreProvider};
use crate::reconciler::{reconcile, SyncReport};
use tracing::{info, warn};

/// Run a sync against the platform selected in `config`
///
/// # Errors
///
/// Configuration and login errors, and any error the failure policy makes fatal.
pub async fn run(config: &SyncConfig) -> Result<SyncReport, SyncError> {
    let provider = build_provider(config)?;
    run_with_provider(provider.as_ref(), config).await
}

/// Run a sync through an already built adapter
///
/// # Errors
///
/// See [`run`].
pub async fn run_with_provider(
    provider: &dyn SecretStoreProvider,
    config: &SyncConfig,
) -> Result<SyncReport, SyncError> {
    let platform = provider.platform();

    let user = provider
        .current_user()
        .await
        .map_err(|cause| SyncError::Authentication { platform, cause })?;
    info!(platform = %platform, user = %user, "login user");

    info!(
        platform = %platform,
        orgs = config.organizations.len(),
        repos = config.repositories.len(),
        secrets = config.secrets.len(),
        mode = %config.policy.mode,
        on_error = %config.policy.on_error,
        "starting secret sync"
    );

    let report = reconcile(
        provider,
        &config.organizations,
        &config.repositories,
        &config.secrets,
        config.policy,
    )
    .await?;

    info!(
        created = report.created,
        updated = report.updated,
        recreated = report.recreated,
        scopes_synced = report.scopes_synced,
        scopes_skipped = report.scopes_skipped,
        repos_ignored = report.repos_ignored,
        errors = report.errors.len(),
        "secret sync finished"
    );
    if !report.is_clean() {
        warn!(
            errors = report.errors.len(),
            scopes = ?report.failed_scopes(),
            "some secrets could not be synced, see errors above"
        );
    }

    Ok(report)
}
