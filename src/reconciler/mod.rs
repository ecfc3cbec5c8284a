//! # Reconciler
//!
//! Applies the desired secrets to every organization scope and then to every
//! repository scope, one remote call at a time.
//!
//! ## Modes
//!
//! - **Upsert**: list the scope once, update names that already exist and create the rest
//! - **Recreate**: delete each desired name (a missing secret is fine) and create it again
//! - **CreateOnly**: create each desired name with no existence check
//!
//! Secrets that are not part of the desired mapping are never touched.
//!
//! ## Failures
//!
//! Every failure is logged with its scope and key. With [`FailurePolicy::Strict`]
//! the first failure is returned and nothing else is attempted; with
//! [`FailurePolicy::Tolerant`] it is recorded in the [`SyncReport`] and the run
//! moves on to the next secret (or the next scope when listing failed).

mod types;

pub use types::{
    DesiredSecrets, FailurePolicy, Scope, SecretValue, SyncMode, SyncPolicy, SyncReport,
};

use crate::error::SyncError;
use crate::provider::SecretStoreProvider;
use tracing::{debug, error, info, warn};

/// Reconcile `desired` into every organization and repository scope
///
/// `repositories` entries must be `owner/name`; anything else is skipped
/// without a remote call.
///
/// # Errors
///
/// Returns the first scope or secret failure when `policy.on_error` is
/// [`FailurePolicy::Strict`]. Tolerant runs always return `Ok` and carry
/// their failures in [`SyncReport::errors`].
pub async fn reconcile(
    provider: &dyn SecretStoreProvider,
    organizations: &[String],
    repositories: &[String],
    desired: &DesiredSecrets,
    policy: SyncPolicy,
) -> Result<SyncReport, SyncError> {
    let mut report = SyncReport::default();

    if desired.is_empty() {
        warn!("no secrets resolved from key_list, nothing to sync");
        return Ok(report);
    }

    let mut scopes: Vec<Scope> = organizations
        .iter()
        .map(|org| Scope::organization(org.as_str()))
        .collect();

    for entry in repositories {
        match Scope::parse_repository(entry) {
            Some(scope) => scopes.push(scope),
            None => {
                info!(repo = %entry, "skip repository entry, expected owner/name");
                report.repos_ignored += 1;
            }
        }
    }

    for scope in &scopes {
        match policy.mode {
            SyncMode::Upsert => upsert_scope(provider, scope, desired, policy, &mut report).await?,
            SyncMode::Recreate => {
                recreate_scope(provider, scope, desired, policy, &mut report).await?;
            }
            SyncMode::CreateOnly => {
                create_scope(provider, scope, desired, policy, &mut report).await?;
            }
        }
    }

    Ok(report)
}

async fn upsert_scope(
    provider: &dyn SecretStoreProvider,
    scope: &Scope,
    desired: &DesiredSecrets,
    policy: SyncPolicy,
    report: &mut SyncReport,
) -> Result<(), SyncError> {
    let existing = match provider.list_secrets(scope).await {
        Ok(existing) => existing,
        Err(cause) => {
            let err = SyncError::ScopeFetchFailed {
                scope: scope.clone(),
                cause,
            };
            log_scope_skipped(scope, &err);
            handle_failure(policy, report, err)?;
            report.scopes_skipped += 1;
            return Ok(());
        }
    };

    debug!(scope = %scope, existing = existing.len(), "listed {} secrets", scope.kind());

    for (name, value) in desired.iter() {
        if existing.contains_key(name) {
            match provider.update_secret(scope, name, value).await {
                Ok(()) => {
                    report.updated += 1;
                    log_mutation(scope, name, "update");
                }
                Err(cause) => {
                    let err = SyncError::SecretUpdateFailed {
                        scope: scope.clone(),
                        name: name.to_string(),
                        cause,
                    };
                    log_failure(scope, name, &err);
                    handle_failure(policy, report, err)?;
                }
            }
        } else {
            create_one(provider, scope, name, value, policy, report).await?;
        }
    }

    report.scopes_synced += 1;
    Ok(())
}

async fn recreate_scope(
    provider: &dyn SecretStoreProvider,
    scope: &Scope,
    desired: &DesiredSecrets,
    policy: SyncPolicy,
    report: &mut SyncReport,
) -> Result<(), SyncError> {
    for (name, value) in desired.iter() {
        if let Err(cause) = provider.delete_secret(scope, name).await {
            let err = SyncError::SecretDeleteFailed {
                scope: scope.clone(),
                name: name.to_string(),
                cause,
            };
            log_failure(scope, name, &err);
            // Creating on top of a secret we could not remove would only fail again
            handle_failure(policy, report, err)?;
            continue;
        }
        log_mutation(scope, name, "delete");

        match provider.create_secret(scope, name, value).await {
            Ok(()) => {
                report.recreated += 1;
                log_mutation(scope, name, "create");
            }
            Err(cause) => {
                let err = SyncError::SecretCreateFailed {
                    scope: scope.clone(),
                    name: name.to_string(),
                    cause,
                };
                log_failure(scope, name, &err);
                handle_failure(policy, report, err)?;
            }
        }
    }

    report.scopes_synced += 1;
    Ok(())
}

async fn create_scope(
    provider: &dyn SecretStoreProvider,
    scope: &Scope,
    desired: &DesiredSecrets,
    policy: SyncPolicy,
    report: &mut SyncReport,
) -> Result<(), SyncError> {
    for (name, value) in desired.iter() {
        create_one(provider, scope, name, value, policy, report).await?;
    }

    report.scopes_synced += 1;
    Ok(())
}

async fn create_one(
    provider: &dyn SecretStoreProvider,
    scope: &Scope,
    name: &str,
    value: &SecretValue,
    policy: SyncPolicy,
    report: &mut SyncReport,
) -> Result<(), SyncError> {
    match provider.create_secret(scope, name, value).await {
        Ok(()) => {
            report.created += 1;
            log_mutation(scope, name, "create");
            Ok(())
        }
        Err(cause) => {
            let err = SyncError::SecretCreateFailed {
                scope: scope.clone(),
                name: name.to_string(),
                cause,
            };
            log_failure(scope, name, &err);
            handle_failure(policy, report, err)
        }
    }
}

/// Strict runs stop here, tolerant runs keep the error for the report
fn handle_failure(
    policy: SyncPolicy,
    report: &mut SyncReport,
    err: SyncError,
) -> Result<(), SyncError> {
    match policy.on_error {
        FailurePolicy::Strict => Err(err),
        FailurePolicy::Tolerant => {
            report.errors.push(err);
            Ok(())
        }
    }
}

fn log_mutation(scope: &Scope, key: &str, action: &str) {
    match scope {
        Scope::Organization { name } => info!(org = %name, key, "{action} org secret"),
        Scope::Repository { .. } => info!(repo = %scope, key, "{action} repo secret"),
    }
}

fn log_failure(scope: &Scope, key: &str, err: &SyncError) {
    match scope {
        Scope::Organization { name } => error!(
            org = %name,
            key,
            error.kind = err.kind(),
            error = %err,
            "failed to sync org secret"
        ),
        Scope::Repository { .. } => error!(
            repo = %scope,
            key,
            error.kind = err.kind(),
            error = %err,
            "failed to sync repo secret"
        ),
    }
}

fn log_scope_skipped(scope: &Scope, err: &SyncError) {
    match scope {
        Scope::Organization { name } => {
            warn!(org = %name, error = %err, "skip org, unable to list secrets");
        }
        Scope::Repository { .. } => {
            warn!(repo = %scope, error = %err, "skip repo, unable to list secrets");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ExistingSecrets, Platform};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::collections::{BTreeMap, HashMap, HashSet};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        List(Scope),
        Create(Scope, String),
        Update(Scope, String),
        Delete(Scope, String),
    }

    /// In-memory secret store that records every call
    #[derive(Default)]
    struct FakeStore {
        secrets: Mutex<HashMap<Scope, BTreeMap<String, String>>>,
        calls: Mutex<Vec<Call>>,
        fail_list: HashSet<Scope>,
        fail_mutation: HashSet<(Scope, String)>,
    }

    impl FakeStore {
        fn with_secret(self, scope: &Scope, name: &str, value: &str) -> Self {
            self.secrets
                .lock()
                .unwrap()
                .entry(scope.clone())
                .or_default()
                .insert(name.to_string(), value.to_string());
            self
        }

        fn failing_list(mut self, scope: &Scope) -> Self {
            self.fail_list.insert(scope.clone());
            self
        }

        fn failing_mutation(mut self, scope: &Scope, name: &str) -> Self {
            self.fail_mutation.insert((scope.clone(), name.to_string()));
            self
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn state(&self, scope: &Scope) -> BTreeMap<String, String> {
            self.secrets
                .lock()
                .unwrap()
                .get(scope)
                .cloned()
                .unwrap_or_default()
        }

        fn check_mutation(&self, scope: &Scope, name: &str) -> Result<()> {
            if self.fail_mutation.contains(&(scope.clone(), name.to_string())) {
                return Err(anyhow!("HTTP 500 (status: 500 Internal Server Error)"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SecretStoreProvider for FakeStore {
        fn platform(&self) -> Platform {
            Platform::Drone
        }

        async fn current_user(&self) -> Result<String> {
            Ok("octocat".to_string())
        }

        async fn list_secrets(&self, scope: &Scope) -> Result<ExistingSecrets> {
            self.calls.lock().unwrap().push(Call::List(scope.clone()));
            if self.fail_list.contains(scope) {
                return Err(anyhow!("HTTP 401 (status: 401 Unauthorized)"));
            }
            Ok(self.state(scope).into_iter().collect())
        }

        async fn create_secret(&self, scope: &Scope, name: &str, value: &SecretValue) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Create(scope.clone(), name.to_string()));
            self.check_mutation(scope, name)?;
            let mut secrets = self.secrets.lock().unwrap();
            let entries = secrets.entry(scope.clone()).or_default();
            if entries.contains_key(name) {
                return Err(anyhow!("HTTP 409 (status: 409 Conflict)"));
            }
            entries.insert(name.to_string(), value.expose().to_string());
            Ok(())
        }

        async fn update_secret(&self, scope: &Scope, name: &str, value: &SecretValue) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Update(scope.clone(), name.to_string()));
            self.check_mutation(scope, name)?;
            self.secrets
                .lock()
                .unwrap()
                .entry(scope.clone())
                .or_default()
                .insert(name.to_string(), value.expose().to_string());
            Ok(())
        }

        async fn delete_secret(&self, scope: &Scope, name: &str) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Delete(scope.clone(), name.to_string()));
            self.check_mutation(scope, name)?;
            if let Some(entries) = self.secrets.lock().unwrap().get_mut(scope) {
                entries.remove(name);
            }
            Ok(())
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    fn policy(mode: SyncMode, on_error: FailurePolicy) -> SyncPolicy {
        SyncPolicy { mode, on_error }
    }

    fn acme() -> Scope {
        Scope::organization("acme")
    }

    #[tokio::test]
    async fn test_upsert_updates_existing_and_creates_missing() {
        let store = FakeStore::default().with_secret(&acme(), "db_pass", "old");
        let desired: DesiredSecrets = [("db_pass", "new"), ("api_key", "k")].into_iter().collect();

        let report = reconcile(
            &store,
            &strings(&["acme"]),
            &[],
            &desired,
            policy(SyncMode::Upsert, FailurePolicy::Strict),
        )
        .await
        .unwrap();

        assert_eq!(
            store.calls(),
            vec![
                Call::List(acme()),
                Call::Create(acme(), "api_key".to_string()),
                Call::Update(acme(), "db_pass".to_string()),
            ]
        );
        assert_eq!(report.created, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.applied(), 2);
        assert_eq!(report.scopes_synced, 1);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_upsert_converges_and_leaves_unmentioned_secrets() {
        let repo = Scope::repository("acme", "api");
        let store = FakeStore::default()
            .with_secret(&repo, "db_pass", "old")
            .with_secret(&repo, "unmanaged", "keep-me");
        let desired: DesiredSecrets = [("db_pass", "new"), ("api_key", "k")].into_iter().collect();

        reconcile(
            &store,
            &[],
            &strings(&["acme/api"]),
            &desired,
            policy(SyncMode::Upsert, FailurePolicy::Tolerant),
        )
        .await
        .unwrap();

        let state = store.state(&repo);
        assert_eq!(state.get("db_pass").map(String::as_str), Some("new"));
        assert_eq!(state.get("api_key").map(String::as_str), Some("k"));
        assert_eq!(state.get("unmanaged").map(String::as_str), Some("keep-me"));
        assert!(!store
            .calls()
            .iter()
            .any(|call| matches!(call, Call::Delete(..))));
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = FakeStore::default().with_secret(&acme(), "other", "x");
        let desired: DesiredSecrets = [("db_pass", "new"), ("api_key", "k")].into_iter().collect();
        let orgs = strings(&["acme"]);
        let sync_policy = policy(SyncMode::Upsert, FailurePolicy::Strict);

        reconcile(&store, &orgs, &[], &desired, sync_policy).await.unwrap();
        let after_first = store.state(&acme());

        let second = reconcile(&store, &orgs, &[], &desired, sync_policy)
            .await
            .unwrap();

        assert_eq!(store.state(&acme()), after_first);
        // Second pass finds everything and only updates
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 2);
    }

    #[tokio::test]
    async fn test_malformed_repository_entries_make_no_calls() {
        let store = FakeStore::default();
        let desired: DesiredSecrets = [("api_key", "k")].into_iter().collect();

        let report = reconcile(
            &store,
            &[],
            &strings(&["badformat", "a/b/c", "/repo", "ownerA/repoB"]),
            &desired,
            policy(SyncMode::Upsert, FailurePolicy::Strict),
        )
        .await
        .unwrap();

        let repo = Scope::repository("ownerA", "repoB");
        assert_eq!(
            store.calls(),
            vec![
                Call::List(repo.clone()),
                Call::Create(repo, "api_key".to_string()),
            ]
        );
        assert_eq!(report.repos_ignored, 3);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_strict_list_failure_aborts_run() {
        let beta = Scope::organization("beta");
        let store = FakeStore::default().failing_list(&acme());
        let desired: DesiredSecrets = [("api_key", "k")].into_iter().collect();

        let err = reconcile(
            &store,
            &strings(&["acme", "beta"]),
            &strings(&["beta/web"]),
            &desired,
            policy(SyncMode::Upsert, FailurePolicy::Strict),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SyncError::ScopeFetchFailed { ref scope, .. } if *scope == acme()));
        assert_eq!(store.calls(), vec![Call::List(acme())]);
        assert!(store.state(&beta).is_empty());
    }

    #[tokio::test]
    async fn test_tolerant_list_failure_skips_scope_only() {
        let beta = Scope::organization("beta");
        let store = FakeStore::default().failing_list(&acme());
        let desired: DesiredSecrets = [("api_key", "k")].into_iter().collect();

        let report = reconcile(
            &store,
            &strings(&["acme", "beta"]),
            &[],
            &desired,
            policy(SyncMode::Upsert, FailurePolicy::Tolerant),
        )
        .await
        .unwrap();

        assert_eq!(report.scopes_skipped, 1);
        assert_eq!(report.scopes_synced, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind(), "scope_fetch_failed");
        assert_eq!(report.errors[0].scope(), Some(&acme()));
        assert_eq!(store.state(&beta).get("api_key").map(String::as_str), Some("k"));
    }

    #[tokio::test]
    async fn test_skipped_scopes_match_recorded_list_failures() {
        let repo = Scope::repository("acme", "api");
        let store = FakeStore::default().failing_list(&acme()).failing_list(&repo);
        let desired: DesiredSecrets = [("api_key", "k")].into_iter().collect();

        let report = reconcile(
            &store,
            &strings(&["acme", "beta"]),
            &strings(&["acme/api"]),
            &desired,
            policy(SyncMode::Upsert, FailurePolicy::Tolerant),
        )
        .await
        .unwrap();

        assert_eq!(report.scopes_skipped, 2);
        assert_eq!(report.scopes_synced, 1);
        assert_eq!(
            report
                .errors
                .iter()
                .filter(|err| err.kind() == "scope_fetch_failed")
                .count(),
            report.scopes_skipped
        );
        assert_eq!(report.failed_scopes(), vec!["acme", "acme/api"]);
    }

    #[tokio::test]
    async fn test_tolerant_mutation_failure_continues_with_next_secret() {
        let store = FakeStore::default()
            .with_secret(&acme(), "db_pass", "old")
            .failing_mutation(&acme(), "db_pass");
        let desired: DesiredSecrets = [("db_pass", "new"), ("token", "t")].into_iter().collect();

        let report = reconcile(
            &store,
            &strings(&["acme"]),
            &[],
            &desired,
            policy(SyncMode::Upsert, FailurePolicy::Tolerant),
        )
        .await
        .unwrap();

        assert_eq!(report.created, 1);
        assert_eq!(report.updated, 0);
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(
            &report.errors[0],
            SyncError::SecretUpdateFailed { name, .. } if name == "db_pass"
        ));
        assert_eq!(store.state(&acme()).get("db_pass").map(String::as_str), Some("old"));
        assert_eq!(store.state(&acme()).get("token").map(String::as_str), Some("t"));
    }

    #[tokio::test]
    async fn test_strict_mutation_failure_aborts_run() {
        let store = FakeStore::default().failing_mutation(&acme(), "api_key");
        let desired: DesiredSecrets = [("api_key", "k"), ("token", "t")].into_iter().collect();

        let err = reconcile(
            &store,
            &strings(&["acme", "beta"]),
            &[],
            &desired,
            policy(SyncMode::Upsert, FailurePolicy::Strict),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SyncError::SecretCreateFailed { ref name, .. } if name == "api_key"));
        assert_eq!(
            store.calls(),
            vec![Call::List(acme()), Call::Create(acme(), "api_key".to_string())]
        );
    }

    #[tokio::test]
    async fn test_recreate_deletes_then_creates_without_listing() {
        let store = FakeStore::default()
            .with_secret(&acme(), "db_pass", "old")
            .with_secret(&acme(), "unmanaged", "keep-me");
        let desired: DesiredSecrets = [("db_pass", "new"), ("api_key", "k")].into_iter().collect();

        let report = reconcile(
            &store,
            &strings(&["acme"]),
            &[],
            &desired,
            policy(SyncMode::Recreate, FailurePolicy::Strict),
        )
        .await
        .unwrap();

        assert_eq!(
            store.calls(),
            vec![
                Call::Delete(acme(), "api_key".to_string()),
                Call::Create(acme(), "api_key".to_string()),
                Call::Delete(acme(), "db_pass".to_string()),
                Call::Create(acme(), "db_pass".to_string()),
            ]
        );
        assert_eq!(report.recreated, 2);
        let state = store.state(&acme());
        assert_eq!(state.get("db_pass").map(String::as_str), Some("new"));
        assert_eq!(state.get("unmanaged").map(String::as_str), Some("keep-me"));
    }

    #[tokio::test]
    async fn test_recreate_skips_create_when_delete_fails() {
        let store = FakeStore::default().failing_mutation(&acme(), "db_pass");
        let desired: DesiredSecrets = [("db_pass", "new"), ("token", "t")].into_iter().collect();

        let report = reconcile(
            &store,
            &strings(&["acme"]),
            &[],
            &desired,
            policy(SyncMode::Recreate, FailurePolicy::Tolerant),
        )
        .await
        .unwrap();

        assert!(!store
            .calls()
            .contains(&Call::Create(acme(), "db_pass".to_string())));
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind(), "secret_delete_failed");
        assert_eq!(report.recreated, 1);
    }

    #[tokio::test]
    async fn test_create_only_never_lists_or_updates() {
        let repo = Scope::repository("acme", "api");
        let store = FakeStore::default();
        let desired: DesiredSecrets = [("api_key", "k")].into_iter().collect();

        let report = reconcile(
            &store,
            &strings(&["acme"]),
            &strings(&["acme/api"]),
            &desired,
            policy(SyncMode::CreateOnly, FailurePolicy::Strict),
        )
        .await
        .unwrap();

        assert_eq!(
            store.calls(),
            vec![
                Call::Create(acme(), "api_key".to_string()),
                Call::Create(repo, "api_key".to_string()),
            ]
        );
        assert_eq!(report.created, 2);
        assert_eq!(report.scopes_synced, 2);
    }

    #[tokio::test]
    async fn test_empty_desired_secrets_makes_no_calls() {
        let store = FakeStore::default();

        let report = reconcile(
            &store,
            &strings(&["acme"]),
            &strings(&["acme/api"]),
            &DesiredSecrets::new(),
            policy(SyncMode::Upsert, FailurePolicy::Strict),
        )
        .await
        .unwrap();

        assert!(store.calls().is_empty());
        assert_eq!(report.applied(), 0);
    }
}
