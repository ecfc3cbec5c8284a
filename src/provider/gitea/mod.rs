//! # Gitea Provider
//!
//! REST client for Gitea Actions secrets.
//!
//! - Organization secrets: `/api/v1/orgs/{org}/actions/secrets`
//! - Repository secrets: `/api/v1/repos/{owner}/{repo}/actions/secrets`
//!
//! Gitea has a single `PUT` that creates or replaces a secret, so create and
//! update map to the same call. Secret names are validated locally and an
//! invalid name fails without a request.
//!
//! Gitea matches names case-insensitively and reports them upper-cased, so
//! listed names are lower-cased to line up with the desired keys.

mod requests;
mod responses;

use super::common::{
    build_http_client, error_from_response, operation_span, EndpointConfig, OperationTracker,
};
use super::{ExistingSecrets, Platform, SecretStoreProvider};
use crate::error::SyncError;
use crate::reconciler::{Scope, SecretValue};
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use requests::PutSecretRequest;
use reqwest::{redirect, Client, Method, RequestBuilder, Response, StatusCode};
use responses::{SecretResponse, UserResponse};
use tracing::{debug, Instrument};
use zeroize::Zeroizing;

/// Page size used when listing secrets
const PAGE_LIMIT: usize = 50;

/// Prefixes Gitea reserves for its own variables
const RESERVED_PREFIXES: [&str; 2] = ["GITEA_", "GITHUB_"];

/// Validate an actions secret name
///
/// Format: letters, digits and underscores, not starting with a digit, and
/// not using a reserved `GITEA_` or `GITHUB_` prefix.
pub fn validate_secret_name(name: &str) -> Result<()> {
    let name_regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
        .map_err(|e| anyhow::anyhow!("Failed to compile regex: {e}"))?;

    if !name_regex.is_match(name) {
        return Err(anyhow::anyhow!(
            "invalid gitea secret name '{name}': only letters, digits and underscores are allowed and it must not start with a digit"
        ));
    }

    let upper = name.to_uppercase();
    if let Some(prefix) = RESERVED_PREFIXES.iter().find(|p| upper.starts_with(*p)) {
        return Err(anyhow::anyhow!(
            "invalid gitea secret name '{name}': the {prefix} prefix is reserved"
        ));
    }

    Ok(())
}

/// Gitea Actions secrets client
pub struct GiteaClient {
    http_client: Client,
    base_url: String,
    token: Zeroizing<String>,
}

impl std::fmt::Debug for GiteaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GiteaClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GiteaClient {
    /// Create a client for the configured Gitea server
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MissingCredential`] if the server or token is empty.
    pub fn new(endpoint: &EndpointConfig) -> Result<Self, SyncError> {
        endpoint.require(Platform::Gitea)?;

        let http_client = build_http_client(
            Platform::Gitea,
            endpoint.skip_verify,
            redirect::Policy::default(),
        )?;

        debug!(server = endpoint.base_url(), "initialized gitea client");

        Ok(Self {
            http_client,
            base_url: endpoint.base_url().to_string(),
            token: endpoint.token.clone(),
        })
    }

    fn secrets_path(scope: &Scope) -> String {
        match scope {
            Scope::Organization { name } => format!("/api/v1/orgs/{name}/actions/secrets"),
            Scope::Repository { owner, name } => {
                format!("/api/v1/repos/{owner}/{name}/actions/secrets")
            }
        }
    }

    fn secret_path(scope: &Scope, secret: &str) -> String {
        format!("{}/{secret}", Self::secrets_path(scope))
    }

    /// Build HTTP request with authentication headers
    fn make_request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}{path}", self.base_url))
            .header(
                reqwest::header::AUTHORIZATION,
                format!("token {}", self.token.as_str()),
            )
    }

    async fn send(request: RequestBuilder, action: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .with_context(|| format!("gitea {action} request failed"))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_from_response(Platform::Gitea, status, &body)
            .context(format!("gitea {action} failed")))
    }

    async fn put_secret(&self, scope: &Scope, name: &str, value: &SecretValue) -> Result<()> {
        validate_secret_name(name)?;

        let request = self
            .make_request(Method::PUT, &Self::secret_path(scope, name))
            .json(&PutSecretRequest {
                data: value.expose(),
            });
        let response = Self::send(request, "PUT").await?;

        // 201 when the secret was created, 204 when it replaced an existing one
        debug!(scope = %scope, key = name, status = response.status().as_u16(), "gitea secret stored");
        Ok(())
    }
}

#[async_trait]
impl SecretStoreProvider for GiteaClient {
    fn platform(&self) -> Platform {
        Platform::Gitea
    }

    async fn current_user(&self) -> Result<String> {
        let span = operation_span!("gitea.user.get", server = %self.base_url);
        let tracker = OperationTracker::new(span.clone());

        let result: Result<String> = async {
            let response =
                Self::send(self.make_request(Method::GET, "/api/v1/user"), "login").await?;
            let user: UserResponse = response
                .json()
                .await
                .context("failed to parse gitea user response")?;
            Ok(user.login)
        }
        .instrument(span)
        .await;

        tracker.finish(result)
    }

    async fn list_secrets(&self, scope: &Scope) -> Result<ExistingSecrets> {
        let span = operation_span!("gitea.secret.list", scope = %scope);
        let tracker = OperationTracker::new(span.clone());

        let result: Result<ExistingSecrets> = async {
            let path = Self::secrets_path(scope);
            let mut existing = ExistingSecrets::new();
            let mut page = 1usize;

            loop {
                let request = self
                    .make_request(Method::GET, &path)
                    .query(&[("page", page), ("limit", PAGE_LIMIT)]);
                let secrets: Vec<SecretResponse> = Self::send(request, "list")
                    .await?
                    .json()
                    .await
                    .context("failed to parse gitea secret list")?;

                let count = secrets.len();
                let known = existing.len();
                existing.extend(
                    secrets
                        .into_iter()
                        .map(|secret| (secret.name.to_lowercase(), String::new())),
                );

                // A page with nothing new means the server ignores `page`
                if count < PAGE_LIMIT || existing.len() == known {
                    break;
                }
                page += 1;
            }

            Ok(existing)
        }
        .instrument(span)
        .await;

        tracker.finish(result)
    }

    async fn create_secret(&self, scope: &Scope, name: &str, value: &SecretValue) -> Result<()> {
        let span = operation_span!("gitea.secret.create", scope = %scope, secret.name = name);
        let tracker = OperationTracker::new(span.clone());

        let result = self.put_secret(scope, name, value).instrument(span).await;

        tracker.finish(result)
    }

    async fn update_secret(&self, scope: &Scope, name: &str, value: &SecretValue) -> Result<()> {
        let span = operation_span!("gitea.secret.update", scope = %scope, secret.name = name);
        let tracker = OperationTracker::new(span.clone());

        let result = self.put_secret(scope, name, value).instrument(span).await;

        tracker.finish(result)
    }

    async fn delete_secret(&self, scope: &Scope, name: &str) -> Result<()> {
        let span = operation_span!("gitea.secret.delete", scope = %scope, secret.name = name);
        let tracker = OperationTracker::new(span.clone());

        let result: Result<()> = async {
            validate_secret_name(name)?;

            let response = self
                .make_request(Method::DELETE, &Self::secret_path(scope, name))
                .send()
                .await
                .context("gitea DELETE request failed")?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                debug!(scope = %scope, key = name, "gitea secret already absent");
                return Ok(());
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(error_from_response(Platform::Gitea, status, &body)
                    .context("gitea DELETE failed"));
            }
            Ok(())
        }
        .instrument(span)
        .await;

        tracker.finish(result)
    }
}
