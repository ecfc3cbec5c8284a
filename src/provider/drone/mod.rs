//! # Drone Provider
//!
//! REST client for the Drone CI secrets API.
//!
//! - Organization secrets live under `/api/secrets/{org}`
//! - Repository secrets live under `/api/repos/{owner}/{name}/secrets`
//!
//! Requests authenticate with `Authorization: Bearer <token>`. Any 3xx answer
//! is an error, redirects are never followed.

mod requests;
mod responses;

use super::common::{
    build_http_client, error_from_response, operation_span, EndpointConfig, OperationTracker,
};
use super::{ExistingSecrets, Platform, SecretStoreProvider};
use crate::error::SyncError;
use crate::reconciler::{Scope, SecretValue};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use requests::{OrgSecretRequest, RepoSecretRequest};
use reqwest::{redirect, Client, Method, RequestBuilder, Response, StatusCode};
use responses::{SecretResponse, UserResponse};
use tracing::{debug, Instrument};
use zeroize::Zeroizing;

const REDIRECT_ERROR: &str =
    "Attempting to redirect the requests. Did you configure the correct drone server address?";

/// Drone secrets API client
pub struct DroneClient {
    http_client: Client,
    base_url: String,
    token: Zeroizing<String>,
}

impl std::fmt::Debug for DroneClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DroneClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl DroneClient {
    /// Create a client for the configured Drone server
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MissingCredential`] if the server or token is empty.
    pub fn new(endpoint: &EndpointConfig) -> Result<Self, SyncError> {
        endpoint.require(Platform::Drone)?;

        let http_client =
            build_http_client(Platform::Drone, endpoint.skip_verify, redirect::Policy::none())?;

        debug!(server = endpoint.base_url(), "initialized drone client");

        Ok(Self {
            http_client,
            base_url: endpoint.base_url().to_string(),
            token: endpoint.token.clone(),
        })
    }

    fn secrets_path(scope: &Scope) -> String {
        match scope {
            Scope::Organization { name } => format!("/api/secrets/{name}"),
            Scope::Repository { owner, name } => format!("/api/repos/{owner}/{name}/secrets"),
        }
    }

    fn secret_path(scope: &Scope, secret: &str) -> String {
        format!("{}/{secret}", Self::secrets_path(scope))
    }

    /// Build HTTP request with authentication headers
    fn make_request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(self.token.as_str())
    }

    /// Send a request, refusing redirects
    async fn send(&self, request: RequestBuilder, action: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .with_context(|| format!("drone {action} request failed"))?;

        if response.status().is_redirection() {
            bail!(REDIRECT_ERROR);
        }

        Ok(response)
    }

    async fn ensure_success(response: Response, action: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_from_response(Platform::Drone, status, &body)
            .context(format!("drone {action} failed")))
    }

    async fn write_secret(
        &self,
        method: Method,
        scope: &Scope,
        name: &str,
        value: &SecretValue,
    ) -> Result<()> {
        let (path, action) = if method == Method::POST {
            (Self::secrets_path(scope), "POST")
        } else {
            (Self::secret_path(scope, name), "PATCH")
        };

        let request = self.make_request(method, &path);
        let request = match scope {
            Scope::Organization { name: namespace } => request.json(&OrgSecretRequest {
                namespace,
                name,
                data: value.expose(),
            }),
            Scope::Repository { .. } => request.json(&RepoSecretRequest {
                name,
                data: value.expose(),
            }),
        };

        let response = self.send(request, action).await?;
        Self::ensure_success(response, action).await?;
        Ok(())
    }
}

#[async_trait]
impl SecretStoreProvider for DroneClient {
    fn platform(&self) -> Platform {
        Platform::Drone
    }

    async fn current_user(&self) -> Result<String> {
        let span = operation_span!("drone.user.get", server = %self.base_url);
        let tracker = OperationTracker::new(span.clone());

        let result: Result<String> = async {
            let response = self
                .send(self.make_request(Method::GET, "/api/user"), "login")
                .await?;
            let user: UserResponse = Self::ensure_success(response, "login")
                .await?
                .json()
                .await
                .context("failed to parse drone user response")?;
            Ok(user.login)
        }
        .instrument(span)
        .await;

        tracker.finish(result)
    }

    async fn list_secrets(&self, scope: &Scope) -> Result<ExistingSecrets> {
        let span = operation_span!("drone.secret.list", scope = %scope);
        let tracker = OperationTracker::new(span.clone());

        let result: Result<ExistingSecrets> = async {
            let request = self.make_request(Method::GET, &Self::secrets_path(scope));
            let response = self.send(request, "list").await?;
            let secrets: Vec<SecretResponse> = Self::ensure_success(response, "list")
                .await?
                .json()
                .await
                .context("failed to parse drone secret list")?;

            Ok(secrets
                .into_iter()
                .map(|secret| (secret.name, secret.data.unwrap_or_default()))
                .collect())
        }
        .instrument(span)
        .await;

        tracker.finish(result)
    }

    async fn create_secret(&self, scope: &Scope, name: &str, value: &SecretValue) -> Result<()> {
        let span = operation_span!("drone.secret.create", scope = %scope, secret.name = name);
        let tracker = OperationTracker::new(span.clone());

        let result = self
            .write_secret(Method::POST, scope, name, value)
            .instrument(span)
            .await;

        tracker.finish(result)
    }

    async fn update_secret(&self, scope: &Scope, name: &str, value: &SecretValue) -> Result<()> {
        let span = operation_span!("drone.secret.update", scope = %scope, secret.name = name);
        let tracker = OperationTracker::new(span.clone());

        let result = self
            .write_secret(Method::PATCH, scope, name, value)
            .instrument(span)
            .await;

        tracker.finish(result)
    }

    async fn delete_secret(&self, scope: &Scope, name: &str) -> Result<()> {
        let span = operation_span!("drone.secret.delete", scope = %scope, secret.name = name);
        let tracker = OperationTracker::new(span.clone());

        let result: Result<()> = async {
            let request = self.make_request(Method::DELETE, &Self::secret_path(scope, name));
            let response = self.send(request, "DELETE").await?;
            if response.status() == StatusCode::NOT_FOUND {
                debug!(scope = %scope, key = name, "drone secret already absent");
                return Ok(());
            }
            Self::ensure_success(response, "DELETE").await?;
            Ok(())
        }
        .instrument(span)
        .await;

        tracker.finish(result)
    }
}
