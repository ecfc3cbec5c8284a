//! Request bodies for the Drone secrets API.
//!
//! Bodies carry plaintext values and have no `Debug` impl.

use serde::Serialize;

/// Body of `POST` and `PATCH` on `/api/secrets/{namespace}`
#[derive(Serialize)]
pub(crate) struct OrgSecretRequest<'a> {
    pub namespace: &'a str,
    pub name: &'a str,
    pub data: &'a str,
}

/// Body of `POST` and `PATCH` on `/api/repos/{owner}/{name}/secrets`
#[derive(Serialize)]
pub(crate) struct RepoSecretRequest<'a> {
    pub name: &'a str,
    pub data: &'a str,
}
