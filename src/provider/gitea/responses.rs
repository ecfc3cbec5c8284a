//! Response bodies returned by the Gitea API.

use serde::Deserialize;

/// Entry of an actions secret listing; values are never returned
#[derive(Debug, Deserialize)]
pub(crate) struct SecretResponse {
    pub name: String,
}

/// `GET /api/v1/user`
#[derive(Debug, Deserialize)]
pub(crate) struct UserResponse {
    pub login: String,
}
