//! Response bodies returned by the Drone API.

use serde::Deserialize;

/// Entry of a secret listing
///
/// Drone never returns `data` for stored secrets; it is kept optional so a
/// server that does send it still parses.
#[derive(Debug, Deserialize)]
pub(crate) struct SecretResponse {
    pub name: String,
    #[serde(default)]
    pub data: Option<String>,
}

/// `GET /api/user`
#[derive(Debug, Deserialize)]
pub(crate) struct UserResponse {
    pub login: String,
}
