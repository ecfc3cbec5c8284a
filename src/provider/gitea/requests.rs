//! Request bodies for the Gitea Actions secrets API.

use serde::Serialize;

/// Body of `PUT .../actions/secrets/{secretname}`
///
/// Carries the plaintext value and has no `Debug` impl.
#[derive(Serialize)]
pub(crate) struct PutSecretRequest<'a> {
    pub data: &'a str,
}
