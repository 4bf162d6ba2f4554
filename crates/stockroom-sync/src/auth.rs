//! Credential exchange and the mid-session expiry policy.

use stockroom_api_models::TokenRequest;

use crate::api::InventoryApi;
use crate::cache::QueryCache;
use crate::error::SyncError;
use crate::session::SessionStore;

/// Message shown when the server rejects a username/password pair.
pub const INVALID_CREDENTIALS: &str = "invalid username or password";

/// Exchange credentials for a token and start the session.
///
/// # Errors
///
/// Returns [`SyncError::ValidationFailure`] when either field is blank,
/// [`SyncError::AuthFailure`] when the server rejects the credentials, and any
/// transport failure unchanged.
pub async fn authenticate(
    api: &dyn InventoryApi,
    session: &SessionStore,
    username: &str,
    password: &str,
) -> Result<(), SyncError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(SyncError::validation("username is required"));
    }
    if password.is_empty() {
        return Err(SyncError::validation("password is required"));
    }

    let request = TokenRequest {
        username: username.to_string(),
        password: password.to_string(),
    };
    let response = api.obtain_token(&request).await.map_err(|err| {
        tracing::warn!(error = %err, username, "login rejected");
        if err.is_unauthorized() {
            SyncError::auth(INVALID_CREDENTIALS)
        } else {
            err
        }
    })?;

    session.login(response.access);
    Ok(())
}

/// End the session when `error` says the token is no longer accepted.
///
/// Returns whether the session was ended.
pub fn expire_on_unauthorized(
    session: &SessionStore,
    cache: &QueryCache,
    error: &SyncError,
) -> bool {
    if !error.is_unauthorized() || !session.is_authenticated() {
        return false;
    }
    tracing::warn!(error = %error, "token rejected mid-session; logging out");
    session.logout();
    cache.clear();
    true
}
