//! Username/password authentication handler
//!
//! Implements RFC 1929 username/password authentication for SOCKS5. The
//! verdict comes from an injected [`CredentialVerifier`]; this module only
//! runs the exchange.

use crate::error::Socks5Error;
use crate::socks::codec::{PasswordReply, PasswordRequest};
use std::collections::HashMap;
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

/// Decides whether a username/password pair is accepted.
///
/// Called concurrently from every session task.
pub trait CredentialVerifier: Send + Sync {
    /// Return `true` to accept the credentials
    fn verify(&self, username: &str, password: &str) -> bool;
}

/// Fixed username -> password table, usually loaded from configuration
#[derive(Clone, Default)]
pub struct StaticCredentials {
    users: HashMap<String, String>,
}

impl StaticCredentials {
    /// Create a verifier from a username -> password map
    pub fn new(users: HashMap<String, String>) -> Self {
        StaticCredentials { users }
    }

    /// Number of known users
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether no users are configured
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut users: Vec<&String> = self.users.keys().collect();
        users.sort();
        f.debug_struct("StaticCredentials")
            .field("users", &users)
            .finish()
    }
}

impl CredentialVerifier for StaticCredentials {
    fn verify(&self, username: &str, password: &str) -> bool {
        self.users
            .get(username)
            .is_some_and(|expected| expected == password)
    }
}

/// Adapter turning a closure into a [`CredentialVerifier`]
pub struct VerifyFn<F>(pub F);

impl<F> CredentialVerifier for VerifyFn<F>
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn verify(&self, username: &str, password: &str) -> bool {
        (self.0)(username, password)
    }
}

/// Run the username/password sub-negotiation
///
/// Reads one [`PasswordRequest`], asks `verifier`, and writes exactly one
/// [`PasswordReply`] unless the stream ends mid-request.
///
/// # Returns
///
/// The authenticated username
pub async fn authenticate_password<S>(
    stream: &mut S,
    verifier: &dyn CredentialVerifier,
) -> Result<String, Socks5Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = match PasswordRequest::read_from(stream).await {
        Ok(request) => request,
        Err(e @ Socks5Error::UnsupportedAuthVersion(_)) => {
            let _ = PasswordReply::failure().write_to(stream).await;
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    if !verifier.verify(&request.username, &request.password) {
        let _ = PasswordReply::failure().write_to(stream).await;
        return Err(Socks5Error::AuthFailed(request.username));
    }

    PasswordReply::success().write_to(stream).await?;
    debug!("Authentication successful for user: {}", request.username);

    Ok(request.username)
}
