//! SOCKS5 authentication module
//!
//! Handles method negotiation and username/password authentication.
//!
//! The negotiation moves through `AwaitingHello -> MethodSelected`, then
//! either `AwaitingCredentials -> Authenticated | Rejected` or straight to
//! `Authenticated`; every `Rejected` edge is an `Err` from [`authenticate`].

mod password;

pub use password::{authenticate_password, CredentialVerifier, StaticCredentials, VerifyFn};

use crate::config::AuthConfig;
use crate::error::{Socks5Error, SocksdError};
use crate::socks::codec::{ClientHello, MethodSelection};
use crate::socks::types::AuthMethod;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

/// Server-side authentication policy: the required method and, for
/// username/password, the verifier that judges credentials.
#[derive(Clone)]
pub struct AuthPolicy {
    method: AuthMethod,
    verifier: Option<Arc<dyn CredentialVerifier>>,
}

impl AuthPolicy {
    /// Accept clients without authentication
    pub fn no_auth() -> Self {
        AuthPolicy {
            method: AuthMethod::None,
            verifier: None,
        }
    }

    /// Require username/password authentication checked by `verifier`
    pub fn password<V>(verifier: V) -> Self
    where
        V: CredentialVerifier + 'static,
    {
        AuthPolicy {
            method: AuthMethod::Password,
            verifier: Some(Arc::new(verifier)),
        }
    }

    /// Build the policy described by configuration
    pub fn from_config(config: &AuthConfig) -> Result<Self, SocksdError> {
        match config.method {
            AuthMethod::None => Ok(AuthPolicy::no_auth()),
            AuthMethod::Password => {
                let credentials = StaticCredentials::new(config.users.clone());
                if credentials.is_empty() {
                    return Err(SocksdError::Config(
                        "Password authentication requires at least one user".to_string(),
                    ));
                }
                debug!("Loaded {} user(s) for password authentication", credentials.len());
                Ok(AuthPolicy::password(credentials))
            }
        }
    }

    /// The method clients must offer
    pub fn method(&self) -> AuthMethod {
        self.method
    }
}

impl fmt::Debug for AuthPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthPolicy")
            .field("method", &self.method)
            .field("has_verifier", &self.verifier.is_some())
            .finish()
    }
}

/// Result of a successful negotiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    /// Method that was negotiated
    pub method: AuthMethod,
    /// Authenticated username, for username/password sessions
    pub username: Option<String>,
}

/// Perform method negotiation and, if required, authentication
///
/// 1. Read the client's hello (version checked first)
/// 2. Select the configured method if the client offered it, otherwise
///    answer `0xFF` and stop without reading anything else
/// 3. Run the username/password sub-negotiation when configured
///
/// Writes exactly one method selection and at most one password reply.
pub async fn authenticate<S>(
    stream: &mut S,
    policy: &AuthPolicy,
) -> Result<AuthOutcome, Socks5Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let hello = ClientHello::read_from(stream).await?;
    debug!("Client offered authentication methods: {:?}", hello.methods);

    let method = policy.method;
    if !hello.offers(method.to_byte()) {
        let _ = MethodSelection::not_acceptable().write_to(stream).await;
        return Err(Socks5Error::NoAcceptableMethod);
    }

    MethodSelection::new(method.to_byte())
        .write_to(stream)
        .await?;
    debug!("Selected authentication method: {}", method);

    let username = match (method, policy.verifier.as_deref()) {
        (AuthMethod::None, _) => None,
        (AuthMethod::Password, Some(verifier)) => {
            Some(authenticate_password(stream, verifier).await?)
        }
        // Unreachable through the public constructors
        (AuthMethod::Password, None) => {
            return Err(Socks5Error::AuthFailed(String::new()));
        }
    };

    Ok(AuthOutcome { method, username })
}
