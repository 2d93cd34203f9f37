//! Access token renewal from a session token.
//!
//! Every call re-verifies the session, decrypts the refresh credential and
//! asks the provider for a fresh access token. Nothing is cached and nothing
//! is retried: a failure is reported to the caller, who decides whether to
//! restart the authorization flow.

use super::provider::{IdentityProvider, ProviderError};
use crate::config::{AppConfig, ConfigError, Secrets};
use crate::credentials::CredentialCipher;
use crate::session::{SessionClaims, SessionCodec, SessionError};
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Lifetime reported when the provider gives no expiry
pub const DEFAULT_EXPIRES_IN_SECONDS: i64 = 3600;

/// Renewal failures.
#[derive(Debug, Error)]
pub enum RenewError {
    /// No session token was presented
    #[error("no session found")]
    Unauthenticated,
    /// The session token failed verification
    #[error("invalid session: {0}")]
    InvalidSession(#[from] SessionError),
    /// The embedded credential failed authentication; not retryable
    #[error("session credential is corrupt or tampered")]
    CorruptOrTamperedCredential,
    /// The provider rejected the refresh credential; re-authorization required
    #[error("provider rejected the refresh token")]
    UpstreamRefreshFailed,
    #[error("server misconfigured: {0}")]
    Misconfigured(#[from] ConfigError),
    /// Network or provider-side failure
    #[error("provider call failed: {0}")]
    Upstream(ProviderError),
}

/// A freshly minted access token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccessGrant {
    pub access_token: String,
    pub expires_in: i64,
}

/// Turns a session token into a provider access token.
pub struct AccessTokenRenewer<'a> {
    config: &'a AppConfig,
    secrets: &'a Secrets,
    provider: &'a dyn IdentityProvider,
}

impl<'a> AccessTokenRenewer<'a> {
    pub fn new(config: &'a AppConfig, secrets: &'a Secrets, provider: &'a dyn IdentityProvider) -> Self {
        Self {
            config,
            secrets,
            provider,
        }
    }

    /// Verifies a session token without contacting the provider.
    pub fn verify(&self, session_token: Option<&str>) -> Result<SessionClaims, RenewError> {
        let token = session_token
            .filter(|t| !t.is_empty())
            .ok_or(RenewError::Unauthenticated)?;

        let codec = SessionCodec::new(self.secrets.jwt_secret()?, self.config.session.ttl_seconds);
        codec.verify(token).map_err(|e| {
            debug!(error = %e, "Session verification failed");
            RenewError::InvalidSession(e)
        })
    }

    /// Exchanges the session's refresh credential for a new access token.
    pub async fn renew(&self, session_token: Option<&str>) -> Result<AccessGrant, RenewError> {
        let claims = self.verify(session_token)?;

        let cipher = CredentialCipher::from_hex(self.secrets.encryption_key()?)
            .map_err(|_| ConfigError::Invalid("ENCRYPTION_KEY"))?;
        let refresh_token = cipher.decrypt(&claims.record.refresh_token).map_err(|_| {
            warn!(email = %claims.record.email, "Session credential failed authentication");
            RenewError::CorruptOrTamperedCredential
        })?;

        let client = self.secrets.client_credentials()?;
        let tokens = self
            .provider
            .refresh_access_token(&client, &refresh_token)
            .await
            .map_err(|e| match e {
                ProviderError::Rejected { status, .. } => {
                    warn!(email = %claims.record.email, status, "Provider rejected refresh token");
                    RenewError::UpstreamRefreshFailed
                }
                other => {
                    error!(error = %other, "Token refresh request failed");
                    RenewError::Upstream(other)
                }
            })?;

        let access_token = tokens.access_token.ok_or_else(|| {
            warn!(email = %claims.record.email, "Provider returned no access token");
            RenewError::UpstreamRefreshFailed
        })?;

        let expires_in = tokens
            .expires_at
            .map(|at| (at - Utc::now()).num_seconds().max(0))
            .unwrap_or(DEFAULT_EXPIRES_IN_SECONDS);

        debug!(email = %claims.record.email, expires_in, "Access token renewed");

        Ok(AccessGrant {
            access_token,
            expires_in,
        })
    }
}
