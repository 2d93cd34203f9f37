//! OAuth 2.0 authorization-code flow.
//!
//! ```text
//! AwaitingRedirect ──begin──▶ AwaitingCallback ──complete──▶ Authenticated
//!        │                           │
//!        └──────────────┬────────────┘
//!                       ▼
//!               Failed(AuthFailure)
//! ```
//!
//! Both terminal states are reached through [`AuthorizationFlow::complete`];
//! nothing is persisted server-side in between; the CSRF state rides in a
//! cookie.

use super::csrf::{self, CsrfState};
use super::provider::{build_auth_url, IdentityProvider};
use crate::config::{AppConfig, ConfigError, Secrets};
use crate::credentials::CredentialCipher;
use crate::session::{SessionCodec, SessionRecord};
use serde::Deserialize;
use std::borrow::Cow;
use tracing::{debug, error, info, warn};

/// Why an authorization attempt failed.
///
/// Each reason renders to a coarse code for the `/?error=` redirect;
/// internal detail is logged, never sent to the browser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthFailure {
    /// The provider reported an error (e.g. the user denied consent)
    ProviderError(String),
    /// Missing authorization code or state
    InvalidRequest,
    /// CSRF state mismatch
    InvalidState,
    /// Required secrets are missing or invalid
    ServerMisconfigured,
    /// The provider did not return both an access and a refresh token
    TokenExchangeFailed,
    /// Any other fault during the flow
    AuthenticationFailed,
}

impl AuthFailure {
    /// Error code placed in the redirect's query string.
    pub fn code(&self) -> Cow<'static, str> {
        match self {
            AuthFailure::ProviderError(code) => Cow::Owned(sanitize_provider_code(code)),
            AuthFailure::InvalidRequest => Cow::Borrowed("invalid_request"),
            AuthFailure::InvalidState => Cow::Borrowed("invalid_state"),
            AuthFailure::ServerMisconfigured => Cow::Borrowed("server_config_error"),
            AuthFailure::TokenExchangeFailed => Cow::Borrowed("token_exchange_failed"),
            AuthFailure::AuthenticationFailed => Cow::Borrowed("authentication_failed"),
        }
    }

    /// Where the browser is sent after this failure.
    pub fn redirect_target(&self) -> String {
        format!("/?error={}", urlencoding::encode(&self.code()))
    }
}

/// Provider error codes are passed through only when they look like an
/// OAuth error code (`access_denied`, `invalid_scope`, ...).
fn sanitize_provider_code(code: &str) -> String {
    let well_formed = !code.is_empty()
        && code.len() <= 64
        && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if well_formed {
        code.to_string()
    } else {
        "provider_error".to_string()
    }
}

/// A signed session ready to be set as the `session` cookie.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionIssued {
    pub token: String,
    pub email: String,
}

/// Where the flow stands after a step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FlowState {
    /// Nothing has happened yet
    #[default]
    AwaitingRedirect,
    /// The browser must be sent to `auth_url` with `state` set as a cookie
    AwaitingCallback { auth_url: String, state: CsrfState },
    Authenticated(SessionIssued),
    Failed(AuthFailure),
}

impl FlowState {
    /// `Authenticated` and `Failed` end the flow.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Authenticated(_) | FlowState::Failed(_))
    }
}

/// OAuth callback query parameters
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Drives one authorization attempt. Borrowed per request; holds no state of
/// its own.
pub struct AuthorizationFlow<'a> {
    config: &'a AppConfig,
    secrets: &'a Secrets,
    provider: &'a dyn IdentityProvider,
}

impl<'a> AuthorizationFlow<'a> {
    pub fn new(config: &'a AppConfig, secrets: &'a Secrets, provider: &'a dyn IdentityProvider) -> Self {
        Self {
            config,
            secrets,
            provider,
        }
    }

    /// Entry step: checks configuration, issues a CSRF state and builds the
    /// provider authorization URL.
    pub fn begin(&self) -> FlowState {
        let (client_id, redirect_uri) = match (self.secrets.client_id(), self.secrets.redirect_uri()) {
            (Ok(client_id), Ok(redirect_uri)) => (client_id, redirect_uri),
            (Err(e), _) | (_, Err(e)) => {
                error!(error = %e, "OAuth login not configured");
                return FlowState::Failed(AuthFailure::ServerMisconfigured);
            }
        };

        let state = csrf::issue();
        let auth_url = build_auth_url(&self.config.google, client_id, redirect_uri, state.as_str());

        info!("Redirecting to OAuth provider");
        FlowState::AwaitingCallback { auth_url, state }
    }

    /// Callback step. Always ends in a terminal state.
    pub async fn complete(&self, params: CallbackParams, state_cookie: Option<&str>) -> FlowState {
        match self.try_complete(params, state_cookie).await {
            Ok(issued) => {
                info!(email = %issued.email, "OAuth flow completed successfully");
                FlowState::Authenticated(issued)
            }
            Err(failure) => {
                warn!(reason = %failure.code(), "OAuth flow failed");
                FlowState::Failed(failure)
            }
        }
    }

    async fn try_complete(
        &self,
        params: CallbackParams,
        state_cookie: Option<&str>,
    ) -> Result<SessionIssued, AuthFailure> {
        if let Some(error) = params.error {
            let description = params
                .error_description
                .unwrap_or_else(|| "Unknown error".to_string());
            warn!(error = %error, description = %description, "OAuth authorization failed at provider");
            return Err(AuthFailure::ProviderError(error));
        }

        let (code, state) = match (non_empty(params.code), non_empty(params.state)) {
            (Some(code), Some(state)) => (code, state),
            _ => return Err(AuthFailure::InvalidRequest),
        };

        if !csrf::validate(state_cookie, Some(&state)) {
            warn!(has_cookie = state_cookie.is_some(), "Invalid OAuth state (possible CSRF attack)");
            return Err(AuthFailure::InvalidState);
        }
        debug!("CSRF state validated");

        let (client, codec, cipher) = self.load_secrets().map_err(|e| {
            error!(error = %e, "OAuth callback not configured");
            AuthFailure::ServerMisconfigured
        })?;

        debug!("Exchanging authorization code for token");
        let tokens = self.provider.exchange_code(&client, &code).await.map_err(|e| {
            error!(error = %e, "Token exchange failed");
            AuthFailure::AuthenticationFailed
        })?;

        let (access_token, refresh_token) = match (tokens.access_token, tokens.refresh_token) {
            (Some(access), Some(refresh)) => (access, refresh),
            (access, refresh) => {
                warn!(
                    has_access_token = access.is_some(),
                    has_refresh_token = refresh.is_some(),
                    "Provider did not return both tokens"
                );
                return Err(AuthFailure::TokenExchangeFailed);
            }
        };

        let user = self.provider.get_user_info(&access_token).await.map_err(|e| {
            error!(error = %e, "Failed to fetch user info");
            AuthFailure::AuthenticationFailed
        })?;

        let sealed = cipher.encrypt(&refresh_token).map_err(|e| {
            error!(error = %e, "Failed to encrypt refresh token");
            AuthFailure::AuthenticationFailed
        })?;

        let record = SessionRecord {
            email: user.email,
            name: user.name.unwrap_or_default(),
            picture: user.picture,
            refresh_token: sealed,
        };

        let token = codec.sign(&record).map_err(|e| {
            error!(error = %e, "Failed to sign session");
            AuthFailure::AuthenticationFailed
        })?;

        Ok(SessionIssued {
            token,
            email: record.email,
        })
    }

    fn load_secrets(&self) -> Result<(crate::config::ClientCredentials, SessionCodec, CredentialCipher), ConfigError> {
        let client = self.secrets.client_credentials()?;
        self.secrets.redirect_uri()?;
        let codec = SessionCodec::new(self.secrets.jwt_secret()?, self.config.session.ttl_seconds);
        let cipher = CredentialCipher::from_hex(self.secrets.encryption_key()?)
            .map_err(|_| ConfigError::Invalid("ENCRYPTION_KEY"))?;
        Ok((client, codec, cipher))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_codes() {
        assert_eq!(AuthFailure::InvalidRequest.redirect_target(), "/?error=invalid_request");
        assert_eq!(AuthFailure::InvalidState.redirect_target(), "/?error=invalid_state");
        assert_eq!(
            AuthFailure::ServerMisconfigured.redirect_target(),
            "/?error=server_config_error"
        );
        assert_eq!(
            AuthFailure::TokenExchangeFailed.redirect_target(),
            "/?error=token_exchange_failed"
        );
        assert_eq!(
            AuthFailure::AuthenticationFailed.redirect_target(),
            "/?error=authentication_failed"
        );
    }

    #[test]
    fn test_provider_codes_are_sanitized() {
        assert_eq!(
            AuthFailure::ProviderError("access_denied".to_string()).redirect_target(),
            "/?error=access_denied"
        );
        assert_eq!(
            AuthFailure::ProviderError("<script>alert(1)</script>".to_string()).code(),
            "provider_error"
        );
        assert_eq!(AuthFailure::ProviderError(String::new()).code(), "provider_error");
    }

    #[test]
    fn test_flow_state_terminality() {
        assert_eq!(FlowState::default(), FlowState::AwaitingRedirect);
        assert!(!FlowState::AwaitingRedirect.is_terminal());
        assert!(!FlowState::AwaitingCallback {
            auth_url: "https://example.com".to_string(),
            state: csrf::issue(),
        }
        .is_terminal());
        assert!(FlowState::Failed(AuthFailure::InvalidState).is_terminal());
    }

    #[test]
    fn test_begin_without_client_id() {
        let config = AppConfig::default();
        let secrets = Secrets::default();
        let provider = crate::api::auth::GoogleProvider::new(reqwest::Client::new(), &config.google);
        let flow = AuthorizationFlow::new(&config, &secrets, &provider);

        assert_eq!(flow.begin(), FlowState::Failed(AuthFailure::ServerMisconfigured));
    }

    #[test]
    fn test_callback_params_deserialization() {
        let params: CallbackParams = serde_urlencoded::from_str("code=auth_code_123&state=csrf_state_456").unwrap();
        assert_eq!(params.code.as_deref(), Some("auth_code_123"));
        assert_eq!(params.state.as_deref(), Some("csrf_state_456"));
        assert_eq!(params.error, None);

        let params: CallbackParams =
            serde_urlencoded::from_str("error=access_denied&error_description=User+cancelled").unwrap();
        assert_eq!(params.error.as_deref(), Some("access_denied"));
        assert_eq!(params.error_description.as_deref(), Some("User cancelled"));
        assert_eq!(params.code, None);
    }
}
