//! Identity provider boundary.
//!
//! The OAuth provider is an opaque collaborator behind three calls: exchange
//! an authorization code, refresh an access token, and read the user's
//! identity. [`GoogleProvider`] talks to Google's token and userinfo
//! endpoints; tests substitute their own implementation.

use crate::config::{ClientCredentials, GoogleConfig};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

/// Provider call failures.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider answered with a client error (4xx), e.g. `invalid_grant`
    #[error("provider rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    /// Network failure or provider server error
    #[error("provider request failed: {0}")]
    Transport(String),
    /// The provider answered but the body was not what we expected
    #[error("unexpected provider response: {0}")]
    InvalidResponse(String),
}

/// Tokens returned by the provider's token endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// When the access token expires (UTC)
    pub expires_at: Option<DateTime<Utc>>,
}

/// Identity attributes of the authorized user.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct UserInfo {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Narrow async interface to the OAuth identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchanges an authorization code for tokens.
    async fn exchange_code(
        &self,
        client: &ClientCredentials,
        code: &str,
    ) -> Result<ProviderTokens, ProviderError>;

    /// Exchanges a refresh token for a fresh access token.
    async fn refresh_access_token(
        &self,
        client: &ClientCredentials,
        refresh_token: &str,
    ) -> Result<ProviderTokens, ProviderError>;

    /// Reads the identity of the user an access token belongs to.
    async fn get_user_info(&self, access_token: &str) -> Result<UserInfo, ProviderError>;
}

/// Builds the provider's authorization URL.
///
/// `access_type=offline` and `prompt=consent` make Google issue a refresh
/// token on every login, not only the first.
pub fn build_auth_url(config: &GoogleConfig, client_id: &str, redirect_uri: &str, state: &str) -> String {
    let scopes = config.scopes.join(" ");
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
        config.auth_url,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&scopes),
        urlencoding::encode(state)
    )
}

/// OAuth token response (standard OAuth 2.0)
#[derive(Deserialize, Debug)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TryFrom<TokenResponse> for ProviderTokens {
    type Error = ProviderError;

    fn try_from(response: TokenResponse) -> Result<Self, Self::Error> {
        let expires_at = match response.expires_in {
            Some(seconds) => Some(
                Duration::try_seconds(seconds)
                    .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
                    .ok_or_else(|| {
                        ProviderError::InvalidResponse(format!("expires_in out of range: {}", seconds))
                    })?,
            ),
            None => None,
        };

        Ok(Self {
            access_token: response.access_token.filter(|t| !t.is_empty()),
            refresh_token: response.refresh_token.filter(|t| !t.is_empty()),
            expires_at,
        })
    }
}

/// Google OAuth 2.0 endpoints over HTTP.
#[derive(Clone)]
pub struct GoogleProvider {
    http: Client,
    token_url: String,
    userinfo_url: String,
}

impl GoogleProvider {
    pub fn new(http: Client, config: &GoogleConfig) -> Self {
        Self {
            http,
            token_url: config.token_url.clone(),
            userinfo_url: config.userinfo_url.clone(),
        }
    }

    async fn post_token_form(&self, form: &HashMap<&str, &str>) -> Result<ProviderTokens, ProviderError> {
        let response = self
            .http
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let response = check_status(response).await?;

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        tracing::debug!(
            has_access_token = token_response.access_token.is_some(),
            has_refresh_token = token_response.refresh_token.is_some(),
            expires_in = ?token_response.expires_in,
            "Token endpoint responded"
        );

        token_response.try_into()
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    async fn exchange_code(
        &self,
        client: &ClientCredentials,
        code: &str,
    ) -> Result<ProviderTokens, ProviderError> {
        let mut form = HashMap::new();
        form.insert("grant_type", "authorization_code");
        form.insert("code", code);
        form.insert("client_id", client.client_id.as_str());
        form.insert("client_secret", client.client_secret.as_str());
        if let Some(redirect_uri) = client.redirect_uri.as_deref() {
            form.insert("redirect_uri", redirect_uri);
        }

        tracing::debug!(token_url = %self.token_url, "Exchanging authorization code for token");
        self.post_token_form(&form).await
    }

    async fn refresh_access_token(
        &self,
        client: &ClientCredentials,
        refresh_token: &str,
    ) -> Result<ProviderTokens, ProviderError> {
        let mut form = HashMap::new();
        form.insert("grant_type", "refresh_token");
        form.insert("refresh_token", refresh_token);
        form.insert("client_id", client.client_id.as_str());
        form.insert("client_secret", client.client_secret.as_str());

        tracing::debug!(token_url = %self.token_url, "Refreshing access token");
        self.post_token_form(&form).await
    }

    async fn get_user_info(&self, access_token: &str) -> Result<UserInfo, ProviderError> {
        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

/// Splits provider responses into client rejections and everything else.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    if status.is_client_error() {
        Err(ProviderError::Rejected {
            status: status.as_u16(),
            body,
        })
    } else {
        Err(ProviderError::Transport(format!(
            "status {}: {}",
            status, body
        )))
    }
}
