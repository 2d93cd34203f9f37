// Shared helpers for router-level integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use chrono::{Duration, Utc};
use mailbridge::api::auth::{IdentityProvider, ProviderError, ProviderTokens, UserInfo};
use mailbridge::config::{AppConfig, ClientCredentials, Secrets};
use mailbridge::credentials::CredentialCipher;
use mailbridge::session::{SessionCodec, SessionRecord};
use mailbridge::{create_router, AppState};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub const KEY_HEX: &str = "8f3a9c1d2e4b5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8";
pub const JWT_SECRET: &str = "integration-test-jwt-secret";
pub const REFRESH_TOKEN: &str = "1//refresh-token-from-provider";

type Outcome = Box<dyn Fn() -> Result<ProviderTokens, ProviderError> + Send + Sync>;

/// Identity provider with scripted responses that records what it was sent.
pub struct ScriptedProvider {
    exchange: Outcome,
    refresh: Outcome,
    user: Option<UserInfo>,
    pub exchanged_codes: Mutex<Vec<String>>,
    pub refreshed_tokens: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    /// Provider that completes every step successfully.
    pub fn happy() -> Self {
        Self {
            exchange: Box::new(|| {
                Ok(ProviderTokens {
                    access_token: Some("ya29.initial".to_string()),
                    refresh_token: Some(REFRESH_TOKEN.to_string()),
                    expires_at: Some(Utc::now() + Duration::seconds(3599)),
                })
            }),
            refresh: Box::new(|| {
                Ok(ProviderTokens {
                    access_token: Some("ya29.renewed".to_string()),
                    refresh_token: None,
                    expires_at: Some(Utc::now() + Duration::seconds(3599)),
                })
            }),
            user: Some(UserInfo {
                email: "alice@example.com".to_string(),
                name: Some("Alice Example".to_string()),
                picture: Some("https://example.com/alice.png".to_string()),
            }),
            exchanged_codes: Mutex::new(Vec::new()),
            refreshed_tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn with_exchange(
        mut self,
        outcome: impl Fn() -> Result<ProviderTokens, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        self.exchange = Box::new(outcome);
        self
    }

    pub fn with_refresh(
        mut self,
        outcome: impl Fn() -> Result<ProviderTokens, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        self.refresh = Box::new(outcome);
        self
    }

    pub fn without_user_info(mut self) -> Self {
        self.user = None;
        self
    }
}

#[async_trait]
impl IdentityProvider for ScriptedProvider {
    async fn exchange_code(
        &self,
        _client: &ClientCredentials,
        code: &str,
    ) -> Result<ProviderTokens, ProviderError> {
        self.exchanged_codes.lock().unwrap().push(code.to_string());
        (self.exchange)()
    }

    async fn refresh_access_token(
        &self,
        _client: &ClientCredentials,
        refresh_token: &str,
    ) -> Result<ProviderTokens, ProviderError> {
        self.refreshed_tokens
            .lock()
            .unwrap()
            .push(refresh_token.to_string());
        (self.refresh)()
    }

    async fn get_user_info(&self, _access_token: &str) -> Result<UserInfo, ProviderError> {
        self.user
            .clone()
            .ok_or_else(|| ProviderError::Transport("userinfo unavailable".to_string()))
    }
}

/// Every secret configured.
pub fn full_secrets() -> Secrets {
    Secrets {
        google_client_id: Some("test-client-id".to_string()),
        google_client_secret: Some("test-client-secret".to_string()),
        google_redirect_uri: Some("http://localhost:3000/auth/callback".to_string()),
        jwt_secret: Some(JWT_SECRET.to_string()),
        encryption_key: Some(KEY_HEX.to_string()),
        anthropic_api_key: Some("test-anthropic-key".to_string()),
    }
}

/// Default config with no static site.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.server.static_dir = PathBuf::from("/nonexistent/mailbridge-static");
    config
}

pub fn app_with(config: AppConfig, secrets: Secrets, provider: Arc<ScriptedProvider>) -> Router {
    let state = AppState {
        config: Arc::new(config),
        secrets: Arc::new(secrets),
        provider,
        http: reqwest::Client::new(),
    };
    create_router(state)
}

pub fn app(secrets: Secrets, provider: Arc<ScriptedProvider>) -> Router {
    app_with(test_config(), secrets, provider)
}

pub fn request(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// All `Set-Cookie` header values.
pub fn set_cookies<B>(response: &Response<B>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// The `Set-Cookie` header for `name`, if any.
pub fn find_cookie(cookies: &[String], name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    cookies.iter().find(|c| c.starts_with(&prefix)).cloned()
}

/// Value part of a `Set-Cookie` header.
pub fn cookie_value(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value.to_string())
        .unwrap_or_default()
}

pub fn location<B>(response: &Response<B>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string())
        .unwrap_or_default()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// A session token as the callback would issue it.
pub fn session_token(jwt_secret: &str) -> String {
    let cipher = CredentialCipher::from_hex(KEY_HEX).unwrap();
    let record = SessionRecord {
        email: "alice@example.com".to_string(),
        name: "Alice Example".to_string(),
        picture: None,
        refresh_token: cipher.encrypt(REFRESH_TOKEN).unwrap(),
    };
    SessionCodec::new(jwt_secret, 3600).sign(&record).unwrap()
}
