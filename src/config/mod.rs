pub mod secrets;
pub use secrets::{ClientCredentials, ConfigError, Secrets};

use anyhow::{bail, Context};
use serde::Deserialize;
use std::path::PathBuf;

use crate::session::DEFAULT_SESSION_TTL_SECONDS;

/// Environment variable naming an optional TOML config file
pub const CONFIG_PATH_ENV: &str = "MAILBRIDGE_CONFIG";

/// Complete mailbridge configuration (non-secret settings).
///
/// Secrets never live in this file; they come from the environment via
/// [`Secrets::from_env`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub anthropic: AnthropicConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Directory served for `/` and `/portal.html`
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("public")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            static_dir: default_static_dir(),
        }
    }
}

/// Cookie lifetimes
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Session token lifetime (seconds), at most one hour
    #[serde(default = "default_session_ttl")]
    pub ttl_seconds: i64,
    /// CSRF state cookie lifetime (seconds)
    #[serde(default = "default_state_ttl")]
    pub state_ttl_seconds: i64,
}

fn default_session_ttl() -> i64 {
    DEFAULT_SESSION_TTL_SECONDS
}

fn default_state_ttl() -> i64 {
    600
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_session_ttl(),
            state_ttl_seconds: default_state_ttl(),
        }
    }
}

/// Google OAuth and Gmail endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_userinfo_url")]
    pub userinfo_url: String,
    #[serde(default = "default_gmail_api_url")]
    pub gmail_api_url: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

fn default_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_userinfo_url() -> String {
    "https://www.googleapis.com/oauth2/v2/userinfo".to_string()
}

fn default_gmail_api_url() -> String {
    "https://gmail.googleapis.com".to_string()
}

fn default_scopes() -> Vec<String> {
    vec![
        "https://www.googleapis.com/auth/gmail.readonly".to_string(),
        "https://www.googleapis.com/auth/userinfo.email".to_string(),
        "https://www.googleapis.com/auth/userinfo.profile".to_string(),
    ]
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            userinfo_url: default_userinfo_url(),
            gmail_api_url: default_gmail_api_url(),
            scopes: default_scopes(),
        }
    }
}

/// Text-generation API settings
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicConfig {
    #[serde(default = "default_anthropic_url")]
    pub api_url: String,
    /// Model used for single-email analysis
    #[serde(default = "default_analysis_model")]
    pub analysis_model: String,
    /// Model used for weekly insights (faster, to stay within request timeouts)
    #[serde(default = "default_insights_model")]
    pub insights_model: String,
}

fn default_anthropic_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_analysis_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

fn default_insights_model() -> String {
    "claude-haiku-4-5-20251001".to_string()
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_url: default_anthropic_url(),
            analysis_model: default_analysis_model(),
            insights_model: default_insights_model(),
        }
    }
}

impl AppConfig {
    /// Rejects lifetimes outside the supported range. A session may be
    /// shortened but never outlive the one-hour ceiling.
    pub fn validate(&self) -> anyhow::Result<()> {
        let ttl = self.session.ttl_seconds;
        if !(1..=DEFAULT_SESSION_TTL_SECONDS).contains(&ttl) {
            bail!(
                "session.ttl_seconds must be between 1 and {}, got {}",
                DEFAULT_SESSION_TTL_SECONDS,
                ttl
            );
        }
        if self.session.state_ttl_seconds < 1 {
            bail!(
                "session.state_ttl_seconds must be positive, got {}",
                self.session.state_ttl_seconds
            );
        }
        Ok(())
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> anyhow::Result<AppConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;
    let config: AppConfig = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from `MAILBRIDGE_CONFIG` if set, otherwise defaults.
pub fn load_from_env() -> anyhow::Result<AppConfig> {
    match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) if !path.is_empty() => load_config(&path),
        _ => Ok(AppConfig::default()),
    }
}
