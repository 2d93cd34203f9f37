use thiserror::Error;

/// A required secret is absent or unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration value for {0}")]
    Invalid(&'static str),
}

/// Server-held secrets, read from the environment.
///
/// Every field is optional so the server can start half-configured; each
/// endpoint asks for exactly what it needs and fails closed when it is
/// missing. Empty strings count as missing.
#[derive(Clone, Default)]
pub struct Secrets {
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub google_redirect_uri: Option<String>,
    pub jwt_secret: Option<String>,
    /// 64 hex characters (256-bit AES key)
    pub encryption_key: Option<String>,
    pub anthropic_api_key: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("google_client_id", &self.google_client_id.is_some())
            .field("google_client_secret", &self.google_client_secret.is_some())
            .field("google_redirect_uri", &self.google_redirect_uri)
            .field("jwt_secret", &self.jwt_secret.is_some())
            .field("encryption_key", &self.encryption_key.is_some())
            .field("anthropic_api_key", &self.anthropic_api_key.is_some())
            .finish()
    }
}

/// OAuth client identity used for token endpoint calls.
#[derive(Clone, Debug)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: Option<String>,
}

impl Secrets {
    /// Build from env vars.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Self {
            google_client_id: get("GOOGLE_CLIENT_ID"),
            google_client_secret: get("GOOGLE_CLIENT_SECRET"),
            google_redirect_uri: get("GOOGLE_REDIRECT_URI"),
            jwt_secret: get("JWT_SECRET"),
            encryption_key: get("ENCRYPTION_KEY"),
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
        }
    }

    pub fn client_id(&self) -> Result<&str, ConfigError> {
        require(&self.google_client_id, "GOOGLE_CLIENT_ID")
    }

    pub fn redirect_uri(&self) -> Result<&str, ConfigError> {
        require(&self.google_redirect_uri, "GOOGLE_REDIRECT_URI")
    }

    pub fn jwt_secret(&self) -> Result<&str, ConfigError> {
        require(&self.jwt_secret, "JWT_SECRET")
    }

    pub fn encryption_key(&self) -> Result<&str, ConfigError> {
        require(&self.encryption_key, "ENCRYPTION_KEY")
    }

    pub fn anthropic_api_key(&self) -> Result<&str, ConfigError> {
        require(&self.anthropic_api_key, "ANTHROPIC_API_KEY")
    }

    /// Client id and secret, plus the redirect URI when configured.
    pub fn client_credentials(&self) -> Result<ClientCredentials, ConfigError> {
        Ok(ClientCredentials {
            client_id: self.client_id()?.to_string(),
            client_secret: require(&self.google_client_secret, "GOOGLE_CLIENT_SECRET")?
                .to_string(),
            redirect_uri: self.google_redirect_uri.clone(),
        })
    }
}

fn require<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, ConfigError> {
    value.as_deref().ok_or(ConfigError::Missing(name))
}
