//! Signed, stateless session tokens.
//!
//! The session is an HS256 JWT carried in the `session` cookie. It holds the
//! user's identity and the encrypted refresh credential; the server keeps no
//! copy. Verification is the only trust boundary: the signature is checked
//! first, then expiry, and nothing in the payload is used until both pass.
//!
//! There is no revocation list. A token stays valid for its full TTL and
//! logging out only clears the client's cookie.

use crate::credentials::EncryptedCredential;
use chrono::{DateTime, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default session lifetime (1 hour)
pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 3600;

/// Session token verification and signing failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session signature is invalid")]
    InvalidSignature,
    #[error("session has expired")]
    Expired,
    #[error("session token is malformed")]
    Malformed,
    #[error("failed to sign session: {0}")]
    Signing(String),
}

/// Identity and credential carried by a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(rename = "refreshToken")]
    pub refresh_token: EncryptedCredential,
}

/// JWT claims: the session record plus its expiry (epoch seconds).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(flatten)]
    pub record: SessionRecord,
    pub exp: i64,
}

impl SessionClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Signs and verifies session tokens with a server-held secret.
#[derive(Clone)]
pub struct SessionCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_seconds: i64,
}

impl SessionCodec {
    /// Creates a codec for the given signing secret and lifetime.
    pub fn new(secret: &str, ttl_seconds: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is exact: a token is rejected the second after `exp`
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_seconds,
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Signs a record, expiring `ttl_seconds` from now.
    pub fn sign(&self, record: &SessionRecord) -> Result<String, SessionError> {
        self.sign_at(record, Utc::now())
    }

    /// Signs a record as if issued at `issued_at`.
    pub fn sign_at(
        &self,
        record: &SessionRecord,
        issued_at: DateTime<Utc>,
    ) -> Result<String, SessionError> {
        let claims = SessionClaims {
            record: record.clone(),
            exp: issued_at.timestamp() + self.ttl_seconds,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| SessionError::Signing(e.to_string()))
    }

    /// Verifies a token and returns its claims.
    ///
    /// # Errors
    /// - `InvalidSignature`: signature does not match (checked before anything else)
    /// - `Expired`: signature is valid but `exp` has passed
    /// - `Malformed`: not a decodable HS256 JWT with the expected claims
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => SessionError::InvalidSignature,
                ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::Malformed,
            })
    }
}
