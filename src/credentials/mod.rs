//! Encryption of the OAuth refresh credential.
//!
//! The refresh token is the only long-lived secret in the system. It never
//! leaves the process unencrypted: the callback encrypts it before it is
//! embedded in the session token, and the renewer decrypts it only for the
//! duration of a single provider call.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       Session token (signed JWT)         │
//! │  - identity claims                       │
//! │  - refreshToken: EncryptedCredential     │
//! └─────────────────────────────────────────┘
//!          ↓                    ↑
//!    (decrypt)            (encrypt)
//!          ↓                    ↑
//! ┌─────────────────────────────────────────┐
//! │       CredentialCipher                   │
//! │  - AES-256-GCM, 128-bit random IV        │
//! │  - detached tag, fails closed            │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use mailbridge::credentials::CredentialCipher;
//!
//! # fn main() -> anyhow::Result<()> {
//! let key_hex = std::env::var("ENCRYPTION_KEY")?;
//! let cipher = CredentialCipher::from_hex(&key_hex)?;
//!
//! let sealed = cipher.encrypt("refresh-token")?;
//! assert_eq!(cipher.decrypt(&sealed)?, "refresh-token");
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};

mod encryption;

pub use encryption::{CipherError, CredentialCipher, IV_SIZE, KEY_SIZE, TAG_SIZE};

/// An encrypted refresh credential, hex encoded for transport.
///
/// Produced only by [`CredentialCipher::encrypt`]. Serialized as
/// `{"encrypted", "iv", "authTag"}` inside the session token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedCredential {
    /// Ciphertext
    pub encrypted: String,

    /// Initialization vector (16 bytes)
    pub iv: String,

    /// GCM authentication tag (16 bytes)
    pub auth_tag: String,
}
