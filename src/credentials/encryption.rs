//! AES-256-GCM encryption for the refresh credential.
//!
//! Each credential is encrypted with a fresh 128-bit IV and a detached
//! authentication tag. The key is 32 bytes (256 bits), supplied as 64 hex
//! characters from server configuration.

use super::EncryptedCredential;
use aes_gcm::{
    aead::{consts::U16, AeadCore, AeadInPlace, KeyInit, OsRng},
    aes::Aes256,
    AesGcm, Key, Nonce, Tag,
};
use thiserror::Error;

/// Size of the encryption key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Size of the IV in bytes (128 bits)
pub const IV_SIZE: usize = 16;

/// Size of the GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// AES-256-GCM with a 16-byte nonce, matching the stored credential format.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// Cipher failures.
///
/// Decryption never distinguishes *why* it failed: a bad hex field, a wrong
/// IV length and a tag mismatch all surface as `CorruptOrTampered`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("encryption key must be {KEY_SIZE} bytes encoded as {} hex characters", KEY_SIZE * 2)]
    InvalidKey,
    #[error("encryption failed")]
    EncryptionFailed,
    #[error("credential is corrupt or has been tampered with")]
    CorruptOrTampered,
}

/// Symmetric cipher for the long-lived refresh credential.
#[derive(Clone)]
pub struct CredentialCipher {
    cipher: Aes256Gcm16,
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCipher").finish_non_exhaustive()
    }
}

impl CredentialCipher {
    /// Builds a cipher from raw key bytes.
    pub fn new(key: &[u8; KEY_SIZE]) -> Self {
        Self {
            cipher: Aes256Gcm16::new(Key::<Aes256Gcm16>::from_slice(key)),
        }
    }

    /// Builds a cipher from a 64-character hex key.
    ///
    /// # Returns
    /// * `Ok(CredentialCipher)` - Key decoded to exactly 32 bytes
    /// * `Err(CipherError::InvalidKey)` - Bad hex or wrong length
    pub fn from_hex(key_hex: &str) -> Result<Self, CipherError> {
        let bytes = hex::decode(key_hex.trim()).map_err(|_| CipherError::InvalidKey)?;
        let key: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| CipherError::InvalidKey)?;
        Ok(Self::new(&key))
    }

    /// Encrypts a credential under a freshly generated random IV.
    ///
    /// # Security
    /// - The IV comes from the OS CSPRNG on every call and is never reused
    /// - The tag authenticates the ciphertext and is checked on decrypt
    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedCredential, CipherError> {
        // Generate random IV (never reuse!)
        let iv = Aes256Gcm16::generate_nonce(&mut OsRng);

        let mut buffer = plaintext.as_bytes().to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(&iv, b"", &mut buffer)
            .map_err(|_| CipherError::EncryptionFailed)?;

        Ok(EncryptedCredential {
            encrypted: hex::encode(&buffer),
            iv: hex::encode(iv),
            auth_tag: hex::encode(tag),
        })
    }

    /// Decrypts and authenticates a credential.
    ///
    /// Fails closed: the plaintext is only returned once the tag has been
    /// verified over the whole ciphertext.
    pub fn decrypt(&self, credential: &EncryptedCredential) -> Result<String, CipherError> {
        let mut buffer =
            hex::decode(&credential.encrypted).map_err(|_| CipherError::CorruptOrTampered)?;
        let iv = hex::decode(&credential.iv).map_err(|_| CipherError::CorruptOrTampered)?;
        let tag = hex::decode(&credential.auth_tag).map_err(|_| CipherError::CorruptOrTampered)?;

        if iv.len() != IV_SIZE || tag.len() != TAG_SIZE {
            return Err(CipherError::CorruptOrTampered);
        }

        self.cipher
            .decrypt_in_place_detached(
                Nonce::<U16>::from_slice(&iv),
                b"",
                &mut buffer,
                Tag::<U16>::from_slice(&tag),
            )
            .map_err(|_| CipherError::CorruptOrTampered)?;

        String::from_utf8(buffer).map_err(|_| CipherError::CorruptOrTampered)
    }
}
