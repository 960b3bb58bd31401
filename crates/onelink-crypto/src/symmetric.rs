//! Symmetric content encryption using AES-256-GCM
//!
//! Every protected resource (a link block, a file, a conversation) gets its
//! own random [`ContentKey`]. Encryption is authenticated: tampered
//! ciphertext fails decryption instead of returning garbage.

use crate::{codec, CryptoError, Result};
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a content key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Size of an IV in bytes (96 bits, the AES-GCM nonce size)
pub const IV_SIZE: usize = 12;

/// A random symmetric key protecting one resource's plaintext
///
/// Never persisted in the clear; it travels only inside an envelope's
/// wrapped-key slots or stays in memory for the session.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ContentKey {
    key: [u8; KEY_SIZE],
}

impl ContentKey {
    /// Generate a new random content key
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        rand::RngCore::fill_bytes(&mut OsRng, &mut key);
        Self { key }
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKey(format!(
                "content key must be {} bytes, got {}",
                KEY_SIZE,
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// Get the raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    /// Encode as base64 for transport inside an envelope
    pub fn to_base64(&self) -> String {
        codec::to_base64(&self.key)
    }

    /// Decode from base64
    pub fn from_base64(s: &str) -> Result<Self> {
        Self::from_bytes(&codec::from_base64(s)?)
    }
}

impl From<[u8; KEY_SIZE]> for ContentKey {
    fn from(key: [u8; KEY_SIZE]) -> Self {
        Self { key }
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContentKey(<redacted>)")
    }
}

/// An initialization vector for AES-GCM
///
/// Fresh per encryption; never reused with the same key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Iv {
    #[serde(with = "codec::base64_array")]
    bytes: [u8; IV_SIZE],
}

impl Iv {
    /// Generate a random IV
    pub fn generate() -> Self {
        let mut bytes = [0u8; IV_SIZE];
        rand::RngCore::fill_bytes(&mut OsRng, &mut bytes);
        Self { bytes }
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != IV_SIZE {
            return Err(CryptoError::InvalidIv(format!(
                "iv must be {} bytes, got {}",
                IV_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; IV_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the IV bytes
    pub fn as_bytes(&self) -> &[u8; IV_SIZE] {
        &self.bytes
    }
}

/// Encrypt a payload under the given content key with a fresh random IV
pub fn encrypt(key: &ContentKey, plaintext: &[u8]) -> Result<(Iv, Vec<u8>)> {
    let iv = Iv::generate();
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(aes_gcm::Nonce::from_slice(iv.as_bytes()), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    Ok((iv, ciphertext))
}

/// Decrypt a payload; fails with [`CryptoError::Authentication`] when the
/// authentication tag does not verify
pub fn decrypt(key: &ContentKey, iv: &Iv, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::Decryption(e.to_string()))?;
    cipher
        .decrypt(aes_gcm::Nonce::from_slice(iv.as_bytes()), ciphertext)
        .map_err(|_| CryptoError::Authentication)
}
