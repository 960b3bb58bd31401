//! Passphrase-protected private key backup
//!
//! A [`VaultRecord`] is the user's private key wrapped under a key derived
//! from a passphrase with PBKDF2-HMAC-SHA-256 (100,000 iterations, random
//! 16-byte salt) and sealed with AES-256-GCM. The derived key and the
//! passphrase are never persisted; the record is only as strong as the
//! passphrase, so an empty passphrase is rejected outright.

use crate::{
    codec,
    identity::IdentityPrivateKey,
    symmetric::{ContentKey, Iv},
    CryptoError, Result, CRYPTO_VERSION,
};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

/// PBKDF2 iteration count
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Salt length in bytes
pub const SALT_SIZE: usize = 16;

/// A user's private key wrapped under a passphrase-derived key
///
/// One per user in the document store; overwritten on key re-generation.
/// Absence means no cloud backup exists.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultRecord {
    /// Wire format version
    pub version: u8,
    /// AES-256-GCM ciphertext over the PKCS#8 private key bytes
    #[serde(with = "codec::base64_vec")]
    pub ciphertext: Vec<u8>,
    /// The IV used for this ciphertext
    pub iv: Iv,
    /// The PBKDF2 salt
    #[serde(with = "codec::base64_array")]
    pub salt: [u8; SALT_SIZE],
}

impl VaultRecord {
    /// Serialize to the JSON string form stored in the vault document
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| CryptoError::Serialization(e.to_string()))
    }

    /// Parse from the stored JSON string form
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| CryptoError::Serialization(e.to_string()))
    }
}

fn derive_vault_key(passphrase: &str, salt: &[u8; SALT_SIZE]) -> ContentKey {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    ContentKey::from(key)
}

/// Wrap a private key for off-device backup
pub fn backup(private: &IdentityPrivateKey, passphrase: &str) -> Result<VaultRecord> {
    if passphrase.is_empty() {
        return Err(CryptoError::EmptyPassphrase);
    }

    let mut salt = [0u8; SALT_SIZE];
    rand::RngCore::fill_bytes(&mut OsRng, &mut salt);

    let key = derive_vault_key(passphrase, &salt);
    let (iv, ciphertext) = crate::symmetric::encrypt(&key, &private.to_der()?)?;

    Ok(VaultRecord {
        version: CRYPTO_VERSION,
        ciphertext,
        iv,
        salt,
    })
}

/// Recover a private key from a vault record
///
/// Fails with [`CryptoError::InvalidPassphrase`] on a wrong passphrase or
/// a corrupted record; the two are deliberately indistinguishable.
pub fn recover(record: &VaultRecord, passphrase: &str) -> Result<IdentityPrivateKey> {
    if passphrase.is_empty() {
        return Err(CryptoError::EmptyPassphrase);
    }

    let key = derive_vault_key(passphrase, &record.salt);
    let der = crate::symmetric::decrypt(&key, &record.iv, &record.ciphertext)
        .map_err(|_| CryptoError::InvalidPassphrase)?;
    IdentityPrivateKey::from_der(&der).map_err(|_| CryptoError::InvalidPassphrase)
}
