//! Error types for the onelink-crypto crate

use thiserror::Error;

/// Result type alias using `CryptoError`
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur during cryptographic operations
///
/// All failures are terminal for the attempted operation; nothing here is
/// retried transparently because retrying with the same key material cannot
/// succeed.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Key generation failed
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Malformed key material (bad DER layout, wrong length, bad base64)
    #[error("malformed key material: {0}")]
    KeyFormat(String),

    /// Encryption failed
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed for a structural reason (missing wrapped key,
    /// unwrap failure, undecodable payload)
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Authentication tag did not verify; the ciphertext or IV was tampered
    /// with, or the wrong content key was supplied
    #[error("ciphertext authentication failed")]
    Authentication,

    /// A wrapped key unwrapped structurally but does not authenticate the
    /// ciphertext it came with (stale or foreign key)
    #[error("unwrapped key does not match ciphertext")]
    KeyMismatch,

    /// Vault recovery failed; wrong passphrase and corrupted vault are
    /// intentionally indistinguishable
    #[error("invalid passphrase or corrupted vault")]
    InvalidPassphrase,

    /// Vault backup was attempted with an empty passphrase
    #[error("vault passphrase must not be empty")]
    EmptyPassphrase,

    /// Invalid IV length
    #[error("invalid iv: {0}")]
    InvalidIv(String),

    /// Invalid symmetric key length
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Base64 decode error
    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}
