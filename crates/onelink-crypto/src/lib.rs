//! # OneLink Crypto
//!
//! Cryptographic core for the OneLink sovereign content-sharing platform.
//!
//! This crate provides:
//! - **Identity keys**: 2048-bit RSA-OAEP key pairs, portable as DER SPKI/PKCS#8
//! - **Content encryption**: AES-256-GCM with a fresh 256-bit key per resource
//! - **Envelopes**: encrypt-once, wrap-per-recipient key distribution
//! - **Key vault**: passphrase-derived private key backup (PBKDF2 + AES-GCM)
//!
//! ## Security Model
//!
//! This crate implements a "Trust-No-One" security model where:
//! - All encryption happens client-side
//! - Private keys never leave the device except inside a vault record
//! - The document store only ever sees ciphertext and wrapped keys
//!
//! ## Example
//!
//! ```rust,ignore
//! use onelink_crypto::{IdentityKeyPair, envelope};
//!
//! // Generate identity keys for two users
//! let alice = IdentityKeyPair::generate()?;
//! let bob = IdentityKeyPair::generate()?;
//!
//! // Alice seals a secret for Bob
//! let sealed = envelope::seal_for(b"secret-url", bob.public_key())?;
//!
//! // Bob opens it with his private key
//! let plaintext = sealed.open_with(bob.private_key())?;
//! ```

pub mod codec;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod symmetric;
pub mod vault;

pub use codec::{from_base64, to_base64};
pub use envelope::{Envelope, SealedPayload, WrappedKey};
pub use error::{CryptoError, Result};
pub use identity::{IdentityKeyPair, IdentityPrivateKey, IdentityPublicKey};
pub use symmetric::{ContentKey, Iv};
pub use vault::VaultRecord;

/// Version of the envelope/vault wire format
pub const CRYPTO_VERSION: u8 = 1;
