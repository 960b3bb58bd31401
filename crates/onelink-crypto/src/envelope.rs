//! Envelope wrap/unwrap protocol
//!
//! Content is encrypted exactly once with a fresh [`ContentKey`]; the key
//! is then asymmetrically wrapped per recipient. Adding a recipient later
//! means wrapping the *same* content key again, which only someone able to
//! unwrap it can do (the access-grant flow is exactly this operation).
//!
//! The envelope shape is resolved once at construction as a tagged variant
//! rather than sniffed from optional fields at each call site:
//!
//! - [`Envelope::SingleRecipient`] — one wrapped key
//! - [`Envelope::MultiRecipient`] — one wrapped key per recipient id
//! - [`Envelope::KeyExternal`] — no wrapped key; the content key is
//!   supplied out-of-band (already resolved this session)

use crate::{
    codec,
    identity::{IdentityPrivateKey, IdentityPublicKey},
    symmetric::{self, ContentKey, Iv},
    CryptoError, Result, CRYPTO_VERSION,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An asymmetrically wrapped copy of a content key
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WrappedKey(#[serde(with = "codec::base64_vec")] Vec<u8>);

impl WrappedKey {
    /// Wrap a content key for a recipient
    pub fn wrap(key: &ContentKey, recipient: &IdentityPublicKey) -> Result<Self> {
        Ok(Self(recipient.wrap_bytes(key.as_bytes())?))
    }

    /// Unwrap back into a content key
    ///
    /// Fails with [`CryptoError::Decryption`] when the wrap was not made
    /// for this private key, or when the unwrapped bytes are not a valid
    /// content key.
    pub fn unwrap_with(&self, private: &IdentityPrivateKey) -> Result<ContentKey> {
        let bytes = private.unwrap_bytes(&self.0)?;
        ContentKey::from_bytes(&bytes)
            .map_err(|_| CryptoError::Decryption("unwrapped bytes are not a content key".into()))
    }

    /// Create from raw wrapped bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Get the raw wrapped bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for WrappedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WrappedKey({} bytes)", self.0.len())
    }
}

/// The symmetric half of an envelope: one ciphertext/IV pair produced by
/// exactly one content key
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SealedPayload {
    /// Wire format version
    pub version: u8,
    /// AES-256-GCM ciphertext
    #[serde(with = "codec::base64_vec")]
    pub ciphertext: Vec<u8>,
    /// The IV used for this ciphertext
    pub iv: Iv,
}

/// Ciphertext plus zero or more wrapped copies of its content key
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Envelope {
    /// Sealed for exactly one recipient
    SingleRecipient {
        sealed: SealedPayload,
        wrapped_key: WrappedKey,
    },
    /// Sealed once, key wrapped independently per recipient id
    MultiRecipient {
        sealed: SealedPayload,
        wrapped_keys: HashMap<String, WrappedKey>,
    },
    /// No wrapped key; only valid when the content key is supplied
    /// out-of-band
    KeyExternal { sealed: SealedPayload },
}

/// Encrypt a payload with a fresh content key and wrap that key for one
/// recipient
pub fn seal_for(plaintext: &[u8], recipient: &IdentityPublicKey) -> Result<Envelope> {
    let key = ContentKey::generate();
    let (iv, ciphertext) = symmetric::encrypt(&key, plaintext)?;
    let wrapped_key = WrappedKey::wrap(&key, recipient)?;
    Ok(Envelope::SingleRecipient {
        sealed: SealedPayload {
            version: CRYPTO_VERSION,
            ciphertext,
            iv,
        },
        wrapped_key,
    })
}

/// Encrypt a payload once and wrap the same content key for every
/// recipient
pub fn seal_for_many(
    plaintext: &[u8],
    recipients: &HashMap<String, IdentityPublicKey>,
) -> Result<Envelope> {
    let key = ContentKey::generate();
    let (iv, ciphertext) = symmetric::encrypt(&key, plaintext)?;
    let mut wrapped_keys = HashMap::with_capacity(recipients.len());
    for (user_id, public) in recipients {
        wrapped_keys.insert(user_id.clone(), WrappedKey::wrap(&key, public)?);
    }
    Ok(Envelope::MultiRecipient {
        sealed: SealedPayload {
            version: CRYPTO_VERSION,
            ciphertext,
            iv,
        },
        wrapped_keys,
    })
}

/// Encrypt a payload under a caller-held content key; the envelope itself
/// carries no wrapped key
pub fn seal_with_key(plaintext: &[u8], key: &ContentKey) -> Result<Envelope> {
    let (iv, ciphertext) = symmetric::encrypt(key, plaintext)?;
    Ok(Envelope::KeyExternal {
        sealed: SealedPayload {
            version: CRYPTO_VERSION,
            ciphertext,
            iv,
        },
    })
}

impl Envelope {
    /// The ciphertext/IV pair, independent of variant
    pub fn sealed(&self) -> &SealedPayload {
        match self {
            Envelope::SingleRecipient { sealed, .. } => sealed,
            Envelope::MultiRecipient { sealed, .. } => sealed,
            Envelope::KeyExternal { sealed } => sealed,
        }
    }

    /// Unwrap the content key with a private key without touching the
    /// payload
    ///
    /// For multi-recipient envelopes every wrapped copy is tried; RSA-OAEP
    /// rejects copies made for other keys.
    pub fn unwrap_content_key(&self, private: &IdentityPrivateKey) -> Result<ContentKey> {
        match self {
            Envelope::SingleRecipient { wrapped_key, .. } => wrapped_key.unwrap_with(private),
            Envelope::MultiRecipient { wrapped_keys, .. } => wrapped_keys
                .values()
                .find_map(|wrapped| wrapped.unwrap_with(private).ok())
                .ok_or_else(|| {
                    CryptoError::Decryption("no wrapped key unwraps with this private key".into())
                }),
            Envelope::KeyExternal { .. } => Err(CryptoError::Decryption(
                "envelope carries no wrapped key; content key must be supplied".into(),
            )),
        }
    }

    /// Unwrap the content key and decrypt the payload
    ///
    /// Error contract: [`CryptoError::KeyMismatch`] when a wrapped key
    /// unwraps structurally but fails to authenticate the ciphertext
    /// (stale or foreign key — "not yet shared with you"), and
    /// [`CryptoError::Decryption`] for any other failure ("corrupted
    /// data"). Callers surface the two differently.
    pub fn open_with(&self, private: &IdentityPrivateKey) -> Result<Vec<u8>> {
        let key = self.unwrap_content_key(private)?;
        self.open_with_key(&key).map_err(|e| match e {
            CryptoError::Authentication => CryptoError::KeyMismatch,
            other => other,
        })
    }

    /// Decrypt the payload with an already-resolved content key
    pub fn open_with_key(&self, key: &ContentKey) -> Result<Vec<u8>> {
        let sealed = self.sealed();
        symmetric::decrypt(key, &sealed.iv, &sealed.ciphertext)
    }

    /// Serialize to the JSON string form stored in resource records
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| CryptoError::Serialization(e.to_string()))
    }

    /// Parse from the stored JSON string form
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| CryptoError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityKeyPair;

    #[test]
    fn test_seal_open_roundtrip() {
        let kp = IdentityKeyPair::generate().unwrap();
        let plaintext = b"secret-url";

        let envelope = seal_for(plaintext, kp.public_key()).unwrap();
        let opened = envelope.open_with(kp.private_key()).unwrap();

        assert_eq!(plaintext.as_slice(), opened.as_slice());
    }

    #[test]
    fn test_foreign_private_key_cannot_open() {
        let kp = IdentityKeyPair::generate().unwrap();
        let stranger = IdentityKeyPair::generate().unwrap();

        let envelope = seal_for(b"for kp only", kp.public_key()).unwrap();
        assert!(envelope.open_with(stranger.private_key()).is_err());
    }

    #[test]
    fn test_multi_recipient_shares_one_ciphertext() {
        let kp1 = IdentityKeyPair::generate().unwrap();
        let kp2 = IdentityKeyPair::generate().unwrap();
        let recipients = HashMap::from([
            ("alice".to_string(), kp1.public_key().clone()),
            ("bob".to_string(), kp2.public_key().clone()),
        ]);

        let envelope = seal_for_many(b"group secret", &recipients).unwrap();
        match &envelope {
            Envelope::MultiRecipient { wrapped_keys, .. } => assert_eq!(wrapped_keys.len(), 2),
            other => panic!("expected multi-recipient envelope, got {other:?}"),
        }

        // Both recipients independently recover the plaintext from the
        // same ciphertext/iv pair.
        assert_eq!(envelope.open_with(kp1.private_key()).unwrap(), b"group secret");
        assert_eq!(envelope.open_with(kp2.private_key()).unwrap(), b"group secret");
    }

    #[test]
    fn test_key_external_needs_out_of_band_key() {
        let key = ContentKey::generate();
        let envelope = seal_with_key(b"session data", &key).unwrap();

        assert_eq!(envelope.open_with_key(&key).unwrap(), b"session data");

        let kp = IdentityKeyPair::generate().unwrap();
        assert!(matches!(
            envelope.open_with(kp.private_key()),
            Err(CryptoError::Decryption(_))
        ));
    }

    #[test]
    fn test_tampered_ciphertext_is_decryption_class() {
        let kp = IdentityKeyPair::generate().unwrap();
        let mut envelope = seal_for(b"payload", kp.public_key()).unwrap();

        if let Envelope::SingleRecipient { sealed, .. } = &mut envelope {
            sealed.ciphertext[0] ^= 0xFF;
        }

        // The key unwraps fine but no longer authenticates the tampered
        // ciphertext, which surfaces as a key mismatch.
        assert!(matches!(
            envelope.open_with(kp.private_key()),
            Err(CryptoError::KeyMismatch)
        ));
    }

    #[test]
    fn test_stale_wrapped_key_is_key_mismatch() {
        // An envelope whose wrapped key belongs to a different content key
        // than the ciphertext, as happens after the owner regenerates keys.
        let kp = IdentityKeyPair::generate().unwrap();
        let ciphertext_key = ContentKey::generate();
        let stale_key = ContentKey::generate();

        let (iv, ciphertext) = symmetric::encrypt(&ciphertext_key, b"content").unwrap();
        let envelope = Envelope::SingleRecipient {
            sealed: SealedPayload {
                version: CRYPTO_VERSION,
                ciphertext,
                iv,
            },
            wrapped_key: WrappedKey::wrap(&stale_key, kp.public_key()).unwrap(),
        };

        assert!(matches!(
            envelope.open_with(kp.private_key()),
            Err(CryptoError::KeyMismatch)
        ));
    }

    #[test]
    fn test_unwrap_content_key_only() {
        let kp = IdentityKeyPair::generate().unwrap();
        let envelope = seal_for(b"content", kp.public_key()).unwrap();

        let key = envelope.unwrap_content_key(kp.private_key()).unwrap();
        assert_eq!(envelope.open_with_key(&key).unwrap(), b"content");
    }

    #[test]
    fn test_json_roundtrip() {
        let kp = IdentityKeyPair::generate().unwrap();
        let envelope = seal_for(b"stored blob", kp.public_key()).unwrap();

        let json = envelope.to_json().unwrap();
        let restored = Envelope::from_json(&json).unwrap();

        assert_eq!(restored.open_with(kp.private_key()).unwrap(), b"stored blob");
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            Envelope::from_json("{\"kind\":\"mystery\"}"),
            Err(CryptoError::Serialization(_))
        ));
    }
}
