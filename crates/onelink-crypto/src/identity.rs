//! Per-user asymmetric identity keys
//!
//! Each user holds one 2048-bit RSA key pair used with OAEP (SHA-256)
//! padding. The public key is published to the document store; the private
//! key never leaves the device except inside a [`crate::VaultRecord`].
//!
//! Keys export as standard DER layouts (SPKI for public, PKCS#8 for
//! private), base64-encoded, so the same material is portable across
//! client implementations.

use crate::{codec, CryptoError, Result};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

/// RSA modulus size in bits
pub const RSA_MODULUS_BITS: usize = 2048;

/// A user's published public key (RSA, OAEP-SHA-256)
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityPublicKey {
    inner: RsaPublicKey,
}

impl IdentityPublicKey {
    /// Import from DER-encoded SPKI bytes
    pub fn from_der(bytes: &[u8]) -> Result<Self> {
        let inner = RsaPublicKey::from_public_key_der(bytes)
            .map_err(|e| CryptoError::KeyFormat(format!("bad SPKI public key: {e}")))?;
        Ok(Self { inner })
    }

    /// Export as DER-encoded SPKI bytes
    pub fn to_der(&self) -> Result<Vec<u8>> {
        let doc = self
            .inner
            .to_public_key_der()
            .map_err(|e| CryptoError::KeyFormat(format!("SPKI encoding failed: {e}")))?;
        Ok(doc.as_bytes().to_vec())
    }

    /// Import from a base64-encoded SPKI string (the published form)
    pub fn from_base64(s: &str) -> Result<Self> {
        Self::from_der(&codec::from_base64(s)?)
    }

    /// Export as a base64-encoded SPKI string
    pub fn to_base64(&self) -> Result<String> {
        Ok(codec::to_base64(&self.to_der()?))
    }

    /// Asymmetrically wrap a small payload (a raw content key) for the
    /// holder of the matching private key
    pub fn wrap_bytes(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.inner
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext)
            .map_err(|e| CryptoError::Encryption(format!("RSA-OAEP wrap failed: {e}")))
    }
}

impl std::fmt::Debug for IdentityPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_base64() {
            Ok(b64) => write!(f, "IdentityPublicKey({}..)", &b64[..16.min(b64.len())]),
            Err(_) => write!(f, "IdentityPublicKey(<unencodable>)"),
        }
    }
}

/// A user's private key; local-only except inside a vault record
#[derive(Clone)]
pub struct IdentityPrivateKey {
    inner: RsaPrivateKey,
}

impl IdentityPrivateKey {
    /// Import from DER-encoded PKCS#8 bytes
    pub fn from_der(bytes: &[u8]) -> Result<Self> {
        let inner = RsaPrivateKey::from_pkcs8_der(bytes)
            .map_err(|e| CryptoError::KeyFormat(format!("bad PKCS#8 private key: {e}")))?;
        Ok(Self { inner })
    }

    /// Export as DER-encoded PKCS#8 bytes
    pub fn to_der(&self) -> Result<Vec<u8>> {
        let doc = self
            .inner
            .to_pkcs8_der()
            .map_err(|e| CryptoError::KeyFormat(format!("PKCS#8 encoding failed: {e}")))?;
        Ok(doc.as_bytes().to_vec())
    }

    /// Import from a base64-encoded PKCS#8 string
    pub fn from_base64(s: &str) -> Result<Self> {
        Self::from_der(&codec::from_base64(s)?)
    }

    /// Export as a base64-encoded PKCS#8 string
    pub fn to_base64(&self) -> Result<String> {
        Ok(codec::to_base64(&self.to_der()?))
    }

    /// Derive the matching public key
    pub fn public_key(&self) -> IdentityPublicKey {
        IdentityPublicKey {
            inner: RsaPublicKey::from(&self.inner),
        }
    }

    /// Unwrap a payload wrapped with the matching public key
    ///
    /// Fails with [`CryptoError::Decryption`] when the wrapped bytes were
    /// not produced for this key.
    pub fn unwrap_bytes(&self, wrapped: &[u8]) -> Result<Vec<u8>> {
        self.inner
            .decrypt(Oaep::new::<Sha256>(), wrapped)
            .map_err(|e| CryptoError::Decryption(format!("RSA-OAEP unwrap failed: {e}")))
    }
}

impl std::fmt::Debug for IdentityPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IdentityPrivateKey(<redacted>)")
    }
}

/// A complete identity key pair
#[derive(Clone)]
pub struct IdentityKeyPair {
    private: IdentityPrivateKey,
    public: IdentityPublicKey,
}

impl IdentityKeyPair {
    /// Generate a fresh 2048-bit key pair
    ///
    /// Key generation takes noticeable wall time; async callers should run
    /// it on a blocking thread.
    pub fn generate() -> Result<Self> {
        let inner = RsaPrivateKey::new(&mut OsRng, RSA_MODULUS_BITS)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let private = IdentityPrivateKey { inner };
        let public = private.public_key();
        Ok(Self { private, public })
    }

    /// Reassemble a key pair from an existing private key
    pub fn from_private_key(private: IdentityPrivateKey) -> Self {
        let public = private.public_key();
        Self { private, public }
    }

    /// Get the private key
    pub fn private_key(&self) -> &IdentityPrivateKey {
        &self.private
    }

    /// Get the public key
    pub fn public_key(&self) -> &IdentityPublicKey {
        &self.public
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let kp1 = IdentityKeyPair::generate().unwrap();
        let kp2 = IdentityKeyPair::generate().unwrap();
        assert_ne!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn test_public_key_derivation() {
        let kp = IdentityKeyPair::generate().unwrap();
        let derived = kp.private_key().public_key();
        assert_eq!(kp.public_key(), &derived);
    }

    #[test]
    fn test_der_base64_roundtrip() {
        let kp = IdentityKeyPair::generate().unwrap();

        let pub_b64 = kp.public_key().to_base64().unwrap();
        let pub_back = IdentityPublicKey::from_base64(&pub_b64).unwrap();
        assert_eq!(kp.public_key(), &pub_back);

        let priv_b64 = kp.private_key().to_base64().unwrap();
        let priv_back = IdentityPrivateKey::from_base64(&priv_b64).unwrap();
        assert_eq!(priv_back.public_key(), *kp.public_key());
    }

    #[test]
    fn test_malformed_key_rejected() {
        assert!(matches!(
            IdentityPublicKey::from_base64("bm90IGEga2V5"),
            Err(CryptoError::KeyFormat(_))
        ));
        assert!(matches!(
            IdentityPrivateKey::from_der(&[0u8; 16]),
            Err(CryptoError::KeyFormat(_))
        ));
        assert!(IdentityPublicKey::from_base64("!!!").is_err());
    }

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let kp = IdentityKeyPair::generate().unwrap();
        let secret = [7u8; 32];

        let wrapped = kp.public_key().wrap_bytes(&secret).unwrap();
        assert_ne!(wrapped.as_slice(), secret.as_slice());

        let unwrapped = kp.private_key().unwrap_bytes(&wrapped).unwrap();
        assert_eq!(unwrapped.as_slice(), secret.as_slice());
    }

    #[test]
    fn test_unwrap_with_foreign_key_fails() {
        let kp1 = IdentityKeyPair::generate().unwrap();
        let kp2 = IdentityKeyPair::generate().unwrap();

        let wrapped = kp1.public_key().wrap_bytes(&[1u8; 32]).unwrap();
        assert!(kp2.private_key().unwrap_bytes(&wrapped).is_err());
    }
}
