//! Identity key lifecycle
//!
//! Provisioning on first use, explicit re-generation, passphrase vault
//! backup and recovery, and logout. Keypair generation is the one
//! genuinely slow cryptographic operation here, so it runs on a blocking
//! thread rather than on the event loop.

use crate::{
    keystore::LocalKeyStore,
    store::{DocumentStore, UserProfile},
    CoreError, Result,
};
use onelink_crypto::{vault, CryptoError, IdentityKeyPair};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of first-use identity provisioning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityStatus {
    /// Local private key and published public key both present
    Ready,
    /// A fresh keypair was generated and published
    Generated,
    /// A public key is published but no local private key exists; the
    /// user must recover from their vault before decrypting anything
    RecoveryRequired,
}

/// Identity lifecycle service
pub struct IdentityService<S> {
    store: Arc<S>,
    keys: LocalKeyStore,
}

impl<S: DocumentStore> IdentityService<S> {
    pub fn new(store: Arc<S>, keys: LocalKeyStore) -> Self {
        Self { store, keys }
    }

    /// Access the local key store
    pub fn local_keys(&self) -> &LocalKeyStore {
        &self.keys
    }

    /// Ensure the user has usable identity keys, generating a pair on
    /// first use
    ///
    /// A published key with no local counterpart cannot be repaired
    /// automatically — generating a new pair would orphan everything
    /// wrapped for the old one — so that case reports
    /// [`IdentityStatus::RecoveryRequired`].
    pub async fn ensure_identity(&self, user_id: &str) -> Result<IdentityStatus> {
        let profile = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| CoreError::UserNotFound(user_id.to_string()))?;

        let local = self.keys.get(user_id);
        match (local, profile.public_key.as_deref()) {
            (Some(_), Some(_)) => Ok(IdentityStatus::Ready),
            (None, Some(_)) => {
                debug!(user_id, "published key exists but local key is absent");
                Ok(IdentityStatus::RecoveryRequired)
            }
            (Some(private), None) => {
                // Local key survived but publication was lost; republish.
                let public = private.public_key().to_base64()?;
                self.publish_public_key(profile, public).await?;
                Ok(IdentityStatus::Ready)
            }
            (None, None) => {
                info!(user_id, "generating identity keypair");
                let keypair = generate_keypair_blocking().await?;
                let public = keypair.public_key().to_base64()?;
                self.keys.store(user_id, keypair.private_key().clone());
                self.publish_public_key(profile, public).await?;
                Ok(IdentityStatus::Generated)
            }
        }
    }

    /// Generate and publish a brand-new keypair, discarding the old one
    ///
    /// Every content key previously wrapped for this user becomes
    /// unreadable, and the old vault record is deleted so recovery cannot
    /// resurrect the stale key.
    pub async fn regenerate(&self, user_id: &str) -> Result<()> {
        let profile = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| CoreError::UserNotFound(user_id.to_string()))?;

        warn!(user_id, "regenerating identity keypair; prior wraps are now invalid");
        let keypair = generate_keypair_blocking().await?;
        let public = keypair.public_key().to_base64()?;

        self.keys.store(user_id, keypair.private_key().clone());
        self.store.delete_vault(user_id).await?;
        self.publish_public_key(profile, public).await
    }

    /// Back up the local private key to the vault under a passphrase
    pub async fn backup_to_vault(&self, user_id: &str, passphrase: &str) -> Result<()> {
        let private = self
            .keys
            .get(user_id)
            .ok_or_else(|| CoreError::KeyUnavailable(user_id.to_string()))?;

        let record = vault::backup(&private, passphrase)?;
        self.store.put_vault(user_id, &record).await?;
        info!(user_id, "private key backed up to vault");
        Ok(())
    }

    /// Recover the private key from the vault and install it locally
    ///
    /// Also republishes the matching public key in case the profile lost
    /// it.
    pub async fn recover_from_vault(&self, user_id: &str, passphrase: &str) -> Result<()> {
        let profile = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| CoreError::UserNotFound(user_id.to_string()))?;
        let record = self
            .store
            .get_vault(user_id)
            .await?
            .ok_or_else(|| CoreError::KeyUnavailable(user_id.to_string()))?;

        let private = vault::recover(&record, passphrase)?;
        let public = private.public_key().to_base64()?;
        self.keys.store(user_id, private);
        self.publish_public_key(profile, public).await?;
        info!(user_id, "private key recovered from vault");
        Ok(())
    }

    /// Clear the local private key at logout; the vault record, if any,
    /// stays put
    pub fn logout(&self, user_id: &str) {
        if self.keys.delete(user_id) {
            debug!(user_id, "local private key cleared");
        }
    }

    async fn publish_public_key(&self, mut profile: UserProfile, public: String) -> Result<()> {
        profile.public_key = Some(public);
        self.store.put_user(&profile).await
    }
}

/// Run RSA keypair generation off the event loop
async fn generate_keypair_blocking() -> Result<IdentityKeyPair> {
    tokio::task::spawn_blocking(IdentityKeyPair::generate)
        .await
        .map_err(|e| CoreError::Crypto(CryptoError::KeyGeneration(e.to_string())))?
        .map_err(CoreError::Crypto)
}
