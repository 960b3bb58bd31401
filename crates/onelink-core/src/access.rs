//! Access requests and grants
//!
//! A viewer who hits a protected block files an [`AccessRequest`]. The
//! owner approves by unwrapping the block's content key with their own
//! private key, re-wrapping it for the requester's published key, and
//! writing the resulting [`AccessGrant`] before marking the request
//! granted. The server only ever stores wrapped key material.

use crate::{
    blocks::BlockContent,
    keystore::LocalKeyStore,
    store::{generate_doc_id, require_public_key, DocumentStore},
    CoreError, Result,
};
use chrono::{DateTime, Utc};
use onelink_crypto::WrappedKey;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Lifecycle of an access request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessStatus {
    Pending,
    Granted,
    Denied,
}

impl AccessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessStatus::Pending => "pending",
            AccessStatus::Granted => "granted",
            AccessStatus::Denied => "denied",
        }
    }
}

/// A viewer's request to see a protected block
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessRequest {
    pub id: String,
    pub block_id: String,
    pub owner_id: String,
    pub requester_id: String,
    /// Snapshot of the requester's published key at request time
    pub requester_public_key: String,
    pub status: AccessStatus,
    pub created_at: DateTime<Utc>,
}

impl AccessRequest {
    pub fn is_pending(&self) -> bool {
        self.status == AccessStatus::Pending
    }
}

/// The block's content key, re-wrapped for one grantee
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessGrant {
    pub id: String,
    pub block_id: String,
    pub user_id: String,
    pub wrapped_key: WrappedKey,
    pub granted_at: DateTime<Utc>,
}

/// Owner-side approval flow over the document store
pub struct AccessControl<S> {
    store: Arc<S>,
    keys: LocalKeyStore,
}

impl<S: DocumentStore> AccessControl<S> {
    pub fn new(store: Arc<S>, keys: LocalKeyStore) -> Self {
        Self { store, keys }
    }

    /// File a pending request for a protected block
    ///
    /// The requester's current published key is snapshotted into the
    /// request so the owner approves against exactly what they saw.
    pub async fn request_access(&self, block_id: &str, requester_id: &str) -> Result<AccessRequest> {
        let block = self
            .store
            .get_block(block_id)
            .await?
            .ok_or_else(|| CoreError::BlockNotFound(block_id.to_string()))?;
        if !block.content.is_protected() {
            return Err(CoreError::BlockNotProtected(block_id.to_string()));
        }

        let requester_key = require_public_key(self.store.as_ref(), requester_id).await?;
        let request = AccessRequest {
            id: generate_doc_id(),
            block_id: block_id.to_string(),
            owner_id: block.owner_id.clone(),
            requester_id: requester_id.to_string(),
            requester_public_key: requester_key.to_base64()?,
            status: AccessStatus::Pending,
            created_at: Utc::now(),
        };
        self.store.put_access_request(&request).await?;
        debug!(request_id = %request.id, block_id, requester_id, "access requested");
        Ok(request)
    }

    /// Approve a pending request: re-wrap the block key and issue a grant
    ///
    /// The grant is written before the status flips to granted, so a crash
    /// in between leaves a re-approvable pending request rather than a
    /// granted request with no key. Approving an already granted request
    /// returns the existing grant unchanged.
    pub async fn approve(&self, request_id: &str) -> Result<AccessGrant> {
        let mut request = self
            .store
            .get_access_request(request_id)
            .await?
            .ok_or_else(|| CoreError::RequestNotFound(request_id.to_string()))?;

        match request.status {
            AccessStatus::Pending => {}
            AccessStatus::Granted => {
                // A crash after the grant write can leave the pair out of
                // sync, so prefer the grant record over the status flag.
                if let Some(existing) = self
                    .store
                    .find_grant(&request.block_id, &request.requester_id)
                    .await?
                {
                    return Ok(existing);
                }
            }
            AccessStatus::Denied => {
                return Err(CoreError::RequestNotPending {
                    request_id: request_id.to_string(),
                    status: request.status.as_str(),
                })
            }
        }

        let block = self
            .store
            .get_block(&request.block_id)
            .await?
            .ok_or_else(|| CoreError::BlockNotFound(request.block_id.clone()))?;
        let sealed = match &block.content {
            BlockContent::Sealed { encrypted_blob } => encrypted_blob,
            BlockContent::Plaintext { .. } => {
                return Err(CoreError::BlockNotProtected(block.id.clone()))
            }
        };

        let owner_private = self
            .keys
            .get(&block.owner_id)
            .ok_or_else(|| CoreError::OwnerKeyUnavailable(block.owner_id.clone()))?;
        let content_key = sealed.unwrap_content_key(&owner_private)?;

        let requester_key =
            onelink_crypto::IdentityPublicKey::from_base64(&request.requester_public_key)?;
        let grant = AccessGrant {
            id: generate_doc_id(),
            block_id: request.block_id.clone(),
            user_id: request.requester_id.clone(),
            wrapped_key: WrappedKey::wrap(&content_key, &requester_key)?,
            granted_at: Utc::now(),
        };

        // Grant first, status second.
        self.store.put_grant(&grant).await?;
        request.status = AccessStatus::Granted;
        self.store.put_access_request(&request).await?;
        info!(request_id, block_id = %grant.block_id, user_id = %grant.user_id, "access granted");
        Ok(grant)
    }

    /// Deny a pending request; no key material moves
    pub async fn deny(&self, request_id: &str) -> Result<()> {
        let mut request = self
            .store
            .get_access_request(request_id)
            .await?
            .ok_or_else(|| CoreError::RequestNotFound(request_id.to_string()))?;
        if !request.is_pending() {
            return Err(CoreError::RequestNotPending {
                request_id: request_id.to_string(),
                status: request.status.as_str(),
            });
        }
        request.status = AccessStatus::Denied;
        self.store.put_access_request(&request).await?;
        debug!(request_id, "access denied");
        Ok(())
    }

    /// Pending requests for blocks owned by the given user
    pub async fn pending_for_owner(&self, owner_id: &str) -> Result<Vec<AccessRequest>> {
        self.store.list_pending_requests(owner_id).await
    }
}
