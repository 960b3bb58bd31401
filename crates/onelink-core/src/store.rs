//! Document store contract
//!
//! The surrounding application owns the real document database; this core
//! only relies on the logical shape below. The store is the system of
//! record for all wrapped-key and ciphertext material and is assumed to
//! give read-after-write consistency per document. It never sees
//! plaintext or private keys (vault records excluded — those are
//! ciphertext too).
//!
//! [`MemoryDocumentStore`] is the in-process implementation used by tests
//! and embedders.

use crate::{
    access::{AccessGrant, AccessRequest},
    blocks::LinkBlock,
    chat::{Conversation, EncryptedMessage},
    CoreError, Result,
};
use async_trait::async_trait;
use dashmap::DashMap;
use onelink_crypto::VaultRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A user profile document; `public_key` is the base64 SPKI published
/// after key generation, or `None` for users who have not provisioned yet
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub display_name: String,
    pub public_key: Option<String>,
}

impl UserProfile {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            public_key: None,
        }
    }
}

/// Generate a random 16-byte hex document id
pub(crate) fn generate_doc_id() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Trait for document store backends
#[async_trait]
pub trait DocumentStore: Send + Sync {
    // ---- users ----

    /// Fetch a user profile
    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>>;

    /// Create or overwrite a user profile
    async fn put_user(&self, profile: &UserProfile) -> Result<()>;

    // ---- vaults ----

    /// Fetch a user's vault record, if a backup exists
    async fn get_vault(&self, user_id: &str) -> Result<Option<VaultRecord>>;

    /// Create or overwrite a user's vault record
    async fn put_vault(&self, user_id: &str, record: &VaultRecord) -> Result<()>;

    /// Delete a user's vault record
    async fn delete_vault(&self, user_id: &str) -> Result<()>;

    // ---- link blocks ----

    /// Fetch a link block
    async fn get_block(&self, block_id: &str) -> Result<Option<LinkBlock>>;

    /// Create or overwrite a link block
    async fn put_block(&self, block: &LinkBlock) -> Result<()>;

    // ---- access requests and grants ----

    /// Fetch an access request
    async fn get_access_request(&self, request_id: &str) -> Result<Option<AccessRequest>>;

    /// Create or overwrite an access request
    async fn put_access_request(&self, request: &AccessRequest) -> Result<()>;

    /// List pending requests addressed to an owner
    async fn list_pending_requests(&self, owner_id: &str) -> Result<Vec<AccessRequest>>;

    /// Find the grant for a (block, user) pair, if one was issued
    async fn find_grant(&self, block_id: &str, user_id: &str) -> Result<Option<AccessGrant>>;

    /// Create or overwrite an access grant
    async fn put_grant(&self, grant: &AccessGrant) -> Result<()>;

    // ---- conversations ----

    /// Fetch a conversation document
    async fn get_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>>;

    /// Create or overwrite a conversation document
    async fn put_conversation(&self, conversation: &Conversation) -> Result<()>;

    // ---- messages ----

    /// Append a message to a conversation
    async fn append_message(&self, conversation_id: &str, message: &EncryptedMessage)
        -> Result<()>;

    /// List a conversation's messages in `created_at` order
    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<EncryptedMessage>>;

    /// Delete a single message
    async fn delete_message(&self, conversation_id: &str, message_id: &str) -> Result<()>;
}

/// An in-memory document store
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    users: Arc<DashMap<String, UserProfile>>,
    vaults: Arc<DashMap<String, VaultRecord>>,
    blocks: Arc<DashMap<String, LinkBlock>>,
    requests: Arc<DashMap<String, AccessRequest>>,
    grants: Arc<DashMap<(String, String), AccessGrant>>,
    conversations: Arc<DashMap<String, Conversation>>,
    messages: Arc<DashMap<String, Vec<EncryptedMessage>>>,
}

impl MemoryDocumentStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of user profiles stored
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Number of messages stored across all conversations
    pub fn message_count(&self) -> usize {
        self.messages.iter().map(|entry| entry.value().len()).sum()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.users.get(user_id).map(|e| e.value().clone()))
    }

    async fn put_user(&self, profile: &UserProfile) -> Result<()> {
        self.users.insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn get_vault(&self, user_id: &str) -> Result<Option<VaultRecord>> {
        Ok(self.vaults.get(user_id).map(|e| e.value().clone()))
    }

    async fn put_vault(&self, user_id: &str, record: &VaultRecord) -> Result<()> {
        self.vaults.insert(user_id.to_string(), record.clone());
        Ok(())
    }

    async fn delete_vault(&self, user_id: &str) -> Result<()> {
        self.vaults.remove(user_id);
        Ok(())
    }

    async fn get_block(&self, block_id: &str) -> Result<Option<LinkBlock>> {
        Ok(self.blocks.get(block_id).map(|e| e.value().clone()))
    }

    async fn put_block(&self, block: &LinkBlock) -> Result<()> {
        self.blocks.insert(block.id.clone(), block.clone());
        Ok(())
    }

    async fn get_access_request(&self, request_id: &str) -> Result<Option<AccessRequest>> {
        Ok(self.requests.get(request_id).map(|e| e.value().clone()))
    }

    async fn put_access_request(&self, request: &AccessRequest) -> Result<()> {
        self.requests.insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn list_pending_requests(&self, owner_id: &str) -> Result<Vec<AccessRequest>> {
        let mut pending: Vec<AccessRequest> = self
            .requests
            .iter()
            .filter(|e| e.value().owner_id == owner_id && e.value().is_pending())
            .map(|e| e.value().clone())
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(pending)
    }

    async fn find_grant(&self, block_id: &str, user_id: &str) -> Result<Option<AccessGrant>> {
        Ok(self
            .grants
            .get(&(block_id.to_string(), user_id.to_string()))
            .map(|e| e.value().clone()))
    }

    async fn put_grant(&self, grant: &AccessGrant) -> Result<()> {
        self.grants.insert(
            (grant.block_id.clone(), grant.user_id.clone()),
            grant.clone(),
        );
        Ok(())
    }

    async fn get_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        Ok(self
            .conversations
            .get(conversation_id)
            .map(|e| e.value().clone()))
    }

    async fn put_conversation(&self, conversation: &Conversation) -> Result<()> {
        self.conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    async fn append_message(
        &self,
        conversation_id: &str,
        message: &EncryptedMessage,
    ) -> Result<()> {
        self.messages
            .entry(conversation_id.to_string())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<EncryptedMessage>> {
        let mut messages = self
            .messages
            .get(conversation_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn delete_message(&self, conversation_id: &str, message_id: &str) -> Result<()> {
        if let Some(mut entry) = self.messages.get_mut(conversation_id) {
            entry.value_mut().retain(|m| m.id != message_id);
        }
        Ok(())
    }
}

/// Fetch a user's published public key or fail with the error the caller
/// should surface
pub(crate) async fn require_public_key<S: DocumentStore + ?Sized>(
    store: &S,
    user_id: &str,
) -> Result<onelink_crypto::IdentityPublicKey> {
    let profile = store
        .get_user(user_id)
        .await?
        .ok_or_else(|| CoreError::UserNotFound(user_id.to_string()))?;
    let b64 = profile
        .public_key
        .ok_or_else(|| CoreError::MissingIdentity(user_id.to_string()))?;
    Ok(onelink_crypto::IdentityPublicKey::from_base64(&b64)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_user_roundtrip() {
        let store = MemoryDocumentStore::new();
        let mut profile = UserProfile::new("alice", "Alice");
        profile.public_key = Some("spki".into());

        store.put_user(&profile).await.unwrap();
        let fetched = store.get_user("alice").await.unwrap().unwrap();
        assert_eq!(fetched.public_key.as_deref(), Some("spki"));

        assert!(store.get_user("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_public_key_surfaces_missing_identity() {
        let store = MemoryDocumentStore::new();
        store
            .put_user(&UserProfile::new("bob", "Bob"))
            .await
            .unwrap();

        assert!(matches!(
            require_public_key(&store, "bob").await,
            Err(CoreError::MissingIdentity(_))
        ));
        assert!(matches!(
            require_public_key(&store, "ghost").await,
            Err(CoreError::UserNotFound(_))
        ));
    }
}
