//! End-to-end encrypted conversations
//!
//! Each conversation carries one AES content key wrapped once per
//! participant in a [`ConversationKeyRing`]. Messages on the wire are
//! ciphertext plus IV only. Burn-after-reading messages carry an
//! `expires_at` deadline; readers filter them out and the sender deletes
//! its own expired copies the next time it reads the conversation.

use crate::{
    keystore::LocalKeyStore,
    store::{generate_doc_id, require_public_key, DocumentStore},
    CoreError, Result,
};
use chrono::{DateTime, Duration, Utc};
use onelink_crypto::{symmetric, ContentKey, IdentityPrivateKey, Iv, WrappedKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Shown in place of message bodies the local key cannot open
pub const UNDECRYPTABLE_PLACEHOLDER: &str = "[Unable to decrypt]";

/// Conversation preview text; real bodies never reach the server
const LAST_MESSAGE_PREVIEW: &str = "[Encrypted]";

/// One wrapped copy of the conversation key per participant
///
/// Removing an entry does not rotate the key; the removed participant can
/// still open anything they already synced. [`ChatService::remove_participant`]
/// establishes a fresh ring instead of editing this one.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConversationKeyRing {
    keys: HashMap<String, WrappedKey>,
}

impl ConversationKeyRing {
    /// Generate a fresh conversation key wrapped for every participant
    pub fn establish<'a, I>(participants: I) -> Result<(ContentKey, Self)>
    where
        I: IntoIterator<Item = (&'a str, &'a onelink_crypto::IdentityPublicKey)>,
    {
        let key = ContentKey::generate();
        let mut ring = Self::default();
        for (user_id, public) in participants {
            ring.keys
                .insert(user_id.to_string(), WrappedKey::wrap(&key, public)?);
        }
        Ok((key, ring))
    }

    /// Unwrap the calling user's copy of the conversation key
    pub fn resolve(&self, user_id: &str, private: &IdentityPrivateKey) -> Result<ContentKey> {
        let wrapped = self
            .keys
            .get(user_id)
            .ok_or_else(|| CoreError::KeyNotEstablished {
                conversation_id: String::new(),
                user_id: user_id.to_string(),
            })?;
        Ok(wrapped.unwrap_with(private)?)
    }

    /// Wrap the existing conversation key for a new participant
    pub fn add(
        &mut self,
        user_id: &str,
        key: &ContentKey,
        public: &onelink_crypto::IdentityPublicKey,
    ) -> Result<()> {
        self.keys
            .insert(user_id.to_string(), WrappedKey::wrap(key, public)?);
        Ok(())
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.keys.contains_key(user_id)
    }

    pub fn participant_ids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }
}

/// A conversation document
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub key_ring: ConversationKeyRing,
    /// Opaque preview; the server never sees a real body
    pub last_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A message at rest: ciphertext, IV, and routing metadata only
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncryptedMessage {
    pub id: String,
    pub sender_id: String,
    #[serde(with = "onelink_crypto::codec::base64_vec")]
    pub ciphertext: Vec<u8>,
    pub iv: Iv,
    pub created_at: DateTime<Utc>,
    /// Burn-after-reading deadline, if any
    pub expires_at: Option<DateTime<Utc>>,
}

impl EncryptedMessage {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// A decrypted message as handed to the UI
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Conversation and message service over the document store
pub struct ChatService<S> {
    store: Arc<S>,
    keys: LocalKeyStore,
}

impl<S: DocumentStore> ChatService<S> {
    pub fn new(store: Arc<S>, keys: LocalKeyStore) -> Self {
        Self { store, keys }
    }

    /// Create a conversation with a fresh key wrapped for every participant
    pub async fn establish(&self, participant_ids: &[&str]) -> Result<Conversation> {
        let ring = self.build_ring(participant_ids).await?;
        let conversation = Conversation {
            id: generate_doc_id(),
            key_ring: ring,
            last_message: None,
            updated_at: Utc::now(),
        };
        self.store.put_conversation(&conversation).await?;
        info!(conversation_id = %conversation.id, participants = participant_ids.len(), "conversation established");
        Ok(conversation)
    }

    /// Unwrap the conversation key as the given user
    pub async fn resolve_shared_key(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<ContentKey> {
        let conversation = self.require_conversation(conversation_id).await?;
        let private = self
            .keys
            .get(user_id)
            .ok_or_else(|| CoreError::KeyUnavailable(user_id.to_string()))?;
        conversation
            .key_ring
            .resolve(user_id, &private)
            .map_err(|e| match e {
                CoreError::KeyNotEstablished { user_id, .. } => CoreError::KeyNotEstablished {
                    conversation_id: conversation_id.to_string(),
                    user_id,
                },
                other => other,
            })
    }

    /// Wrap the existing key for a new participant
    ///
    /// `actor_id` must already hold a ring entry; they resolve the key and
    /// re-wrap it, so the server never sees it in the clear.
    pub async fn add_participant(
        &self,
        conversation_id: &str,
        actor_id: &str,
        new_user_id: &str,
    ) -> Result<()> {
        let key = self.resolve_shared_key(conversation_id, actor_id).await?;
        let public = require_public_key(self.store.as_ref(), new_user_id).await?;

        let mut conversation = self.require_conversation(conversation_id).await?;
        conversation.key_ring.add(new_user_id, &key, &public)?;
        conversation.updated_at = Utc::now();
        self.store.put_conversation(&conversation).await?;
        debug!(conversation_id, new_user_id, "participant added");
        Ok(())
    }

    /// Remove a participant by rotating to a fresh key ring
    ///
    /// Old messages stay encrypted under the old key, which the removed
    /// participant may have synced; everything sent after removal uses a
    /// key they never receive.
    pub async fn remove_participant(
        &self,
        conversation_id: &str,
        removed_user_id: &str,
    ) -> Result<()> {
        let mut conversation = self.require_conversation(conversation_id).await?;
        let remaining: Vec<String> = conversation
            .key_ring
            .participant_ids()
            .filter(|id| *id != removed_user_id)
            .map(str::to_string)
            .collect();
        let remaining_refs: Vec<&str> = remaining.iter().map(String::as_str).collect();

        conversation.key_ring = self.build_ring(&remaining_refs).await?;
        conversation.updated_at = Utc::now();
        self.store.put_conversation(&conversation).await?;
        info!(conversation_id, removed_user_id, "participant removed, key rotated");
        Ok(())
    }

    /// Encrypt and append a message; `ttl` marks it burn-after-reading
    pub async fn send_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        body: &str,
        ttl: Option<Duration>,
    ) -> Result<EncryptedMessage> {
        let key = self.resolve_shared_key(conversation_id, sender_id).await?;
        let (iv, ciphertext) = symmetric::encrypt(&key, body.as_bytes())?;

        let now = Utc::now();
        let message = EncryptedMessage {
            id: generate_doc_id(),
            sender_id: sender_id.to_string(),
            ciphertext,
            iv,
            created_at: now,
            expires_at: ttl.map(|ttl| now + ttl),
        };
        self.store.append_message(conversation_id, &message).await?;

        let mut conversation = self.require_conversation(conversation_id).await?;
        conversation.last_message = Some(LAST_MESSAGE_PREVIEW.to_string());
        conversation.updated_at = now;
        self.store.put_conversation(&conversation).await?;
        debug!(conversation_id, message_id = %message.id, expiring = message.expires_at.is_some(), "message sent");
        Ok(message)
    }

    /// Decrypt the conversation for the given reader, oldest first
    ///
    /// Expired messages are skipped; if the reader sent them, their stored
    /// copies are deleted here rather than by a background job. Messages
    /// the resolved key cannot open render as a placeholder body instead
    /// of failing the whole read.
    pub async fn read_messages(
        &self,
        conversation_id: &str,
        reader_id: &str,
    ) -> Result<Vec<ChatMessage>> {
        let key = self.resolve_shared_key(conversation_id, reader_id).await?;
        let now = Utc::now();

        let mut visible = Vec::new();
        for message in self.store.list_messages(conversation_id).await? {
            if message.is_expired(now) {
                if message.sender_id == reader_id {
                    self.store
                        .delete_message(conversation_id, &message.id)
                        .await?;
                    debug!(conversation_id, message_id = %message.id, "expired message deleted");
                }
                continue;
            }
            let body = match symmetric::decrypt(&key, &message.iv, &message.ciphertext) {
                Ok(bytes) => String::from_utf8(bytes)
                    .unwrap_or_else(|_| UNDECRYPTABLE_PLACEHOLDER.to_string()),
                Err(_) => UNDECRYPTABLE_PLACEHOLDER.to_string(),
            };
            visible.push(ChatMessage {
                id: message.id,
                sender_id: message.sender_id,
                body,
                created_at: message.created_at,
                expires_at: message.expires_at,
            });
        }
        Ok(visible)
    }

    async fn build_ring(&self, participant_ids: &[&str]) -> Result<ConversationKeyRing> {
        let mut publics = Vec::with_capacity(participant_ids.len());
        for id in participant_ids {
            publics.push((*id, require_public_key(self.store.as_ref(), id).await?));
        }
        let (_, ring) = ConversationKeyRing::establish(
            publics.iter().map(|(id, public)| (*id, public)),
        )?;
        Ok(ring)
    }

    async fn require_conversation(&self, conversation_id: &str) -> Result<Conversation> {
        self.store
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| CoreError::ConversationNotFound(conversation_id.to_string()))
    }
}
