//! Protected link blocks
//!
//! A link block is either stored in the clear (public visibility) or as an
//! envelope sealed for the owner's own public key — exactly one of the two
//! forms is ever populated. Non-owners read a protected block through an
//! access grant issued by the owner (see [`crate::access`]).

use crate::{
    keystore::LocalKeyStore,
    store::{generate_doc_id, require_public_key, DocumentStore},
    CoreError, Result,
};
use chrono::{DateTime, Utc};
use onelink_crypto::{envelope, CryptoError, Envelope};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Who may see a block's content
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Anyone; content stored in the clear
    Public,
    /// Accepted friends, via access grants
    Friends,
    /// Owner only, unless individually granted
    Private,
}

/// Block content: plaintext or a sealed envelope, never both
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockContent {
    Plaintext { plaintext: String },
    Sealed { encrypted_blob: Envelope },
}

impl BlockContent {
    pub fn is_protected(&self) -> bool {
        matches!(self, BlockContent::Sealed { .. })
    }
}

/// A link block document
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinkBlock {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub visibility: Visibility,
    pub content: BlockContent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Link block publish/read service
pub struct BlockService<S> {
    store: Arc<S>,
    keys: LocalKeyStore,
}

impl<S: DocumentStore> BlockService<S> {
    pub fn new(store: Arc<S>, keys: LocalKeyStore) -> Self {
        Self { store, keys }
    }

    /// Publish a block; non-public visibility seals the body for the
    /// owner's own published key
    pub async fn publish(
        &self,
        owner_id: &str,
        title: &str,
        visibility: Visibility,
        body: &str,
    ) -> Result<LinkBlock> {
        let content = match visibility {
            Visibility::Public => BlockContent::Plaintext {
                plaintext: body.to_string(),
            },
            Visibility::Friends | Visibility::Private => {
                let owner_public = require_public_key(self.store.as_ref(), owner_id).await?;
                BlockContent::Sealed {
                    encrypted_blob: envelope::seal_for(body.as_bytes(), &owner_public)?,
                }
            }
        };

        let now = Utc::now();
        let block = LinkBlock {
            id: generate_doc_id(),
            owner_id: owner_id.to_string(),
            title: title.to_string(),
            visibility,
            content,
            created_at: now,
            updated_at: now,
        };
        self.store.put_block(&block).await?;
        debug!(block_id = %block.id, owner_id, ?visibility, "block published");
        Ok(block)
    }

    /// Read a block's body as the given user
    ///
    /// Owner path first (the envelope's own wrapped key), then the access
    /// grant issued to the reader. Distinguishes "not shared with you"
    /// ([`CoreError::AccessNotGranted`]) from corrupted data
    /// ([`CryptoError::Decryption`] and friends) so callers can render
    /// each properly.
    pub async fn read(&self, block_id: &str, reader_id: &str) -> Result<String> {
        let block = self
            .store
            .get_block(block_id)
            .await?
            .ok_or_else(|| CoreError::BlockNotFound(block_id.to_string()))?;

        let sealed = match &block.content {
            BlockContent::Plaintext { plaintext } => return Ok(plaintext.clone()),
            BlockContent::Sealed { encrypted_blob } => encrypted_blob,
        };

        let private = self
            .keys
            .get(reader_id)
            .ok_or_else(|| CoreError::KeyUnavailable(reader_id.to_string()))?;

        // Owner path: the envelope's wrapped key was made for the owner.
        match sealed.open_with(&private) {
            Ok(bytes) => return decode_body(bytes),
            Err(CryptoError::Decryption(_)) | Err(CryptoError::KeyMismatch) => {}
            Err(other) => return Err(other.into()),
        }

        // Grant path: the owner re-wrapped the content key for this reader.
        let grant = self
            .store
            .find_grant(block_id, reader_id)
            .await?
            .ok_or_else(|| CoreError::AccessNotGranted {
                block_id: block_id.to_string(),
                user_id: reader_id.to_string(),
            })?;

        let content_key = grant.wrapped_key.unwrap_with(&private)?;
        decode_body(sealed.open_with_key(&content_key)?)
    }
}

fn decode_body(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
}
