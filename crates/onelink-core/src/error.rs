//! Error types for the onelink-core crate

use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in core service operations
///
/// Key-material errors are terminal and user-actionable (recovery flow,
/// re-request access); they are never retried automatically.
#[derive(Error, Debug)]
pub enum CoreError {
    /// User not found in the document store
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// Link block not found
    #[error("block not found: {0}")]
    BlockNotFound(String),

    /// Access request not found
    #[error("access request not found: {0}")]
    RequestNotFound(String),

    /// Conversation not found
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    /// The user has no published public key; nothing can be wrapped for
    /// them yet
    #[error("user {0} has no published public key")]
    MissingIdentity(String),

    /// The owner's local private key is absent; recovery is required
    /// before any grant can be issued
    #[error("owner {0} has no local private key; recover it first")]
    OwnerKeyUnavailable(String),

    /// The local private key for this user is absent on this device
    #[error("no local private key for user {0}")]
    KeyUnavailable(String),

    /// The conversation has no wrapped-key entry for this user yet
    #[error("conversation key not established for user {user_id} in {conversation_id}")]
    KeyNotEstablished {
        conversation_id: String,
        user_id: String,
    },

    /// An access request in a terminal state cannot transition again
    #[error("access request {request_id} is {status}, not pending")]
    RequestNotPending {
        request_id: String,
        status: &'static str,
    },

    /// The block is stored in the clear; there is no content key to grant
    #[error("block {0} is not protected")]
    BlockNotProtected(String),

    /// No access grant exists for this reader and block
    #[error("no access grant for user {user_id} on block {block_id}")]
    AccessNotGranted {
        block_id: String,
        user_id: String,
    },

    /// Cryptographic failure from the crypto core
    #[error("crypto error: {0}")]
    Crypto(#[from] onelink_crypto::CryptoError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Document store backend failure
    #[error("store error: {0}")]
    Store(String),
}
