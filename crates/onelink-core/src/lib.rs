//! # OneLink Core
//!
//! Key-management and sharing services for the OneLink platform.
//!
//! This crate provides:
//! - **Identity lifecycle**: keypair bootstrap, republish, and passphrase-vault recovery
//! - **Protected blocks**: content sealed for the owner, opened via access grants
//! - **Access control**: request/approve/deny flow that re-wraps keys per grantee
//! - **Encrypted chat**: per-conversation key rings with burn-after-reading messages
//!
//! All services run against a [`store::DocumentStore`], the seam between
//! the end-to-end crypto in `onelink-crypto` and whatever document
//! database backs a deployment. Private keys live only in a
//! [`keystore::LocalKeyStore`]; the store sees public keys, wrapped keys,
//! and ciphertext.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │   IdentityService │ BlockService │ Chat     │
//! ├─────────────────────────────────────────────┤
//! │        AccessControl (request/grant)        │
//! ├─────────────────────────────────────────────┤
//! │   LocalKeyStore   │    DocumentStore        │
//! ├─────────────────────────────────────────────┤
//! │            onelink-crypto                   │
//! └─────────────────────────────────────────────┘
//! ```

pub mod access;
pub mod blocks;
pub mod chat;
pub mod error;
pub mod identity;
pub mod keystore;
pub mod store;

pub use access::{AccessControl, AccessGrant, AccessRequest, AccessStatus};
pub use blocks::{BlockContent, BlockService, LinkBlock, Visibility};
pub use chat::{ChatMessage, ChatService, Conversation, ConversationKeyRing, EncryptedMessage};
pub use error::{CoreError, Result};
pub use identity::{IdentityService, IdentityStatus};
pub use keystore::LocalKeyStore;
pub use store::{DocumentStore, MemoryDocumentStore, UserProfile};
