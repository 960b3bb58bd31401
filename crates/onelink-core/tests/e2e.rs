//! End-to-end scenarios across the identity, vault, access, and chat services.

use std::sync::Arc;

use chrono::Duration;
use onelink_core::{
    AccessControl, BlockService, ChatService, CoreError, DocumentStore, IdentityService,
    IdentityStatus, LocalKeyStore, MemoryDocumentStore, UserProfile, Visibility,
};

struct Platform {
    store: Arc<MemoryDocumentStore>,
    keys: LocalKeyStore,
    identity: IdentityService<MemoryDocumentStore>,
    blocks: BlockService<MemoryDocumentStore>,
    access: AccessControl<MemoryDocumentStore>,
    chat: ChatService<MemoryDocumentStore>,
}

impl Platform {
    fn new() -> Self {
        let store = Arc::new(MemoryDocumentStore::new());
        let keys = LocalKeyStore::new();
        Self {
            identity: IdentityService::new(store.clone(), keys.clone()),
            blocks: BlockService::new(store.clone(), keys.clone()),
            access: AccessControl::new(store.clone(), keys.clone()),
            chat: ChatService::new(store.clone(), keys.clone()),
            store,
            keys,
        }
    }

    async fn sign_up(&self, id: &str) {
        self.store
            .put_user(&UserProfile::new(id, id))
            .await
            .unwrap();
        let status = self.identity.ensure_identity(id).await.unwrap();
        assert_eq!(status, IdentityStatus::Generated);
    }
}

#[tokio::test]
async fn test_share_protected_block_end_to_end() {
    let platform = Platform::new();
    platform.sign_up("alice").await;
    platform.sign_up("bob").await;

    // Alice publishes a protected block; Bob cannot read it yet.
    let block = platform
        .blocks
        .publish("alice", "Secret link", Visibility::Private, "secret-url")
        .await
        .unwrap();
    assert!(matches!(
        platform.blocks.read(&block.id, "bob").await,
        Err(CoreError::AccessNotGranted { .. })
    ));

    // Bob requests, Alice sees it in her queue and approves.
    let request = platform.access.request_access(&block.id, "bob").await.unwrap();
    let pending = platform.access.pending_for_owner("alice").await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, request.id);

    platform.access.approve(&request.id).await.unwrap();
    assert_eq!(
        platform.blocks.read(&block.id, "bob").await.unwrap(),
        "secret-url"
    );

    // Alice can still read her own block through the owner path.
    assert_eq!(
        platform.blocks.read(&block.id, "alice").await.unwrap(),
        "secret-url"
    );
}

#[tokio::test]
async fn test_vault_recovery_restores_access() {
    let platform = Platform::new();
    platform.sign_up("alice").await;

    let block = platform
        .blocks
        .publish("alice", "Secret", Visibility::Private, "secret-url")
        .await
        .unwrap();

    platform
        .identity
        .backup_to_vault("alice", "correct horse battery staple")
        .await
        .unwrap();

    // New device: no local key, so reads fail and identity reports recovery.
    platform.identity.logout("alice");
    assert!(matches!(
        platform.blocks.read(&block.id, "alice").await,
        Err(CoreError::KeyUnavailable(_))
    ));
    assert_eq!(
        platform.identity.ensure_identity("alice").await.unwrap(),
        IdentityStatus::RecoveryRequired
    );

    // Wrong passphrase stays out; the right one restores everything.
    assert!(matches!(
        platform
            .identity
            .recover_from_vault("alice", "wrong passphrase")
            .await,
        Err(CoreError::Crypto(
            onelink_crypto::CryptoError::InvalidPassphrase
        ))
    ));
    platform
        .identity
        .recover_from_vault("alice", "correct horse battery staple")
        .await
        .unwrap();
    assert_eq!(
        platform.blocks.read(&block.id, "alice").await.unwrap(),
        "secret-url"
    );
}

#[tokio::test]
async fn test_regenerate_orphans_old_grants() {
    let platform = Platform::new();
    platform.sign_up("alice").await;
    platform.sign_up("bob").await;

    let block = platform
        .blocks
        .publish("alice", "Secret", Visibility::Private, "secret-url")
        .await
        .unwrap();
    let request = platform.access.request_access(&block.id, "bob").await.unwrap();
    platform.access.approve(&request.id).await.unwrap();

    // Bob regenerates his keypair; his old grant was wrapped for the old key.
    platform.identity.regenerate("bob").await.unwrap();
    assert!(platform.blocks.read(&block.id, "bob").await.is_err());

    // A fresh request/approve cycle against the new key works again.
    let request = platform.access.request_access(&block.id, "bob").await.unwrap();
    platform.access.approve(&request.id).await.unwrap();
    assert_eq!(
        platform.blocks.read(&block.id, "bob").await.unwrap(),
        "secret-url"
    );
}

#[tokio::test]
async fn test_group_chat_with_expiring_messages() {
    let platform = Platform::new();
    for id in ["alice", "bob", "carol"] {
        platform.sign_up(id).await;
    }

    let conv = platform.chat.establish(&["alice", "bob", "carol"]).await.unwrap();
    platform
        .chat
        .send_message(&conv.id, "alice", "welcome", None)
        .await
        .unwrap();
    platform
        .chat
        .send_message(&conv.id, "bob", "this will burn", Some(Duration::milliseconds(-1)))
        .await
        .unwrap();

    // Everyone sees the durable message; the expired one is hidden.
    for reader in ["alice", "bob", "carol"] {
        let bodies: Vec<String> = platform
            .chat
            .read_messages(&conv.id, reader)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.body)
            .collect();
        assert_eq!(bodies, ["welcome"]);
    }

    // Bob's read above deleted his expired copy from the store.
    assert_eq!(platform.store.message_count(), 1);

    // Carol is removed; she keeps no path to new messages.
    platform.chat.remove_participant(&conv.id, "carol").await.unwrap();
    platform
        .chat
        .send_message(&conv.id, "alice", "carol is gone", None)
        .await
        .unwrap();
    assert!(matches!(
        platform.chat.resolve_shared_key(&conv.id, "carol").await,
        Err(CoreError::KeyNotEstablished { .. })
    ));
    let latest = platform.chat.read_messages(&conv.id, "bob").await.unwrap();
    assert_eq!(latest.last().unwrap().body, "carol is gone");
}

#[tokio::test]
async fn test_logout_keeps_published_identity() {
    let platform = Platform::new();
    platform.sign_up("alice").await;

    platform.identity.logout("alice");
    assert!(!platform.keys.contains("alice"));

    // The published key survives, so the next sign-in demands recovery
    // instead of silently generating a second identity.
    assert_eq!(
        platform.identity.ensure_identity("alice").await.unwrap(),
        IdentityStatus::RecoveryRequired
    );
}
