//! Local private key store
//!
//! The only persistent secret on a device. Process-wide, keyed by user id,
//! with atomic store/get/delete — no two writers for the same user id ever
//! interleave. Populated at registration or vault recovery, cleared at
//! logout; nothing here ever reaches the document store.

use dashmap::DashMap;
use onelink_crypto::IdentityPrivateKey;
use std::sync::Arc;

/// Keyed store for local private keys
#[derive(Clone, Default)]
pub struct LocalKeyStore {
    keys: Arc<DashMap<String, IdentityPrivateKey>>,
}

impl LocalKeyStore {
    /// Create a new empty key store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a private key for a user, replacing any previous one
    pub fn store(&self, user_id: &str, key: IdentityPrivateKey) {
        self.keys.insert(user_id.to_string(), key);
    }

    /// Fetch a user's private key
    pub fn get(&self, user_id: &str) -> Option<IdentityPrivateKey> {
        self.keys.get(user_id).map(|e| e.value().clone())
    }

    /// Delete a user's private key; returns whether one existed
    pub fn delete(&self, user_id: &str) -> bool {
        self.keys.remove(user_id).is_some()
    }

    /// Check whether a key is present without cloning it
    pub fn contains(&self, user_id: &str) -> bool {
        self.keys.contains_key(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onelink_crypto::IdentityKeyPair;

    #[test]
    fn test_store_get_delete() {
        let store = LocalKeyStore::new();
        let kp = IdentityKeyPair::generate().unwrap();

        assert!(store.get("alice").is_none());
        store.store("alice", kp.private_key().clone());
        assert!(store.contains("alice"));
        assert_eq!(
            store.get("alice").unwrap().public_key(),
            *kp.public_key()
        );

        assert!(store.delete("alice"));
        assert!(!store.delete("alice"));
        assert!(store.get("alice").is_none());
    }

    #[test]
    fn test_keys_are_per_user() {
        let store = LocalKeyStore::new();
        let kp_a = IdentityKeyPair::generate().unwrap();
        let kp_b = IdentityKeyPair::generate().unwrap();

        store.store("a", kp_a.private_key().clone());
        store.store("b", kp_b.private_key().clone());

        assert_eq!(store.get("a").unwrap().public_key(), *kp_a.public_key());
        assert_eq!(store.get("b").unwrap().public_key(), *kp_b.public_key());
    }
}
