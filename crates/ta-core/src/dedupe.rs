//! Content-level duplicate detection.
//!
//! A hash cache over incident content, owned by whichever service needs
//! duplicate detection and synced explicitly from its store. Entries expire
//! so a long-lived cache does not diverge from out-of-band deletions.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use crate::vector::{IncidentStore, StoreError};

/// Default entry lifetime (one hour).
pub const DEFAULT_HASH_TTL: Duration = Duration::from_secs(60 * 60);

/// SHA-256 cache of already-seen incident content.
pub struct ContentHashCache {
    entries: RwLock<HashMap<String, Instant>>,
    ttl: Duration,
}

impl ContentHashCache {
    /// Creates an empty cache with the given entry lifetime.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Hex-encoded SHA-256 of `content`.
    pub fn hash(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Records `content` as seen. Returns its hash.
    pub async fn insert(&self, content: &str) -> String {
        let hash = Self::hash(content);
        self.entries
            .write()
            .await
            .insert(hash.clone(), Instant::now());
        hash
    }

    /// Whether unexpired content with the same hash was seen.
    pub async fn contains(&self, content: &str) -> bool {
        let hash = Self::hash(content);
        let entries = self.entries.read().await;
        match entries.get(&hash) {
            Some(inserted_at) => inserted_at.elapsed() <= self.ttl,
            None => false,
        }
    }

    /// Drops expired entries.
    pub async fn cleanup(&self) {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, inserted_at| inserted_at.elapsed() <= self.ttl);
        debug!(
            removed = before - entries.len(),
            remaining = entries.len(),
            "Hash cache cleanup"
        );
    }

    /// Rebuilds the cache from the store's current contents.
    pub async fn sync_with_store(&self, store: &dyn IncidentStore) -> Result<(), StoreError> {
        let incidents = store.list_all().await?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.clear();
        for incident in &incidents {
            entries.insert(Self::hash(&incident.content), now);
        }
        debug!(entries = entries.len(), "Hash cache synced with store");
        Ok(())
    }

    /// Drops every entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Number of cached hashes.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for ContentHashCache {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::Incident;
    use crate::vector::InMemoryIncidentStore;

    #[tokio::test]
    async fn test_insert_and_contains() {
        let cache = ContentHashCache::default();
        assert!(!cache.contains("port scan").await);

        cache.insert("port scan").await;
        assert!(cache.contains("port scan").await);
        assert!(!cache.contains("port scan from new host").await);
    }

    #[tokio::test]
    async fn test_expired_entries_are_not_matched() {
        let cache = ContentHashCache::new(Duration::from_millis(10));
        cache.insert("short lived").await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(!cache.contains("short lived").await);
        cache.cleanup().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_sync_with_store_replaces_contents() {
        let store = InMemoryIncidentStore::new(4);
        let incident = Incident::new("malware beacon to known c2", "test");
        store.upsert(&incident, &[1.0, 0.0, 0.0, 0.0]).await.unwrap();

        let cache = ContentHashCache::default();
        cache.insert("stale entry").await;

        cache.sync_with_store(&store).await.unwrap();
        assert_eq!(cache.len().await, 1);
        assert!(cache.contains("malware beacon to known c2").await);
        assert!(!cache.contains("stale entry").await);
    }
}
