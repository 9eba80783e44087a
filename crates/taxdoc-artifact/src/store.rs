//! Artifact store trait and in-memory implementation

use crate::error::ArtifactError;
use crate::hash::ContentHash;
use crate::record::{ArtifactKey, FilledArtifact, RetrievalUrl, StoredArtifact};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// Append-only versioned document storage
///
/// # Contract
/// - `put` always allocates a new version, even for identical bytes
/// - versions for a key are `1..=N` with no gaps or repeats, also under
///   concurrent writers
/// - nothing is ever overwritten or deleted
#[async_trait]
pub trait ArtifactStore: Send + Sync + Debug {
    /// Store bytes as the next version of `key`
    async fn put(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<FilledArtifact, ArtifactError>;

    /// Newest version, if any
    async fn get_latest(&self, key: &ArtifactKey) -> Result<Option<StoredArtifact>, ArtifactError>;

    /// A specific version, if it exists
    async fn get_version(
        &self,
        key: &ArtifactKey,
        version: u64,
    ) -> Result<Option<StoredArtifact>, ArtifactError>;

    /// All version records, newest first
    async fn list_versions(&self, key: &ArtifactKey) -> Result<Vec<FilledArtifact>, ArtifactError>;

    /// Issue a time-limited retrieval URL for a stored version
    fn retrieval_url(&self, record: &FilledArtifact, ttl: Duration) -> RetrievalUrl;
}

pub(crate) fn expiry(ttl: Duration) -> chrono::DateTime<Utc> {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(1));
    Utc::now() + ttl
}

/// Process-local store
///
/// Version allocation happens while holding the key's map entry, so the
/// read-increment-append is atomic per key.
#[derive(Debug, Default, Clone)]
pub struct InMemoryArtifactStore {
    versions: Arc<DashMap<ArtifactKey, Vec<StoredArtifact>>>,
}

impl InMemoryArtifactStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with at least one version
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.versions.len()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn put(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<FilledArtifact, ArtifactError> {
        key.validate()?;
        let mut entry = self.versions.entry(key.clone()).or_default();
        let version = entry.len() as u64 + 1;
        let record = FilledArtifact {
            key: key.clone(),
            version,
            content_hash: ContentHash::of(bytes),
            stored_at: Utc::now(),
            storage_key: key.storage_key(version),
            size_bytes: bytes.len(),
        };
        entry.push(StoredArtifact {
            record: record.clone(),
            bytes: bytes.to_vec(),
        });
        drop(entry);

        tracing::info!(
            key = %key,
            version,
            hash = %record.content_hash.short(),
            "stored artifact version"
        );
        Ok(record)
    }

    async fn get_latest(&self, key: &ArtifactKey) -> Result<Option<StoredArtifact>, ArtifactError> {
        self.versions
            .get(key)
            .and_then(|v| v.last().cloned())
            .map(StoredArtifact::verified)
            .transpose()
    }

    async fn get_version(
        &self,
        key: &ArtifactKey,
        version: u64,
    ) -> Result<Option<StoredArtifact>, ArtifactError> {
        let index = match version.checked_sub(1) {
            Some(i) => i as usize,
            None => return Ok(None),
        };
        self.versions
            .get(key)
            .and_then(|v| v.get(index).cloned())
            .map(StoredArtifact::verified)
            .transpose()
    }

    async fn list_versions(&self, key: &ArtifactKey) -> Result<Vec<FilledArtifact>, ArtifactError> {
        Ok(self
            .versions
            .get(key)
            .map(|v| v.iter().rev().map(|s| s.record.clone()).collect())
            .unwrap_or_default())
    }

    fn retrieval_url(&self, record: &FilledArtifact, ttl: Duration) -> RetrievalUrl {
        let expires_at = expiry(ttl);
        RetrievalUrl {
            url: format!(
                "memory://{}?expires={}",
                record.storage_key,
                expires_at.timestamp()
            ),
            expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key() -> ArtifactKey {
        ArtifactKey::new("client-1", "1040", 2024)
    }

    #[tokio::test]
    async fn identical_bytes_get_new_versions() {
        let store = InMemoryArtifactStore::new();
        let a = store.put(&key(), b"same").await.unwrap();
        let b = store.put(&key(), b"same").await.unwrap();
        assert_eq!(a.version, 1);
        assert_eq!(b.version, 2);
        assert_eq!(a.content_hash, b.content_hash);
        assert_ne!(a.storage_key, b.storage_key);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = InMemoryArtifactStore::new();
        for i in 0..3u8 {
            store.put(&key(), &[i]).await.unwrap();
        }
        let versions: Vec<u64> = store
            .list_versions(&key())
            .await
            .unwrap()
            .iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(versions, vec![3, 2, 1]);

        let latest = store.get_latest(&key()).await.unwrap().unwrap();
        assert_eq!(latest.bytes, vec![2]);
        let first = store.get_version(&key(), 1).await.unwrap().unwrap();
        assert_eq!(first.bytes, vec![0]);
        assert!(store.get_version(&key(), 0).await.unwrap().is_none());
        assert!(store.get_version(&key(), 9).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let store = InMemoryArtifactStore::new();
        store.put(&key(), b"a").await.unwrap();
        let other = ArtifactKey::new("client-2", "1040", 2024);
        let record = store.put(&other, b"b").await.unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(store.key_count(), 2);
        assert!(store
            .get_latest(&ArtifactKey::new("nobody", "1040", 2024))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_never_collide() {
        let store = InMemoryArtifactStore::new();
        let mut handles = Vec::new();
        for i in 0..32u8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.put(&key(), &[i]).await.unwrap().version
            }));
        }
        let mut versions = Vec::new();
        for h in handles {
            versions.push(h.await.unwrap());
        }
        versions.sort_unstable();
        assert_eq!(versions, (1..=32).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn retrieval_url_names_storage_key() {
        let store = InMemoryArtifactStore::new();
        let record = store.put(&key(), b"x").await.unwrap();
        let url = store.retrieval_url(&record, Duration::from_secs(60));
        assert!(url.url.starts_with("memory://client-1/1040/2024/v000001?expires="));
        assert!(url.expires_at > record.stored_at);
    }
}
