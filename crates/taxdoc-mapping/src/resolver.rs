//! Cached mapping resolver
//!
//! Flattened mappings are read-mostly and cached process-wide per
//! (form type, tax year). There is no TTL: entries leave the cache only
//! through [`MappingResolver::invalidate`] or an administrative patch.
//!
//! Loads hold a shared admin lock from the store read until the cache
//! insert; patches and invalidation hold it exclusively, so a load that
//! read the store before a patch cannot cache its result after the
//! invalidation.

use crate::document::MappingPatch;
use crate::error::MappingError;
use crate::mapping::SemanticMapping;
use crate::store::MappingStore;
use moka::future::Cache;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Default number of (form, year) mappings kept in memory
pub const DEFAULT_CACHE_CAPACITY: u64 = 64;

/// Loads, caches and administers semantic mappings
#[derive(Debug, Clone)]
pub struct MappingResolver {
    store: Arc<dyn MappingStore>,
    cache: Cache<(String, u16), Arc<SemanticMapping>>,
    admin: Arc<RwLock<()>>,
}

impl MappingResolver {
    /// Create resolver with default cache capacity
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn MappingStore>) -> Self {
        Self::with_capacity(store, DEFAULT_CACHE_CAPACITY)
    }

    /// Create resolver with a specific cache capacity
    #[inline]
    #[must_use]
    pub fn with_capacity(store: Arc<dyn MappingStore>, capacity: u64) -> Self {
        Self {
            store,
            cache: Cache::new(capacity),
            admin: Arc::new(RwLock::new(())),
        }
    }

    /// Flattened mapping for a form and year
    ///
    /// # Errors
    /// - `MappingError::NotFound` when the store has no document
    /// - `MappingError::KeyMismatch` when the stored document names another key
    /// - store and decode errors, unmodified
    #[tracing::instrument(skip(self))]
    pub async fn load(&self, form_type: &str, tax_year: u16) -> Result<Arc<SemanticMapping>, MappingError> {
        let key = (form_type.to_string(), tax_year);
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached);
        }

        let _guard = self.admin.read().await;
        let document = self
            .store
            .get(form_type, tax_year)
            .await?
            .ok_or_else(|| MappingError::not_found(form_type, tax_year))?;
        if document.form_type != form_type || document.tax_year != tax_year {
            return Err(MappingError::KeyMismatch {
                expected: format!("{form_type}/{tax_year}"),
                found: format!("{}/{}", document.form_type, document.tax_year),
            });
        }

        let mapping = Arc::new(SemanticMapping::flatten(&document)?);
        tracing::info!(
            form_type,
            tax_year,
            keys = mapping.len(),
            patches = document.patches.len(),
            "loaded semantic mapping"
        );
        self.cache.insert(key, Arc::clone(&mapping)).await;
        Ok(mapping)
    }

    /// Administrative patch: upsert the named patch, persist, invalidate
    ///
    /// The patched document is flattened before it is written, so a patch
    /// that cannot load is never persisted.
    ///
    /// # Errors
    /// - `MappingError::UnknownPatch` for names outside the sequence
    /// - `MappingError::NotFound` when there is no document to patch
    /// - store errors, unmodified
    #[tracing::instrument(skip(self, patch), fields(patch = %patch.name, version = patch.version))]
    pub async fn apply_patch(
        &self,
        form_type: &str,
        tax_year: u16,
        patch: MappingPatch,
    ) -> Result<Arc<SemanticMapping>, MappingError> {
        let _guard = self.admin.write().await;
        let mut document = self
            .store
            .get(form_type, tax_year)
            .await?
            .ok_or_else(|| MappingError::not_found(form_type, tax_year))?;

        if let Some(previous) = document.upsert_patch(patch)? {
            tracing::info!(previous_version = previous.version, "replacing mapping patch");
        }
        let mapping = Arc::new(SemanticMapping::flatten(&document)?);

        self.store.put(document).await?;
        self.evict(form_type, tax_year).await;
        Ok(mapping)
    }

    /// Drop the cached mapping for a form and year
    pub async fn invalidate(&self, form_type: &str, tax_year: u16) {
        let _guard = self.admin.write().await;
        self.evict(form_type, tax_year).await;
    }

    async fn evict(&self, form_type: &str, tax_year: u16) {
        self.cache
            .invalidate(&(form_type.to_string(), tax_year))
            .await;
        tracing::debug!(form_type, tax_year, "invalidated cached mapping");
    }

    /// Whether a mapping is currently cached
    #[must_use]
    pub async fn is_cached(&self, form_type: &str, tax_year: u16) -> bool {
        self.cache
            .get(&(form_type.to_string(), tax_year))
            .await
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{MappingDocument, PatchName};
    use crate::store::InMemoryMappingStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn document() -> MappingDocument {
        MappingDocument::new("1040", 2024)
            .with_seed("income", "wages_line_1a", "topmostSubform[0].Page1[0].f1_32[0]")
            .with_seed("refund", "refund_line_35a", "topmostSubform[0].Page2[0].f2_20[0]")
    }

    /// Counts reads so cache hits are observable
    #[derive(Debug)]
    struct CountingStore {
        inner: InMemoryMappingStore,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl MappingStore for CountingStore {
        async fn get(&self, form_type: &str, tax_year: u16) -> Result<Option<MappingDocument>, MappingError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get(form_type, tax_year).await
        }

        async fn put(&self, document: MappingDocument) -> Result<(), MappingError> {
            self.inner.put(document).await
        }
    }

    fn counting() -> Arc<CountingStore> {
        Arc::new(CountingStore {
            inner: InMemoryMappingStore::with_documents([document()]),
            reads: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn second_load_hits_cache() {
        let store = counting();
        let resolver = MappingResolver::new(store.clone());

        let first = resolver.load("1040", 2024).await.unwrap();
        let second = resolver.load("1040", 2024).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.reads.load(Ordering::SeqCst), 1);
        assert!(resolver.is_cached("1040", 2024).await);
    }

    #[tokio::test]
    async fn missing_mapping_is_not_found() {
        let resolver = MappingResolver::new(Arc::new(InMemoryMappingStore::new()));
        let err = resolver.load("1040", 2024).await.unwrap_err();
        assert!(matches!(err, MappingError::NotFound { tax_year: 2024, .. }));
    }

    #[tokio::test]
    async fn apply_patch_persists_and_invalidates() {
        let store = counting();
        let resolver = MappingResolver::new(store.clone());
        let before = resolver.load("1040", 2024).await.unwrap();
        assert_eq!(before.resolve("refund_line_35a"), Some("topmostSubform[0].Page2[0].f2_20[0]"));

        resolver
            .apply_patch(
                "1040",
                2024,
                MappingPatch::new(PatchName::Refund, 1).with_entry(
                    "refund",
                    "refund_line_35a",
                    "topmostSubform[0].Page2[0].f2_23[0]",
                ),
            )
            .await
            .unwrap();
        assert!(!resolver.is_cached("1040", 2024).await);

        let after = resolver.load("1040", 2024).await.unwrap();
        assert_eq!(after.resolve("refund_line_35a"), Some("topmostSubform[0].Page2[0].f2_23[0]"));
        assert_eq!(after.resolve("wages_line_1a"), before.resolve("wages_line_1a"));

        let stored = store.inner.get("1040", 2024).await.unwrap().unwrap();
        assert_eq!(stored.patches.len(), 1);
    }

    /// Holds the first armed read until released
    #[derive(Debug, Default)]
    struct GatedStore {
        inner: InMemoryMappingStore,
        armed: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl MappingStore for GatedStore {
        async fn get(&self, form_type: &str, tax_year: u16) -> Result<Option<MappingDocument>, MappingError> {
            let snapshot = self.inner.get(form_type, tax_year).await;
            if self.armed.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            snapshot
        }

        async fn put(&self, document: MappingDocument) -> Result<(), MappingError> {
            self.inner.put(document).await
        }
    }

    #[tokio::test]
    async fn patch_during_slow_load_is_not_lost() {
        let store = Arc::new(GatedStore {
            inner: InMemoryMappingStore::with_documents([document()]),
            ..GatedStore::default()
        });
        let resolver = MappingResolver::new(store.clone());
        store.armed.store(true, Ordering::SeqCst);

        let loading = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.load("1040", 2024).await }
        });
        store.entered.notified().await;

        let patching = tokio::spawn({
            let resolver = resolver.clone();
            async move {
                resolver
                    .apply_patch(
                        "1040",
                        2024,
                        MappingPatch::new(PatchName::Refund, 9).with_entry(
                            "refund",
                            "refund_line_35a",
                            "topmostSubform[0].Page2[0].f2_99[0]",
                        ),
                    )
                    .await
            }
        });
        tokio::task::yield_now().await;
        store.release.notify_one();

        let stale = loading.await.unwrap().unwrap();
        assert_eq!(stale.resolve("refund_line_35a"), Some("topmostSubform[0].Page2[0].f2_20[0]"));
        patching.await.unwrap().unwrap();

        let after = resolver.load("1040", 2024).await.unwrap();
        assert_eq!(after.resolve("refund_line_35a"), Some("topmostSubform[0].Page2[0].f2_99[0]"));
    }

    #[tokio::test]
    async fn unknown_patch_is_not_persisted() {
        let store = counting();
        let resolver = MappingResolver::new(store.clone());
        let patch = MappingPatch {
            name: "adhoc".into(),
            version: 1,
            sections: Default::default(),
        };
        let err = resolver.apply_patch("1040", 2024, patch).await.unwrap_err();
        assert!(matches!(err, MappingError::UnknownPatch(_)));
        assert!(store.inner.get("1040", 2024).await.unwrap().unwrap().patches.is_empty());
    }

    #[tokio::test]
    async fn mismatched_document_key_rejected() {
        #[derive(Debug)]
        struct WrongYear;

        #[async_trait]
        impl MappingStore for WrongYear {
            async fn get(&self, form_type: &str, _: u16) -> Result<Option<MappingDocument>, MappingError> {
                Ok(Some(MappingDocument::new(form_type, 1999)))
            }
            async fn put(&self, _: MappingDocument) -> Result<(), MappingError> {
                Ok(())
            }
        }

        let resolver = MappingResolver::new(Arc::new(WrongYear));
        assert!(matches!(
            resolver.load("1040", 2024).await,
            Err(MappingError::KeyMismatch { .. })
        ));
    }
}
