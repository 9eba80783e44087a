//! Mapping Store: persisted nested mapping documents

use crate::document::MappingDocument;
use crate::error::MappingError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Persistence for mapping documents
///
/// Written only by administrative patch operations; the fill path reads.
#[async_trait]
pub trait MappingStore: Send + Sync + Debug {
    /// Document for a form and year, if one exists
    async fn get(&self, form_type: &str, tax_year: u16) -> Result<Option<MappingDocument>, MappingError>;

    /// Replace the document stored under its own (form type, tax year)
    async fn put(&self, document: MappingDocument) -> Result<(), MappingError>;
}

/// Process-local mapping store
#[derive(Debug, Default, Clone)]
pub struct InMemoryMappingStore {
    documents: Arc<DashMap<(String, u16), MappingDocument>>,
}

impl InMemoryMappingStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create store seeded with documents
    #[must_use]
    pub fn with_documents(documents: impl IntoIterator<Item = MappingDocument>) -> Self {
        let store = Self::new();
        for doc in documents {
            store
                .documents
                .insert((doc.form_type.clone(), doc.tax_year), doc);
        }
        store
    }
}

#[async_trait]
impl MappingStore for InMemoryMappingStore {
    async fn get(&self, form_type: &str, tax_year: u16) -> Result<Option<MappingDocument>, MappingError> {
        Ok(self
            .documents
            .get(&(form_type.to_string(), tax_year))
            .map(|d| d.clone()))
    }

    async fn put(&self, document: MappingDocument) -> Result<(), MappingError> {
        self.documents
            .insert((document.form_type.clone(), document.tax_year), document);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get() {
        let store = InMemoryMappingStore::new();
        assert!(store.get("1040", 2024).await.unwrap().is_none());
        store.put(MappingDocument::new("1040", 2024)).await.unwrap();
        assert!(store.get("1040", 2024).await.unwrap().is_some());
        assert!(store.get("1040", 2023).await.unwrap().is_none());
    }
}
