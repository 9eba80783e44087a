//! Artifact keys and version records

use crate::error::ArtifactError;
use crate::hash::ContentHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Versioning namespace: one subject's form for one tax year
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactKey {
    /// Taxpayer / engagement the document belongs to
    pub subject: String,
    /// Form identifier, e.g. `1040`
    pub form_type: String,
    /// Tax year the form covers
    pub tax_year: u16,
}

impl ArtifactKey {
    /// Create key
    #[inline]
    #[must_use]
    pub fn new(subject: impl Into<String>, form_type: impl Into<String>, tax_year: u16) -> Self {
        Self {
            subject: subject.into(),
            form_type: form_type.into(),
            tax_year,
        }
    }

    /// Reject components that cannot be used as storage path segments
    ///
    /// # Errors
    /// `ArtifactError::InvalidKey` for empty components or ones containing
    /// separators or parent references.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        for (name, part) in [("subject", &self.subject), ("form_type", &self.form_type)] {
            if part.is_empty()
                || part == "."
                || part.contains("..")
                || part.contains(['/', '\\'])
            {
                return Err(ArtifactError::InvalidKey(format!("{name} '{part}'")));
            }
        }
        Ok(())
    }

    /// Storage key for a given version
    #[must_use]
    pub fn storage_key(&self, version: u64) -> String {
        format!("{self}/v{version:06}")
    }
}

impl Display for ArtifactKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.subject, self.form_type, self.tax_year)
    }
}

/// One immutable stored rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilledArtifact {
    /// Namespace the version was allocated in
    pub key: ArtifactKey,
    /// Monotonic per key, starting at 1
    pub version: u64,
    /// Blake3 of the stored bytes
    pub content_hash: ContentHash,
    /// When the version was written
    pub stored_at: DateTime<Utc>,
    /// Object key in the backing store
    pub storage_key: String,
    /// Size of the stored bytes
    pub size_bytes: usize,
}

/// A version record together with its bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub record: FilledArtifact,
    pub bytes: Vec<u8>,
}

impl StoredArtifact {
    /// Verify the bytes against the recorded hash
    ///
    /// # Errors
    /// `ArtifactError::Integrity` when the bytes were altered after write.
    pub fn verified(self) -> Result<Self, ArtifactError> {
        if self.record.content_hash.matches(&self.bytes) {
            Ok(self)
        } else {
            Err(ArtifactError::Integrity {
                storage_key: self.record.storage_key.clone(),
                expected: self.record.content_hash,
                actual: ContentHash::of(&self.bytes),
            })
        }
    }
}

/// Time-limited retrieval handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}
