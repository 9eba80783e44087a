//! Filesystem-backed artifact store
//!
//! Layout: `{root}/{subject}/{form_type}/{tax_year}/v{version:06}.bin` plus a
//! `.meta.json` sidecar per version. A version exists once its sidecar does.
//! Sidecars are written to a `.tmp` file and renamed into place, so readers
//! never see a partial one.
//!
//! Version numbers are claimed by exclusive-create of the `.bin` file, which
//! is the compare-and-swap at this layer: a writer that loses the race moves
//! on to the next number.

use crate::error::ArtifactError;
use crate::hash::ContentHash;
use crate::record::{ArtifactKey, FilledArtifact, RetrievalUrl, StoredArtifact};
use crate::store::{expiry, ArtifactStore};
use async_trait::async_trait;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const MAX_CLAIM_ATTEMPTS: u32 = 64;

/// Artifact store rooted at a local directory
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Create store rooted at `root` (created on first write)
    #[inline]
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_dir(&self, key: &ArtifactKey) -> PathBuf {
        self.root
            .join(&key.subject)
            .join(&key.form_type)
            .join(key.tax_year.to_string())
    }

    fn bin_path(dir: &Path, version: u64) -> PathBuf {
        dir.join(format!("v{version:06}.bin"))
    }

    fn meta_path(dir: &Path, version: u64) -> PathBuf {
        dir.join(format!("v{version:06}.meta.json"))
    }

    /// Highest version number with a claimed `.bin` file
    async fn highest_claimed(dir: &Path) -> Result<u64, ArtifactError> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(ArtifactError::io_error(dir, e)),
        };
        let mut highest = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ArtifactError::io_error(dir, e))?
        {
            if let Some(v) = parse_version(&entry.file_name().to_string_lossy(), ".bin") {
                highest = highest.max(v);
            }
        }
        Ok(highest)
    }

    async fn read_record(dir: &Path, version: u64) -> Result<Option<FilledArtifact>, ArtifactError> {
        let path = Self::meta_path(dir, version);
        match tokio::fs::read(&path).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ArtifactError::io_error(path, e)),
        }
    }

    async fn load(&self, record: FilledArtifact) -> Result<StoredArtifact, ArtifactError> {
        let path = Self::bin_path(&self.key_dir(&record.key), record.version);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| ArtifactError::io_error(&path, e))?;
        StoredArtifact { record, bytes }.verified()
    }
}

fn parse_version(name: &str, suffix: &str) -> Option<u64> {
    name.strip_prefix('v')?.strip_suffix(suffix)?.parse().ok()
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<FilledArtifact, ArtifactError> {
        key.validate()?;
        let dir = self.key_dir(key);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ArtifactError::io_error(&dir, e))?;

        let mut version = Self::highest_claimed(&dir).await? + 1;
        let mut attempts = 0;
        let (path, mut file) = loop {
            let path = Self::bin_path(&dir, version);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    attempts += 1;
                    if attempts >= MAX_CLAIM_ATTEMPTS {
                        return Err(ArtifactError::Contended(key.to_string()));
                    }
                    tracing::debug!(key = %key, version, "version already claimed, advancing");
                    version += 1;
                }
                Err(e) => return Err(ArtifactError::io_error(path, e)),
            }
        };

        file.write_all(bytes)
            .await
            .map_err(|e| ArtifactError::io_error(&path, e))?;
        file.sync_all()
            .await
            .map_err(|e| ArtifactError::io_error(&path, e))?;

        let record = FilledArtifact {
            key: key.clone(),
            version,
            content_hash: ContentHash::of(bytes),
            stored_at: Utc::now(),
            storage_key: key.storage_key(version),
            size_bytes: bytes.len(),
        };
        let meta = Self::meta_path(&dir, version);
        let staged = meta.with_extension("json.tmp");
        tokio::fs::write(&staged, serde_json::to_vec_pretty(&record)?)
            .await
            .map_err(|e| ArtifactError::io_error(&staged, e))?;
        tokio::fs::rename(&staged, &meta)
            .await
            .map_err(|e| ArtifactError::io_error(&meta, e))?;

        tracing::info!(
            key = %key,
            version,
            hash = %record.content_hash.short(),
            path = %path.display(),
            "stored artifact version"
        );
        Ok(record)
    }

    async fn get_latest(&self, key: &ArtifactKey) -> Result<Option<StoredArtifact>, ArtifactError> {
        match self.list_versions(key).await?.into_iter().next() {
            Some(record) => Ok(Some(self.load(record).await?)),
            None => Ok(None),
        }
    }

    async fn get_version(
        &self,
        key: &ArtifactKey,
        version: u64,
    ) -> Result<Option<StoredArtifact>, ArtifactError> {
        key.validate()?;
        match Self::read_record(&self.key_dir(key), version).await? {
            Some(record) => Ok(Some(self.load(record).await?)),
            None => Ok(None),
        }
    }

    async fn list_versions(&self, key: &ArtifactKey) -> Result<Vec<FilledArtifact>, ArtifactError> {
        key.validate()?;
        let dir = self.key_dir(key);
        let mut records = Vec::new();
        for version in (1..=Self::highest_claimed(&dir).await?).rev() {
            // A claimed version without a sidecar is still being written.
            if let Some(record) = Self::read_record(&dir, version).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn retrieval_url(&self, record: &FilledArtifact, ttl: Duration) -> RetrievalUrl {
        let expires_at = expiry(ttl);
        let path = Self::bin_path(&self.key_dir(&record.key), record.version);
        RetrievalUrl {
            url: format!("file://{}?expires={}", path.display(), expires_at.timestamp()),
            expires_at,
        }
    }
}
