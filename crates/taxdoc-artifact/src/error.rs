//! Error types for artifact storage

use crate::hash::ContentHash;
use std::path::PathBuf;

/// Errors raised by artifact stores
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// Key component unusable as a storage path segment
    #[error("invalid artifact key: {0}")]
    InvalidKey(String),

    /// Stored bytes no longer match the recorded hash
    #[error("integrity check failed for {storage_key}: expected {expected}, got {actual}")]
    Integrity {
        storage_key: String,
        expected: ContentHash,
        actual: ContentHash,
    },

    /// Backing storage I/O failure
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Version metadata could not be encoded or decoded
    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Version allocation kept colliding with concurrent writers
    #[error("version allocation contended for {0}")]
    Contended(String),

    /// Store temporarily unreachable
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl ArtifactError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a bounded retry may succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable(_) | Self::Contended(_) => true,
            Self::Io { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}
