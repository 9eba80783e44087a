//! Tax document artifact store
//!
//! Append-only, versioned, content-addressed storage of rendered forms.
//!
//! # Core Concepts
//!
//! - [`ArtifactKey`]: versioning namespace (subject, form type, tax year)
//! - [`FilledArtifact`]: immutable record of one stored version
//! - [`ArtifactStore`]: storage trait; versions are allocated atomically
//! - [`ContentHash`]: 32-byte Blake3 hash of the stored bytes
//!
//! # Example
//!
//! ```rust,ignore
//! use taxdoc_artifact::{ArtifactKey, ArtifactStore, InMemoryArtifactStore};
//!
//! let store = InMemoryArtifactStore::new();
//! let key = ArtifactKey::new("client-1", "1040", 2024);
//! let record = store.put(&key, &rendered).await?;
//! assert_eq!(record.version, 1);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod fs;
mod hash;
mod record;
mod store;

pub use error::ArtifactError;
pub use fs::FsArtifactStore;
pub use hash::{ContentHash, HashError};
pub use record::{ArtifactKey, FilledArtifact, RetrievalUrl, StoredArtifact};
pub use store::{ArtifactStore, InMemoryArtifactStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
