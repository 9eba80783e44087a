//! Semantic mapping resolver
//!
//! Maps stable semantic keys (`wages_line_1a`) to the physical widget paths
//! of one form template revision, and back.
//!
//! # Architecture
//!
//! ```text
//! MappingStore ──► MappingDocument ──► flatten (seed → generated → patches) ──► SemanticMapping
//!                                                                               ↑____________↓
//!                                                                   MappingResolver (moka cache)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use taxdoc_mapping::{InMemoryMappingStore, MappingResolver};
//!
//! let resolver = MappingResolver::new(Arc::new(store));
//! let mapping = resolver.load("1040", 2024).await?;
//! let path = mapping.resolve("wages_line_1a");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod document;
mod error;
mod mapping;
mod normalize;
mod resolver;
mod store;

pub use document::{MappingDocument, MappingPatch, PatchName, SectionMap};
pub use error::MappingError;
pub use mapping::{MappingConflict, MappingEntry, MappingSource, SemanticMapping};
pub use normalize::normalize_field_path;
pub use resolver::{MappingResolver, DEFAULT_CACHE_CAPACITY};
pub use store::{InMemoryMappingStore, MappingStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
