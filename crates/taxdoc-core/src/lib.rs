//! Tax document engine
//!
//! Fills versioned government form templates from computed tax facts.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────── FormFillEngine ─────────────────────────┐
//! │  MappingResolver   TemplateProvider   TaxCalculator   Renderer  │
//! │  (taxdoc-mapping)                     (taxdoc-calc)             │
//! │                     SessionStore      ArtifactStore             │
//! │                                       (taxdoc-artifact)         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use taxdoc_core::{EngineConfig, FillRequest, FormFillEngine};
//!
//! let engine = FormFillEngine::new(config, mappings, rules, templates, artifacts);
//! let response = engine
//!     .fill_tax_form(FillRequest::new("client-7", "1040", 2024, facts))
//!     .await?;
//! if response.needs_input {
//!     // ask response.questions, then call again in the same session
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod config;
mod engine;
mod error;
pub mod facts;
mod format;
mod render;
mod retry;
mod session;
pub mod telemetry;
mod template;

pub use config::EngineConfig;
pub use engine::{FillOutcome, FillRequest, FillResponse, FillResult, FormFillEngine, SkippedField};
pub use error::{EngineError, EngineResult};
pub use facts::Question;
pub use format::{to_field_value, FieldCategory, WriteRejection};
pub use render::{CanonicalJsonRenderer, FormRenderer, CHECKBOX_OFF};
pub use session::{SessionId, SessionStore};
pub use telemetry::{init_tracing, LogFormat};
pub use template::{
    FieldValue, FormTemplate, Geometry, InMemoryTemplateProvider, TemplateError, TemplateProvider, Widget,
    WidgetKind,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
