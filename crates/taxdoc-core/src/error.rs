//! Error types for the fill engine
//!
//! Component errors are wrapped unmodified:
//! - mapping/rules/template lookups that find nothing are configuration errors
//! - malformed facts are validation errors, raised before calculation
//! - store timeouts and unavailability are transient, retried once
//!
//! Skipped widgets and needs-input rounds are results, not errors.

use crate::template::TemplateError;
use std::path::PathBuf;
use taxdoc_artifact::ArtifactError;
use taxdoc_calc::CalcError;
use taxdoc_mapping::MappingError;

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Mapping store or mapping document failure
    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// Tax rules lookup or fact validation failure
    #[error("calculation error: {0}")]
    Calc(#[from] CalcError),

    /// Form template lookup failure
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// Artifact store failure that a retry cannot fix
    #[error("artifact store error: {0}")]
    Artifact(#[from] ArtifactError),

    /// I/O timeout or unavailability at an external store
    #[error("transient storage error during {operation}: {message}")]
    TransientStorage {
        operation: &'static str,
        message: String,
    },

    /// Request rejected before any work started
    #[error("invalid request: {0}")]
    Validation(String),

    /// Rendered output could not be produced
    #[error("render failed: {0}")]
    Render(String),

    /// Engine configuration file unreadable
    #[error("config error in {path}: {message}")]
    Config { path: PathBuf, message: String },
}

impl EngineError {
    /// Create transient storage error
    pub fn transient(operation: &'static str, message: impl Into<String>) -> Self {
        Self::TransientStorage {
            operation,
            message: message.into(),
        }
    }

    /// Classify an artifact store error
    pub(crate) fn from_artifact(operation: &'static str, err: ArtifactError) -> Self {
        if err.is_transient() {
            Self::transient(operation, err.to_string())
        } else {
            Self::Artifact(err)
        }
    }

    /// Classify a template provider error
    pub(crate) fn from_template(operation: &'static str, err: TemplateError) -> Self {
        match err {
            TemplateError::Unavailable(message) => Self::transient(operation, message),
            other => Self::Template(other),
        }
    }

    /// Missing mapping, template or rules for the requested key
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Mapping(MappingError::NotFound { .. })
            | Self::Mapping(MappingError::UnknownPatch(_))
            | Self::Mapping(MappingError::KeyMismatch { .. })
            | Self::Template(TemplateError::NotFound { .. })
            | Self::Config { .. } => true,
            Self::Calc(e) => e.is_configuration(),
            _ => false,
        }
    }

    /// Malformed facts or request
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Calc(CalcError::Validation { .. })
        )
    }

    /// Whether the boundary may retry
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStorage { .. })
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use taxdoc_calc::FilingStatus;

    #[test]
    fn classification() {
        let missing: EngineError = MappingError::not_found("1040", 2024).into();
        assert!(missing.is_configuration());
        assert!(!missing.is_retryable());

        let rules: EngineError = CalcError::MissingRules {
            tax_year: 2024,
            status: FilingStatus::Single,
        }
        .into();
        assert!(rules.is_configuration());

        let bad: EngineError = CalcError::validation("wages", "must not be negative").into();
        assert!(bad.is_validation());
        assert!(!bad.is_configuration());

        assert!(EngineError::transient("artifact put", "timed out").is_retryable());
    }

    #[test]
    fn artifact_errors_split_by_transience() {
        let flaky = EngineError::from_artifact("put", ArtifactError::Unavailable("503".into()));
        assert!(flaky.is_retryable());
        let hard = EngineError::from_artifact("put", ArtifactError::InvalidKey("x".into()));
        assert!(matches!(hard, EngineError::Artifact(_)));
    }

    #[test]
    fn display_keeps_component_message() {
        let err: EngineError = MappingError::not_found("1040", 2030).into();
        assert_eq!(err.to_string(), "mapping error: no mapping for form 1040 tax year 2030");
    }
}
