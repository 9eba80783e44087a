//! Error types for tax calculation

use crate::facts::FilingStatus;

/// Errors raised before or during calculation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalcError {
    /// No rules published for the requested year and status
    #[error("no tax rules for {status} in {tax_year}")]
    MissingRules { tax_year: u16, status: FilingStatus },

    /// Rules data is present but unusable
    #[error("invalid tax rules for {status} in {tax_year}: {reason}")]
    InvalidRules {
        tax_year: u16,
        status: FilingStatus,
        reason: String,
    },

    /// Malformed input fact
    #[error("invalid fact '{field}': {reason}")]
    Validation { field: String, reason: String },
}

impl CalcError {
    /// Create validation error for a fact
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether this is a rules/configuration problem rather than bad input
    #[inline]
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::MissingRules { .. } | Self::InvalidRules { .. })
    }
}
