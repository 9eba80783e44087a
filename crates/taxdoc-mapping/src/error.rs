//! Error types for mapping load and administration

/// Errors loading, flattening or patching a mapping
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    /// No mapping document for the requested form and year
    #[error("no mapping for form {form_type} tax year {tax_year}")]
    NotFound { form_type: String, tax_year: u16 },

    /// Patch name outside the declared patch sequence
    #[error("unknown mapping patch: '{0}'")]
    UnknownPatch(String),

    /// Document key does not match the key it was stored or requested under
    #[error("mapping document is for {found}, expected {expected}")]
    KeyMismatch { expected: String, found: String },

    /// JSON document could not be decoded
    #[error("invalid mapping document: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML document could not be decoded
    #[error("invalid mapping document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Backing store failure
    #[error("mapping store error: {0}")]
    Store(String),
}

impl MappingError {
    /// Create not-found error
    pub fn not_found(form_type: impl Into<String>, tax_year: u16) -> Self {
        Self::NotFound {
            form_type: form_type.into(),
            tax_year,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = MappingError::not_found("1040", 2024);
        assert_eq!(err.to_string(), "no mapping for form 1040 tax year 2024");
    }
}
