//! Nested mapping documents and named patches
//!
//! ```text
//! seed ──► generated ──► filing_status ─► digital_assets ─► standard_deduction ─► dependents ─► refund
//! ```
//!
//! Each layer overwrites only the keys it defines. The patch sequence is
//! fixed by [`PatchName::SEQUENCE`], not by document order.

use crate::error::MappingError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// `section → semantic_key → field_path`
pub type SectionMap = BTreeMap<String, BTreeMap<String, String>>;

/// Named corrections, in application order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchName {
    FilingStatus,
    DigitalAssets,
    StandardDeduction,
    Dependents,
    Refund,
}

impl PatchName {
    /// Declared merge order
    pub const SEQUENCE: [Self; 5] = [
        Self::FilingStatus,
        Self::DigitalAssets,
        Self::StandardDeduction,
        Self::Dependents,
        Self::Refund,
    ];

    /// Stable snake_case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FilingStatus => "filing_status",
            Self::DigitalAssets => "digital_assets",
            Self::StandardDeduction => "standard_deduction",
            Self::Dependents => "dependents",
            Self::Refund => "refund",
        }
    }
}

impl Display for PatchName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatchName {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::SEQUENCE
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| MappingError::UnknownPatch(s.to_string()))
    }
}

fn first_version() -> u32 {
    1
}

/// One named correction layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingPatch {
    /// Must parse as a [`PatchName`]
    pub name: String,
    #[serde(default = "first_version")]
    pub version: u32,
    #[serde(default)]
    pub sections: SectionMap,
}

impl MappingPatch {
    /// Empty patch
    #[must_use]
    pub fn new(name: PatchName, version: u32) -> Self {
        Self {
            name: name.as_str().to_string(),
            version,
            sections: SectionMap::new(),
        }
    }

    /// Add an entry (builder style)
    #[must_use]
    pub fn with_entry(
        mut self,
        section: impl Into<String>,
        semantic_key: impl Into<String>,
        field_path: impl Into<String>,
    ) -> Self {
        self.sections
            .entry(section.into())
            .or_default()
            .insert(semantic_key.into(), field_path.into());
        self
    }

    /// Parsed name
    ///
    /// # Errors
    /// `MappingError::UnknownPatch` for names outside the sequence.
    pub fn patch_name(&self) -> Result<PatchName, MappingError> {
        self.name.parse()
    }
}

/// Stored form of a mapping, one per (form type, tax year)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingDocument {
    pub form_type: String,
    pub tax_year: u16,
    #[serde(default)]
    pub seed: SectionMap,
    #[serde(default)]
    pub generated: SectionMap,
    #[serde(default)]
    pub patches: Vec<MappingPatch>,
}

impl MappingDocument {
    /// Empty document for a key
    #[must_use]
    pub fn new(form_type: impl Into<String>, tax_year: u16) -> Self {
        Self {
            form_type: form_type.into(),
            tax_year,
            seed: SectionMap::new(),
            generated: SectionMap::new(),
            patches: Vec::new(),
        }
    }

    /// Decode JSON
    ///
    /// # Errors
    /// `MappingError::Json` on malformed input.
    pub fn from_json(raw: &str) -> Result<Self, MappingError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Decode YAML
    ///
    /// # Errors
    /// `MappingError::Yaml` on malformed input.
    pub fn from_yaml(raw: &str) -> Result<Self, MappingError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Encode as pretty JSON
    ///
    /// # Errors
    /// `MappingError::Json` if encoding fails.
    pub fn to_json(&self) -> Result<String, MappingError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Add a seed entry (builder style)
    #[must_use]
    pub fn with_seed(
        mut self,
        section: impl Into<String>,
        semantic_key: impl Into<String>,
        field_path: impl Into<String>,
    ) -> Self {
        self.seed
            .entry(section.into())
            .or_default()
            .insert(semantic_key.into(), field_path.into());
        self
    }

    /// Insert a patch, replacing an existing patch with the same name
    ///
    /// Returns the replaced patch, if any.
    ///
    /// # Errors
    /// `MappingError::UnknownPatch` when the patch name is not in the sequence.
    pub fn upsert_patch(&mut self, patch: MappingPatch) -> Result<Option<MappingPatch>, MappingError> {
        patch.patch_name()?;
        match self.patches.iter_mut().find(|p| p.name == patch.name) {
            Some(existing) => Ok(Some(std::mem::replace(existing, patch))),
            None => {
                self.patches.push(patch);
                Ok(None)
            }
        }
    }

    /// Patches in merge order
    ///
    /// # Errors
    /// `MappingError::UnknownPatch` for the first unrecognised name.
    pub fn ordered_patches(&self) -> Result<Vec<(PatchName, &MappingPatch)>, MappingError> {
        let mut ordered = self
            .patches
            .iter()
            .map(|p| p.patch_name().map(|name| (name, p)))
            .collect::<Result<Vec<_>, _>>()?;
        ordered.sort_by_key(|(name, p)| (*name, p.version));
        Ok(ordered)
    }
}
