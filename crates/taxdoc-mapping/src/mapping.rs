//! Flattened semantic mapping
//!
//! One live field path per semantic key per (form type, tax year).
//! Duplicates are recorded as [`MappingConflict`]s, never load failures.

use crate::document::{MappingDocument, PatchName, SectionMap};
use crate::error::MappingError;
use crate::normalize::normalize_field_path;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{self, Display, Formatter};

/// Layer an entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingSource {
    Seed,
    Generated,
    Patch(PatchName),
}

impl Display for MappingSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seed => f.write_str("seed"),
            Self::Generated => f.write_str("generated"),
            Self::Patch(name) => write!(f, "patch:{name}"),
        }
    }
}

/// One live mapping entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingEntry {
    pub semantic_key: String,
    pub field_path: String,
    pub section: String,
    pub source: MappingSource,
}

/// Mapping defect; a warning, never fatal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MappingConflict {
    /// One field claimed by several semantic keys
    SharedFieldPath {
        field_code: String,
        semantic_keys: Vec<String>,
    },
    /// Key whose field is not a widget of the current template
    MissingWidget {
        semantic_key: String,
        field_path: String,
    },
    /// Key defined in more than one section of the same layer
    DuplicateKey {
        semantic_key: String,
        source: MappingSource,
        sections: Vec<String>,
    },
}

impl Display for MappingConflict {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::SharedFieldPath {
                field_code,
                semantic_keys,
            } => write!(f, "field {field_code} claimed by {}", semantic_keys.join(", ")),
            Self::MissingWidget {
                semantic_key,
                field_path,
            } => write!(f, "{semantic_key} maps to {field_path}, which has no widget"),
            Self::DuplicateKey {
                semantic_key,
                source,
                sections,
            } => write!(
                f,
                "{semantic_key} defined in sections {} of {source}",
                sections.join(", ")
            ),
        }
    }
}

/// Flat `semantic_key → field_path` table for one form and year
#[derive(Debug, Clone)]
pub struct SemanticMapping {
    form_type: String,
    tax_year: u16,
    entries: BTreeMap<String, MappingEntry>,
    /// normalized field code → first claimant in key order
    reverse: HashMap<String, String>,
    load_conflicts: Vec<MappingConflict>,
}

impl SemanticMapping {
    /// Flatten a document: seed, then generated, then patches in sequence
    ///
    /// # Errors
    /// `MappingError::UnknownPatch` if the document names a patch outside
    /// the declared sequence.
    pub fn flatten(doc: &MappingDocument) -> Result<Self, MappingError> {
        let mut entries = BTreeMap::new();
        let mut load_conflicts = Vec::new();

        apply_layer(&mut entries, &mut load_conflicts, &doc.seed, MappingSource::Seed);
        apply_layer(
            &mut entries,
            &mut load_conflicts,
            &doc.generated,
            MappingSource::Generated,
        );
        for (name, patch) in doc.ordered_patches()? {
            tracing::debug!(patch = %name, version = patch.version, "applying mapping patch");
            apply_layer(
                &mut entries,
                &mut load_conflicts,
                &patch.sections,
                MappingSource::Patch(name),
            );
        }

        let mut reverse = HashMap::with_capacity(entries.len());
        for entry in entries.values() {
            reverse
                .entry(normalize_field_path(&entry.field_path))
                .or_insert_with(|| entry.semantic_key.clone());
        }

        Ok(Self {
            form_type: doc.form_type.clone(),
            tax_year: doc.tax_year,
            entries,
            reverse,
            load_conflicts,
        })
    }

    /// Form identifier
    #[inline]
    #[must_use]
    pub fn form_type(&self) -> &str {
        &self.form_type
    }

    /// Tax year
    #[inline]
    #[must_use]
    pub fn tax_year(&self) -> u16 {
        self.tax_year
    }

    /// Field path for a semantic key; `None` when unmapped
    #[must_use]
    pub fn resolve(&self, semantic_key: &str) -> Option<&str> {
        self.entries.get(semantic_key).map(|e| e.field_path.as_str())
    }

    /// Full entry for a semantic key
    #[must_use]
    pub fn entry(&self, semantic_key: &str) -> Option<&MappingEntry> {
        self.entries.get(semantic_key)
    }

    /// Semantic key for a physical field path; index suffixes are ignored
    #[must_use]
    pub fn reverse_resolve(&self, field_path: &str) -> Option<&str> {
        self.reverse
            .get(&normalize_field_path(field_path))
            .map(String::as_str)
    }

    /// Entries in key order
    pub fn entries(&self) -> impl Iterator<Item = &MappingEntry> {
        self.entries.values()
    }

    /// Number of live keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping has no keys
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Report conflicts against the current template's widget names
    ///
    /// Includes duplicate-key findings recorded while flattening.
    #[must_use]
    pub fn validate<'a>(&self, widget_names: impl IntoIterator<Item = &'a str>) -> Vec<MappingConflict> {
        let mut conflicts = self.load_conflicts.clone();

        let mut claims: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entry in self.entries.values() {
            claims
                .entry(normalize_field_path(&entry.field_path))
                .or_default()
                .push(entry.semantic_key.clone());
        }
        conflicts.extend(
            claims
                .into_iter()
                .filter(|(_, keys)| keys.len() > 1)
                .map(|(field_code, semantic_keys)| MappingConflict::SharedFieldPath {
                    field_code,
                    semantic_keys,
                }),
        );

        let widgets: BTreeSet<String> = widget_names.into_iter().map(normalize_field_path).collect();
        conflicts.extend(
            self.entries
                .values()
                .filter(|e| !widgets.contains(&normalize_field_path(&e.field_path)))
                .map(|e| MappingConflict::MissingWidget {
                    semantic_key: e.semantic_key.clone(),
                    field_path: e.field_path.clone(),
                }),
        );

        conflicts
    }
}

/// Overwrite `entries` with every key the layer defines
fn apply_layer(
    entries: &mut BTreeMap<String, MappingEntry>,
    conflicts: &mut Vec<MappingConflict>,
    layer: &SectionMap,
    source: MappingSource,
) {
    let mut seen: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (section, keys) in layer {
        for (semantic_key, field_path) in keys {
            seen.entry(semantic_key).or_default().push(section.clone());
            entries.insert(
                semantic_key.clone(),
                MappingEntry {
                    semantic_key: semantic_key.clone(),
                    field_path: field_path.clone(),
                    section: section.clone(),
                    source,
                },
            );
        }
    }
    for (semantic_key, sections) in seen {
        if sections.len() > 1 {
            conflicts.push(MappingConflict::DuplicateKey {
                semantic_key: semantic_key.to_string(),
                source,
                sections,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MappingPatch;
    use pretty_assertions::assert_eq;

    const P1: &str = "topmostSubform[0].Page1[0].";

    fn doc() -> MappingDocument {
        MappingDocument::new("1040", 2024)
            .with_seed("income", "wages_line_1a", format!("{P1}f1_32[0]"))
            .with_seed("filing_status", "filing_status_single", format!("{P1}c1_1[0]"))
            .with_seed("refund", "refund_line_35a", "topmostSubform[0].Page2[0].f2_20[0]")
    }

    #[test]
    fn resolves_both_ways() {
        let mapping = SemanticMapping::flatten(&doc()).unwrap();
        assert_eq!(mapping.resolve("wages_line_1a"), Some("topmostSubform[0].Page1[0].f1_32[0]"));
        assert_eq!(mapping.reverse_resolve("f1_32[3]"), Some("wages_line_1a"));
        assert_eq!(mapping.reverse_resolve("topmostSubform[1].Page1[0].f1_32[0]"), Some("wages_line_1a"));
        assert_eq!(mapping.resolve("unknown"), None);
        assert_eq!(mapping.reverse_resolve("f9_99[0]"), None);
    }

    #[test]
    fn patch_overwrites_only_its_keys() {
        let mut document = doc();
        document
            .upsert_patch(
                MappingPatch::new(PatchName::Refund, 1)
                    .with_entry("refund", "refund_line_35a", "topmostSubform[0].Page2[0].f2_23[0]"),
            )
            .unwrap();
        let mapping = SemanticMapping::flatten(&document).unwrap();

        let refund = mapping.entry("refund_line_35a").unwrap();
        assert_eq!(refund.field_path, "topmostSubform[0].Page2[0].f2_23[0]");
        assert_eq!(refund.source, MappingSource::Patch(PatchName::Refund));
        assert_eq!(mapping.entry("wages_line_1a").unwrap().source, MappingSource::Seed);
        assert_eq!(mapping.len(), 3);
    }

    #[test]
    fn later_patch_in_sequence_wins_regardless_of_document_order() {
        let mut document = doc();
        document.patches.push(
            MappingPatch::new(PatchName::Refund, 1).with_entry("x", "wages_line_1a", "f1_90[0]"),
        );
        document.patches.push(
            MappingPatch::new(PatchName::FilingStatus, 1).with_entry("x", "wages_line_1a", "f1_80[0]"),
        );
        let mapping = SemanticMapping::flatten(&document).unwrap();
        assert_eq!(mapping.resolve("wages_line_1a"), Some("f1_90[0]"));
    }

    #[test]
    fn shared_field_path_is_a_warning() {
        let document = doc().with_seed("income", "wages_alias", format!("{P1}f1_32[1]"));
        let mapping = SemanticMapping::flatten(&document).unwrap();
        let conflicts = mapping.validate(["f1_32[0]", "c1_1[0]", "f2_20[0]"]);
        assert_eq!(
            conflicts,
            vec![MappingConflict::SharedFieldPath {
                field_code: "f1_32".into(),
                semantic_keys: vec!["wages_alias".into(), "wages_line_1a".into()],
            }]
        );
        // lexically first claimant owns the reverse lookup
        assert_eq!(mapping.reverse_resolve("f1_32[0]"), Some("wages_alias"));
    }

    #[test]
    fn missing_widget_reported() {
        let mapping = SemanticMapping::flatten(&doc()).unwrap();
        let conflicts = mapping.validate(["topmostSubform[0].Page1[0].f1_32[0]", "c1_1[0]"]);
        assert_eq!(
            conflicts,
            vec![MappingConflict::MissingWidget {
                semantic_key: "refund_line_35a".into(),
                field_path: "topmostSubform[0].Page2[0].f2_20[0]".into(),
            }]
        );
    }

    #[test]
    fn duplicate_key_across_sections() {
        let document = doc().with_seed("payments", "wages_line_1a", format!("{P1}f1_33[0]"));
        let mapping = SemanticMapping::flatten(&document).unwrap();
        // "payments" sorts after "income", so it is the live entry
        assert_eq!(mapping.entry("wages_line_1a").unwrap().section, "payments");
        let conflicts = mapping.validate(["f1_32[0]", "f1_33[0]", "c1_1[0]", "f2_20[0]"]);
        assert!(conflicts.contains(&MappingConflict::DuplicateKey {
            semantic_key: "wages_line_1a".into(),
            source: MappingSource::Seed,
            sections: vec!["income".into(), "payments".into()],
        }));
    }

    #[test]
    fn round_trip_on_conflict_free_mapping() {
        let mapping = SemanticMapping::flatten(&doc()).unwrap();
        let widgets: Vec<String> = mapping.entries().map(|e| e.field_path.clone()).collect();
        assert!(mapping.validate(widgets.iter().map(String::as_str)).is_empty());
        for entry in mapping.entries() {
            let path = mapping.resolve(&entry.semantic_key).unwrap();
            assert_eq!(mapping.reverse_resolve(path), Some(entry.semantic_key.as_str()));
        }
    }
}
