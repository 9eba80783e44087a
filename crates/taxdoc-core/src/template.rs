//! Form templates and their widgets
//!
//! A template is one revision of a government form: the blank document
//! bytes plus the fillable widgets it declares. Widget names are the
//! physical field paths the semantic mapping points at.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;
use taxdoc_artifact::ContentHash;
use taxdoc_mapping::normalize_field_path;

/// What a widget accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WidgetKind {
    /// Free text, optionally length-limited
    Text {
        #[serde(default)]
        max_length: Option<usize>,
    },
    /// Two-state box; renders `on_value` when checked
    Checkbox { on_value: String },
    /// One of a fixed option list
    Choice { options: Vec<String> },
}

impl WidgetKind {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Checkbox { .. } => "checkbox",
            Self::Choice { .. } => "choice",
        }
    }
}

/// Widget placement on its page
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A fillable field of a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub field_name: String,
    pub kind: WidgetKind,
    #[serde(default)]
    pub page: u16,
    #[serde(default)]
    pub geometry: Geometry,
}

impl Widget {
    /// Text widget without a length limit
    #[must_use]
    pub fn text(field_name: impl Into<String>) -> Self {
        Self::new(field_name, WidgetKind::Text { max_length: None })
    }

    /// Checkbox widget with its on-state token
    #[must_use]
    pub fn checkbox(field_name: impl Into<String>, on_value: impl Into<String>) -> Self {
        Self::new(
            field_name,
            WidgetKind::Checkbox {
                on_value: on_value.into(),
            },
        )
    }

    #[must_use]
    pub fn new(field_name: impl Into<String>, kind: WidgetKind) -> Self {
        Self {
            field_name: field_name.into(),
            kind,
            page: 0,
            geometry: Geometry::default(),
        }
    }

    /// On page
    #[inline]
    #[must_use]
    pub fn on_page(mut self, page: u16) -> Self {
        self.page = page;
        self
    }
}

/// Typed value to write into a widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Checkbox(bool),
    Choice(String),
}

/// One template revision
#[derive(Debug, Clone)]
pub struct FormTemplate {
    pub form_type: String,
    pub tax_year: u16,
    /// Blank form document
    pub bytes: Vec<u8>,
    widgets: Vec<Widget>,
    /// exact name → index, then normalized code → index
    by_name: HashMap<String, usize>,
    by_code: HashMap<String, usize>,
}

impl FormTemplate {
    #[must_use]
    pub fn new(form_type: impl Into<String>, tax_year: u16, bytes: Vec<u8>, widgets: Vec<Widget>) -> Self {
        let mut by_name = HashMap::with_capacity(widgets.len());
        let mut by_code = HashMap::with_capacity(widgets.len());
        for (idx, widget) in widgets.iter().enumerate() {
            by_name.entry(widget.field_name.clone()).or_insert(idx);
            by_code
                .entry(normalize_field_path(&widget.field_name))
                .or_insert(idx);
        }
        Self {
            form_type: form_type.into(),
            tax_year,
            bytes,
            widgets,
            by_name,
            by_code,
        }
    }

    /// Widget for a mapped field path
    ///
    /// Exact match first, then by normalized field code so mappings survive
    /// re-parenting of the widget tree between revisions.
    #[must_use]
    pub fn widget(&self, field_path: &str) -> Option<&Widget> {
        self.by_name
            .get(field_path)
            .or_else(|| self.by_code.get(&normalize_field_path(field_path)))
            .map(|&idx| &self.widgets[idx])
    }

    #[inline]
    #[must_use]
    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    /// Hash of the blank document
    #[inline]
    #[must_use]
    pub fn content_hash(&self) -> ContentHash {
        ContentHash::of(&self.bytes)
    }
}

/// Template lookup failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// No template registered for the form and year
    #[error("no template for form {form_type} tax year {tax_year}")]
    NotFound { form_type: String, tax_year: u16 },

    /// Backing store did not answer
    #[error("template store unavailable: {0}")]
    Unavailable(String),
}

/// Source of form templates
#[async_trait]
pub trait TemplateProvider: Send + Sync + Debug {
    /// Template for a form and year
    async fn get_template(&self, form_type: &str, tax_year: u16) -> Result<Arc<FormTemplate>, TemplateError>;
}

/// Process-local template registry
#[derive(Debug, Default, Clone)]
pub struct InMemoryTemplateProvider {
    templates: Arc<DashMap<(String, u16), Arc<FormTemplate>>>,
}

impl InMemoryTemplateProvider {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a template
    pub fn insert(&self, template: FormTemplate) {
        self.templates.insert(
            (template.form_type.clone(), template.tax_year),
            Arc::new(template),
        );
    }

    /// With template
    #[must_use]
    pub fn with_template(self, template: FormTemplate) -> Self {
        self.insert(template);
        self
    }
}

#[async_trait]
impl TemplateProvider for InMemoryTemplateProvider {
    async fn get_template(&self, form_type: &str, tax_year: u16) -> Result<Arc<FormTemplate>, TemplateError> {
        self.templates
            .get(&(form_type.to_string(), tax_year))
            .map(|t| Arc::clone(t.value()))
            .ok_or_else(|| TemplateError::NotFound {
                form_type: form_type.to_string(),
                tax_year,
            })
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) | Self::Choice(s) => f.write_str(s),
            Self::Checkbox(true) => f.write_str("checked"),
            Self::Checkbox(false) => f.write_str("unchecked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> FormTemplate {
        FormTemplate::new(
            "1040",
            2024,
            b"%blank".to_vec(),
            vec![
                Widget::text("topmostSubform[0].Page1[0].f1_32[0]"),
                Widget::checkbox("topmostSubform[0].Page1[0].c1_1[0]", "1").on_page(1),
            ],
        )
    }

    #[test]
    fn widget_lookup_exact_then_normalized() {
        let t = template();
        assert!(t.widget("topmostSubform[0].Page1[0].f1_32[0]").is_some());
        let moved = t.widget("form1[0].Page1[0].Lines[0].f1_32[0]").unwrap();
        assert_eq!(moved.field_name, "topmostSubform[0].Page1[0].f1_32[0]");
        assert!(t.widget("f1_99").is_none());
    }

    #[test]
    fn widget_kind_serde_is_tagged() {
        let json = serde_json::to_string(&WidgetKind::Checkbox { on_value: "Yes".into() }).unwrap();
        assert_eq!(json, r#"{"type":"checkbox","on_value":"Yes"}"#);
        let back: WidgetKind = serde_json::from_str(r#"{"type":"text"}"#).unwrap();
        assert_eq!(back, WidgetKind::Text { max_length: None });
    }

    #[tokio::test]
    async fn provider_not_found() {
        let provider = InMemoryTemplateProvider::new().with_template(template());
        assert!(provider.get_template("1040", 2024).await.is_ok());
        let err = provider.get_template("1040", 2023).await.unwrap_err();
        assert_eq!(
            err,
            TemplateError::NotFound {
                form_type: "1040".into(),
                tax_year: 2023
            }
        );
    }
}
