//! Filled-form rendering

use crate::error::EngineError;
use crate::template::{FieldValue, FormTemplate, WidgetKind};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Token written for unchecked boxes
pub const CHECKBOX_OFF: &str = "Off";

/// Produces the stored bytes of a filled form
///
/// Implementations must be deterministic: identical inputs yield identical
/// bytes, so re-fills can be compared by content hash.
pub trait FormRenderer: Send + Sync + Debug {
    /// Render `values` (keyed by widget field name) onto `template`
    ///
    /// # Errors
    /// `EngineError::Render` when output cannot be produced.
    fn render(&self, template: &FormTemplate, values: &BTreeMap<String, FieldValue>) -> Result<Vec<u8>, EngineError>;
}

#[derive(Serialize)]
struct CanonicalForm<'a> {
    form_type: &'a str,
    tax_year: u16,
    template_hash: String,
    fields: BTreeMap<&'a str, String>,
}

/// Renders a canonical JSON field dump
///
/// Checkboxes render their widget's on-state token or `Off`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalJsonRenderer;

impl FormRenderer for CanonicalJsonRenderer {
    fn render(&self, template: &FormTemplate, values: &BTreeMap<String, FieldValue>) -> Result<Vec<u8>, EngineError> {
        let mut fields = BTreeMap::new();
        for (name, value) in values {
            let rendered = match value {
                FieldValue::Text(s) | FieldValue::Choice(s) => s.clone(),
                FieldValue::Checkbox(false) => CHECKBOX_OFF.to_string(),
                FieldValue::Checkbox(true) => match template.widget(name).map(|w| &w.kind) {
                    Some(WidgetKind::Checkbox { on_value }) => on_value.clone(),
                    _ => {
                        return Err(EngineError::Render(format!(
                            "{name} is not a checkbox widget"
                        )))
                    }
                },
            };
            fields.insert(name.as_str(), rendered);
        }

        let form = CanonicalForm {
            form_type: &template.form_type,
            tax_year: template.tax_year,
            template_hash: template.content_hash().to_string(),
            fields,
        };
        serde_json::to_vec_pretty(&form).map_err(|e| EngineError::Render(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Widget;

    fn template() -> FormTemplate {
        FormTemplate::new(
            "1040",
            2024,
            b"blank".to_vec(),
            vec![
                Widget::text("f1_32"),
                Widget::checkbox("c1_1", "1"),
                Widget::checkbox("c1_2", "Yes"),
            ],
        )
    }

    #[test]
    fn checkbox_uses_widget_on_value() {
        let mut values = BTreeMap::new();
        values.insert("c1_1".to_string(), FieldValue::Checkbox(false));
        values.insert("c1_2".to_string(), FieldValue::Checkbox(true));
        values.insert("f1_32".to_string(), FieldValue::Text("55,151.93".into()));

        let bytes = CanonicalJsonRenderer.render(&template(), &values).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["fields"]["c1_1"], "Off");
        assert_eq!(json["fields"]["c1_2"], "Yes");
        assert_eq!(json["fields"]["f1_32"], "55,151.93");
        assert_eq!(json["tax_year"], 2024);
    }

    #[test]
    fn output_is_deterministic() {
        let mut values = BTreeMap::new();
        values.insert("f1_32".to_string(), FieldValue::Text("1.00".into()));
        let a = CanonicalJsonRenderer.render(&template(), &values).unwrap();
        let b = CanonicalJsonRenderer.render(&template(), &values).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn checked_non_checkbox_is_render_error() {
        let mut values = BTreeMap::new();
        values.insert("f1_32".to_string(), FieldValue::Checkbox(true));
        assert!(matches!(
            CanonicalJsonRenderer.render(&template(), &values),
            Err(EngineError::Render(_))
        ));
    }
}
