//! Fact value to widget value conversion
//!
//! ```text
//! Text widget      ◄── Text (verbatim) | Number (grouped currency, or plain for identifiers)
//! Checkbox widget  ◄── Flag
//! Choice widget    ◄── Text matching one option
//! ```
//!
//! Anything else is a [`WriteRejection`]; the engine skips that widget.

use crate::template::{FieldValue, Widget, WidgetKind};
use serde::Serialize;
use std::fmt::{self, Display, Formatter};
use taxdoc_calc::money::format_grouped;
use taxdoc_calc::FactValue;

/// Runs of `_`-separated key tokens whose numbers are written digit-for-digit
const IDENTIFIER_MARKERS: [&[&str]; 4] = [&["ssn"], &["ein"], &["routing", "number"], &["account", "number"]];

/// How numeric values for a key are formatted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCategory {
    /// Grouped decimal, two places
    Currency,
    /// Verbatim digits
    Identifier,
}

impl FieldCategory {
    #[must_use]
    pub fn of(semantic_key: &str) -> Self {
        let key = semantic_key.to_ascii_lowercase();
        let tokens: Vec<&str> = key.split('_').collect();
        if IDENTIFIER_MARKERS
            .iter()
            .any(|marker| tokens.windows(marker.len()).any(|run| run == *marker))
        {
            Self::Identifier
        } else {
            Self::Currency
        }
    }
}

/// Why a value could not be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum WriteRejection {
    /// Mapped field path is not a widget of the template
    NoWidget,
    /// Value kind does not fit the widget kind
    TypeMismatch { widget: &'static str, value: &'static str },
    /// Text longer than the widget allows
    TooLong { max_length: usize, length: usize },
    /// Choice value outside the option list
    NotAnOption { value: String },
}

impl Display for WriteRejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoWidget => f.write_str("no widget for mapped field"),
            Self::TypeMismatch { widget, value } => write!(f, "{widget} widget cannot take a {value} value"),
            Self::TooLong { max_length, length } => {
                write!(f, "value of length {length} exceeds limit {max_length}")
            }
            Self::NotAnOption { value } => write!(f, "'{value}' is not an option"),
        }
    }
}

fn value_kind(value: &FactValue) -> &'static str {
    match value {
        FactValue::Flag(_) => "boolean",
        FactValue::Text(_) => "text",
        FactValue::Number(_) => "number",
    }
}

fn fit_text(text: String, max_length: Option<usize>) -> Result<FieldValue, WriteRejection> {
    let length = text.chars().count();
    match max_length {
        Some(max) if length > max => Err(WriteRejection::TooLong {
            max_length: max,
            length,
        }),
        _ => Ok(FieldValue::Text(text)),
    }
}

/// Convert a fact for writing into `widget`
///
/// # Errors
/// A [`WriteRejection`] when the value does not fit the widget.
pub fn to_field_value(semantic_key: &str, value: &FactValue, widget: &Widget) -> Result<FieldValue, WriteRejection> {
    match (&widget.kind, value) {
        (WidgetKind::Text { max_length }, FactValue::Text(s)) => fit_text(s.clone(), *max_length),
        (WidgetKind::Text { max_length }, FactValue::Number(n)) => {
            let text = match FieldCategory::of(semantic_key) {
                FieldCategory::Currency => format_grouped(*n),
                FieldCategory::Identifier => n.normalize().to_string(),
            };
            fit_text(text, *max_length)
        }
        (WidgetKind::Checkbox { .. }, FactValue::Flag(checked)) => Ok(FieldValue::Checkbox(*checked)),
        (WidgetKind::Choice { options }, FactValue::Text(s)) => options
            .iter()
            .find(|o| o.eq_ignore_ascii_case(s.trim()))
            .map(|o| FieldValue::Choice(o.clone()))
            .ok_or_else(|| WriteRejection::NotAnOption { value: s.clone() }),
        (kind, value) => Err(WriteRejection::TypeMismatch {
            widget: kind.name(),
            value: value_kind(value),
        }),
    }
}
