//! Tax facts: the flat caller-supplied fact set and its validated form

use crate::error::CalcError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// One fact value
///
/// Strings are tried before numbers so identifiers such as SSNs stay text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    Flag(bool),
    Text(String),
    Number(Decimal),
}

impl FactValue {
    /// Text value
    #[inline]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Numeric view; numeric text is accepted
    #[must_use]
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => Decimal::from_str(s.trim().replace(',', "").as_str()).ok(),
            Self::Flag(_) => None,
        }
    }

    /// Boolean view; `yes`/`no`/`true`/`false` text is accepted
    #[must_use]
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            Self::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "yes" | "true" | "y" => Some(true),
                "no" | "false" | "n" => Some(false),
                _ => None,
            },
            Self::Number(_) => None,
        }
    }

    /// Text view of a text value
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Empty text counts as absent
    #[must_use]
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Text(s) if s.trim().is_empty())
    }
}

impl From<bool> for FactValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<Decimal> for FactValue {
    fn from(value: Decimal) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for FactValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Flat fact set in key order
pub type FactSet = BTreeMap<String, FactValue>;

/// Filing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilingStatus {
    Single,
    MarriedJoint,
    MarriedSeparate,
    HeadOfHousehold,
    QualifyingWidow,
}

impl FilingStatus {
    /// Every status, in form order
    pub const ALL: [Self; 5] = [
        Self::Single,
        Self::MarriedJoint,
        Self::MarriedSeparate,
        Self::HeadOfHousehold,
        Self::QualifyingWidow,
    ];

    /// Stable snake_case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::MarriedJoint => "married_joint",
            Self::MarriedSeparate => "married_separate",
            Self::HeadOfHousehold => "head_of_household",
            Self::QualifyingWidow => "qualifying_widow",
        }
    }
}

impl Display for FilingStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilingStatus {
    type Err = CalcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "single" => Ok(Self::Single),
            "married_joint" | "married_filing_jointly" | "mfj" => Ok(Self::MarriedJoint),
            "married_separate" | "married_filing_separately" | "mfs" => Ok(Self::MarriedSeparate),
            "head_of_household" | "hoh" => Ok(Self::HeadOfHousehold),
            "qualifying_widow" | "qualifying_widower" | "qualifying_surviving_spouse" | "qw"
            | "qss" => Ok(Self::QualifyingWidow),
            _ => Err(CalcError::validation(
                "filing_status",
                format!("unknown filing status '{s}'"),
            )),
        }
    }
}

/// A dependent claimed on the return
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependent {
    pub first_name: String,
    pub last_name: String,
    pub ssn: String,
    pub relationship: String,
    #[serde(default)]
    pub child_tax_credit: bool,
    #[serde(default)]
    pub other_dependent_credit: bool,
}

/// Validated facts ready for calculation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxFacts {
    pub tax_year: u16,
    pub filing_status: FilingStatus,
    pub wages: Decimal,
    pub taxable_interest: Decimal,
    pub ordinary_dividends: Decimal,
    pub capital_gain: Decimal,
    pub other_income: Decimal,
    pub adjustments: Decimal,
    pub withholding: Decimal,
    pub estimated_payments: Decimal,
    pub digital_assets: bool,
    pub dependents: Vec<Dependent>,
}

impl TaxFacts {
    /// Validate a flat fact set
    ///
    /// # Errors
    /// `CalcError::Validation` for a missing or unknown filing status, a
    /// non-numeric or negative money fact, or a non-boolean flag.
    pub fn from_facts(
        facts: &FactSet,
        tax_year: u16,
        dependents: &[Dependent],
    ) -> Result<Self, CalcError> {
        let filing_status = match facts.get("filing_status") {
            Some(FactValue::Text(s)) => s.parse()?,
            Some(_) => {
                return Err(CalcError::validation("filing_status", "expected text"));
            }
            None => return Err(CalcError::validation("filing_status", "required")),
        };

        let digital_assets = match facts.get("digital_assets") {
            Some(v) if !v.is_blank() => v
                .as_flag()
                .ok_or_else(|| CalcError::validation("digital_assets", "expected yes/no"))?,
            _ => false,
        };

        for (i, dep) in dependents.iter().enumerate() {
            if dep.first_name.trim().is_empty() || dep.last_name.trim().is_empty() {
                return Err(CalcError::validation(
                    format!("dependents[{i}]"),
                    "name is required",
                ));
            }
        }

        Ok(Self {
            tax_year,
            filing_status,
            wages: money(facts, "wages")?,
            taxable_interest: money(facts, "taxable_interest")?,
            ordinary_dividends: money(facts, "ordinary_dividends")?,
            capital_gain: money(facts, "capital_gain")?,
            other_income: money(facts, "other_income")?,
            adjustments: money(facts, "adjustments")?,
            withholding: money(facts, "withholding")?,
            estimated_payments: money(facts, "estimated_payments")?,
            digital_assets,
            dependents: dependents.to_vec(),
        })
    }

    /// Income before adjustments
    #[must_use]
    pub fn total_income(&self) -> Decimal {
        self.wages
            + self.taxable_interest
            + self.ordinary_dividends
            + self.capital_gain
            + self.other_income
    }

    /// Withholding plus estimated payments
    #[must_use]
    pub fn total_payments(&self) -> Decimal {
        self.withholding + self.estimated_payments
    }
}

/// Absent money facts are zero; present ones must be non-negative numbers
fn money(facts: &FactSet, field: &str) -> Result<Decimal, CalcError> {
    match facts.get(field) {
        None => Ok(Decimal::ZERO),
        Some(v) if v.is_blank() => Ok(Decimal::ZERO),
        Some(v) => {
            let amount = v
                .as_decimal()
                .ok_or_else(|| CalcError::validation(field, "expected an amount"))?;
            if amount.is_sign_negative() && !amount.is_zero() {
                return Err(CalcError::validation(field, "must not be negative"));
            }
            Ok(crate::money::round_cents(amount))
        }
    }
}
