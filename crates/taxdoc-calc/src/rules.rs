//! Tax rules: standard deductions, bracket schedules and credit amounts

use crate::error::CalcError;
use crate::facts::FilingStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// One marginal bracket: `rate` applies to income in `[lower, upper)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bracket {
    pub lower: Decimal,
    /// `None` for the top bracket
    pub upper: Option<Decimal>,
    pub rate: Decimal,
}

/// Per-dependent non-refundable credit amounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditAmounts {
    pub child_tax_credit: Decimal,
    pub other_dependent_credit: Decimal,
}

/// Rules for one (tax year, filing status)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRules {
    pub standard_deduction: Decimal,
    pub brackets: Vec<Bracket>,
    pub credits: CreditAmounts,
}

impl TaxRules {
    /// Check the bracket schedule is contiguous, starts at zero and ends open
    ///
    /// # Errors
    /// `CalcError::InvalidRules` describing the first defect found.
    pub fn validate(&self, tax_year: u16, status: FilingStatus) -> Result<(), CalcError> {
        let invalid = |reason: String| CalcError::InvalidRules {
            tax_year,
            status,
            reason,
        };

        let first = self
            .brackets
            .first()
            .ok_or_else(|| invalid("empty bracket schedule".to_string()))?;
        if !first.lower.is_zero() {
            return Err(invalid(format!("first bracket starts at {}", first.lower)));
        }
        for pair in self.brackets.windows(2) {
            match pair[0].upper {
                Some(upper) if upper == pair[1].lower && upper > pair[0].lower => {}
                _ => {
                    return Err(invalid(format!(
                        "bracket at {} does not meet bracket at {}",
                        pair[0].lower, pair[1].lower
                    )))
                }
            }
        }
        if self.brackets.last().and_then(|b| b.upper).is_some() {
            return Err(invalid("top bracket must be open-ended".to_string()));
        }
        if self.standard_deduction.is_sign_negative() {
            return Err(invalid("negative standard deduction".to_string()));
        }
        Ok(())
    }
}

/// Build a schedule from ascending upper thresholds and matching rates
///
/// `rates` has one more entry than `thresholds`; the last rate is the open
/// top bracket.
#[must_use]
pub fn schedule(thresholds: &[i64], rates_pct: &[i64]) -> Vec<Bracket> {
    let mut brackets = Vec::with_capacity(rates_pct.len());
    let mut lower = Decimal::ZERO;
    for (i, rate) in rates_pct.iter().enumerate() {
        let upper = thresholds.get(i).map(|t| Decimal::from(*t));
        brackets.push(Bracket {
            lower,
            upper,
            rate: Decimal::new(*rate, 2),
        });
        if let Some(u) = upper {
            lower = u;
        }
    }
    brackets
}

/// Source of published rules
pub trait TaxRulesProvider: Send + Sync + Debug {
    /// Rules for a year and status
    ///
    /// # Errors
    /// `CalcError::MissingRules` when the provider has no data for the key.
    fn get_rules(&self, tax_year: u16, status: FilingStatus) -> Result<TaxRules, CalcError>;
}

const RATES_PCT: [i64; 7] = [10, 12, 22, 24, 32, 35, 37];

/// Built-in published tables
#[derive(Debug, Clone, Default)]
pub struct StaticRulesProvider {
    rules: BTreeMap<(u16, FilingStatus), TaxRules>,
}

impl StaticRulesProvider {
    /// Empty provider
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Provider with the 2023 and 2024 federal tables
    #[must_use]
    pub fn federal() -> Self {
        use FilingStatus::{HeadOfHousehold, MarriedJoint, MarriedSeparate, QualifyingWidow, Single};

        let credits = CreditAmounts {
            child_tax_credit: Decimal::from(2000),
            other_dependent_credit: Decimal::from(500),
        };
        let mut provider = Self::empty();

        let y2023: [(FilingStatus, i64, [i64; 6]); 5] = [
            (Single, 13_850, [11_000, 44_725, 95_375, 182_100, 231_250, 578_125]),
            (MarriedJoint, 27_700, [22_000, 89_450, 190_750, 364_200, 462_500, 693_750]),
            (MarriedSeparate, 13_850, [11_000, 44_725, 95_375, 182_100, 231_250, 346_875]),
            (HeadOfHousehold, 20_800, [15_700, 59_850, 95_350, 182_100, 231_250, 578_100]),
            (QualifyingWidow, 27_700, [22_000, 89_450, 190_750, 364_200, 462_500, 693_750]),
        ];
        let y2024: [(FilingStatus, i64, [i64; 6]); 5] = [
            (Single, 14_600, [11_600, 47_150, 100_525, 191_950, 243_725, 609_350]),
            (MarriedJoint, 29_200, [23_200, 94_300, 201_050, 383_900, 487_450, 731_200]),
            (MarriedSeparate, 14_600, [11_600, 47_150, 100_525, 191_950, 243_725, 365_600]),
            (HeadOfHousehold, 21_900, [16_550, 63_100, 100_500, 191_950, 243_700, 609_350]),
            (QualifyingWidow, 29_200, [23_200, 94_300, 201_050, 383_900, 487_450, 731_200]),
        ];

        for (year, table) in [(2023, y2023), (2024, y2024)] {
            for (status, deduction, thresholds) in table {
                provider.insert(
                    year,
                    status,
                    TaxRules {
                        standard_deduction: Decimal::from(deduction),
                        brackets: schedule(&thresholds, &RATES_PCT),
                        credits,
                    },
                );
            }
        }
        provider
    }

    /// Add or replace rules for a key
    pub fn insert(&mut self, tax_year: u16, status: FilingStatus, rules: TaxRules) {
        self.rules.insert((tax_year, status), rules);
    }

    /// Years with at least one status loaded
    #[must_use]
    pub fn years(&self) -> Vec<u16> {
        let mut years: Vec<u16> = self.rules.keys().map(|(y, _)| *y).collect();
        years.dedup();
        years
    }
}

impl TaxRulesProvider for StaticRulesProvider {
    fn get_rules(&self, tax_year: u16, status: FilingStatus) -> Result<TaxRules, CalcError> {
        self.rules
            .get(&(tax_year, status))
            .cloned()
            .ok_or(CalcError::MissingRules { tax_year, status })
    }
}
