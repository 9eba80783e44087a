//! Form 1040 calculation
//!
//! ```text
//! total_income ─ adjustments ─► AGI ─ standard deduction ─► taxable income
//!     taxable income ─► progressive brackets ─► tax ─ credits ─► total tax
//!     total payments ─ total tax ─► refund (+) / amount owed (−)
//! ```

use crate::error::CalcError;
use crate::facts::TaxFacts;
use crate::money::round_cents;
use crate::rules::{Bracket, TaxRulesProvider};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Derived figures for one calculation
///
/// Immutable once computed; recompute instead of editing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxResult {
    pub total_income: Decimal,
    pub adjustments: Decimal,
    pub agi: Decimal,
    pub standard_deduction: Decimal,
    pub taxable_income: Decimal,
    pub tax: Decimal,
    pub credits_applied: Decimal,
    pub total_tax: Decimal,
    pub total_payments: Decimal,
    /// Positive: refund. Negative: amount owed.
    pub refund_or_due: Decimal,
    pub is_refund: bool,
}

impl TaxResult {
    /// Amount owed, zero when refunding or even
    #[must_use]
    pub fn amount_owed(&self) -> Decimal {
        if self.refund_or_due.is_sign_negative() {
            -self.refund_or_due
        } else {
            Decimal::ZERO
        }
    }
}

/// Tax on `taxable` under a marginal schedule
///
/// Each bracket's share is rounded to cents before summation.
#[must_use]
pub fn progressive_tax(taxable: Decimal, brackets: &[Bracket]) -> Decimal {
    brackets
        .iter()
        .filter(|b| taxable > b.lower)
        .map(|b| {
            let top = b.upper.map_or(taxable, |u| u.min(taxable));
            round_cents((top - b.lower) * b.rate)
        })
        .sum()
}

/// Calculator bound to a rules provider
#[derive(Debug, Clone)]
pub struct TaxCalculator {
    rules: Arc<dyn TaxRulesProvider>,
}

impl TaxCalculator {
    /// Create calculator over a rules provider
    #[inline]
    #[must_use]
    pub fn new(rules: Arc<dyn TaxRulesProvider>) -> Self {
        Self { rules }
    }

    /// Compute the return
    ///
    /// # Errors
    /// - `CalcError::MissingRules` when no rules exist for the year/status
    /// - `CalcError::InvalidRules` when the schedule is malformed
    pub fn compute(&self, facts: &TaxFacts) -> Result<TaxResult, CalcError> {
        let rules = self.rules.get_rules(facts.tax_year, facts.filing_status)?;
        rules.validate(facts.tax_year, facts.filing_status)?;

        let total_income = round_cents(facts.total_income());
        let adjustments = round_cents(facts.adjustments);
        let agi = (total_income - adjustments).max(Decimal::ZERO);
        let standard_deduction = round_cents(rules.standard_deduction);
        let taxable_income = (agi - standard_deduction).max(Decimal::ZERO);
        let tax = progressive_tax(taxable_income, &rules.brackets);

        let (ctc_count, odc_count) = facts.dependents.iter().fold((0u32, 0u32), |(c, o), d| {
            (
                c + u32::from(d.child_tax_credit),
                o + u32::from(d.other_dependent_credit && !d.child_tax_credit),
            )
        });
        let credits_available = rules.credits.child_tax_credit * Decimal::from(ctc_count)
            + rules.credits.other_dependent_credit * Decimal::from(odc_count);
        let credits_applied = round_cents(credits_available.min(tax));
        let total_tax = (tax - credits_applied).max(Decimal::ZERO);

        let total_payments = round_cents(facts.total_payments());
        let refund_or_due = total_payments - total_tax;

        let result = TaxResult {
            total_income,
            adjustments,
            agi,
            standard_deduction,
            taxable_income,
            tax,
            credits_applied,
            total_tax,
            total_payments,
            refund_or_due,
            is_refund: refund_or_due > Decimal::ZERO,
        };

        tracing::debug!(
            tax_year = facts.tax_year,
            status = %facts.filing_status,
            taxable = %result.taxable_income,
            total_tax = %result.total_tax,
            refund_or_due = %result.refund_or_due,
            "computed return"
        );
        Ok(result)
    }
}
