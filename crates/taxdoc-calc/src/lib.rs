//! Form 1040 tax calculator
//!
//! Pure computation from validated facts to a [`TaxResult`]: standard
//! deduction lookup, progressive bracket tax, non-refundable dependent
//! credits and the refund/amount-due sign convention.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use taxdoc_calc::{StaticRulesProvider, TaxCalculator, TaxFacts};
//!
//! let calculator = TaxCalculator::new(Arc::new(StaticRulesProvider::federal()));
//! let facts = TaxFacts::from_facts(&fact_set, 2024, &dependents)?;
//! let result = calculator.compute(&facts)?;
//! println!("refund or due: {}", result.refund_or_due);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod calculator;
mod error;
mod facts;
pub mod money;
mod rules;

pub use calculator::{progressive_tax, TaxCalculator, TaxResult};
pub use error::CalcError;
pub use facts::{Dependent, FactSet, FactValue, FilingStatus, TaxFacts};
pub use rules::{schedule, Bracket, CreditAmounts, StaticRulesProvider, TaxRules, TaxRulesProvider};

/// Re-exported so callers build amounts with the same decimal type
pub use rust_decimal::Decimal;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
