//! Effective fact set for one fill
//!
//! ```text
//! raw facts ∪ calculated lines ∪ status/asset boxes ∪ dependent rows ∪ bank lines ∪ answers
//! ```
//!
//! Later layers overwrite earlier ones. Every derived key is a semantic
//! key the mapping can resolve.

use serde::{Deserialize, Serialize};
use taxdoc_calc::{Decimal, Dependent, FactSet, FactValue, FilingStatus, TaxFacts, TaxResult};

/// Raw fact names the fill path reads directly
pub mod inputs {
    pub const ROUTING_NUMBER: &str = "routing_number";
    pub const ACCOUNT_NUMBER: &str = "account_number";
    pub const ACCOUNT_TYPE: &str = "account_type";
}

/// Derived semantic keys
pub mod keys {
    pub const WAGES: &str = "wages_line_1a";
    pub const TOTAL_INCOME: &str = "total_income_line_9";
    pub const ADJUSTMENTS: &str = "adjustments_line_10";
    pub const AGI: &str = "agi_line_11";
    pub const STANDARD_DEDUCTION: &str = "standard_deduction_line_12";
    pub const TAXABLE_INCOME: &str = "taxable_income_line_15";
    pub const TAX: &str = "tax_line_16";
    pub const CREDITS: &str = "credits_line_19";
    pub const TOTAL_TAX: &str = "total_tax_line_24";
    pub const WITHHOLDING: &str = "withholding_line_25d";
    pub const TOTAL_PAYMENTS: &str = "total_payments_line_33";
    pub const OVERPAID: &str = "overpaid_line_34";
    pub const REFUND: &str = "refund_line_35a";
    pub const AMOUNT_OWED: &str = "amount_owed_line_37";
    pub const ROUTING_NUMBER: &str = "routing_number_line_35b";
    pub const ACCOUNT_NUMBER: &str = "account_number_line_35d";
    pub const ACCOUNT_CHECKING: &str = "account_type_checking_line_35c";
    pub const ACCOUNT_SAVINGS: &str = "account_type_savings_line_35c";
    pub const DIGITAL_ASSETS_YES: &str = "digital_assets_yes";
    pub const DIGITAL_ASSETS_NO: &str = "digital_assets_no";

    /// `filing_status_single`, `filing_status_married_joint`, ...
    #[must_use]
    pub fn filing_status(status: super::FilingStatus) -> String {
        format!("filing_status_{}", status.as_str())
    }

    /// `dependent_{row}_{column}`
    #[must_use]
    pub fn dependent(row: usize, column: &str) -> String {
        format!("dependent_{row}_{column}")
    }
}

/// A value the caller must supply before the form can be completed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Fact name to answer under in `user_responses`
    pub field: String,
    pub prompt: String,
}

impl Question {
    fn new(field: &str, prompt: &str) -> Self {
        Self {
            field: field.to_string(),
            prompt: prompt.to_string(),
        }
    }
}

/// Union of the caller's facts with stored and fresh answers
///
/// A non-blank fact wins over an answer to the same name; answers only
/// fill in what the facts leave blank or absent.
#[must_use]
pub fn merge_answers(facts: &FactSet, answers: &FactSet) -> FactSet {
    let mut merged = facts.clone();
    for (name, answer) in answers {
        if present(facts, name).is_none() {
            merged.insert(name.clone(), answer.clone());
        }
    }
    merged
}

fn present<'a>(facts: &'a FactSet, name: &str) -> Option<&'a FactValue> {
    facts.get(name).filter(|v| !v.is_blank())
}

/// Questions blocking completion, empty when the form can be filled
///
/// A refund needs direct-deposit routing and account numbers. Account
/// type defaults to checking and is never asked for.
#[must_use]
pub fn pending_questions(result: &TaxResult, facts: &FactSet) -> Vec<Question> {
    if !(result.is_refund && result.refund_or_due > Decimal::ZERO) {
        return Vec::new();
    }
    let mut questions = Vec::new();
    if present(facts, inputs::ROUTING_NUMBER).is_none() {
        questions.push(Question::new(
            inputs::ROUTING_NUMBER,
            "What is the 9-digit routing number for the refund deposit account?",
        ));
    }
    if present(facts, inputs::ACCOUNT_NUMBER).is_none() {
        questions.push(Question::new(
            inputs::ACCOUNT_NUMBER,
            "What is the account number for the refund deposit account?",
        ));
    }
    questions
}

/// Build the complete semantic fact set for writing
///
/// `facts` already contains the merged answers. Only the first
/// `max_dependent_rows` dependents get rows.
#[must_use]
pub fn effective_facts(facts: &FactSet, tax: &TaxFacts, result: &TaxResult, max_dependent_rows: usize) -> FactSet {
    let mut out = facts.clone();
    let mut number = |key: &str, value: Decimal| {
        out.insert(key.to_string(), FactValue::Number(value));
    };

    number(keys::WAGES, tax.wages);
    number(keys::TOTAL_INCOME, result.total_income);
    number(keys::ADJUSTMENTS, result.adjustments);
    number(keys::AGI, result.agi);
    number(keys::STANDARD_DEDUCTION, result.standard_deduction);
    number(keys::TAXABLE_INCOME, result.taxable_income);
    number(keys::TAX, result.tax);
    number(keys::CREDITS, result.credits_applied);
    number(keys::TOTAL_TAX, result.total_tax);
    number(keys::WITHHOLDING, tax.withholding);
    number(keys::TOTAL_PAYMENTS, result.total_payments);
    if result.is_refund {
        number(keys::OVERPAID, result.refund_or_due);
        number(keys::REFUND, result.refund_or_due);
    } else if result.refund_or_due < Decimal::ZERO {
        number(keys::AMOUNT_OWED, result.amount_owed());
    }

    for status in FilingStatus::ALL {
        out.insert(
            keys::filing_status(status),
            FactValue::Flag(status == tax.filing_status),
        );
    }
    out.insert(keys::DIGITAL_ASSETS_YES.into(), FactValue::Flag(tax.digital_assets));
    out.insert(keys::DIGITAL_ASSETS_NO.into(), FactValue::Flag(!tax.digital_assets));

    for (row, dependent) in tax.dependents.iter().take(max_dependent_rows).enumerate() {
        insert_dependent(&mut out, row, dependent);
    }

    if result.is_refund {
        if let Some(routing) = present(facts, inputs::ROUTING_NUMBER).cloned() {
            out.insert(keys::ROUTING_NUMBER.into(), routing);
        }
        if let Some(account) = present(facts, inputs::ACCOUNT_NUMBER).cloned() {
            out.insert(keys::ACCOUNT_NUMBER.into(), account);
        }
        let savings = present(facts, inputs::ACCOUNT_TYPE)
            .and_then(FactValue::as_text)
            .is_some_and(|t| t.trim().eq_ignore_ascii_case("savings"));
        out.insert(keys::ACCOUNT_CHECKING.into(), FactValue::Flag(!savings));
        out.insert(keys::ACCOUNT_SAVINGS.into(), FactValue::Flag(savings));
    }

    out
}

fn insert_dependent(out: &mut FactSet, row: usize, dependent: &Dependent) {
    out.insert(keys::dependent(row, "first_name"), FactValue::text(&dependent.first_name));
    out.insert(keys::dependent(row, "last_name"), FactValue::text(&dependent.last_name));
    out.insert(keys::dependent(row, "ssn"), FactValue::text(&dependent.ssn));
    out.insert(keys::dependent(row, "relationship"), FactValue::text(&dependent.relationship));
    out.insert(
        keys::dependent(row, "child_tax_credit"),
        FactValue::Flag(dependent.child_tax_credit),
    );
    out.insert(
        keys::dependent(row, "other_dependent_credit"),
        FactValue::Flag(dependent.other_dependent_credit),
    );
}
