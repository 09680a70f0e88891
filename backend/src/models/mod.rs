//! Domain models for the case-import pipeline.
//!
//! - [`ImportRow`] - one validated, normalized source row
//! - [`Case`] - the aggregate unit of work (customer + transactions)
//! - [`Customer`] - customer snapshot embedded in a case
//! - [`Transaction`] - one disputed transaction
//! - [`FraudType`] / [`ReceivedChannel`] - closed classifications

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference number prefix for every case.
pub const REFERENCE_PREFIX: &str = "IBMB";

/// Normalized form of a source transaction identifier, used as the
/// dedup key across the store and the current batch.
pub fn normalize_transaction_id(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Highest sequence a reference number can carry in one year.
pub const MAX_REFERENCE_SEQUENCE: u32 = 999_999;

/// Sum of amounts, `None` if it leaves the `Decimal` range.
pub fn checked_total(amounts: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(amount))
}

/// Format a reference number: `IBMB-<year>-<6-digit sequence>`.
pub fn format_reference_number(year: i32, sequence: u32) -> String {
    format!("{}-{}-{:06}", REFERENCE_PREFIX, year, sequence)
}

// =============================================================================
// Fraud Type
// =============================================================================

/// Classified fraud type of a case.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum FraudType {
    ScamInvestment,
    Ato,
    SimSwap,
    Phishing,
    SocialEngineering,
    #[default]
    Other,
}

impl FraudType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScamInvestment => "scam_investment",
            Self::Ato => "ato",
            Self::SimSwap => "sim_swap",
            Self::Phishing => "phishing",
            Self::SocialEngineering => "social_engineering",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FraudType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Received Channel
// =============================================================================

/// Channel through which the dispute was received.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReceivedChannel {
    Branch,
    ContactCenter,
    MobileApp,
    Email,
}

impl ReceivedChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Branch => "branch",
            Self::ContactCenter => "contact_center",
            Self::MobileApp => "mobile_app",
            Self::Email => "email",
        }
    }
}

impl fmt::Display for ReceivedChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Workflow status
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    #[default]
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvestigationStatus {
    #[default]
    InProgress,
    Completed,
}

/// Where a case came from. Imported cases are distinguishable from
/// hand-entered ones.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaseSource {
    #[default]
    Manual,
    Import,
}

// =============================================================================
// Import Row
// =============================================================================

/// One validated, normalized source row.
///
/// Only the validator constructs these; downstream stages trust them.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImportRow {
    /// 1-based source row number (header is row 1).
    pub row_number: usize,

    pub cnic: String,
    pub customer_name: String,
    pub customer_city: String,
    pub customer_region: String,
    pub customer_mobile: String,
    pub account_number: String,

    pub fraud_type: FraudType,
    pub scenario: String,
    pub investigation_officer: String,
    pub branch_code: String,
    pub case_received_date: NaiveDate,
    pub case_received_channel: ReceivedChannel,

    pub customer_reported_late: bool,
    pub beneficiary_added: bool,
    pub ftdh_filled: bool,
    pub ftdh_id: String,
    pub fms_alert_generated: bool,
    pub expected_recovery_onus: Decimal,
    pub expected_recovery_member_bank: Decimal,
    pub transaction_period: String,
    pub date_incident_occurred: Option<NaiveDate>,
    pub disputed_transaction_details: String,
    pub no_of_transactions: Option<u32>,
    pub dispute_amount_at_risk: Option<Decimal>,
    pub complaint_no: String,

    pub transaction_id: String,
    pub transaction_amount: Decimal,
    pub transaction_date: NaiveDate,
    pub transaction_time: NaiveTime,
    pub stan: Option<String>,
    pub beneficiary_account: String,
    pub beneficiary_bank: String,
    pub beneficiary_name: String,
    pub transaction_channel: String,
}

impl ImportRow {
    /// Dedup key of this row's transaction.
    pub fn transaction_key(&self) -> String {
        normalize_transaction_id(&self.transaction_id)
    }
}

// =============================================================================
// Case aggregate
// =============================================================================

/// Customer snapshot embedded in a case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub id: u64,
    pub cnic: String,
    pub name: String,
    pub city: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub mobile: String,
    pub account_number: String,
}

/// A disputed transaction. Belongs to exactly one case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: u64,
    pub transaction_id: String,
    pub amount: Decimal,
    pub disputed_amount: Decimal,
    pub date: NaiveDate,
    pub time: NaiveTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stan: Option<String>,
    #[serde(default)]
    pub beneficiary_account: String,
    #[serde(default)]
    pub beneficiary_bank: String,
    #[serde(default)]
    pub beneficiary_name: String,
    #[serde(default)]
    pub channel: String,
}

/// Entry of a case's investigation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionLogEntry {
    pub at: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    #[serde(default)]
    pub note: String,
}

/// One fraud-dispute investigation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Case {
    pub id: u64,
    pub reference_number: String,
    pub customer: Customer,
    #[serde(default)]
    pub status: CaseStatus,
    #[serde(default)]
    pub investigation_status: InvestigationStatus,

    #[serde(default)]
    pub fraud_type: FraudType,
    #[serde(default)]
    pub scenario: String,
    pub case_received_date: NaiveDate,
    pub case_received_channel: ReceivedChannel,
    #[serde(default)]
    pub investigation_officer: String,
    #[serde(default)]
    pub branch_code: String,
    #[serde(default)]
    pub customer_reported_late: bool,
    #[serde(default)]
    pub beneficiary_added: bool,
    #[serde(default)]
    pub ftdh_filled: bool,
    #[serde(default)]
    pub ftdh_id: String,
    #[serde(default)]
    pub fms_alert_generated: bool,
    #[serde(default)]
    pub expected_recovery_onus: Decimal,
    #[serde(default)]
    pub expected_recovery_member_bank: Decimal,
    #[serde(default)]
    pub transaction_period: String,
    #[serde(default)]
    pub date_incident_occurred: Option<NaiveDate>,
    #[serde(default)]
    pub disputed_transaction_details: String,
    #[serde(default)]
    pub no_of_transactions: u32,
    #[serde(default)]
    pub dispute_amount_at_risk: Decimal,
    #[serde(default)]
    pub complaint_no: String,

    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub action_log: Vec<ActionLogEntry>,
    pub total_disputed_amount: Decimal,

    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub source: CaseSource,
}

impl Case {
    /// Sum of the transactions' disputed amounts (`None` on overflow).
    pub fn disputed_sum(&self) -> Option<Decimal> {
        checked_total(self.transactions.iter().map(|t| t.disputed_amount))
    }

    /// True when the stored total matches the transactions.
    pub fn is_total_consistent(&self) -> bool {
        self.disputed_sum() == Some(self.total_disputed_amount)
    }

    pub fn is_imported(&self) -> bool {
        self.source == CaseSource::Import
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_number_is_zero_padded() {
        assert_eq!(format_reference_number(2025, 7), "IBMB-2025-000007");
        assert_eq!(format_reference_number(2025, 123456), "IBMB-2025-123456");
    }

    #[test]
    fn test_checked_total() {
        let huge = Decimal::from_str_exact("70000000000000000000000000000").unwrap();
        assert_eq!(checked_total([huge, huge]), None);
        assert_eq!(
            checked_total([Decimal::new(1050, 2), Decimal::new(25, 1)]),
            Some(Decimal::new(13, 0))
        );
        assert_eq!(checked_total(std::iter::empty()), Some(Decimal::ZERO));
    }

    #[test]
    fn test_transaction_id_normalization() {
        assert_eq!(normalize_transaction_id("  TXN-001 "), "txn-001");
        assert_eq!(
            normalize_transaction_id("Txn-001"),
            normalize_transaction_id("txn-001")
        );
    }

    #[test]
    fn test_enum_wire_names() {
        let json = serde_json::to_string(&ReceivedChannel::ContactCenter).unwrap();
        assert_eq!(json, "\"contact_center\"");
        let json = serde_json::to_string(&FraudType::ScamInvestment).unwrap();
        assert_eq!(json, "\"scam_investment\"");
        assert_eq!(FraudType::SimSwap.to_string(), "sim_swap");
    }
}
