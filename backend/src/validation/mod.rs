//! Row validation and normalization.
//!
//! Maps header columns to canonical field names, coerces each data row into
//! an [`ImportRow`] and records a [`RowError`] for rows that fail a required
//! check. Required checks run in a fixed order and the first failure wins,
//! so a row contributes at most one error:
//!
//! 1. `cnic` is exactly 13 digits
//! 2. `account_number` is not empty
//! 3. `case_received_date` is `YYYY-MM-DD`
//! 4. `case_received_channel` maps to a known channel
//! 5. `transaction_id` is not empty
//! 6. `transaction_amount` is a number greater than zero
//! 7. `transaction_date_time` is `YYYY-MM-DD HH:mm[:ss]`
//!
//! Everything else is optional and falls back to [`FieldDefaults`].

pub mod rules;

use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

use crate::config::FieldDefaults;
use crate::error::{FileError, RowError};
use crate::models::ImportRow;

pub use rules::{channel_rules, fraud_type_rules, normalize_label, Classifiers, Predicate, Rule, RuleTable};

/// Columns that must be present in the header.
pub const REQUIRED_COLUMNS: [&str; 11] = [
    "cnic",
    "customer_name",
    "customer_city",
    "account_number",
    "fraud_type",
    "case_received_date",
    "case_received_channel",
    "transaction_id",
    "transaction_amount",
    "transaction_date_time",
    "ftdh_id",
];

/// Recognized optional columns. Anything else in the header is ignored.
pub const OPTIONAL_COLUMNS: [&str; 22] = [
    "customer_region",
    "customer_mobile",
    "scenario",
    "investigation_officer",
    "branch_code",
    "customer_reported_late",
    "stan",
    "beneficiary_added",
    "ftdh_filled",
    "fms_alert_generated",
    "expected_recovery_onus",
    "expected_recovery_member_bank",
    "transaction_period",
    "date_incident_occurred",
    "disputed_transaction_details",
    "no_of_transactions",
    "dispute_amount_at_risk",
    "complaint_no",
    "transaction_channel",
    "beneficiary_account",
    "beneficiary_bank",
    "beneficiary_name",
];

static STRICT_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

static DATE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2})(?:T|\s+)(\d{2}:\d{2})(:\d{2})?$").unwrap()
});

const TRUE_VALUES: [&str; 5] = ["yes", "y", "true", "1", "x"];

/// Result of validating a whole parsed file.
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    /// Rows that passed every required check, in source order.
    pub rows: Vec<ImportRow>,
    /// One entry per rejected row (or a single file-level entry).
    pub errors: Vec<RowError>,
    /// Number of data rows seen, excluding the header.
    pub total_rows: usize,
    /// Set when the whole file was rejected.
    pub file_error: Option<FileError>,
}

impl ValidationOutcome {
    fn rejected(err: FileError, total_rows: usize) -> Self {
        Self {
            rows: Vec::new(),
            errors: vec![RowError::from(&err)],
            total_rows,
            file_error: Some(err),
        }
    }
}

/// Normalize a header cell: trim, lowercase, whitespace runs become `_`.
pub fn normalize_header(cell: &str) -> String {
    cell.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Header name → column index. The first occurrence of a name wins.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    index: HashMap<String, usize>,
}

impl ColumnMap {
    pub fn from_header(header: &[String]) -> Self {
        let mut index = HashMap::new();
        for (i, cell) in header.iter().enumerate() {
            index.entry(normalize_header(cell)).or_insert(i);
        }
        Self { index }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Required columns absent from the header, in declaration order.
    pub fn missing_required(&self) -> Vec<String> {
        REQUIRED_COLUMNS
            .iter()
            .filter(|c| !self.contains(c))
            .map(|c| c.to_string())
            .collect()
    }

    /// Trimmed cell for `name`; empty when the column or cell is absent.
    pub fn cell<'a>(&self, row: &'a [String], name: &str) -> &'a str {
        self.index
            .get(name)
            .and_then(|&i| row.get(i))
            .map(|s| s.trim())
            .unwrap_or("")
    }
}

/// Validates parsed rows against the import schema.
#[derive(Debug, Clone, Default)]
pub struct RowValidator {
    classifiers: Classifiers,
    defaults: FieldDefaults,
}

impl RowValidator {
    pub fn new(classifiers: Classifiers, defaults: FieldDefaults) -> Self {
        Self { classifiers, defaults }
    }

    /// Validate all rows; the first row is the header.
    pub fn validate(&self, rows: &[Vec<String>]) -> ValidationOutcome {
        let Some((header, data)) = rows.split_first() else {
            return ValidationOutcome::rejected(FileError::NoDataRows, 0);
        };

        let columns = ColumnMap::from_header(header);
        let missing = columns.missing_required();
        if !missing.is_empty() {
            return ValidationOutcome::rejected(FileError::MissingColumns(missing), data.len());
        }
        if data.is_empty() {
            return ValidationOutcome::rejected(FileError::NoDataRows, 0);
        }

        let mut outcome = ValidationOutcome {
            total_rows: data.len(),
            ..Default::default()
        };

        for (i, cells) in data.iter().enumerate() {
            // header is row 1
            match self.validate_row(i + 2, cells, &columns) {
                Ok(row) => outcome.rows.push(row),
                Err(err) => outcome.errors.push(err),
            }
        }

        outcome
    }

    /// Validate one data row.
    pub fn validate_row(
        &self,
        row_number: usize,
        cells: &[String],
        columns: &ColumnMap,
    ) -> Result<ImportRow, RowError> {
        let get = |name: &str| columns.cell(cells, name);
        let fail = |field: &str, message: String| RowError::new(row_number, field, message);
        let d = &self.defaults;

        let cnic = parse_cnic(get("cnic")).ok_or_else(|| {
            fail("cnic", format!("CNIC must be exactly 13 digits (got '{}')", get("cnic")))
        })?;

        let account_number = get("account_number");
        if account_number.is_empty() {
            return Err(fail("account_number", "Account number is required".into()));
        }

        let case_received_date = parse_strict_date(get("case_received_date")).ok_or_else(|| {
            fail(
                "case_received_date",
                format!(
                    "Case received date must be YYYY-MM-DD (got '{}')",
                    get("case_received_date")
                ),
            )
        })?;

        let case_received_channel =
            self.classifiers.channel(get("case_received_channel")).ok_or_else(|| {
                fail(
                    "case_received_channel",
                    format!(
                        "Unknown channel '{}': expected branch, contact_center, mobile_app or email",
                        get("case_received_channel")
                    ),
                )
            })?;

        let transaction_id = get("transaction_id");
        if transaction_id.is_empty() {
            return Err(fail("transaction_id", "Transaction ID is required".into()));
        }

        let transaction_amount = parse_amount(get("transaction_amount"))
            .filter(|a| *a > Decimal::ZERO)
            .ok_or_else(|| {
                fail(
                    "transaction_amount",
                    format!(
                        "Transaction amount must be a number greater than zero (got '{}')",
                        get("transaction_amount")
                    ),
                )
            })?;

        let (transaction_date, transaction_time) = parse_date_time(get("transaction_date_time"))
            .ok_or_else(|| {
                fail(
                    "transaction_date_time",
                    format!(
                        "Transaction date/time must be YYYY-MM-DD HH:mm or YYYY-MM-DD HH:mm:ss (got '{}')",
                        get("transaction_date_time")
                    ),
                )
            })?;

        let text_or = |name: &str, fallback: &str| {
            let value = get(name);
            if value.is_empty() { fallback.to_string() } else { value.to_string() }
        };

        Ok(ImportRow {
            row_number,
            cnic,
            customer_name: get("customer_name").to_string(),
            customer_city: get("customer_city").to_string(),
            customer_region: get("customer_region").to_string(),
            customer_mobile: get("customer_mobile").to_string(),
            account_number: account_number.to_string(),

            fraud_type: self.classifiers.fraud_type(get("fraud_type")),
            scenario: text_or("scenario", &d.scenario),
            investigation_officer: text_or("investigation_officer", &d.investigation_officer),
            branch_code: text_or("branch_code", &d.branch_code),
            case_received_date,
            case_received_channel,

            customer_reported_late: parse_flag(get("customer_reported_late")),
            beneficiary_added: parse_flag(get("beneficiary_added")),
            ftdh_filled: parse_flag(get("ftdh_filled")),
            ftdh_id: get("ftdh_id").to_string(),
            fms_alert_generated: parse_flag(get("fms_alert_generated")),
            expected_recovery_onus: parse_amount(get("expected_recovery_onus")).unwrap_or_default(),
            expected_recovery_member_bank: parse_amount(get("expected_recovery_member_bank"))
                .unwrap_or_default(),
            transaction_period: text_or("transaction_period", &d.transaction_period),
            date_incident_occurred: parse_strict_date(get("date_incident_occurred")),
            disputed_transaction_details: get("disputed_transaction_details").to_string(),
            no_of_transactions: get("no_of_transactions").parse().ok(),
            dispute_amount_at_risk: parse_amount(get("dispute_amount_at_risk")),
            complaint_no: get("complaint_no").to_string(),

            transaction_id: transaction_id.to_string(),
            transaction_amount,
            transaction_date,
            transaction_time,
            stan: Some(get("stan")).filter(|s| !s.is_empty()).map(str::to_string),
            beneficiary_account: text_or("beneficiary_account", &d.beneficiary),
            beneficiary_bank: text_or("beneficiary_bank", &d.beneficiary),
            beneficiary_name: text_or("beneficiary_name", &d.beneficiary),
            transaction_channel: text_or("transaction_channel", &d.transaction_channel),
        })
    }
}

/// Validate with the built-in classifiers and defaults.
pub fn validate_rows(rows: &[Vec<String>]) -> ValidationOutcome {
    RowValidator::default().validate(rows)
}

/// 13 digits once dashes and spaces are removed.
pub fn parse_cnic(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| *c != '-' && !c.is_whitespace()).collect();
    (digits.len() == 13 && digits.chars().all(|c| c.is_ascii_digit())).then_some(digits)
}

/// Strict `YYYY-MM-DD` that is also a real calendar date.
pub fn parse_strict_date(raw: &str) -> Option<NaiveDate> {
    if !STRICT_DATE.is_match(raw) {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Decimal amount; thousands separators and surrounding spaces allowed.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

/// `YYYY-MM-DD HH:mm[:ss]` (space or `T`); the time comes back with seconds.
pub fn parse_date_time(raw: &str) -> Option<(NaiveDate, NaiveTime)> {
    let caps = DATE_TIME.captures(raw)?;
    let date = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok()?;
    let seconds = caps.get(3).map_or(":00", |m| m.as_str());
    let time = NaiveTime::parse_from_str(&format!("{}{}", &caps[2], seconds), "%H:%M:%S").ok()?;
    Some((date, time))
}

/// Yes/no style flag; anything unrecognized is `false`.
pub fn parse_flag(raw: &str) -> bool {
    let lower = raw.to_lowercase();
    TRUE_VALUES.contains(&lower.as_str())
}
