//! Cluster validated rows into case groups.
//!
//! Two steps, in this order:
//!
//! 1. [`dedup_rows`] drops rows whose transaction id is already known, either
//!    from the store or from an earlier row of the same batch.
//! 2. [`group_rows`] clusters the survivors by (CNIC, received date,
//!    received channel).
//!
//! ```text
//! rows (validated)                      groups
//! ┌──────────────────────────────┐     ┌─────────────────────────────┐
//! │ 4210..1, 2025-03-01, branch  │     │ 4210..1 / 03-01 / branch    │
//! │ 4210..1, 2025-03-01, branch  │ ──▶ │   TXN-1, TXN-2              │
//! │ 4210..1, 2025-03-02, branch  │     ├─────────────────────────────┤
//! └──────────────────────────────┘     │ 4210..1 / 03-02 / branch    │
//!                                      │   TXN-3                     │
//!                                      └─────────────────────────────┘
//! ```
//!
//! Groups come out in order of first appearance and rows keep their input
//! order, so identical input always assembles identical cases.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::models::{checked_total, ImportRow, ReceivedChannel};

/// Composite identity of a case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GroupKey {
    pub cnic: String,
    pub case_received_date: NaiveDate,
    pub case_received_channel: ReceivedChannel,
}

impl GroupKey {
    pub fn of(row: &ImportRow) -> Self {
        Self {
            cnic: row.cnic.clone(),
            case_received_date: row.case_received_date,
            case_received_channel: row.case_received_channel,
        }
    }
}

/// Rows that become one case. Never empty.
#[derive(Debug, Clone)]
pub struct CaseGroup {
    key: GroupKey,
    head: ImportRow,
    tail: Vec<ImportRow>,
}

impl CaseGroup {
    fn new(head: ImportRow) -> Self {
        Self {
            key: GroupKey::of(&head),
            head,
            tail: Vec::new(),
        }
    }

    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    /// First row of the group; it describes the customer and the case.
    pub fn head(&self) -> &ImportRow {
        &self.head
    }

    pub fn rows(&self) -> impl Iterator<Item = &ImportRow> {
        std::iter::once(&self.head).chain(self.tail.iter())
    }

    pub fn len(&self) -> usize {
        1 + self.tail.len()
    }

    /// Sum of the group's transaction amounts, `None` on overflow.
    pub fn checked_total(&self) -> Option<Decimal> {
        checked_total(self.rows().map(|r| r.transaction_amount))
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// A row dropped because its transaction already exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub row: usize,
    pub transaction_id: String,
}

/// Rows that survived dedup plus the ones that did not.
#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    pub rows: Vec<ImportRow>,
    pub skipped: Vec<SkippedRow>,
}

/// Drop rows whose normalized transaction id is in `known` or appeared on
/// an earlier row of this batch.
pub fn dedup_rows(rows: Vec<ImportRow>, known: &HashSet<String>) -> DedupOutcome {
    let mut seen: HashSet<String> = HashSet::new();
    let mut outcome = DedupOutcome::default();

    for row in rows {
        let key = row.transaction_key();
        if known.contains(&key) || !seen.insert(key) {
            outcome.skipped.push(SkippedRow {
                row: row.row_number,
                transaction_id: row.transaction_id.clone(),
            });
            continue;
        }
        outcome.rows.push(row);
    }

    outcome
}

/// Cluster rows by [`GroupKey`], preserving first-appearance order.
pub fn group_rows(rows: Vec<ImportRow>) -> Vec<CaseGroup> {
    let mut groups: Vec<CaseGroup> = Vec::new();
    let mut index: HashMap<GroupKey, usize> = HashMap::new();

    for row in rows {
        let key = GroupKey::of(&row);
        match index.get(&key) {
            Some(&i) => groups[i].tail.push(row),
            None => {
                index.insert(key, groups.len());
                groups.push(CaseGroup::new(row));
            }
        }
    }

    groups
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::FraudType;
    use chrono::NaiveTime;
    use rust_decimal::Decimal;

    pub(crate) fn row(n: usize, cnic: &str, date: &str, channel: ReceivedChannel, txn: &str) -> ImportRow {
        ImportRow {
            row_number: n,
            cnic: cnic.to_string(),
            customer_name: format!("Customer {cnic}"),
            customer_city: "Lahore".into(),
            customer_region: String::new(),
            customer_mobile: String::new(),
            account_number: "0011".into(),
            fraud_type: FraudType::Phishing,
            scenario: "Not specified".into(),
            investigation_officer: "Unassigned".into(),
            branch_code: "N/A".into(),
            case_received_date: date.parse().unwrap(),
            case_received_channel: channel,
            customer_reported_late: false,
            beneficiary_added: false,
            ftdh_filled: false,
            ftdh_id: "F-1".into(),
            fms_alert_generated: false,
            expected_recovery_onus: Decimal::ZERO,
            expected_recovery_member_bank: Decimal::ZERO,
            transaction_period: "N/A".into(),
            date_incident_occurred: None,
            disputed_transaction_details: String::new(),
            no_of_transactions: None,
            dispute_amount_at_risk: None,
            complaint_no: String::new(),
            transaction_id: txn.to_string(),
            transaction_amount: Decimal::new(100 * n as i64, 0),
            transaction_date: date.parse().unwrap(),
            transaction_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            stan: None,
            beneficiary_account: "Unknown".into(),
            beneficiary_bank: "Unknown".into(),
            beneficiary_name: "Unknown".into(),
            transaction_channel: "N/A".into(),
        }
    }

    const A: &str = "4210112345671";
    const B: &str = "3520298765432";

    #[test]
    fn test_same_key_same_group() {
        let groups = group_rows(vec![
            row(2, A, "2025-03-01", ReceivedChannel::Branch, "T1"),
            row(3, A, "2025-03-01", ReceivedChannel::Branch, "T2"),
        ]);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        let ids: Vec<_> = groups[0].rows().map(|r| r.transaction_id.as_str()).collect();
        assert_eq!(ids, vec!["T1", "T2"]);
    }

    #[test]
    fn test_any_key_difference_splits() {
        let groups = group_rows(vec![
            row(2, A, "2025-03-01", ReceivedChannel::Branch, "T1"),
            row(3, B, "2025-03-01", ReceivedChannel::Branch, "T2"),
            row(4, A, "2025-03-02", ReceivedChannel::Branch, "T3"),
            row(5, A, "2025-03-01", ReceivedChannel::Email, "T4"),
        ]);
        assert_eq!(groups.len(), 4);
    }

    #[test]
    fn test_first_appearance_order() {
        let groups = group_rows(vec![
            row(2, B, "2025-03-01", ReceivedChannel::Branch, "T1"),
            row(3, A, "2025-03-01", ReceivedChannel::Branch, "T2"),
            row(4, B, "2025-03-01", ReceivedChannel::Branch, "T3"),
        ]);

        assert_eq!(groups[0].key().cnic, B);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1].key().cnic, A);
        assert_eq!(groups[0].head().row_number, 2);
    }

    #[test]
    fn test_dedup_against_store_and_batch() {
        let known: HashSet<String> = ["t-old".to_string()].into_iter().collect();
        let outcome = dedup_rows(
            vec![
                row(2, A, "2025-03-01", ReceivedChannel::Branch, " T-OLD "),
                row(3, A, "2025-03-01", ReceivedChannel::Branch, "T-new"),
                row(4, A, "2025-03-01", ReceivedChannel::Branch, "t-NEW"),
            ],
            &known,
        );

        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].row_number, 3);
        let skipped: Vec<_> = outcome.skipped.iter().map(|s| s.row).collect();
        assert_eq!(skipped, vec![2, 4]);
    }
}
