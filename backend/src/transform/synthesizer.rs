//! Build case aggregates from groups.
//!
//! One case per group. Customer and case-level fields come from the group's
//! first row; later rows only contribute their transaction. Imported cases
//! always start `open` / `in_progress` with an empty action log.

use chrono::{DateTime, Utc};

use super::allocator::IdAllocator;
use super::grouper::CaseGroup;
use crate::error::{AllocResult, AllocationError};
use crate::models::{
    Case, CaseSource, CaseStatus, Customer, ImportRow, InvestigationStatus, Transaction,
};

/// Build one case, drawing ids from `alloc`.
///
/// Allocation order is case id, customer id, reference number, then one
/// transaction id per row in group order. The total is checked before any
/// id is drawn, so an overflowing group consumes nothing.
pub fn synthesize_case(
    group: &CaseGroup,
    alloc: &mut IdAllocator,
    created_at: DateTime<Utc>,
) -> AllocResult<Case> {
    let total_disputed_amount = group
        .checked_total()
        .ok_or(AllocationError::AmountOverflow {
            row: group.head().row_number,
        })?;

    let id = alloc.next_case_id()?;
    let customer_id = alloc.next_customer_id()?;
    let reference_number = alloc.next_reference_number()?;

    let transactions = group
        .rows()
        .map(|row| alloc.next_transaction_id().map(|id| build_transaction(row, id)))
        .collect::<AllocResult<Vec<Transaction>>>()?;

    let head = group.head();

    Ok(Case {
        id,
        reference_number,
        customer: Customer {
            id: customer_id,
            cnic: head.cnic.clone(),
            name: head.customer_name.clone(),
            city: head.customer_city.clone(),
            region: head.customer_region.clone(),
            mobile: head.customer_mobile.clone(),
            account_number: head.account_number.clone(),
        },
        status: CaseStatus::Open,
        investigation_status: InvestigationStatus::InProgress,

        fraud_type: head.fraud_type,
        scenario: head.scenario.clone(),
        case_received_date: head.case_received_date,
        case_received_channel: head.case_received_channel,
        investigation_officer: head.investigation_officer.clone(),
        branch_code: head.branch_code.clone(),
        customer_reported_late: head.customer_reported_late,
        beneficiary_added: head.beneficiary_added,
        ftdh_filled: head.ftdh_filled,
        ftdh_id: head.ftdh_id.clone(),
        fms_alert_generated: head.fms_alert_generated,
        expected_recovery_onus: head.expected_recovery_onus,
        expected_recovery_member_bank: head.expected_recovery_member_bank,
        transaction_period: head.transaction_period.clone(),
        date_incident_occurred: head.date_incident_occurred,
        disputed_transaction_details: head.disputed_transaction_details.clone(),
        no_of_transactions: head
            .no_of_transactions
            .unwrap_or(transactions.len() as u32),
        dispute_amount_at_risk: head.dispute_amount_at_risk.unwrap_or(total_disputed_amount),
        complaint_no: head.complaint_no.clone(),

        transactions,
        action_log: Vec::new(),
        total_disputed_amount,

        created_at,
        source: CaseSource::Import,
    })
}

/// Build cases for all groups, in group order.
pub fn synthesize_cases(
    groups: &[CaseGroup],
    alloc: &mut IdAllocator,
    created_at: DateTime<Utc>,
) -> AllocResult<Vec<Case>> {
    groups
        .iter()
        .map(|group| synthesize_case(group, alloc, created_at))
        .collect()
}

fn build_transaction(row: &ImportRow, id: u64) -> Transaction {
    Transaction {
        id,
        transaction_id: row.transaction_id.clone(),
        amount: row.transaction_amount,
        disputed_amount: row.transaction_amount,
        date: row.transaction_date,
        time: row.transaction_time,
        stan: row.stan.clone(),
        beneficiary_account: row.beneficiary_account.clone(),
        beneficiary_bank: row.beneficiary_bank.clone(),
        beneficiary_name: row.beneficiary_name.clone(),
        channel: row.transaction_channel.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReceivedChannel;
    use crate::transform::grouper::{group_rows, tests::row};
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    const A: &str = "4210112345671";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 5, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_case_from_group() {
        let mut first = row(2, A, "2025-03-01", ReceivedChannel::Branch, "T1");
        first.customer_name = "Ayesha Khan".into();
        let mut second = row(3, A, "2025-03-01", ReceivedChannel::Branch, "T2");
        second.customer_name = "A. Khan".into();

        let groups = group_rows(vec![first, second]);
        let mut alloc = IdAllocator::scan(std::iter::empty(), 2025);
        let case = synthesize_case(&groups[0], &mut alloc, now()).unwrap();

        assert_eq!(case.id, 1);
        assert_eq!(case.customer.id, 1);
        assert_eq!(case.reference_number, "IBMB-2025-000001");
        assert_eq!(case.customer.name, "Ayesha Khan");
        assert_eq!(case.status, CaseStatus::Open);
        assert_eq!(case.investigation_status, InvestigationStatus::InProgress);
        assert_eq!(case.source, CaseSource::Import);
        assert!(case.action_log.is_empty());
        assert_eq!(case.created_at, now());

        let ids: Vec<u64> = case.transactions.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_total_is_sum_of_disputed() {
        let mut r1 = row(2, A, "2025-03-01", ReceivedChannel::Email, "T1");
        r1.transaction_amount = "1250.75".parse().unwrap();
        let mut r2 = row(3, A, "2025-03-01", ReceivedChannel::Email, "T2");
        r2.transaction_amount = "0.10".parse().unwrap();
        let mut r3 = row(4, A, "2025-03-01", ReceivedChannel::Email, "T3");
        r3.transaction_amount = "0.20".parse().unwrap();

        let groups = group_rows(vec![r1, r2, r3]);
        let mut alloc = IdAllocator::scan(std::iter::empty(), 2025);
        let case = synthesize_case(&groups[0], &mut alloc, now()).unwrap();

        assert_eq!(case.total_disputed_amount, "1251.05".parse::<Decimal>().unwrap());
        assert!(case.is_total_consistent());
        assert!(case.transactions.iter().all(|t| t.amount == t.disputed_amount));
        assert_eq!(case.no_of_transactions, 3);
        assert_eq!(case.dispute_amount_at_risk, case.total_disputed_amount);
    }

    #[test]
    fn test_explicit_case_fields_win() {
        let mut r = row(2, A, "2025-03-01", ReceivedChannel::Branch, "T1");
        r.no_of_transactions = Some(5);
        r.dispute_amount_at_risk = Some(Decimal::new(999, 0));

        let groups = group_rows(vec![r]);
        let mut alloc = IdAllocator::scan(std::iter::empty(), 2025);
        let case = synthesize_case(&groups[0], &mut alloc, now()).unwrap();

        assert_eq!(case.no_of_transactions, 5);
        assert_eq!(case.dispute_amount_at_risk, Decimal::new(999, 0));
    }

    #[test]
    fn test_allocation_follows_group_order() {
        let groups = group_rows(vec![
            row(2, A, "2025-03-01", ReceivedChannel::Branch, "T1"),
            row(3, A, "2025-03-02", ReceivedChannel::Branch, "T2"),
            row(4, A, "2025-03-01", ReceivedChannel::Branch, "T3"),
        ]);
        let mut alloc = IdAllocator::scan(std::iter::empty(), 2025);
        let cases = synthesize_cases(&groups, &mut alloc, now()).unwrap();

        assert_eq!(cases[0].reference_number, "IBMB-2025-000001");
        assert_eq!(cases[1].reference_number, "IBMB-2025-000002");
        let first: Vec<u64> = cases[0].transactions.iter().map(|t| t.id).collect();
        assert_eq!(first, vec![1, 2]);
        assert_eq!(cases[1].transactions[0].id, 3);
    }

    #[test]
    fn test_overflowing_group_draws_no_ids() {
        let huge: Decimal = "70000000000000000000000000000".parse().unwrap();
        let mut r1 = row(2, A, "2025-03-01", ReceivedChannel::Branch, "T1");
        r1.transaction_amount = huge;
        let mut r2 = row(3, A, "2025-03-01", ReceivedChannel::Branch, "T2");
        r2.transaction_amount = huge;

        let groups = group_rows(vec![r1, r2]);
        let mut alloc = IdAllocator::scan(std::iter::empty(), 2025);

        let err = synthesize_case(&groups[0], &mut alloc, now()).unwrap_err();
        assert_eq!(err, AllocationError::AmountOverflow { row: 2 });
        assert_eq!(alloc.next_case_id().unwrap(), 1);
    }
}
