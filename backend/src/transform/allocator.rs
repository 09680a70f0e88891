//! Identifier and reference-number allocation.
//!
//! [`IdAllocator::scan`] walks the existing cases once and records the
//! highest case, customer and transaction id plus the highest
//! `IBMB-<year>-NNNNNN` suffix per year. Every `next_*` call hands out the
//! next value above that maximum, so ids are strictly increasing and never
//! reused.
//!
//! The maxima are also persisted as a [`Watermark`] next to the imported
//! cases. Seeding from `max(scan, watermark)` keeps allocation monotonic
//! even after cases disappear from the store.
//!
//! Counters never wrap: a counter at its maximum, or a year whose six-digit
//! reference range is used up, yields an [`AllocationError`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AllocResult, AllocationError};
use crate::models::{format_reference_number, Case, MAX_REFERENCE_SEQUENCE, REFERENCE_PREFIX};

static REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^{}-(\d{{4}})-(\d+)$", REFERENCE_PREFIX)).unwrap()
});

/// Split `IBMB-2025-000042` into `(2025, 42)`.
pub fn parse_reference_number(reference: &str) -> Option<(i32, u32)> {
    let caps = REFERENCE.captures(reference.trim())?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// Highest identifiers handed out so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Watermark {
    pub case_id: u64,
    pub customer_id: u64,
    pub transaction_id: u64,
    /// Highest reference suffix per calendar year.
    pub reference_sequences: BTreeMap<i32, u32>,
}

impl Watermark {
    /// Field-wise maximum of two watermarks.
    pub fn max(mut self, other: &Watermark) -> Watermark {
        self.case_id = self.case_id.max(other.case_id);
        self.customer_id = self.customer_id.max(other.customer_id);
        self.transaction_id = self.transaction_id.max(other.transaction_id);
        for (&year, &seq) in &other.reference_sequences {
            let entry = self.reference_sequences.entry(year).or_insert(0);
            *entry = (*entry).max(seq);
        }
        self
    }
}

/// Hands out monotonically increasing identifiers for one import.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    year: i32,
    high: Watermark,
}

impl IdAllocator {
    /// Scan existing cases once; references are tracked for every year.
    pub fn scan<'a>(cases: impl IntoIterator<Item = &'a Case>, year: i32) -> Self {
        let mut high = Watermark::default();

        for case in cases {
            high.case_id = high.case_id.max(case.id);
            high.customer_id = high.customer_id.max(case.customer.id);
            for txn in &case.transactions {
                high.transaction_id = high.transaction_id.max(txn.id);
            }
            if let Some((ref_year, seq)) = parse_reference_number(&case.reference_number) {
                let entry = high.reference_sequences.entry(ref_year).or_insert(0);
                *entry = (*entry).max(seq);
            }
        }

        Self { year, high }
    }

    /// Raise the counters to at least `watermark`.
    pub fn with_watermark(mut self, watermark: &Watermark) -> Self {
        self.high = self.high.max(watermark);
        self
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn next_case_id(&mut self) -> AllocResult<u64> {
        bump(&mut self.high.case_id, "case")
    }

    pub fn next_customer_id(&mut self) -> AllocResult<u64> {
        bump(&mut self.high.customer_id, "customer")
    }

    pub fn next_transaction_id(&mut self) -> AllocResult<u64> {
        bump(&mut self.high.transaction_id, "transaction")
    }

    /// Next `IBMB-<year>-NNNNNN` for the allocator's year.
    pub fn next_reference_number(&mut self) -> AllocResult<String> {
        let year = self.year;
        let seq = self.high.reference_sequences.entry(year).or_insert(0);
        if *seq >= MAX_REFERENCE_SEQUENCE {
            return Err(AllocationError::ReferencesExhausted { year });
        }
        *seq += 1;
        Ok(format_reference_number(year, *seq))
    }

    /// Current high-water marks, for persisting with the merge.
    pub fn watermark(&self) -> &Watermark {
        &self.high
    }
}

fn bump(counter: &mut u64, kind: &'static str) -> AllocResult<u64> {
    *counter = counter
        .checked_add(1)
        .ok_or(AllocationError::IdsExhausted { kind })?;
    Ok(*counter)
}
