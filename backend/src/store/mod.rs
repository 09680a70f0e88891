//! Persisted case store.
//!
//! The pipeline depends on three operations only: read the read-only
//! baseline, load the imported-cases snapshot, and save it back
//! ([`CaseStore`]). [`SharedStore`] runs a whole load → compute → save
//! cycle under one lock so concurrent imports in a process serialize
//! instead of clobbering each other. Backends shared across processes also
//! take an exclusive claim ([`CaseStore::lock_exclusive`]) for the cycle.
//!
//! The snapshot lives under the namespaced key [`IMPORTED_CASES_KEY`]. An
//! absent or unreadable snapshot is an empty collection, not an error.

pub mod json;
pub mod memory;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::models::{normalize_transaction_id, Case};
use crate::transform::allocator::Watermark;

pub use json::JsonFileStore;
pub use memory::MemoryStore;

/// Key of the imported-cases snapshot.
pub const IMPORTED_CASES_KEY: &str = "ibmb.imported_cases";

/// Persisted import state: the cases plus the allocation high-water mark.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportedSnapshot {
    #[serde(default)]
    pub watermark: Watermark,
    #[serde(default)]
    pub cases: Vec<Case>,
}

/// Read a snapshot file.
///
/// A JSON object is the current layout. A bare array of cases is accepted
/// with an empty watermark. The shape decides, since a derived struct would
/// also accept an array positionally.
pub fn parse_snapshot(content: &str) -> serde_json::Result<ImportedSnapshot> {
    if content.trim_start().starts_with('[') {
        let cases: Vec<Case> = serde_json::from_str(content)?;
        return Ok(ImportedSnapshot {
            watermark: Watermark::default(),
            cases,
        });
    }
    serde_json::from_str(content)
}

/// Persistence collaborator for the import pipeline.
pub trait CaseStore: Send {
    /// Read-only cases that exist independently of imports.
    fn baseline(&self) -> StoreResult<Vec<Case>>;

    /// Current imported-cases snapshot (empty if absent or corrupt).
    fn load_imported(&self) -> StoreResult<ImportedSnapshot>;

    /// Replace the imported-cases snapshot.
    fn save_imported(&mut self, snapshot: &ImportedSnapshot) -> StoreResult<()>;

    /// Claim the store for one load → save cycle. Backends shared between
    /// processes block or fail here; the default is a no-op.
    fn lock_exclusive(&mut self) -> StoreResult<()> {
        Ok(())
    }

    /// Release the claim taken by [`CaseStore::lock_exclusive`].
    fn unlock(&mut self) {}
}

/// Holds the store's exclusive claim until dropped.
struct Claim<'a, S: CaseStore>(&'a mut S);

impl<'a, S: CaseStore> Claim<'a, S> {
    fn acquire(store: &'a mut S) -> StoreResult<Self> {
        store.lock_exclusive()?;
        Ok(Self(store))
    }
}

impl<S: CaseStore> Drop for Claim<'_, S> {
    fn drop(&mut self) {
        self.0.unlock();
    }
}

fn load_view<S: CaseStore>(store: &S) -> StoreResult<StoreView> {
    Ok(StoreView {
        baseline: store.baseline()?,
        imported: store.load_imported()?,
    })
}

/// Everything already in the store, as seen by one import.
#[derive(Debug, Clone, Default)]
pub struct StoreView {
    pub baseline: Vec<Case>,
    pub imported: ImportedSnapshot,
}

impl StoreView {
    /// Baseline and imported cases together.
    pub fn all_cases(&self) -> impl Iterator<Item = &Case> {
        self.baseline.iter().chain(self.imported.cases.iter())
    }

    /// Normalized transaction ids of every stored transaction.
    pub fn known_transaction_ids(&self) -> HashSet<String> {
        self.all_cases()
            .flat_map(|c| c.transactions.iter())
            .map(|t| normalize_transaction_id(&t.transaction_id))
            .collect()
    }
}

/// Single-writer wrapper around a [`CaseStore`].
pub struct SharedStore<S> {
    inner: Mutex<S>,
}

impl<S: CaseStore> SharedStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            inner: Mutex::new(store),
        }
    }

    /// Read the store, compute, and optionally write back, all under the
    /// lock and the store's exclusive claim. The closure returns the
    /// snapshot to save (or `None` to leave the store untouched) and a value
    /// handed back to the caller.
    pub fn transact<T>(
        &self,
        f: impl FnOnce(&StoreView) -> (Option<ImportedSnapshot>, T),
    ) -> StoreResult<T> {
        let mut store = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        let mut claim = Claim::acquire(&mut *store)?;

        let view = load_view(&*claim.0)?;
        let (next, value) = f(&view);
        if let Some(snapshot) = next {
            claim.0.save_imported(&snapshot)?;
        }
        Ok(value)
    }

    /// Read-only view of the current state.
    pub fn view(&self) -> StoreResult<StoreView> {
        let store = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        load_view(&*store)
    }

    /// Give back the wrapped store.
    pub fn into_inner(self) -> StoreResult<S> {
        self.inner.into_inner().map_err(|_| StoreError::Poisoned)
    }
}

/// Append the new cases whose reference number is not already present.
///
/// Returns the merged collection and the reference numbers actually added.
pub fn merge_imported(existing: &[Case], new: Vec<Case>) -> (Vec<Case>, Vec<String>) {
    let mut references: HashSet<String> =
        existing.iter().map(|c| c.reference_number.clone()).collect();
    let mut merged = existing.to_vec();
    let mut added = Vec::new();

    for case in new {
        if references.insert(case.reference_number.clone()) {
            added.push(case.reference_number.clone());
            merged.push(case);
        }
    }

    (merged, added)
}
