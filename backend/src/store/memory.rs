//! In-memory store, for tests and dry runs.

use super::{CaseStore, ImportedSnapshot};
use crate::error::StoreResult;
use crate::models::Case;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    baseline: Vec<Case>,
    imported: ImportedSnapshot,
    saves: usize,
}

impl MemoryStore {
    pub fn with_baseline(baseline: Vec<Case>) -> Self {
        Self {
            baseline,
            ..Default::default()
        }
    }

    /// Number of `save_imported` calls so far.
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl CaseStore for MemoryStore {
    fn baseline(&self) -> StoreResult<Vec<Case>> {
        Ok(self.baseline.clone())
    }

    fn load_imported(&self) -> StoreResult<ImportedSnapshot> {
        Ok(self.imported.clone())
    }

    fn save_imported(&mut self, snapshot: &ImportedSnapshot) -> StoreResult<()> {
        self.imported = snapshot.clone();
        self.saves += 1;
        Ok(())
    }
}
