//! JSON snapshot store on the local filesystem.
//!
//! Layout:
//!
//! ```text
//! <store_dir>/ibmb.imported_cases.json   imported cases + watermark
//! <baseline_path>                        optional read-only case list
//! ```
//!
//! Writes go to a sibling `.tmp` file that is then renamed over the
//! snapshot, so readers never see a half-written file.
//!
//! An import holds `<store_dir>/ibmb.imported_cases.lock` (created with
//! `create_new`) from load to save, so a CLI import and a running server
//! on the same directory take turns. A lock older than the stale limit is
//! assumed to belong to a crashed process and is removed.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use super::{parse_snapshot, CaseStore, ImportedSnapshot, IMPORTED_CASES_KEY};
use crate::api::logs::log_warning;
use crate::error::{StoreError, StoreResult};
use crate::models::Case;

/// How long an import waits for another process's lock.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Age after which a lock file is considered abandoned.
pub const LOCK_STALE_AFTER: Duration = Duration::from_secs(120);

const LOCK_POLL: Duration = Duration::from_millis(50);

/// Case store backed by JSON files.
#[derive(Debug)]
pub struct JsonFileStore {
    store_dir: PathBuf,
    baseline_path: Option<PathBuf>,
    lock_timeout: Duration,
    holds_lock: bool,
}

impl JsonFileStore {
    pub fn new(store_dir: impl AsRef<Path>) -> Self {
        Self {
            store_dir: store_dir.as_ref().to_path_buf(),
            baseline_path: None,
            lock_timeout: LOCK_TIMEOUT,
            holds_lock: false,
        }
    }

    pub fn with_baseline(mut self, path: impl AsRef<Path>) -> Self {
        self.baseline_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Path of the imported-cases snapshot.
    pub fn snapshot_path(&self) -> PathBuf {
        self.store_dir.join(format!("{}.json", IMPORTED_CASES_KEY))
    }

    /// Path of the lock file held during an import.
    pub fn lock_path(&self) -> PathBuf {
        self.store_dir.join(format!("{}.lock", IMPORTED_CASES_KEY))
    }

    fn is_stale(path: &Path) -> bool {
        fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age >= LOCK_STALE_AFTER)
    }

    /// Read a file, treating "not found" as absent.
    fn read_optional(path: &Path) -> StoreResult<Option<String>> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl CaseStore for JsonFileStore {
    fn baseline(&self) -> StoreResult<Vec<Case>> {
        let Some(path) = &self.baseline_path else {
            return Ok(Vec::new());
        };
        let Some(content) = Self::read_optional(path)? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str(&content) {
            Ok(cases) => Ok(cases),
            Err(e) => {
                log_warning(format!(
                    "Baseline {} is unreadable ({}), using no baseline cases",
                    path.display(),
                    e
                ));
                Ok(Vec::new())
            }
        }
    }

    fn load_imported(&self) -> StoreResult<ImportedSnapshot> {
        let path = self.snapshot_path();
        let Some(content) = Self::read_optional(&path)? else {
            return Ok(ImportedSnapshot::default());
        };

        match parse_snapshot(&content) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                log_warning(format!(
                    "Snapshot {} is corrupt ({}), starting from an empty collection",
                    path.display(),
                    e
                ));
                Ok(ImportedSnapshot::default())
            }
        }
    }

    fn save_imported(&mut self, snapshot: &ImportedSnapshot) -> StoreResult<()> {
        fs::create_dir_all(&self.store_dir)?;

        let path = self.snapshot_path();
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(snapshot)?;

        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn lock_exclusive(&mut self) -> StoreResult<()> {
        fs::create_dir_all(&self.store_dir)?;

        let path = self.lock_path();
        let deadline = Instant::now() + self.lock_timeout;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    if let Err(e) = writeln!(file, "{}", std::process::id()) {
                        let _ = fs::remove_file(&path);
                        return Err(e.into());
                    }
                    self.holds_lock = true;
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if Self::is_stale(&path) {
                        log_warning(format!("Removing stale lock {}", path.display()));
                        // another process may have removed it first
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Err(StoreError::Locked(path));
                    }
                    thread::sleep(LOCK_POLL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn unlock(&mut self) {
        if self.holds_lock {
            self.holds_lock = false;
            if let Err(e) = fs::remove_file(self.lock_path()) {
                log_warning(format!("Could not remove lock {}: {}", self.lock_path().display(), e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::sample_cases;
    use crate::transform::allocator::Watermark;
    use crate::transform::pipeline::{ImportOptions, Importer};
    use crate::validation::RowValidator;
    use chrono::{TimeZone, Utc};
    use std::time::SystemTime;
    use tempfile::tempdir;

    #[test]
    fn test_absent_snapshot_is_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert_eq!(store.load_imported().unwrap(), ImportedSnapshot::default());
        assert!(store.baseline().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_snapshot_is_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        fs::write(store.snapshot_path(), "{ not json").unwrap();

        assert!(store.load_imported().unwrap().cases.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("nested"));
        let snapshot = ImportedSnapshot {
            cases: sample_cases(2),
            ..Default::default()
        };

        store.save_imported(&snapshot).unwrap();

        assert_eq!(store.load_imported().unwrap(), snapshot);
        assert!(store.snapshot_path().ends_with("ibmb.imported_cases.json"));
        assert!(!store.snapshot_path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_baseline_is_read() {
        let dir = tempdir().unwrap();
        let baseline = dir.path().join("baseline.json");
        fs::write(&baseline, serde_json::to_string(&sample_cases(3)).unwrap()).unwrap();

        let store = JsonFileStore::new(dir.path()).with_baseline(&baseline);
        assert_eq!(store.baseline().unwrap().len(), 3);
    }

    #[test]
    fn test_watermark_survives_disk() {
        let dir = tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path());
        let mut watermark = Watermark {
            case_id: 2,
            customer_id: 2,
            transaction_id: 2,
            ..Default::default()
        };
        watermark.reference_sequences.insert(2025, 2);
        let snapshot = ImportedSnapshot {
            watermark,
            cases: sample_cases(2),
        };

        store.save_imported(&snapshot).unwrap();

        assert_eq!(store.load_imported().unwrap(), snapshot);
    }

    fn one_row_csv(txn: &str) -> String {
        format!(
            "cnic,customer_name,customer_city,account_number,fraud_type,case_received_date,case_received_channel,transaction_id,transaction_amount,transaction_date_time,ftdh_id\n\
             4210112345671,Sana,Lahore,001,ato,2025-04-01,email,{txn},90,2025-04-01 09:15,F1\n"
        )
    }

    #[test]
    fn test_reimport_through_disk_is_idempotent() {
        let dir = tempdir().unwrap();
        let options = ImportOptions {
            imported_at: Some(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()),
            ..Default::default()
        };

        let first = Importer::new(JsonFileStore::new(dir.path()), RowValidator::default());
        let report = first.import_text(&one_row_csv("T-1"), &options).unwrap();
        assert_eq!(report.created_cases, vec!["IBMB-2025-000001"]);

        // a fresh process reads the same directory
        let second = Importer::new(JsonFileStore::new(dir.path()), RowValidator::default());
        let report = second.import_text(&one_row_csv("T-1"), &options).unwrap();
        assert_eq!(report.skipped_count, 1);
        assert!(report.created_cases.is_empty());

        let report = second.import_text(&one_row_csv("T-2"), &options).unwrap();
        assert_eq!(report.created_cases, vec!["IBMB-2025-000002"]);

        let stored = JsonFileStore::new(dir.path()).load_imported().unwrap();
        assert_eq!(stored.cases.len(), 2);
        assert_eq!(stored.cases[1].id, 2);
        assert_eq!(stored.watermark.reference_sequences[&2025], 2);
        assert!(!JsonFileStore::new(dir.path()).lock_path().exists());
    }

    #[test]
    fn test_lock_excludes_second_writer() {
        let dir = tempdir().unwrap();
        let mut holder = JsonFileStore::new(dir.path());
        let mut waiter = JsonFileStore::new(dir.path()).with_lock_timeout(Duration::ZERO);

        holder.lock_exclusive().unwrap();
        assert!(matches!(waiter.lock_exclusive(), Err(StoreError::Locked(_))));

        holder.unlock();
        waiter.lock_exclusive().unwrap();
        waiter.unlock();
        assert!(!waiter.lock_path().exists());
    }

    #[test]
    fn test_stale_lock_is_taken_over() {
        let dir = tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path()).with_lock_timeout(Duration::ZERO);
        fs::write(store.lock_path(), "4242").unwrap();
        let abandoned = SystemTime::now() - LOCK_STALE_AFTER - Duration::from_secs(60);
        fs::File::options()
            .write(true)
            .open(store.lock_path())
            .unwrap()
            .set_modified(abandoned)
            .unwrap();

        store.lock_exclusive().unwrap();
        store.unlock();
    }
}
