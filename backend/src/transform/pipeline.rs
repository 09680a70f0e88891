//! High-level import API: text in, merged store and report out.
//!
//! ```text
//! text ─▶ parse ─▶ validate ─▶ dedup ─▶ group ─▶ allocate + synthesize ─▶ merge
//!                     │           │
//!                     ▼           ▼
//!                  errors      skipped
//! ```
//!
//! Everything after validation runs inside [`SharedStore::transact`], so the
//! store is read once, written once, and no other import can interleave.
//!
//! # Example
//!
//! ```rust,ignore
//! use caseload::{Importer, ImportOptions, JsonFileStore, RowValidator};
//!
//! let importer = Importer::new(JsonFileStore::new(".caseload"), RowValidator::default());
//! let report = importer.import_file("disputes.csv", &ImportOptions::default())?;
//! println!("{} cases added, {} rows failed", report.cases_added, report.failed_count);
//! ```

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::allocator::{IdAllocator, Watermark};
use super::grouper::{dedup_rows, group_rows, CaseGroup, SkippedRow};
use super::synthesizer::synthesize_cases;
use crate::api::logs::{log_error, log_info, log_success, log_warning, log_warning_indent};
use crate::error::{AllocResult, ImportResult, RowError};
use crate::models::{Case, ImportRow};
use crate::parser::{parse_bytes_auto, parse_file_auto, parse_text_auto, ParsedTable};
use crate::store::{merge_imported, CaseStore, ImportedSnapshot, SharedStore, StoreView};
use crate::validation::{RowValidator, ValidationOutcome};

/// Row errors echoed to the log; the report always carries all of them.
const LOGGED_ERRORS: usize = 5;

/// Options for one import run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Force a delimiter instead of detecting it.
    #[serde(default)]
    pub delimiter: Option<char>,

    /// Compute everything but leave the store untouched.
    #[serde(default)]
    pub dry_run: bool,

    /// Creation timestamp for new cases; `None` means now. Also fixes the
    /// reference-number year.
    #[serde(default)]
    pub imported_at: Option<DateTime<Utc>>,
}

/// Source metadata of the imported file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub encoding: String,
    pub delimiter: char,
    pub row_count: usize,
}

impl From<&ParsedTable> for SourceInfo {
    fn from(table: &ParsedTable) -> Self {
        Self {
            encoding: table.encoding.clone(),
            delimiter: table.delimiter,
            row_count: table.rows.len(),
        }
    }
}

/// Outcome of an import, returned to the caller for presentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    /// Data rows seen, excluding the header.
    pub total_rows: usize,
    /// Rows that became transactions of a synthesized case.
    pub success_count: usize,
    /// Rows rejected by validation.
    pub failed_count: usize,
    /// Rows dropped as duplicate transactions.
    pub skipped_count: usize,
    /// Cases built before the store-level reference dedup.
    pub cases_synthesized: usize,
    /// Cases actually added to the store.
    pub cases_added: usize,
    /// Reference numbers of the added cases, in creation order.
    pub created_cases: Vec<String>,
    /// Per-row errors in row order (a single entry for a rejected file).
    pub errors: Vec<RowError>,
    pub skipped: Vec<SkippedRow>,
    /// True when the whole file was rejected.
    pub file_error: bool,
    pub dry_run: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceInfo>,
}

impl ImportReport {
    fn rejected(outcome: ValidationOutcome, dry_run: bool) -> Self {
        Self {
            total_rows: outcome.total_rows,
            errors: outcome.errors,
            file_error: true,
            dry_run,
            ..Default::default()
        }
    }

    /// True when every row made it into a case or was a known duplicate.
    pub fn is_clean(&self) -> bool {
        !self.file_error && self.failed_count == 0
    }
}

/// Cases to add and the state needed to persist them.
#[derive(Debug, Clone)]
pub struct ImportPlan {
    pub cases: Vec<Case>,
    pub skipped: Vec<SkippedRow>,
    /// Rows rejected with their whole group because the case total is out
    /// of the amount range.
    pub errors: Vec<RowError>,
    /// Rows that became transactions.
    pub accepted_rows: usize,
    /// Allocation high-water mark after this plan.
    pub watermark: Watermark,
}

/// Dedup, group, allocate and synthesize against a store snapshot.
///
/// Pure: identical rows, store state and `imported_at` give identical plans.
/// Fails only when an id or reference range is exhausted.
pub fn plan_import(
    rows: Vec<ImportRow>,
    view: &StoreView,
    imported_at: DateTime<Utc>,
) -> AllocResult<ImportPlan> {
    let known = view.known_transaction_ids();
    let dedup = dedup_rows(rows, &known);

    let (groups, overflowing): (Vec<CaseGroup>, Vec<CaseGroup>) = group_rows(dedup.rows)
        .into_iter()
        .partition(|group| group.checked_total().is_some());

    let errors = overflowing
        .iter()
        .flat_map(|group| group.rows())
        .map(|row| {
            RowError::new(
                row.row_number,
                "transaction_amount",
                "Case total exceeds the supported amount range",
            )
        })
        .collect();
    let accepted_rows = groups.iter().map(CaseGroup::len).sum();

    let mut alloc = IdAllocator::scan(view.all_cases(), imported_at.year())
        .with_watermark(&view.imported.watermark);
    let cases = synthesize_cases(&groups, &mut alloc, imported_at)?;

    Ok(ImportPlan {
        cases,
        skipped: dedup.skipped,
        errors,
        accepted_rows,
        watermark: alloc.watermark().clone(),
    })
}

/// Runs imports against one store.
pub struct Importer<S> {
    store: SharedStore<S>,
    validator: RowValidator,
}

impl<S: CaseStore> Importer<S> {
    pub fn new(store: S, validator: RowValidator) -> Self {
        Self {
            store: SharedStore::new(store),
            validator,
        }
    }

    pub fn store(&self) -> &SharedStore<S> {
        &self.store
    }

    /// Import a local file.
    pub fn import_file(&self, path: impl AsRef<Path>, options: &ImportOptions) -> ImportResult<ImportReport> {
        log_info(format!("📄 Reading {}", path.as_ref().display()));
        let table = parse_file_auto(path, options.delimiter)?;
        self.import_table(table, options)
    }

    /// Import raw bytes (encoding detected).
    pub fn import_bytes(&self, bytes: &[u8], options: &ImportOptions) -> ImportResult<ImportReport> {
        let table = parse_bytes_auto(bytes, options.delimiter)?;
        self.import_table(table, options)
    }

    /// Import already-decoded text.
    pub fn import_text(&self, text: &str, options: &ImportOptions) -> ImportResult<ImportReport> {
        let table = parse_text_auto(text, options.delimiter)?;
        self.import_table(table, options)
    }

    fn import_table(&self, table: ParsedTable, options: &ImportOptions) -> ImportResult<ImportReport> {
        log_success(format!(
            "Parsed {} rows (encoding {}, delimiter '{}')",
            table.rows.len(),
            table.encoding,
            format_delimiter(table.delimiter)
        ));
        let source = SourceInfo::from(&table);
        let mut report = self.import_rows(&table.rows, options)?;
        report.source = Some(source);
        Ok(report)
    }

    /// Import parsed rows; the first row is the header.
    pub fn import_rows(&self, rows: &[Vec<String>], options: &ImportOptions) -> ImportResult<ImportReport> {
        log_info("✔️  Validating rows...");
        let outcome = self.validator.validate(rows);

        if let Some(err) = &outcome.file_error {
            log_error(format!("File rejected: {}", err));
            return Ok(ImportReport::rejected(outcome, options.dry_run));
        }
        print_validation(&outcome);

        let imported_at = options.imported_at.unwrap_or_else(Utc::now);
        let dry_run = options.dry_run;
        let ValidationOutcome { rows, errors, total_rows, .. } = outcome;

        log_info("📦 Grouping and building cases...");
        let outcome = self.store.transact(move |view| {
            let plan = match plan_import(rows, view, imported_at) {
                Ok(plan) => plan,
                Err(e) => return (None, Err(e)),
            };
            let cases_synthesized = plan.cases.len();
            let (merged, added) = merge_imported(&view.imported.cases, plan.cases);

            let mut errors = errors;
            errors.extend(plan.errors);
            errors.sort_by_key(|e| e.row);

            let report = ImportReport {
                total_rows,
                success_count: plan.accepted_rows,
                failed_count: errors.len(),
                skipped_count: plan.skipped.len(),
                cases_synthesized,
                cases_added: added.len(),
                created_cases: added,
                errors,
                skipped: plan.skipped,
                file_error: false,
                dry_run,
                source: None,
            };

            let next = (!dry_run && report.cases_added > 0).then(|| ImportedSnapshot {
                watermark: plan.watermark,
                cases: merged,
            });
            (next, Ok(report))
        })?;
        let report = outcome.map_err(|e| {
            log_error(format!("Import aborted, nothing merged: {}", e));
            e
        })?;

        print_report(&report);
        Ok(report)
    }
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        c => c.to_string(),
    }
}

fn print_validation(outcome: &ValidationOutcome) {
    if outcome.errors.is_empty() {
        log_success(format!("All {} rows valid", outcome.total_rows));
        return;
    }

    log_warning(format!(
        "{} of {} rows failed validation",
        outcome.errors.len(),
        outcome.total_rows
    ));
    for err in outcome.errors.iter().take(LOGGED_ERRORS) {
        log_warning_indent(err.to_string(), 1);
    }
    if outcome.errors.len() > LOGGED_ERRORS {
        log_warning_indent(format!("... +{} more", outcome.errors.len() - LOGGED_ERRORS), 1);
    }
}

fn print_report(report: &ImportReport) {
    if report.skipped_count > 0 {
        log_warning(format!("{} duplicate transaction(s) skipped", report.skipped_count));
    }
    if report.cases_synthesized > report.cases_added {
        log_warning(format!(
            "{} case(s) already in store by reference number",
            report.cases_synthesized - report.cases_added
        ));
    }
    if report.dry_run {
        log_info(format!("Dry run: {} case(s) would be added", report.cases_added));
    } else {
        log_success(format!("{} case(s) added", report.cases_added));
    }
}
