//! Error types for the case-import pipeline.
//!
//! This module defines the error hierarchy, one enum per layer:
//!
//! - [`CsvError`] - tabular text parsing errors
//! - [`FileError`] - file-level rejections (header, empty file)
//! - [`RowError`] - a single rejected data row
//! - [`StoreError`] - persisted case store errors
//! - [`AllocationError`] - identifier or amount ranges exhausted
//! - [`ImportError`] - top-level orchestration errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Conversion is automatic via `From` so `?` works across layers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Parsing Errors
// =============================================================================

/// Errors while turning raw bytes/text into rows.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read the source file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed delimited text.
    #[error("Invalid delimited text: {0}")]
    ParseError(#[from] csv::Error),

    /// Delimiter is not a single-byte character.
    #[error("Unsupported delimiter: {0:?}")]
    UnsupportedDelimiter(char),
}

// =============================================================================
// File-level Errors
// =============================================================================

/// Reasons an entire file is rejected before any row is processed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FileError {
    /// One or more required header columns are absent.
    #[error("Missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// Header present but no data rows follow (or the file is empty).
    #[error("File must contain a header row and at least one data row")]
    NoDataRows,
}

impl FileError {
    /// Field name reported alongside the file-level error.
    pub fn field(&self) -> String {
        match self {
            FileError::MissingColumns(cols) => cols.join(", "),
            FileError::NoDataRows => "file".to_string(),
        }
    }
}

// =============================================================================
// Row-level Errors
// =============================================================================

/// A rejected row: 1-based row number (header is row 1), field and message.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("Row {row}, field '{field}': {message}")]
pub struct RowError {
    pub row: usize,
    pub field: String,
    pub message: String,
}

impl RowError {
    pub fn new(row: usize, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            row,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<&FileError> for RowError {
    fn from(err: &FileError) -> Self {
        RowError::new(1, err.field(), err.to_string())
    }
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors from the persisted case store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error while reading or writing a snapshot.
    #[error("Store IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Snapshot could not be serialized.
    #[error("Store JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Store lock was poisoned by a panicking writer.
    #[error("Store lock poisoned")]
    Poisoned,

    /// Another process holds the snapshot lock file.
    #[error("Store is locked by another process: {}", .0.display())]
    Locked(std::path::PathBuf),
}

// =============================================================================
// Allocation Errors
// =============================================================================

/// A counter or amount ran out of range while building cases.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AllocationError {
    /// A numeric id counter reached its maximum.
    #[error("No {kind} ids left")]
    IdsExhausted { kind: &'static str },

    /// All six-digit reference suffixes of the year are used.
    #[error("Reference numbers for {year} exhausted")]
    ReferencesExhausted { year: i32 },

    /// A case total does not fit the amount range.
    #[error("Disputed total overflows for the case starting at row {row}")]
    AmountOverflow { row: usize },
}

// =============================================================================
// Import Errors (top-level)
// =============================================================================

/// Top-level import failures.
///
/// Row-level and file-level problems are not errors here: they are reported
/// inside [`crate::transform::pipeline::ImportReport`]. This enum covers the
/// external collaborators only, and none of them partially apply a merge.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Source text could not be acquired or decoded.
    #[error("Source error: {0}")]
    Source(#[from] CsvError),

    /// Store could not be read or written.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Identifier space ran out; nothing was merged.
    #[error("Allocation error: {0}")]
    Allocation(#[from] AllocationError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Import error.
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for parsing operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for allocation.
pub type AllocResult<T> = Result<T, AllocationError>;

/// Result type for import operations.
pub type ImportResult<T> = Result<T, ImportError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
