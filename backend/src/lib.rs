//! # Caseload - bulk import of fraud-dispute cases
//!
//! Caseload turns CSV exports of disputed transactions into investigation
//! cases: one case per customer, received date and received channel.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│  Validator  │────▶│  Transform  │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │ (row errors)│     │ (group+ids) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────┬──────┘
//!                                                                    ▼
//!                                                             ┌─────────────┐
//!                                                             │ Case store  │
//!                                                             │   (JSON)    │
//!                                                             └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use caseload::{ImportOptions, Importer, JsonFileStore, RowValidator};
//!
//! let importer = Importer::new(JsonFileStore::new(".caseload"), RowValidator::default());
//! let report = importer.import_file("disputes.csv", &ImportOptions::default())?;
//! println!("Created {:?}", report.created_cases);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Environment-driven settings
//! - [`models`] - Domain models (Case, Customer, Transaction, ImportRow)
//! - [`parser`] - CSV parsing with auto-detection
//! - [`validation`] - Header and row validation, classifier tables
//! - [`transform`] - Grouping, id allocation, case synthesis, pipeline
//! - [`store`] - Persisted case store
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Validation
pub mod validation;

// Transformation
pub mod transform;

// Persistence
pub mod store;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{CsvError, FileError, ImportError, RowError, ServerError, StoreError};

// =============================================================================
// Re-exports - Config and models
// =============================================================================

pub use config::{FieldDefaults, ImportConfig};
pub use models::{
    Case, CaseSource, CaseStatus, Customer, FraudType, ImportRow, InvestigationStatus,
    ReceivedChannel, Transaction,
};

// =============================================================================
// Re-exports - Parsing and validation
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes_auto, parse_file_auto,
    parse_rows, parse_text_auto, ParsedTable,
};
pub use validation::{Classifiers, RowValidator, ValidationOutcome};

// =============================================================================
// Re-exports - Pipeline and store
// =============================================================================

pub use store::{CaseStore, ImportedSnapshot, JsonFileStore, MemoryStore, SharedStore};
pub use transform::pipeline::{plan_import, ImportOptions, ImportPlan, ImportReport, Importer};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, CasesResponse, ImportResponse};

// Server
pub mod server {
    pub use crate::api::server::{start_server, AppState};
}
