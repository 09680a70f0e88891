//! REST API types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ServerError;
use crate::models::Case;
use crate::transform::pipeline::ImportReport;

/// Response to `POST /api/import`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    /// Unique job identifier
    pub job_id: String,

    /// Status: "ready", "warning", "error"
    pub status: String,

    pub report: ImportReport,
}

impl From<ImportReport> for ImportResponse {
    fn from(report: ImportReport) -> Self {
        let status = if report.file_error {
            "error"
        } else if report.failed_count > 0 {
            "warning"
        } else {
            "ready"
        };

        ImportResponse {
            job_id: Uuid::new_v4().to_string(),
            status: status.to_string(),
            report,
        }
    }
}

/// Response to `GET /api/cases`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CasesResponse {
    pub total: usize,
    /// How many of `cases` came from imports
    pub imported: usize,
    pub cases: Vec<Case>,
}

impl CasesResponse {
    pub fn new(cases: Vec<Case>) -> Self {
        Self {
            total: cases.len(),
            imported: cases.iter().filter(|c| c.is_imported()).count(),
            cases,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
    })
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Import(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(error_response(&self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RowError;

    #[test]
    fn test_status_from_report() {
        let clean = ImportReport {
            total_rows: 2,
            success_count: 2,
            ..Default::default()
        };
        assert_eq!(ImportResponse::from(clean).status, "ready");

        let partial = ImportReport {
            total_rows: 2,
            success_count: 1,
            failed_count: 1,
            errors: vec![RowError::new(3, "cnic", "CNIC must be exactly 13 digits")],
            ..Default::default()
        };
        assert_eq!(ImportResponse::from(partial).status, "warning");

        let rejected = ImportReport {
            file_error: true,
            ..Default::default()
        };
        assert_eq!(ImportResponse::from(rejected).status, "error");
    }

    #[test]
    fn test_response_wire_format() {
        let response = ImportResponse::from(ImportReport::default());
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("jobId").is_some());
        assert_eq!(json["report"]["total_rows"], 0);
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            ServerError::BadRequest("no file".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::Internal("join".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
