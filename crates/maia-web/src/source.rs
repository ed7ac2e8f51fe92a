//! Report sources.
//!
//! A [`ReportSource`] hands out reconciled reports by run and test id. The
//! server reads them from disk ([`crate::store::FsReportStore`]); tools that
//! talk to a running dashboard use the HTTP API ([`crate::client::ReportClient`]).

use async_trait::async_trait;
use maia_report::{Report, ReportError, RunId};
use thiserror::Error;

/// Result type alias for report source operations.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Errors that can occur while fetching reports.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The requested test report does not exist.
    #[error("test report not found: {run_id}/{test_id}")]
    NotFound { run_id: String, test_id: String },

    /// A run or test id that could escape the reports directory.
    #[error("invalid identifier: {0:?}")]
    InvalidId(String),

    /// Failed to read from the reports directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A report file was not valid JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A report document could not be normalized.
    #[error("report error: {0}")]
    Report(#[from] ReportError),

    /// The dashboard API could not be reached.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The dashboard API answered with an error status.
    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },

    /// The configured API base URL is unusable.
    #[error("invalid base URL {url}: {reason}")]
    BaseUrl { url: String, reason: String },
}

impl SourceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Read-only access to test reports.
#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Lists run identifiers.
    async fn list_runs(&self) -> SourceResult<Vec<RunId>>;

    /// Loads every test report of a run.
    async fn run_reports(&self, run_id: &str) -> SourceResult<Vec<Report>>;

    /// Loads a single test report.
    async fn test_report(&self, run_id: &str, test_id: &str) -> SourceResult<Report>;
}

/// Rejects ids that are empty or could address anything outside their directory.
pub fn validate_id(id: &str) -> SourceResult<()> {
    let suspicious = id.is_empty()
        || id.contains("..")
        || id.contains('/')
        || id.contains('\\')
        || id.contains('\0');

    if suspicious {
        return Err(SourceError::InvalidId(id.to_string()));
    }
    Ok(())
}
