//! Report storage for the Maia dashboard.
//!
//! Reads reports from the reports directory (`test_reports/` by default): one
//! subdirectory per run, one JSON file per test. Nothing is cached; every
//! request sees the files as they are on disk.

use crate::source::{ReportSource, SourceError, SourceResult, validate_id};
use async_trait::async_trait;
use maia_report::{Report, RunId, reconcile_with_id};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Files in a run directory that aggregate the run instead of describing one test.
pub const AGGREGATE_FILES: [&str; 2] = ["test_results.json", "pytest_raw_report.json"];

/// Filesystem-backed report source.
#[derive(Debug, Clone)]
pub struct FsReportStore {
    /// Reports root (e.g., `test_reports/`)
    base_path: PathBuf,
}

impl FsReportStore {
    /// Creates a store reading from the given reports root.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Lists the per-test report files of a run, sorted by file name.
    async fn report_files(&self, run_path: &Path) -> SourceResult<Vec<(String, PathBuf)>> {
        let mut entries = fs::read_dir(run_path).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !is_test_report(file_name) || !follows_to(&path, std::fs::Metadata::is_file).await {
                continue;
            }
            let Some(test_id) = file_name.strip_suffix(".json") else {
                continue;
            };
            files.push((test_id.to_string(), path));
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }
}

#[async_trait]
impl ReportSource for FsReportStore {
    async fn list_runs(&self) -> SourceResult<Vec<RunId>> {
        let mut entries = fs::read_dir(&self.base_path).await?;
        let mut runs = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if follows_to(&entry.path(), std::fs::Metadata::is_dir).await
                && let Some(name) = entry.file_name().to_str()
            {
                runs.push(name.to_string());
            }
        }

        runs.sort();
        Ok(runs)
    }

    async fn run_reports(&self, run_id: &str) -> SourceResult<Vec<Report>> {
        validate_id(run_id)?;
        let run_path = self.base_path.join(run_id);

        let mut reports = Vec::new();
        for (test_id, path) in self.report_files(&run_path).await? {
            let content = fs::read_to_string(&path).await?;
            let value = serde_json::from_str(&content)?;
            reports.push(reconcile_with_id(value, test_id)?);
        }

        tracing::debug!(run_id, count = reports.len(), "Loaded run reports");
        Ok(reports)
    }

    async fn test_report(&self, run_id: &str, test_id: &str) -> SourceResult<Report> {
        validate_id(run_id)?;
        validate_id(test_id)?;

        let path = self.base_path.join(run_id).join(format!("{}.json", test_id));
        if !fs::try_exists(&path).await? {
            return Err(SourceError::NotFound {
                run_id: run_id.to_string(),
                test_id: test_id.to_string(),
            });
        }

        let content = fs::read_to_string(&path).await?;
        let mut report = maia_report::reconcile_str(&content)?;
        if report.test_id.is_empty() {
            report.test_id = test_id.to_string();
        }
        Ok(report)
    }
}

/// Checks the metadata of `path` after following symlinks. Dangling links never match.
async fn follows_to(path: &Path, check: impl FnOnce(&std::fs::Metadata) -> bool) -> bool {
    fs::metadata(path).await.is_ok_and(|m| check(&m))
}

/// Whether a file name in a run directory is a per-test report.
fn is_test_report(file_name: &str) -> bool {
    file_name.ends_with(".json") && !AGGREGATE_FILES.contains(&file_name)
}
