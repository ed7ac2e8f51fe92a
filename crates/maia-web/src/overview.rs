//! Loads run summaries from a [`ReportSource`].
//!
//! The run listing is the only fetch whose failure is fatal. Every run's
//! reports are fetched concurrently, and a run whose fetch fails is shown
//! with no tests instead of failing the whole overview.

use crate::source::{ReportSource, SourceResult};
use chrono::{DateTime, TimeZone, Utc};
use futures::future::join_all;
use maia_report::{CollapseState, RunListView, RunQuery, RunSummary};
use tracing::warn;

/// Summarizes one run, degrading to an empty run if its reports can't be fetched.
pub async fn load_run_summary(
    source: &dyn ReportSource,
    run_id: &str,
    now: DateTime<Utc>,
) -> RunSummary {
    let reports = match source.run_reports(run_id).await {
        Ok(reports) => reports,
        Err(e) => {
            warn!(run_id, "Failed to load run reports: {}", e);
            Vec::new()
        }
    };
    RunSummary::build(run_id, &reports, now)
}

/// Summarizes every run the source lists, in listing order.
pub async fn load_run_summaries(
    source: &dyn ReportSource,
    now: DateTime<Utc>,
) -> SourceResult<Vec<RunSummary>> {
    let run_ids = source.list_runs().await?;
    let fetches = run_ids
        .iter()
        .map(|run_id| load_run_summary(source, run_id, now));
    Ok(join_all(fetches).await)
}

/// Loads all runs and builds the filtered, date-grouped run list.
pub async fn load_run_list<Tz: TimeZone>(
    source: &dyn ReportSource,
    query: &RunQuery,
    collapse: &mut CollapseState,
    now: &DateTime<Tz>,
) -> SourceResult<RunListView> {
    let runs = load_run_summaries(source, now.with_timezone(&Utc)).await?;
    Ok(RunListView::build(&runs, query, collapse, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceError;
    use async_trait::async_trait;
    use maia_report::{Report, RunId, StatusFilter, reconcile};
    use serde_json::json;
    use std::collections::HashMap;

    /// In-memory source; runs mapped to `None` fail to load.
    struct StubSource {
        runs: Vec<(RunId, Option<Vec<Report>>)>,
        list_fails: bool,
    }

    #[async_trait]
    impl ReportSource for StubSource {
        async fn list_runs(&self) -> SourceResult<Vec<RunId>> {
            if self.list_fails {
                return Err(SourceError::Status {
                    status: 500,
                    message: "Failed to read test runs".to_string(),
                });
            }
            Ok(self.runs.iter().map(|(id, _)| id.clone()).collect())
        }

        async fn run_reports(&self, run_id: &str) -> SourceResult<Vec<Report>> {
            let runs: HashMap<_, _> = self.runs.iter().cloned().collect();
            runs.get(run_id).cloned().flatten().ok_or_else(|| {
                SourceError::Status {
                    status: 500,
                    message: format!("Failed to read reports for run {run_id}"),
                }
            })
        }

        async fn test_report(&self, run_id: &str, test_id: &str) -> SourceResult<Report> {
            Err(SourceError::NotFound {
                run_id: run_id.to_string(),
                test_id: test_id.to_string(),
            })
        }
    }

    fn report(name: &str, status: &str, start: &str, end: &str) -> Report {
        reconcile(json!({
            "test_id": name,
            "test_name": name,
            "status": status,
            "start_time": start,
            "end_time": end,
        }))
        .unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 18, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_failing_run_degrades_to_empty() {
        let source = StubSource {
            runs: vec![
                (
                    "nightly_checkout".to_string(),
                    Some(vec![report(
                        "checkout",
                        "passed",
                        "2026-03-10T09:00:00Z",
                        "2026-03-10T09:00:20Z",
                    )]),
                ),
                ("broken_run".to_string(), None),
            ],
            list_fails: false,
        };

        let summaries = load_run_summaries(&source, now()).await.unwrap();

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].stats.total, 1);
        assert_eq!(summaries[0].stats.total_duration, "20.0s");
        assert_eq!(summaries[1].id, "broken_run");
        assert_eq!(summaries[1].stats.total, 0);
        assert_eq!(summaries[1].stats.total_duration, "N/A");
        assert_eq!(summaries[1].timestamp, now());
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal() {
        let source = StubSource {
            runs: Vec::new(),
            list_fails: true,
        };

        assert!(load_run_summaries(&source, now()).await.is_err());
    }

    #[tokio::test]
    async fn test_run_list_filters_and_groups() {
        let source = StubSource {
            runs: vec![
                (
                    "smoke_a".to_string(),
                    Some(vec![report(
                        "login",
                        "passed",
                        "2026-03-10T08:00:00Z",
                        "2026-03-10T08:00:05Z",
                    )]),
                ),
                (
                    "smoke_b".to_string(),
                    Some(vec![report(
                        "logout",
                        "failed",
                        "2026-03-09T08:00:00Z",
                        "2026-03-09T08:00:05Z",
                    )]),
                ),
            ],
            list_fails: false,
        };

        let mut collapse = CollapseState::new();
        let all = load_run_list(&source, &RunQuery::default(), &mut collapse, &now())
            .await
            .unwrap();
        assert_eq!(all.total_runs, 2);
        assert_eq!(all.groups.len(), 2);
        assert_eq!(all.groups[0].label, "Today");
        assert!(!all.groups[0].collapsed);
        assert_eq!(all.groups[1].label, "Yesterday");
        assert!(all.groups[1].collapsed);

        let failed = RunQuery {
            search: String::new(),
            status: StatusFilter::Failed,
        };
        let view = load_run_list(&source, &failed, &mut collapse, &now())
            .await
            .unwrap();
        assert_eq!(view.matching_runs, 1);
        assert_eq!(view.groups[0].runs[0].id, "smoke_b");
        // Flags recorded by the first build are kept.
        assert!(view.groups[0].collapsed);
    }
}
