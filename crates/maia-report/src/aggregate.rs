//! Run-level rollups and the run list view.
//!
//! Nothing here reads ambient state: the current time, the search query and
//! the collapsed groups are all passed in by the caller.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Report, RunId, TestId, TestStatus};
use crate::time::{self, NOT_AVAILABLE};

/// Label of the group holding runs from the current day.
pub const TODAY: &str = "Today";

/// Label of the group holding runs from the previous day.
pub const YESTERDAY: &str = "Yesterday";

/// Counts and wall-clock span of one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRollup {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub running: usize,
    /// Earliest start to latest end, not the sum of test durations
    pub total_duration: String,
    /// Earliest parseable start time
    pub started_at: Option<DateTime<Utc>>,
}

impl RunRollup {
    pub fn from_reports(reports: &[Report]) -> Self {
        let count = |status: TestStatus| reports.iter().filter(|r| r.status == status).count();

        let started_at = reports
            .iter()
            .filter_map(|r| time::parse_timestamp(&r.start_time))
            .min();
        let ended_at = reports
            .iter()
            .filter_map(|r| time::parse_timestamp(&r.end_time))
            .max();

        let total_duration = match (started_at, ended_at) {
            (Some(start), Some(end)) => {
                time::format_duration(time::millis_between(start, end) / 1000.0)
            }
            _ => NOT_AVAILABLE.to_string(),
        };

        Self {
            total: reports.len(),
            passed: count(TestStatus::Passed),
            failed: count(TestStatus::Failed),
            running: count(TestStatus::Running),
            total_duration,
            started_at,
        }
    }
}

/// One test as listed under its run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestRow {
    pub id: TestId,
    pub name: String,
    pub status: TestStatus,
    pub timestamp: String,
    pub duration: String,
}

impl TestRow {
    pub fn from_report(report: &Report) -> Self {
        Self {
            id: report.test_id.clone(),
            name: report.test_name.clone(),
            status: report.status,
            timestamp: report.start_time.clone(),
            duration: time::format_elapsed(&report.start_time, &report.end_time, 1),
        }
    }
}

/// Summary of a run for list and overview screens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub id: RunId,
    /// Human-readable form of the run id
    pub name: String,
    /// Earliest test start, or the build time for an empty run
    pub timestamp: DateTime<Utc>,
    pub stats: RunRollup,
    pub tests: Vec<TestRow>,
}

impl RunSummary {
    /// Builds the summary of one run.
    ///
    /// `now` stands in for the timestamp of runs without any parseable start.
    pub fn build(run_id: &str, reports: &[Report], now: DateTime<Utc>) -> Self {
        let stats = RunRollup::from_reports(reports);
        Self {
            id: run_id.to_string(),
            name: run_display_name(run_id),
            timestamp: stats.started_at.unwrap_or(now),
            tests: reports.iter().map(TestRow::from_report).collect(),
            stats,
        }
    }

    /// Case-insensitive substring match on the run name or any test name.
    pub fn matches_search(&self, search: &str) -> bool {
        let needle = search.to_lowercase();
        self.name.to_lowercase().contains(&needle)
            || self
                .tests
                .iter()
                .any(|t| t.name.to_lowercase().contains(&needle))
    }

    /// True when the filter is `all` or any test has the filtered status.
    pub fn matches_status(&self, filter: StatusFilter) -> bool {
        match filter.status() {
            None => true,
            Some(status) => self.tests.iter().any(|t| t.status == status),
        }
    }

    pub fn matches(&self, query: &RunQuery) -> bool {
        self.matches_search(&query.search) && self.matches_status(query.status)
    }
}

/// Turns a run id into a display name: `smoke_test_v2` -> `Smoke Test V2`.
pub fn run_display_name(run_id: &str) -> String {
    let mut name = String::with_capacity(run_id.len());
    let mut word_start = true;

    for ch in run_id.chars() {
        let ch = if ch == '_' { ' ' } else { ch };
        if ch.is_whitespace() {
            word_start = true;
            name.push(ch);
            continue;
        }
        if word_start {
            name.extend(ch.to_uppercase());
        } else {
            name.push(ch);
        }
        word_start = false;
    }

    name
}

/// Status filter of the run list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Passed,
    Failed,
    Running,
}

impl StatusFilter {
    fn status(self) -> Option<TestStatus> {
        match self {
            Self::All => None,
            Self::Passed => Some(TestStatus::Passed),
            Self::Failed => Some(TestStatus::Failed),
            Self::Running => Some(TestStatus::Running),
        }
    }
}

/// Search text and status filter applied to the run list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunQuery {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub status: StatusFilter,
}

/// Sorts runs most recent first. Ties keep their incoming order.
pub fn sort_runs(runs: &mut [RunSummary]) {
    runs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Runs that fall on the same calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DateGroup {
    /// `Today`, `Yesterday`, or a date such as `Jan 5, 2026`
    pub label: String,
    pub date: NaiveDate,
    pub runs: Vec<RunSummary>,
}

/// Buckets runs by calendar day in the time zone of `now`.
///
/// Groups come out as `Today`, `Yesterday`, then older (or future) days in
/// descending order. Runs keep their incoming order within a group.
pub fn group_by_date<Tz: TimeZone>(runs: &[RunSummary], now: &DateTime<Tz>) -> Vec<DateGroup> {
    let zone = now.timezone();
    let today = now.date_naive();
    let yesterday = today.pred_opt();

    let mut by_day: BTreeMap<NaiveDate, Vec<RunSummary>> = BTreeMap::new();
    for run in runs {
        let day = run.timestamp.with_timezone(&zone).date_naive();
        by_day.entry(day).or_default().push(run.clone());
    }

    let rank = |day: NaiveDate| {
        if day == today {
            0
        } else if Some(day) == yesterday {
            1
        } else {
            2
        }
    };

    let mut groups: Vec<DateGroup> = by_day
        .into_iter()
        .map(|(date, runs)| {
            let label = match rank(date) {
                0 => TODAY.to_string(),
                1 => YESTERDAY.to_string(),
                _ => date.format("%b %-d, %Y").to_string(),
            };
            DateGroup { label, date, runs }
        })
        .collect();

    groups.sort_by(|a, b| {
        rank(a.date)
            .cmp(&rank(b.date))
            .then_with(|| b.date.cmp(&a.date))
    });
    groups
}

/// Collapsed/expanded flags of the run list groups, owned by the caller.
///
/// Once a group has a flag it is never reset by [`CollapseState::sync`], so
/// a user's toggle survives any number of recomputations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollapseState {
    collapsed: BTreeMap<String, bool>,
}

impl CollapseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records defaults for groups seen for the first time.
    ///
    /// The group to expand is `Today` when present, else the first group;
    /// every other new group starts collapsed.
    pub fn sync(&mut self, groups: &[DateGroup]) {
        let Some(first) = groups.first() else {
            return;
        };
        let expand = if groups.iter().any(|g| g.label == TODAY) {
            TODAY
        } else {
            first.label.as_str()
        };

        for group in groups {
            self.collapsed
                .entry(group.label.clone())
                .or_insert_with(|| group.label != expand);
        }
    }

    pub fn toggle(&mut self, label: &str) {
        let flag = self.collapsed.entry(label.to_string()).or_insert(false);
        *flag = !*flag;
    }

    pub fn is_collapsed(&self, label: &str) -> bool {
        self.collapsed.get(label).copied().unwrap_or(false)
    }
}

/// A date group with its collapsed flag, as rendered by the run list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListedGroup {
    pub label: String,
    pub date: NaiveDate,
    pub collapsed: bool,
    pub runs: Vec<RunSummary>,
}

/// The complete run list: filtered, sorted, grouped by day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunListView {
    pub total_runs: usize,
    pub matching_runs: usize,
    pub groups: Vec<ListedGroup>,
}

impl RunListView {
    /// Applies `query`, sorts, groups by day relative to `now`, and syncs
    /// `collapse` with the resulting groups.
    pub fn build<Tz: TimeZone>(
        runs: &[RunSummary],
        query: &RunQuery,
        collapse: &mut CollapseState,
        now: &DateTime<Tz>,
    ) -> Self {
        let mut matching: Vec<RunSummary> =
            runs.iter().filter(|r| r.matches(query)).cloned().collect();
        sort_runs(&mut matching);

        let groups = group_by_date(&matching, now);
        collapse.sync(&groups);

        Self {
            total_runs: runs.len(),
            matching_runs: matching.len(),
            groups: groups
                .into_iter()
                .map(|g| ListedGroup {
                    collapsed: collapse.is_collapsed(&g.label),
                    label: g.label,
                    date: g.date,
                    runs: g.runs,
                })
                .collect(),
        }
    }
}
