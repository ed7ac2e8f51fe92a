//! # maia-report
//!
//! Report model and derived metrics for the Maia test dashboard.
//!
//! Test runs are directories of JSON reports, one file per test. This crate
//! turns those documents into typed [`Report`]s and computes everything the
//! dashboard displays:
//! - [`reconcile`]: normalizes the legacy and session-scoped report layouts
//! - [`metrics`]: per-test counts, success rate, response times
//! - [`aggregate`]: run rollups, search/filter, date-grouped run lists
//! - [`timeline`]: per-session message timeline and check results
//!
//! All computation is pure and synchronous. Reading files and serving HTTP is
//! left to `maia-web`.

pub mod aggregate;
pub mod error;
mod lenient;
pub mod metrics;
pub mod model;
pub mod reconcile;
pub mod time;
pub mod timeline;

pub use aggregate::{
    CollapseState, DateGroup, RunListView, RunQuery, RunRollup, RunSummary, StatusFilter,
};
pub use error::{ReportError, Result};
pub use metrics::TestMetrics;
pub use model::{
    Assertion, CheckStatus, JudgeResult, Message, MessageMetadata, Participant, ParticipantKind,
    Report, ReportShape, RequirementResult, RunId, Session, TestId, TestStatus, Validator,
};
pub use reconcile::{reconcile, reconcile_str, reconcile_with_id};
pub use timeline::{MessageFilter, SessionChecks, TimelineEntry};
