//! Schema reconciliation.
//!
//! Report files exist in two layouts: older ones keep a flat `assertions`
//! array at the top level, newer ones keep `assertions`, `validators` and
//! `judge_result` inside each session. Both are read into the same
//! [`Report`], and the layout is recorded once as a [`ReportShape`].

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{ReportError, Result};
use crate::lenient;
use crate::model::{Assertion, Participant, Report, ReportShape, Session, TestStatus};

/// Wire form of a report file, before the layout is decided.
#[derive(Debug, Deserialize)]
struct RawReport {
    #[serde(default, deserialize_with = "lenient::value")]
    test_id: String,
    #[serde(default, deserialize_with = "lenient::value")]
    test_name: String,
    #[serde(default, deserialize_with = "lenient::value")]
    start_time: String,
    #[serde(default, deserialize_with = "lenient::value")]
    end_time: String,
    #[serde(default, deserialize_with = "lenient::value")]
    status: TestStatus,
    #[serde(default, deserialize_with = "lenient::seq")]
    participants: Vec<Participant>,
    #[serde(default, deserialize_with = "lenient::seq")]
    sessions: Vec<Session>,
    #[serde(default, deserialize_with = "lenient::optional_seq")]
    assertions: Option<Vec<Assertion>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Normalizes a parsed report document.
///
/// Fails only when the root is not an object; any field below it that is
/// missing or has the wrong type is read as absent.
pub fn reconcile(value: Value) -> Result<Report> {
    let found = json_kind(&value);
    if !value.is_object() {
        return Err(ReportError::NotAnObject { found });
    }

    let raw: RawReport = serde_json::from_value(value)?;

    let shape = match raw.assertions {
        Some(assertions) => ReportShape::Legacy { assertions },
        None => ReportShape::SessionScoped,
    };

    Ok(Report {
        test_id: raw.test_id,
        test_name: raw.test_name,
        start_time: raw.start_time,
        end_time: raw.end_time,
        status: raw.status,
        participants: raw.participants,
        sessions: raw.sessions,
        shape,
        extra: raw.extra,
    })
}

/// Normalizes a report and stamps it with the id derived from its file name.
pub fn reconcile_with_id(value: Value, test_id: impl Into<String>) -> Result<Report> {
    let mut report = reconcile(value)?;
    report.test_id = test_id.into();
    Ok(report)
}

/// Parses and normalizes a report document in one step.
pub fn reconcile_str(raw: &str) -> Result<Report> {
    reconcile(serde_json::from_str(raw)?)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
