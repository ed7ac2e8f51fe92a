//! Data models for test reports.
//!
//! These models represent one test's report as written by the test framework,
//! after normalization by [`crate::reconcile`].

use std::collections::HashSet;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::lenient;

/// Identifier of a run (the report directory name).
pub type RunId = String;

/// Identifier of a test within a run (the report file stem).
pub type TestId = String;

/// Outcome of a whole test.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// Test passed
    Passed,
    /// Test failed
    Failed,
    /// Test is still executing
    Running,
    /// Any status this dashboard does not know about
    #[default]
    #[serde(other)]
    Unknown,
}

/// Outcome of a single assertion or validator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Passed,
    Failed,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Role of a participant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantKind {
    Agent,
    Tool,
    User,
    #[default]
    #[serde(other)]
    Other,
}

/// An agent, tool or user taking part in a test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Participant {
    #[serde(default, deserialize_with = "lenient::value")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::value")]
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "lenient::value")]
    pub kind: ParticipantKind,
    #[serde(default)]
    pub metadata: Value,
}

impl Participant {
    /// Model name recorded for agents (`metadata.model`).
    pub fn model(&self) -> Option<&str> {
        self.metadata.get("model").and_then(Value::as_str)
    }
}

/// Message metadata, classified by the keys the dashboard actually reads.
///
/// Every variant keeps the original map so unknown keys pass through
/// untouched when the report is serialized again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Map<String, Value>")]
pub enum MessageMetadata {
    /// The message invokes a tool (`tool_args` present).
    ToolCall {
        tool_args: Value,
        receiver: Option<String>,
        raw: Map<String, Value>,
    },
    /// The message reports an error (`type == "error"`).
    Error { raw: Map<String, Value> },
    /// Nothing the dashboard interprets.
    Opaque(Map<String, Value>),
}

impl MessageMetadata {
    /// The original key/value map.
    pub fn raw(&self) -> &Map<String, Value> {
        match self {
            Self::ToolCall { raw, .. } | Self::Error { raw } | Self::Opaque(raw) => raw,
        }
    }

    /// Tool arguments, when this is a tool call.
    pub fn tool_args(&self) -> Option<&Value> {
        match self {
            Self::ToolCall { tool_args, .. } => Some(tool_args),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl Default for MessageMetadata {
    fn default() -> Self {
        Self::Opaque(Map::new())
    }
}

impl From<Value> for MessageMetadata {
    fn from(value: Value) -> Self {
        let Value::Object(raw) = value else {
            return Self::default();
        };

        if let Some(tool_args) = raw.get("tool_args").filter(|args| !args.is_null()) {
            return Self::ToolCall {
                tool_args: tool_args.clone(),
                receiver: raw
                    .get("receiver")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                raw,
            };
        }

        if raw.get("type").and_then(Value::as_str) == Some("error") {
            return Self::Error { raw };
        }

        Self::Opaque(raw)
    }
}

impl From<MessageMetadata> for Map<String, Value> {
    fn from(metadata: MessageMetadata) -> Self {
        match metadata {
            MessageMetadata::ToolCall { raw, .. }
            | MessageMetadata::Error { raw }
            | MessageMetadata::Opaque(raw) => raw,
        }
    }
}

/// One message in a session, in the order it was recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Message {
    #[serde(default, deserialize_with = "lenient::value")]
    pub message_id: String,
    #[serde(default, deserialize_with = "lenient::value")]
    pub sender: String,
    #[serde(default, deserialize_with = "lenient::value")]
    pub sender_type: String,
    #[serde(default, deserialize_with = "lenient::value")]
    pub receiver: Option<String>,
    #[serde(default, deserialize_with = "lenient::value")]
    pub receiver_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::value")]
    pub timestamp: String,
    /// Message body; may itself be JSON-encoded
    #[serde(default, deserialize_with = "lenient::text")]
    pub content: String,
    #[serde(default)]
    pub metadata: MessageMetadata,
}

impl Message {
    pub fn is_tool_call(&self) -> bool {
        self.receiver_type.as_deref() == Some("tool")
    }
}

/// A pass/fail check recorded for a session (or, in legacy reports, for the test).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Assertion {
    #[serde(default, deserialize_with = "lenient::value")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::value")]
    pub assertion_name: String,
    #[serde(
        default,
        deserialize_with = "lenient::value",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::value")]
    pub status: CheckStatus,
    #[serde(default)]
    pub metadata: Value,
    /// Free-text detail used by the legacy top-level shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl Assertion {
    /// Failure text (`metadata.message.content`, else legacy string `details`).
    pub fn failure_message(&self) -> Option<&str> {
        self.metadata
            .pointer("/message/content")
            .and_then(Value::as_str)
            .or_else(|| self.details.as_ref().and_then(Value::as_str))
    }
}

/// Error detail attached to a failed validator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ValidatorDetails {
    #[serde(default, deserialize_with = "lenient::text")]
    pub error: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub traceback: String,
}

/// A structural or semantic check run against a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Validator {
    #[serde(default, deserialize_with = "lenient::value")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::value")]
    pub status: CheckStatus,
    #[serde(
        default,
        deserialize_with = "lenient::value",
        skip_serializing_if = "Option::is_none"
    )]
    pub details: Option<ValidatorDetails>,
}

/// Judge verdict for one requirement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RequirementResult {
    #[serde(default, deserialize_with = "lenient::value")]
    pub requirement: String,
    #[serde(default, deserialize_with = "lenient::value")]
    pub verdict: String,
    #[serde(default, deserialize_with = "lenient::value")]
    pub score: f64,
    #[serde(default, deserialize_with = "lenient::value")]
    pub reasoning: String,
}

/// LLM-graded quality assessment of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct JudgeResult {
    #[serde(default, deserialize_with = "lenient::value")]
    pub verdict: String,
    /// Expected range 0-10
    #[serde(default, deserialize_with = "lenient::value")]
    pub score: f64,
    #[serde(default, deserialize_with = "lenient::value")]
    pub reasoning: String,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub requirements: Vec<RequirementResult>,
}

impl JudgeResult {
    pub fn succeeded(&self) -> bool {
        self.verdict == "SUCCESS"
    }
}

/// One conversational thread within a test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Session {
    #[serde(default, deserialize_with = "lenient::value")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub participants: Vec<String>,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub messages: Vec<Message>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_seq",
        skip_serializing_if = "Option::is_none"
    )]
    pub assertions: Option<Vec<Assertion>>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_seq",
        skip_serializing_if = "Option::is_none"
    )]
    pub validators: Option<Vec<Validator>>,
    #[serde(
        default,
        deserialize_with = "lenient::value",
        skip_serializing_if = "Option::is_none"
    )]
    pub judge_result: Option<JudgeResult>,
}

impl Session {
    /// Session-scoped assertions; empty when the session carries none.
    pub fn assertions(&self) -> &[Assertion] {
        self.assertions.as_deref().unwrap_or_default()
    }

    pub fn validators(&self) -> &[Validator] {
        self.validators.as_deref().unwrap_or_default()
    }
}

/// Which historical layout a report was written in.
///
/// Decided once by [`crate::reconcile`]; consumers branch on this instead of
/// probing the JSON for optional keys.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ReportShape {
    /// Assertions live inside each session.
    #[default]
    SessionScoped,
    /// A flat top-level `assertions` array describes the whole test.
    Legacy { assertions: Vec<Assertion> },
}

/// The normalized report of one test execution.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Report {
    pub test_id: TestId,
    pub test_name: String,
    pub start_time: String,
    pub end_time: String,
    pub status: TestStatus,
    pub participants: Vec<Participant>,
    pub sessions: Vec<Session>,
    pub shape: ReportShape,
    /// Top-level fields this dashboard does not interpret
    pub extra: Map<String, Value>,
}

impl Report {
    pub fn agents(&self) -> impl Iterator<Item = &Participant> {
        self.participants_of(ParticipantKind::Agent)
    }

    pub fn tools(&self) -> impl Iterator<Item = &Participant> {
        self.participants_of(ParticipantKind::Tool)
    }

    /// Names of participants typed as agents.
    pub fn agent_names(&self) -> HashSet<&str> {
        self.agents().map(|p| p.name.as_str()).collect()
    }

    /// Names of participants typed as tools.
    pub fn tool_names(&self) -> HashSet<&str> {
        self.tools().map(|p| p.name.as_str()).collect()
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// All messages across sessions, session by session in stored order.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.sessions.iter().flat_map(|s| s.messages.iter())
    }

    /// Assertions describing the whole test.
    ///
    /// Legacy reports answer with their top-level array even when sessions
    /// also carry assertions; session-scoped reports flatten their sessions.
    pub fn aggregate_assertions(&self) -> Vec<&Assertion> {
        match &self.shape {
            ReportShape::Legacy { assertions } => assertions.iter().collect(),
            ReportShape::SessionScoped => self
                .sessions
                .iter()
                .flat_map(|s| s.assertions().iter())
                .collect(),
        }
    }

    fn participants_of(&self, kind: ParticipantKind) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(move |p| p.kind == kind)
    }
}

impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("test_id", &self.test_id)?;
        map.serialize_entry("test_name", &self.test_name)?;
        map.serialize_entry("start_time", &self.start_time)?;
        map.serialize_entry("end_time", &self.end_time)?;
        map.serialize_entry("status", &self.status)?;
        map.serialize_entry("participants", &self.participants)?;
        map.serialize_entry("sessions", &self.sessions)?;
        if let ReportShape::Legacy { assertions } = &self.shape {
            map.serialize_entry("assertions", assertions)?;
        }
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TestStatus::Passed).unwrap(),
            "\"passed\""
        );
        assert_eq!(
            serde_json::to_string(&TestStatus::Running).unwrap(),
            "\"running\""
        );
    }

    #[test]
    fn test_unknown_status_is_tolerated() {
        let status: TestStatus = serde_json::from_value(json!("skipped")).unwrap();
        assert_eq!(status, TestStatus::Unknown);
    }

    #[test]
    fn test_metadata_classifies_tool_call() {
        let metadata = MessageMetadata::from(json!({
            "tool_args": {"city": "Paris"},
            "receiver": "weather_api",
            "trace": 7
        }));

        assert!(matches!(
            &metadata,
            MessageMetadata::ToolCall { receiver: Some(r), .. } if r == "weather_api"
        ));
        assert_eq!(metadata.tool_args(), Some(&json!({"city": "Paris"})));
        // Unknown keys survive a round trip
        let back = serde_json::to_value(&metadata).unwrap();
        assert_eq!(back["trace"], 7);
    }

    #[test]
    fn test_metadata_classifies_error_and_opaque() {
        assert!(MessageMetadata::from(json!({"type": "error"})).is_error());
        assert!(matches!(
            MessageMetadata::from(json!({"type": "text"})),
            MessageMetadata::Opaque(_)
        ));
        assert_eq!(MessageMetadata::from(Value::Null), MessageMetadata::default());
    }

    #[test]
    fn test_message_tolerates_missing_and_mistyped_fields() {
        let message: Message = serde_json::from_value(json!({
            "sender": "user",
            "receiver": 42,
            "content": {"structured": true},
            "metadata": null
        }))
        .unwrap();

        assert_eq!(message.sender, "user");
        assert_eq!(message.receiver, None);
        assert_eq!(message.content, r#"{"structured":true}"#);
        assert_eq!(message.metadata, MessageMetadata::default());
    }

    #[test]
    fn test_assertion_failure_message() {
        let assertion: Assertion = serde_json::from_value(json!({
            "id": "a1",
            "assertion_name": "mentions_price",
            "status": "failed",
            "metadata": {"message": {"content": "no price found"}}
        }))
        .unwrap();

        assert_eq!(assertion.failure_message(), Some("no price found"));
    }

    #[test]
    fn test_session_without_checks_reads_as_empty() {
        let session: Session = serde_json::from_value(json!({"id": "s1"})).unwrap();
        assert!(session.assertions.is_none());
        assert!(session.assertions().is_empty());
        assert!(session.validators().is_empty());
        assert!(session.judge_result.is_none());
    }

    #[test]
    fn test_judge_result_succeeded() {
        let judge = JudgeResult {
            verdict: "SUCCESS".to_string(),
            score: 8.5,
            ..JudgeResult::default()
        };
        assert!(judge.succeeded());
        assert!(
            !JudgeResult {
                verdict: "FAILURE".to_string(),
                ..judge
            }
            .succeeded()
        );
    }
}
