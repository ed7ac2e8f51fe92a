//! Per-session timeline and checks for the test detail screen.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{CheckStatus, Message, MessageMetadata, Report, RequirementResult, Session};

/// Sender name the framework uses for the human side of a conversation.
pub const USER_SENDER: &str = "user";

/// Which messages the timeline shows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageFilter {
    #[default]
    All,
    /// Conversation only: agents and the user
    Messages,
    /// Tool traffic: tool responses and calls addressed to tools
    Tools,
}

impl MessageFilter {
    fn keeps(self, message: &Message, agents: &HashSet<&str>, tools: &HashSet<&str>) -> bool {
        match self {
            Self::All => true,
            Self::Messages => {
                agents.contains(message.sender.as_str()) || message.sender == USER_SENDER
            }
            Self::Tools => tools.contains(message.sender.as_str()) || message.is_tool_call(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    ToolResponse,
    ToolCall,
    UserMessage,
    AgentMessage,
}

/// A message prepared for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineEntry {
    pub message_id: String,
    pub kind: EntryKind,
    pub label: String,
    pub sender: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    pub timestamp: String,
    pub is_error: bool,
    /// Content; tool responses holding JSON are pretty-printed
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_args: Option<Value>,
}

impl TimelineEntry {
    pub fn classify(message: &Message, tools: &HashSet<&str>) -> Self {
        let tool_args = message.metadata.tool_args().cloned();

        let (kind, label) = if tools.contains(message.sender.as_str()) {
            (EntryKind::ToolResponse, "Tool response".to_string())
        } else if tool_args.is_some() {
            let target = match &message.metadata {
                MessageMetadata::ToolCall {
                    receiver: Some(receiver),
                    ..
                } => receiver.as_str(),
                _ => message.receiver.as_deref().unwrap_or_default(),
            };
            (EntryKind::ToolCall, format!("🔧 {}", target))
        } else if message.sender == USER_SENDER {
            (EntryKind::UserMessage, "User Message".to_string())
        } else {
            (EntryKind::AgentMessage, "Agent Message".to_string())
        };

        Self {
            message_id: message.message_id.clone(),
            kind,
            label,
            sender: message.sender.clone(),
            receiver: message.receiver.clone(),
            timestamp: message.timestamp.clone(),
            is_error: message.metadata.is_error(),
            content: if kind == EntryKind::ToolResponse {
                pretty_content(&message.content)
            } else {
                message.content.clone()
            },
            tool_args,
        }
    }
}

/// Re-indents JSON content; anything else is returned unchanged.
pub fn pretty_content(content: &str) -> String {
    serde_json::from_str::<Value>(content)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| content.to_string())
}

/// Timeline of one session, or `None` when the session does not exist.
pub fn session_timeline(
    report: &Report,
    session_id: &str,
    filter: MessageFilter,
) -> Option<Vec<TimelineEntry>> {
    let session = report.session(session_id)?;
    let agents = report.agent_names();
    let tools = report.tool_names();

    Some(
        session
            .messages
            .iter()
            .filter(|m| filter.keeps(m, &agents, &tools))
            .map(|m| TimelineEntry::classify(m, &tools))
            .collect(),
    )
}

/// Session selected when a test is first opened.
pub fn default_session(report: &Report) -> Option<&str> {
    report.sessions.first().map(|s| s.id.as_str())
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckTally {
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl CheckTally {
    fn of(statuses: impl Iterator<Item = CheckStatus>) -> Self {
        statuses.fold(Self::default(), |mut tally, status| {
            match status {
                CheckStatus::Passed => tally.passed += 1,
                CheckStatus::Failed => tally.failed += 1,
                CheckStatus::Unknown => {}
            }
            tally.total += 1;
            tally
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssertionOutcome {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: CheckStatus,
    /// Only reported for failed assertions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidatorOutcome {
    pub name: String,
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JudgeSummary {
    pub score: f64,
    /// Score rendered against the 0-10 scale, e.g. `8/10`
    pub badge: String,
    pub verdict: String,
    pub succeeded: bool,
    pub reasoning: String,
    pub requirements: Vec<RequirementResult>,
}

/// Assertions, validators and judge verdict of one session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionChecks {
    pub session_id: String,
    pub assertions: CheckTally,
    pub validators: CheckTally,
    pub has_failures: bool,
    pub assertion_results: Vec<AssertionOutcome>,
    pub validator_results: Vec<ValidatorOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judge: Option<JudgeSummary>,
}

impl SessionChecks {
    pub fn from_session(session: &Session) -> Self {
        let assertions = CheckTally::of(session.assertions().iter().map(|a| a.status));
        let validators = CheckTally::of(session.validators().iter().map(|v| v.status));

        let assertion_results = session
            .assertions()
            .iter()
            .map(|a| AssertionOutcome {
                id: a.id.clone(),
                name: a.assertion_name.clone(),
                description: a.description.clone(),
                status: a.status,
                failure_message: (a.status == CheckStatus::Failed)
                    .then(|| a.failure_message().map(str::to_string))
                    .flatten(),
            })
            .collect();

        let validator_results = session
            .validators()
            .iter()
            .map(|v| {
                let details = v
                    .details
                    .as_ref()
                    .filter(|_| v.status == CheckStatus::Failed);
                ValidatorOutcome {
                    name: v.name.clone(),
                    status: v.status,
                    error: details.map(|d| d.error.clone()),
                    traceback: details.map(|d| d.traceback.clone()),
                }
            })
            .collect();

        let judge = session.judge_result.as_ref().map(|j| JudgeSummary {
            score: j.score,
            badge: format!("{}/10", j.score),
            verdict: j.verdict.clone(),
            succeeded: j.succeeded(),
            reasoning: j.reasoning.clone(),
            requirements: j.requirements.clone(),
        });

        Self {
            session_id: session.id.clone(),
            has_failures: assertions.failed > 0 || validators.failed > 0,
            assertions,
            validators,
            assertion_results,
            validator_results,
            judge,
        }
    }
}
