//! Derived statistics for a single report.
//!
//! Every function here is total: empty sessions, missing messages and
//! unparseable timestamps yield `0`, `"100%"` or `"N/A"` instead of failing.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::model::{Assertion, CheckStatus, Report, TestStatus};
use crate::time::{self, NOT_AVAILABLE};

/// Total number of messages across all sessions.
pub fn message_count(report: &Report) -> usize {
    report.sessions.iter().map(|s| s.messages.len()).sum()
}

/// Number of messages addressed to a tool.
pub fn tool_call_count(report: &Report) -> usize {
    report.messages().filter(|m| m.is_tool_call()).count()
}

/// Number of calls addressed to one named tool.
pub fn tool_calls_to(report: &Report, tool: &str) -> usize {
    report
        .messages()
        .filter(|m| m.is_tool_call() && m.receiver.as_deref() == Some(tool))
        .count()
}

/// Number of messages sent by one participant.
pub fn agent_message_count(report: &Report, agent: &str) -> usize {
    report.messages().filter(|m| m.sender == agent).count()
}

/// Number of distinct tools an agent called.
pub fn unique_tools_used_by(report: &Report, agent: &str) -> usize {
    report
        .messages()
        .filter(|m| m.sender == agent && m.is_tool_call())
        .filter_map(|m| m.receiver.as_deref())
        .collect::<HashSet<_>>()
        .len()
}

/// Share of passed assertions as an integer percentage.
///
/// An empty set counts as a vacuous pass (`"100%"`).
pub fn success_rate<'a>(assertions: impl IntoIterator<Item = &'a Assertion>) -> String {
    let (passed, total) = assertions
        .into_iter()
        .fold((0usize, 0usize), |(passed, total), assertion| {
            let hit = usize::from(assertion.status == CheckStatus::Passed);
            (passed + hit, total + 1)
        });

    if total == 0 {
        return "100%".to_string();
    }
    let rate = (passed as f64 / total as f64 * 100.0).round();
    format!("{}%", rate as u64)
}

/// Mean delay between an external input and the next agent reply.
///
/// Within each session, a consecutive pair counts when a non-agent sender is
/// followed by a known agent. Negative deltas and pairs with unparseable
/// timestamps are skipped. Agent-to-agent handoffs are not counted.
pub fn average_response_time(report: &Report) -> String {
    match response_time_samples(report).as_slice() {
        [] => NOT_AVAILABLE.to_string(),
        samples => {
            let mean = samples.iter().sum::<f64>() / samples.len() as f64;
            time::format_response_time(mean)
        }
    }
}

/// Individual response-time samples in milliseconds.
pub fn response_time_samples(report: &Report) -> Vec<f64> {
    let agents = report.agent_names();
    let mut samples = Vec::new();

    for session in &report.sessions {
        for pair in session.messages.windows(2) {
            let (request, reply) = (&pair[0], &pair[1]);
            if agents.contains(request.sender.as_str()) || !agents.contains(reply.sender.as_str())
            {
                continue;
            }

            let (Some(sent), Some(answered)) = (
                time::parse_timestamp(&request.timestamp),
                time::parse_timestamp(&reply.timestamp),
            ) else {
                continue;
            };

            let delta = time::millis_between(sent, answered);
            if delta >= 0.0 {
                samples.push(delta);
            }
        }
    }

    samples
}

/// Wall-clock duration of a test with two decimals, `"N/A"` if unknown.
pub fn test_duration(report: &Report) -> String {
    time::format_elapsed(&report.start_time, &report.end_time, 2)
}

/// Activity of one agent within a test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentStats {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages_sent: usize,
    pub unique_tools: usize,
}

/// Call volume of one tool within a test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolStats {
    pub name: String,
    pub calls: usize,
}

/// Everything the per-test header and sidebar show.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestMetrics {
    pub test_id: String,
    pub test_name: String,
    pub status: TestStatus,
    pub start_time: String,
    pub duration: String,
    pub message_count: usize,
    pub tool_call_count: usize,
    pub success_rate: String,
    pub avg_response_time: String,
    pub agents: Vec<AgentStats>,
    pub tools: Vec<ToolStats>,
    pub session_ids: Vec<String>,
}

impl TestMetrics {
    pub fn from_report(report: &Report) -> Self {
        let agents = report
            .agents()
            .map(|agent| AgentStats {
                name: agent.name.clone(),
                model: agent.model().map(str::to_string),
                messages_sent: agent_message_count(report, &agent.name),
                unique_tools: unique_tools_used_by(report, &agent.name),
            })
            .collect();

        let tools = report
            .tools()
            .map(|tool| ToolStats {
                name: tool.name.clone(),
                calls: tool_calls_to(report, &tool.name),
            })
            .collect();

        Self {
            test_id: report.test_id.clone(),
            test_name: report.test_name.clone(),
            status: report.status,
            start_time: report.start_time.clone(),
            duration: test_duration(report),
            message_count: message_count(report),
            tool_call_count: tool_call_count(report),
            success_rate: success_rate(report.aggregate_assertions()),
            avg_response_time: average_response_time(report),
            agents,
            tools,
            session_ids: report.sessions.iter().map(|s| s.id.clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::reconcile;
    use serde_json::{Value, json};

    fn message(sender: &str, timestamp: &str) -> Value {
        json!({"message_id": format!("{sender}-{timestamp}"), "sender": sender, "sender_type": "x", "timestamp": timestamp, "content": "hi"})
    }

    fn tool_call(sender: &str, tool: &str) -> Value {
        json!({
            "sender": sender,
            "receiver": tool,
            "receiver_type": "tool",
            "timestamp": "2026-01-21T10:00:00Z",
            "content": "{}",
            "metadata": {"tool_args": {"q": 1}, "receiver": tool}
        })
    }

    fn report_with(messages: Vec<Value>) -> Report {
        reconcile(json!({
            "test_id": "t",
            "test_name": "T",
            "start_time": "2026-01-21T10:00:00Z",
            "end_time": "2026-01-21T10:01:05.5Z",
            "status": "passed",
            "participants": [
                {"id": "1", "name": "planner", "type": "agent", "metadata": {"model": "llama3"}},
                {"id": "2", "name": "booker", "type": "agent", "metadata": {}},
                {"id": "3", "name": "search", "type": "tool", "metadata": {}},
                {"id": "4", "name": "calendar", "type": "tool", "metadata": {}},
                {"id": "5", "name": "user", "type": "user", "metadata": {}}
            ],
            "sessions": [{"id": "s1", "messages": messages}]
        }))
        .unwrap()
    }

    fn assertions(statuses: &[&str]) -> Vec<Assertion> {
        statuses
            .iter()
            .enumerate()
            .map(|(i, status)| {
                serde_json::from_value(json!({"id": i.to_string(), "status": status})).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_zero_sessions_are_total() {
        let report = reconcile(json!({"test_name": "empty"})).unwrap();

        assert_eq!(message_count(&report), 0);
        assert_eq!(tool_call_count(&report), 0);
        assert_eq!(average_response_time(&report), "N/A");
        assert_eq!(success_rate(report.aggregate_assertions()), "100%");
        assert_eq!(test_duration(&report), "N/A");
    }

    #[test]
    fn test_tool_counts() {
        let report = report_with(vec![
            tool_call("planner", "search"),
            tool_call("planner", "search"),
            tool_call("planner", "calendar"),
            tool_call("booker", "calendar"),
            message("user", "2026-01-21T10:00:00Z"),
        ]);

        assert_eq!(message_count(&report), 5);
        assert_eq!(tool_call_count(&report), 4);
        assert_eq!(tool_calls_to(&report, "search"), 2);
        assert_eq!(tool_calls_to(&report, "missing"), 0);
        assert_eq!(unique_tools_used_by(&report, "planner"), 2);
        assert_eq!(unique_tools_used_by(&report, "booker"), 1);
        assert_eq!(agent_message_count(&report, "planner"), 3);
    }

    #[test]
    fn test_success_rate_rounds() {
        assert_eq!(success_rate(&assertions(&[])), "100%");
        assert_eq!(success_rate(&assertions(&["passed", "failed"])), "50%");
        assert_eq!(
            success_rate(&assertions(&["passed", "passed", "failed"])),
            "67%"
        );
        assert_eq!(success_rate(&assertions(&["failed"])), "0%");
    }

    #[test]
    fn test_success_rate_is_monotonic() {
        let base = ["passed", "failed", "failed", "passed", "failed"];
        for n in 1..=base.len() {
            let prefix = &base[..n];
            let rate = |statuses: &[&str]| {
                success_rate(&assertions(statuses))
                    .trim_end_matches('%')
                    .parse::<u32>()
                    .unwrap()
            };

            let mut with_pass = prefix.to_vec();
            with_pass.push("passed");
            let mut with_fail = prefix.to_vec();
            with_fail.push("failed");
            assert!(rate(&with_pass) >= rate(prefix));
            assert!(rate(&with_fail) <= rate(prefix));
        }
    }

    #[test]
    fn test_average_response_time_pairs() {
        let report = report_with(vec![
            message("user", "2026-01-21T10:00:00Z"),
            message("planner", "2026-01-21T10:00:02Z"),
            // agent -> agent handoff is not a sample
            message("booker", "2026-01-21T10:00:30Z"),
            message("search", "2026-01-21T10:00:31Z"),
            message("booker", "2026-01-21T10:00:32Z"),
        ]);

        assert_eq!(response_time_samples(&report), vec![2000.0, 1000.0]);
        assert_eq!(average_response_time(&report), "1.50s");
    }

    #[test]
    fn test_average_response_time_discards_negative_delta() {
        let report = report_with(vec![
            message("user", "2026-01-21T10:00:05Z"),
            message("planner", "2026-01-21T10:00:00Z"),
        ]);

        assert!(response_time_samples(&report).is_empty());
        assert_eq!(average_response_time(&report), "N/A");
    }

    #[test]
    fn test_average_response_time_skips_bad_timestamps() {
        let report = report_with(vec![
            message("user", "not a time"),
            message("planner", "2026-01-21T10:00:00Z"),
            message("user", "2026-01-21T10:00:00Z"),
            message("planner", "2026-01-21T10:00:00.250Z"),
        ]);

        assert_eq!(average_response_time(&report), "250ms");
    }

    #[test]
    fn test_average_response_time_does_not_cross_sessions() {
        let report = reconcile(json!({
            "participants": [{"id": "1", "name": "planner", "type": "agent"}],
            "sessions": [
                {"id": "a", "messages": [message("user", "2026-01-21T10:00:00Z")]},
                {"id": "b", "messages": [message("planner", "2026-01-21T10:00:01Z")]}
            ]
        }))
        .unwrap();

        assert_eq!(average_response_time(&report), "N/A");
    }

    #[test]
    fn test_metrics_bundle() {
        let report = report_with(vec![
            message("user", "2026-01-21T10:00:00Z"),
            message("planner", "2026-01-21T10:00:00.500Z"),
            tool_call("planner", "search"),
        ]);

        let metrics = TestMetrics::from_report(&report);

        assert_eq!(metrics.message_count, 3);
        assert_eq!(metrics.tool_call_count, 1);
        assert_eq!(metrics.success_rate, "100%");
        assert_eq!(metrics.avg_response_time, "500ms");
        assert_eq!(metrics.duration, "65.50s");
        assert_eq!(metrics.agents.len(), 2);
        assert_eq!(metrics.agents[0].model.as_deref(), Some("llama3"));
        assert_eq!(metrics.agents[0].messages_sent, 2);
        assert_eq!(metrics.agents[0].unique_tools, 1);
        assert_eq!(
            metrics.tools,
            vec![
                ToolStats {
                    name: "search".to_string(),
                    calls: 1
                },
                ToolStats {
                    name: "calendar".to_string(),
                    calls: 0
                },
            ]
        );
        assert_eq!(metrics.session_ids, vec!["s1"]);
    }
}
