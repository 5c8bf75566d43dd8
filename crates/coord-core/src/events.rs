use serde::{Deserialize, Serialize};

/// Event types the coordinator backend pushes to subscribed clients.
///
/// The wire protocol is open-ended: frames with a `type` outside this set are
/// still dispatched under their literal name. This enum covers the vocabulary
/// the backend is known to emit, so callers can subscribe without hand-typing
/// strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    TaskUpdate,
    TaskCreated,
    TaskStarted,
    TaskCompleted,
    TaskFailed,
    AgentStatus,
    SessionStatus,
    AgentThinking,
    AgentTyping,
    ToolExecution,
    Typing,
    Tasks,
    Messages,
}

impl EventType {
    /// Events the visualization endpoint always subscribes to.
    pub const VISUALIZATION: &'static [EventType] = &[
        Self::TaskUpdate,
        Self::TaskCreated,
        Self::TaskStarted,
        Self::TaskCompleted,
        Self::TaskFailed,
        Self::AgentStatus,
        Self::SessionStatus,
    ];

    /// Events the per-agent monitoring endpoint always subscribes to.
    pub const AGENT_MONITOR: &'static [EventType] = &[
        Self::AgentThinking,
        Self::AgentTyping,
        Self::AgentStatus,
        Self::ToolExecution,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskUpdate => "task_update",
            Self::TaskCreated => "task_created",
            Self::TaskStarted => "task_started",
            Self::TaskCompleted => "task_completed",
            Self::TaskFailed => "task_failed",
            Self::AgentStatus => "agent_status",
            Self::SessionStatus => "session_status",
            Self::AgentThinking => "agent_thinking",
            Self::AgentTyping => "agent_typing",
            Self::ToolExecution => "tool_execution",
            Self::Typing => "typing",
            Self::Tasks => "tasks",
            Self::Messages => "messages",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown event type: {0}")]
pub struct UnknownEventType(pub String);

impl std::str::FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task_update" => Ok(Self::TaskUpdate),
            "task_created" => Ok(Self::TaskCreated),
            "task_started" => Ok(Self::TaskStarted),
            "task_completed" => Ok(Self::TaskCompleted),
            "task_failed" => Ok(Self::TaskFailed),
            "agent_status" => Ok(Self::AgentStatus),
            "session_status" => Ok(Self::SessionStatus),
            "agent_thinking" => Ok(Self::AgentThinking),
            "agent_typing" => Ok(Self::AgentTyping),
            "tool_execution" => Ok(Self::ToolExecution),
            "typing" => Ok(Self::Typing),
            "tasks" => Ok(Self::Tasks),
            "messages" => Ok(Self::Messages),
            other => Err(UnknownEventType(other.to_owned())),
        }
    }
}

/// Reserved listener names owned by the client itself, never sent by the
/// server as event frames.
pub mod reserved {
    /// Fired once per successful handshake (`connection_established`).
    pub const CONNECT: &str = "connect";
    /// Fired on every transport close with the close code and reason.
    pub const DISCONNECT: &str = "disconnect";
    /// Fired on transport errors and server `error` frames.
    pub const ERROR: &str = "error";
    /// Catch-all fired for every non-system event frame.
    pub const MESSAGE: &str = "message";

    pub fn is_reserved(name: &str) -> bool {
        matches!(name, CONNECT | DISCONNECT | ERROR | MESSAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_str_roundtrip() {
        let all = [
            EventType::TaskUpdate,
            EventType::TaskCreated,
            EventType::TaskStarted,
            EventType::TaskCompleted,
            EventType::TaskFailed,
            EventType::AgentStatus,
            EventType::SessionStatus,
            EventType::AgentThinking,
            EventType::AgentTyping,
            EventType::ToolExecution,
            EventType::Typing,
            EventType::Tasks,
            EventType::Messages,
        ];
        for evt in all {
            let parsed: EventType = evt.as_str().parse().unwrap();
            assert_eq!(parsed, evt);
        }
    }

    #[test]
    fn unknown_event_type_rejected() {
        let err = "does_not_exist".parse::<EventType>().unwrap_err();
        assert_eq!(err.0, "does_not_exist");
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&EventType::TaskUpdate).unwrap();
        assert_eq!(json, "\"task_update\"");
    }

    #[test]
    fn visualization_set_contents() {
        assert_eq!(EventType::VISUALIZATION.len(), 7);
        assert!(EventType::VISUALIZATION.contains(&EventType::SessionStatus));
        assert!(!EventType::VISUALIZATION.contains(&EventType::AgentThinking));
    }

    #[test]
    fn agent_monitor_set_contents() {
        assert_eq!(EventType::AGENT_MONITOR.len(), 4);
        assert!(EventType::AGENT_MONITOR.contains(&EventType::ToolExecution));
    }

    #[test]
    fn reserved_names() {
        assert!(reserved::is_reserved("connect"));
        assert!(reserved::is_reserved("message"));
        assert!(!reserved::is_reserved("task_update"));
    }
}
