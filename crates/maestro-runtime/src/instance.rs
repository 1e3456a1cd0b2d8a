//! Tool instance state
//!
//! Tracked lifecycle state for each registered tool. The runtime owns one
//! `ToolInstance` per tool id; the container itself is the source of truth
//! only for the live state string reported by `status`.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolState {
    /// Known in the registry, image not pulled
    Available,
    /// Image pulled, no container running
    Installed,
    /// Worker container up and serving
    Running,
    /// Worker was running and has been stopped
    Stopped,
    /// A lifecycle operation failed
    Error,
}

impl ToolState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolState::Available => "available",
            ToolState::Installed => "installed",
            ToolState::Running => "running",
            ToolState::Stopped => "stopped",
            ToolState::Error => "error",
        }
    }
}

impl std::fmt::Display for ToolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runtime-tracked record for one tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInstance {
    /// Registry id this record belongs to
    pub tool_id: String,

    /// Current lifecycle state
    pub state: ToolState,

    /// Host port reserved for the worker, when running
    pub port: Option<u16>,

    /// Backing container id, when running
    pub container_id: Option<String>,

    /// Last lifecycle error, when state is Error
    pub last_error: Option<String>,
}

impl ToolInstance {
    pub fn new(tool_id: impl Into<String>) -> Self {
        Self {
            tool_id: tool_id.into(),
            state: ToolState::Available,
            port: None,
            container_id: None,
            last_error: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == ToolState::Running
    }

    /// Clear container bookkeeping after stop or failure
    pub fn release(&mut self) {
        self.port = None;
        self.container_id = None;
    }
}

/// Detailed status report for one tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolStatusReport {
    pub tool_id: String,
    pub name: String,
    pub state: ToolState,
    pub port: Option<u16>,
    pub container_id: Option<String>,
    /// Live state string from the container runtime ("unknown" when unreadable)
    pub container_state: String,
    /// Tail of the worker's log, when running
    pub recent_logs: Option<String>,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let instance = ToolInstance::new("github");
        assert_eq!(instance.state, ToolState::Available);
        assert!(instance.port.is_none());
        assert!(!instance.is_running());
    }

    #[test]
    fn test_release_clears_container_fields() {
        let mut instance = ToolInstance::new("memory");
        instance.state = ToolState::Running;
        instance.port = Some(8003);
        instance.container_id = Some("abc123".into());

        instance.release();
        assert!(instance.port.is_none());
        assert!(instance.container_id.is_none());
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(serde_json::to_string(&ToolState::Running).unwrap(), "\"running\"");
        assert_eq!(ToolState::Stopped.as_str(), "stopped");
    }
}
