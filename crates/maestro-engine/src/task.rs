//! Task and step state
//!
//! A task is an ordered list of steps plus bookkeeping. Tasks and steps are
//! mutated only by the engine; everything here is construction and small
//! transition helpers that keep the timestamp invariants in one place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Full identifier for wire contracts; `Display` is truncated for logs
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Unique step identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepId(Uuid);

impl StepId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StepId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

// ============================================================================
// Status
// ============================================================================

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Step lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

// ============================================================================
// Steps
// ============================================================================

/// Seed for one step, supplied by the caller or produced by the planner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    pub name: String,
    pub description: String,

    /// Tool id + method present means tool-backed; absent means model-backed
    #[serde(default)]
    pub tool_id: Option<String>,
    #[serde(default)]
    pub tool_method: Option<String>,
    #[serde(default)]
    pub tool_params: Option<HashMap<String, Value>>,
}

impl StepSpec {
    /// Model-backed step
    pub fn model(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tool_id: None,
            tool_method: None,
            tool_params: None,
        }
    }

    /// Tool-backed step
    pub fn tool(
        name: impl Into<String>,
        description: impl Into<String>,
        tool_id: impl Into<String>,
        method: impl Into<String>,
        params: HashMap<String, Value>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tool_id: Some(tool_id.into()),
            tool_method: Some(method.into()),
            tool_params: Some(params),
        }
    }
}

/// One executed unit of a task's plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStep {
    pub id: StepId,
    pub name: String,
    pub description: String,
    pub status: StepStatus,

    pub tool_id: Option<String>,
    pub tool_method: Option<String>,
    pub tool_params: Option<HashMap<String, Value>>,

    pub result: Option<Value>,
    pub error: Option<String>,

    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// completed_at - started_at, stamped on termination
    pub duration_seconds: Option<f64>,
}

impl TaskStep {
    pub fn from_spec(spec: StepSpec) -> Self {
        Self {
            id: StepId::new(),
            name: spec.name,
            description: spec.description,
            status: StepStatus::Pending,
            tool_id: spec.tool_id,
            tool_method: spec.tool_method,
            tool_params: spec.tool_params,
            result: None,
            error: None,
            started_at: None,
            completed_at: None,
            duration_seconds: None,
        }
    }

    /// Whether this step dispatches to a tool worker
    pub fn is_tool_backed(&self) -> bool {
        self.tool_id.is_some() && self.tool_method.is_some()
    }

    pub fn mark_running(&mut self) {
        self.status = StepStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self, result: Option<Value>) {
        self.status = StepStatus::Completed;
        self.result = result;
        self.stamp_end();
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.error = Some(error.into());
        self.stamp_end();
    }

    fn stamp_end(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        if let Some(started) = self.started_at {
            self.duration_seconds = Some((now - started).num_milliseconds() as f64 / 1000.0);
        }
    }
}

// ============================================================================
// Tasks
// ============================================================================

/// Seed for a new task
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub title: String,
    pub description: String,
    pub agent_id: String,
    pub conversation_id: String,
    pub user_id: String,
    pub initial_steps: Vec<StepSpec>,
}

/// A unit of work decomposed into an ordered list of steps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub agent_id: String,
    pub conversation_id: String,
    pub user_id: String,

    pub status: TaskStatus,
    /// 0-100, non-decreasing while running
    pub progress: f32,

    pub steps: Vec<TaskStep>,

    /// Set only on completion
    pub result: Option<Value>,
    /// Set only on failure
    pub error_message: Option<String>,

    /// Ids of tools touched by completed steps
    pub tools_used: Vec<String>,
    pub files_generated: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(spec: TaskSpec) -> Self {
        Self {
            id: TaskId::new(),
            title: spec.title,
            description: spec.description,
            agent_id: spec.agent_id,
            conversation_id: spec.conversation_id,
            user_id: spec.user_id,
            status: TaskStatus::Pending,
            progress: 0.0,
            steps: spec.initial_steps.into_iter().map(TaskStep::from_spec).collect(),
            result: None,
            error_message: None,
            tools_used: Vec::new(),
            files_generated: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// pending -> running, stamping started_at exactly once
    pub fn mark_started(&mut self) {
        self.status = TaskStatus::Running;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
    }

    /// Transition into a terminal status, stamping completed_at exactly once
    pub fn mark_terminal(&mut self, status: TaskStatus) {
        debug_assert!(status.is_terminal());
        self.status = status;
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    /// Record that a completed step used a tool
    pub fn record_tool_use(&mut self, tool_id: &str) {
        if !self.tools_used.iter().any(|t| t == tool_id) {
            self.tools_used.push(tool_id.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> TaskSpec {
        TaskSpec {
            title: "Summarize logs".into(),
            description: "Read and summarize the log file".into(),
            agent_id: "agent-1".into(),
            conversation_id: "conv-1".into(),
            user_id: "user-1".into(),
            initial_steps: vec![],
        }
    }

    #[test]
    fn test_new_task_is_pending() {
        let task = Task::new(spec());
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, 0.0);
        assert!(task.started_at.is_none());
        assert!(task.steps.is_empty());
    }

    #[test]
    fn test_started_at_set_once() {
        let mut task = Task::new(spec());
        task.mark_started();
        let first = task.started_at.unwrap();
        task.mark_started();
        assert_eq!(task.started_at.unwrap(), first);
    }

    #[test]
    fn test_completed_at_set_once() {
        let mut task = Task::new(spec());
        task.mark_started();
        task.mark_terminal(TaskStatus::Failed);
        let first = task.completed_at.unwrap();
        task.mark_terminal(TaskStatus::Failed);
        assert_eq!(task.completed_at.unwrap(), first);
    }

    #[test]
    fn test_step_transitions_stamp_duration() {
        let mut step = TaskStep::from_spec(StepSpec::model("analyze", "Analyze the task"));
        assert_eq!(step.status, StepStatus::Pending);
        assert!(!step.is_tool_backed());

        step.mark_running();
        assert!(step.started_at.is_some());

        step.mark_completed(Some(serde_json::json!({"ok": true})));
        assert_eq!(step.status, StepStatus::Completed);
        assert!(step.duration_seconds.unwrap() >= 0.0);
    }

    #[test]
    fn test_tool_use_is_deduplicated() {
        let mut task = Task::new(spec());
        task.record_tool_use("filesystem");
        task.record_tool_use("filesystem");
        task.record_tool_use("github");
        assert_eq!(task.tools_used, vec!["filesystem", "github"]);
    }

    #[test]
    fn test_id_display_is_short() {
        let id = TaskId::new();
        assert_eq!(id.to_string().len(), 8);
        // Wire form keeps the whole uuid
        assert_eq!(id.as_uuid().to_string().len(), 36);
        assert!(id.as_uuid().to_string().starts_with(&id.to_string()));
    }
}
