//! Task execution engine
//!
//! Owns the in-flight and historical task sets and turns a task description
//! into a deterministic sequence of observable state transitions. Steps run
//! strictly in order; a step dispatches either to the reasoning-model
//! gateway or to a running tool worker via the runtime. Execution never
//! raises past its own boundary - a task always ends in a terminal status.

use crate::planner::Planner;
use crate::progress::{ListenerId, ProgressFanout, ProgressListener};
use crate::task::{StepStatus, Task, TaskId, TaskSpec, TaskStatus, TaskStep};
use maestro_foundation::{
    config::EngineConfig, ChatMessage, Error, GenerationOptions, ProgressUpdate, Result,
    TaskOutcome,
};
use maestro_gateway::Gateway;
use maestro_runtime::ToolRuntime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Aggregate counters over all tasks the engine has seen
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStats {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// completed / (completed + failed + cancelled), 0 when nothing finished
    pub success_rate: f64,
    /// Mean wall-clock seconds of completed tasks, 0 when none completed
    pub average_execution_seconds: f64,
}

/// Plans, executes, cancels, and reports on tasks
pub struct TaskEngine {
    gateway: Arc<dyn Gateway>,
    runtime: Arc<ToolRuntime>,
    planner: Planner,
    fanout: ProgressFanout,
    running: RwLock<HashMap<TaskId, Task>>,
    history: RwLock<HashMap<TaskId, Task>>,
    config: EngineConfig,
}

impl TaskEngine {
    pub fn new(gateway: Arc<dyn Gateway>, runtime: Arc<ToolRuntime>, config: EngineConfig) -> Self {
        let planner = Planner::new(gateway.clone(), runtime.capability_summary());
        Self {
            gateway,
            runtime,
            planner,
            fanout: ProgressFanout::new(),
            running: RwLock::new(HashMap::new()),
            history: RwLock::new(HashMap::new()),
            config,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Register a new pending task
    pub async fn create(&self, spec: TaskSpec) -> TaskId {
        let task = Task::new(spec);
        let task_id = task.id;
        info!(task_id = %task_id, title = %task.title, "Task created");

        let mut running = self.running.write().await;
        running.insert(task_id, task);
        task_id
    }

    /// Run a pending task to a terminal status and return its final state.
    ///
    /// Planning failures fall back to deterministic plans; a step failure
    /// halts the remaining steps and fails the task. A gateway error on a
    /// model-backed step is treated the same as any other step failure.
    pub async fn execute(&self, task_id: TaskId) -> Result<Task> {
        let mut task = {
            let mut running = self.running.write().await;

            let active = running
                .values()
                .filter(|t| t.status == TaskStatus::Running)
                .count();

            let task = match running.get_mut(&task_id) {
                Some(task) => task,
                None => {
                    // A known but archived task is a state error, not a miss
                    let history = self.history.read().await;
                    return match history.get(&task_id) {
                        Some(task) => Err(Error::invalid_state(
                            format!("task {}", task_id),
                            task.status.to_string(),
                            "execute",
                        )),
                        None => Err(Error::NotFound(format!("task {}", task_id))),
                    };
                }
            };

            if task.status != TaskStatus::Pending {
                return Err(Error::invalid_state(
                    format!("task {}", task_id),
                    task.status.to_string(),
                    "execute",
                ));
            }

            if active >= self.config.max_concurrent_tasks {
                return Err(Error::invalid_state(
                    format!("task {}", task_id),
                    "queued while engine is at maximum concurrent tasks",
                    "execute",
                ));
            }

            task.mark_started();
            task.clone()
        };

        info!(task_id = %task_id, "Task execution started");
        self.emit_progress(&task, None).await;

        // Plan when the caller supplied no steps
        if task.steps.is_empty() {
            let specs = self.planner.plan(&task).await;
            task.steps = specs.into_iter().map(TaskStep::from_spec).collect();
            self.store_snapshot(&task).await;
        }

        let total = task.steps.len();
        let mut halted = false;

        for index in 0..total {
            // Cooperative cancellation, observed only between steps
            if !self.store_snapshot(&task).await {
                debug!(task_id = %task_id, "Cancellation observed between steps");
                return Ok(self.get(task_id).await.unwrap_or(task));
            }

            let step_name = task.steps[index].name.clone();
            let succeeded = self.run_step(&mut task, index).await;

            if succeeded {
                task.progress = 100.0 * (index + 1) as f32 / total as f32;
            }
            self.store_snapshot(&task).await;
            self.emit_progress(&task, Some(step_name)).await;

            if !succeeded {
                halted = true;
                break;
            }
        }

        // Close out: summary on full success, aggregate error otherwise
        if !halted && task.steps.iter().all(|s| s.status == StepStatus::Completed) {
            let summary = self.planner.summarize(&task).await;
            task.result = Some(json!({
                "summary": summary,
                "steps_completed": task.steps.len(),
            }));
            task.progress = 100.0;
            task.mark_terminal(TaskStatus::Completed);
        } else {
            let failed_names: Vec<&str> = task
                .steps
                .iter()
                .filter(|s| s.status == StepStatus::Failed)
                .map(|s| s.name.as_str())
                .collect();
            task.error_message = Some(format!("Step(s) failed: {}", failed_names.join(", ")));
            task.mark_terminal(TaskStatus::Failed);
        }

        // Atomic move into history; a miss here means cancel won the race
        // during the final step or the summary call
        if self.running.write().await.remove(&task_id).is_none() {
            debug!(task_id = %task_id, "Cancelled during final step");
            return Ok(self.get(task_id).await.unwrap_or(task));
        }
        self.history.write().await.insert(task_id, task.clone());

        info!(task_id = %task_id, status = %task.status, "Task finished");
        self.emit_terminal(&task).await;
        Ok(task)
    }

    /// Cancel a pending or running task.
    ///
    /// Cooperative: a step already dispatched runs to completion before the
    /// cancellation becomes visible to the executor.
    pub async fn cancel(&self, task_id: TaskId) -> Result<()> {
        let task = {
            let mut running = self.running.write().await;
            match running.remove(&task_id) {
                Some(mut task) => {
                    task.mark_terminal(TaskStatus::Cancelled);
                    self.history.write().await.insert(task_id, task.clone());
                    task
                }
                None => {
                    let history = self.history.read().await;
                    return match history.get(&task_id) {
                        Some(task) => Err(Error::invalid_state(
                            format!("task {}", task_id),
                            task.status.to_string(),
                            "cancel",
                        )),
                        None => Err(Error::NotFound(format!("task {}", task_id))),
                    };
                }
            }
        };

        info!(task_id = %task_id, "Task cancelled");
        self.emit_terminal(&task).await;
        Ok(())
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Register a progress listener for one task
    pub async fn subscribe(
        &self,
        task_id: TaskId,
        listener: Arc<dyn ProgressListener>,
    ) -> Result<ListenerId> {
        if self.get(task_id).await.is_none() {
            return Err(Error::NotFound(format!("task {}", task_id)));
        }
        Ok(self.fanout.subscribe(task_id, listener).await)
    }

    pub async fn unsubscribe(&self, task_id: TaskId, listener_id: ListenerId) -> bool {
        self.fanout.unsubscribe(task_id, listener_id).await
    }

    // ========================================================================
    // Projections
    // ========================================================================

    /// Look up a task in the running set or history
    pub async fn get(&self, task_id: TaskId) -> Option<Task> {
        if let Some(task) = self.running.read().await.get(&task_id) {
            return Some(task.clone());
        }
        self.history.read().await.get(&task_id).cloned()
    }

    /// All tasks matching the filters, newest first
    pub async fn list(&self, user_id: Option<&str>, status: Option<TaskStatus>) -> Vec<Task> {
        let mut tasks: Vec<Task> = {
            let running = self.running.read().await;
            let history = self.history.read().await;
            running.values().chain(history.values()).cloned().collect()
        };

        tasks.retain(|t| {
            user_id.map_or(true, |u| t.user_id == u) && status.map_or(true, |s| t.status == s)
        });
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }

    /// Aggregate counters over running set and history
    pub async fn stats(&self) -> EngineStats {
        let mut stats = EngineStats::default();
        let mut completed_seconds = 0.0;
        {
            let running = self.running.read().await;
            let history = self.history.read().await;
            for task in running.values().chain(history.values()) {
                stats.total += 1;
                match task.status {
                    TaskStatus::Pending => stats.pending += 1,
                    TaskStatus::Running => stats.running += 1,
                    TaskStatus::Completed => {
                        stats.completed += 1;
                        if let (Some(started), Some(completed)) =
                            (task.started_at, task.completed_at)
                        {
                            completed_seconds +=
                                (completed - started).num_milliseconds() as f64 / 1000.0;
                        }
                    }
                    TaskStatus::Failed => stats.failed += 1,
                    TaskStatus::Cancelled => stats.cancelled += 1,
                }
            }
        }

        let finished = stats.completed + stats.failed + stats.cancelled;
        if finished > 0 {
            stats.success_rate = stats.completed as f64 / finished as f64;
        }
        if stats.completed > 0 {
            stats.average_execution_seconds = completed_seconds / stats.completed as f64;
        }
        stats
    }

    // ========================================================================
    // Step execution
    // ========================================================================

    /// Run one step to a terminal status. Returns whether it completed.
    async fn run_step(&self, task: &mut Task, index: usize) -> bool {
        let context = completed_results_summary(&task.steps[..index]);
        let step = &mut task.steps[index];
        let step_name = step.name.clone();
        step.mark_running();
        debug!(task_id = %task.id, step = %step_name, "Step started");

        if step.is_tool_backed() {
            let tool_id = step.tool_id.clone().unwrap_or_default();
            let method = step.tool_method.clone().unwrap_or_default();
            let params = step
                .tool_params
                .clone()
                .map(|p| json!(p))
                .unwrap_or_else(|| json!({}));

            match self
                .runtime
                .invoke(
                    &tool_id,
                    &method,
                    params,
                    &task.agent_id,
                    Some(task.id.as_uuid().to_string()),
                )
                .await
            {
                Ok(response) if response.success => {
                    task.steps[index].mark_completed(response.result);
                    task.record_tool_use(&tool_id);
                    true
                }
                Ok(response) => {
                    let message = response
                        .error
                        .unwrap_or_else(|| "tool call failed".to_string());
                    let error = Error::step_execution(&step_name, message);
                    warn!(task_id = %task.id, tool_id, error = %error, "Tool step failed");
                    task.steps[index].mark_failed(error.to_string());
                    false
                }
                Err(e) => {
                    let error = Error::step_execution(&step_name, e.to_string());
                    warn!(task_id = %task.id, tool_id, error = %error, "Tool step failed");
                    task.steps[index].mark_failed(error.to_string());
                    false
                }
            }
        } else {
            let messages = vec![
                ChatMessage::system(
                    "You are executing one step of a larger task. Do the work described \
                     and report the outcome concisely.",
                ),
                ChatMessage::user(format!(
                    "Task: {}\nDetails: {}\n\nCurrent step: {}\n{}",
                    task.title, task.description, step.description, context
                )),
            ];

            match self
                .gateway
                .complete(messages, GenerationOptions::default())
                .await
            {
                Ok(completion) => {
                    task.steps[index].mark_completed(Some(json!({
                        "content": completion.content,
                    })));
                    true
                }
                Err(e) => {
                    let error = Error::step_execution(&step_name, e.to_string());
                    warn!(task_id = %task.id, error = %error, "Model step failed");
                    task.steps[index].mark_failed(error.to_string());
                    false
                }
            }
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Write the local copy back to the running set. Returns false when the
    /// task is no longer there, which means it was cancelled.
    async fn store_snapshot(&self, task: &Task) -> bool {
        let mut running = self.running.write().await;
        match running.get_mut(&task.id) {
            Some(slot) => {
                *slot = task.clone();
                true
            }
            None => false,
        }
    }

    async fn emit_progress(&self, task: &Task, current_step: Option<String>) {
        self.fanout
            .emit_progress(
                task.id,
                ProgressUpdate {
                    task_id: task.id.as_uuid().to_string(),
                    progress: task.progress,
                    current_step,
                },
            )
            .await;
    }

    async fn emit_terminal(&self, task: &Task) {
        self.fanout
            .emit_terminal(
                task.id,
                TaskOutcome {
                    task_id: task.id.as_uuid().to_string(),
                    status: task.status.to_string(),
                    result: task.result.clone(),
                    error: task.error_message.clone(),
                },
            )
            .await;
    }
}

/// Textual summary of earlier completed steps, fed into model-backed steps
fn completed_results_summary(steps: &[TaskStep]) -> String {
    let done: Vec<String> = steps
        .iter()
        .filter(|s| s.status == StepStatus::Completed)
        .map(|s| {
            let result = s
                .result
                .as_ref()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "(no result)".to_string());
            format!("- {}: {}", s.name, result)
        })
        .collect();

    if done.is_empty() {
        String::new()
    } else {
        format!("\nResults of earlier steps:\n{}", done.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::StepSpec;

    #[test]
    fn test_completed_results_summary_skips_unfinished() {
        let mut steps = vec![
            TaskStep::from_spec(StepSpec::model("one", "first")),
            TaskStep::from_spec(StepSpec::model("two", "second")),
        ];
        steps[0].mark_running();
        steps[0].mark_completed(Some(json!({"n": 1})));

        let summary = completed_results_summary(&steps);
        assert!(summary.contains("- one:"));
        assert!(!summary.contains("- two:"));
    }

    #[test]
    fn test_empty_summary_for_no_completed_steps() {
        let steps = vec![TaskStep::from_spec(StepSpec::model("one", "first"))];
        assert_eq!(completed_results_summary(&steps), "");
    }
}
