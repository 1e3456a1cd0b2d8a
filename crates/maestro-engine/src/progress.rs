//! Progress fan-out
//!
//! Per-task subscriber lists, decoupled from transport. The engine pushes
//! every progress update and exactly one terminal event per task through
//! here; a listener's failure is logged and never reaches the task.

use crate::task::TaskId;
use async_trait::async_trait;
use maestro_foundation::{ProgressUpdate, Result, TaskOutcome};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

/// Handle returned from `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Receives progress and terminal events for one task
#[async_trait]
pub trait ProgressListener: Send + Sync {
    async fn on_progress(&self, update: &ProgressUpdate) -> Result<()>;

    async fn on_terminal(&self, outcome: &TaskOutcome) -> Result<()>;
}

/// Per-task listener registry
pub struct ProgressFanout {
    listeners: RwLock<HashMap<TaskId, HashMap<ListenerId, Arc<dyn ProgressListener>>>>,
    next_id: AtomicU64,
}

impl ProgressFanout {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener for one task
    pub async fn subscribe(
        &self,
        task_id: TaskId,
        listener: Arc<dyn ProgressListener>,
    ) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut listeners = self.listeners.write().await;
        listeners.entry(task_id).or_default().insert(id, listener);
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub async fn unsubscribe(&self, task_id: TaskId, listener_id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().await;
        match listeners.get_mut(&task_id) {
            Some(per_task) => {
                let removed = per_task.remove(&listener_id).is_some();
                if per_task.is_empty() {
                    listeners.remove(&task_id);
                }
                removed
            }
            None => false,
        }
    }

    /// Broadcast a progress update to the task's listeners
    pub async fn emit_progress(&self, task_id: TaskId, update: ProgressUpdate) {
        let targets: Vec<Arc<dyn ProgressListener>> = {
            let listeners = self.listeners.read().await;
            listeners
                .get(&task_id)
                .map(|per_task| per_task.values().cloned().collect())
                .unwrap_or_default()
        };

        for listener in targets {
            if let Err(e) = listener.on_progress(&update).await {
                warn!(task_id = %task_id, error = %e, "Progress listener failed");
            }
        }
    }

    /// Broadcast the terminal event and drop the task's listeners, so each
    /// subscriber sees the terminal status at most once
    pub async fn emit_terminal(&self, task_id: TaskId, outcome: TaskOutcome) {
        let targets: Vec<Arc<dyn ProgressListener>> = {
            let mut listeners = self.listeners.write().await;
            listeners
                .remove(&task_id)
                .map(|per_task| per_task.into_values().collect())
                .unwrap_or_default()
        };

        for listener in targets {
            if let Err(e) = listener.on_terminal(&outcome).await {
                warn!(task_id = %task_id, error = %e, "Terminal listener failed");
            }
        }
    }
}

impl Default for ProgressFanout {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maestro_foundation::Error;
    use tokio::sync::Mutex;

    struct Recorder {
        updates: Mutex<Vec<f32>>,
        terminals: Mutex<Vec<String>>,
        fail: bool,
    }

    impl Recorder {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                updates: Mutex::new(Vec::new()),
                terminals: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait]
    impl ProgressListener for Recorder {
        async fn on_progress(&self, update: &ProgressUpdate) -> Result<()> {
            if self.fail {
                return Err(Error::Internal("listener broke".into()));
            }
            self.updates.lock().await.push(update.progress);
            Ok(())
        }

        async fn on_terminal(&self, outcome: &TaskOutcome) -> Result<()> {
            self.terminals.lock().await.push(outcome.status.clone());
            Ok(())
        }
    }

    fn update(task_id: TaskId, progress: f32) -> ProgressUpdate {
        ProgressUpdate {
            task_id: task_id.to_string(),
            progress,
            current_step: None,
        }
    }

    #[tokio::test]
    async fn test_subscribe_and_emit() {
        let fanout = ProgressFanout::new();
        let task_id = TaskId::new();
        let recorder = Recorder::new(false);

        fanout.subscribe(task_id, recorder.clone()).await;
        fanout.emit_progress(task_id, update(task_id, 50.0)).await;

        assert_eq!(*recorder.updates.lock().await, vec![50.0]);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let fanout = ProgressFanout::new();
        let task_id = TaskId::new();
        let recorder = Recorder::new(false);

        let id = fanout.subscribe(task_id, recorder.clone()).await;
        assert!(fanout.unsubscribe(task_id, id).await);
        assert!(!fanout.unsubscribe(task_id, id).await);

        fanout.emit_progress(task_id, update(task_id, 50.0)).await;
        assert!(recorder.updates.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_block_others() {
        let fanout = ProgressFanout::new();
        let task_id = TaskId::new();
        let broken = Recorder::new(true);
        let healthy = Recorder::new(false);

        fanout.subscribe(task_id, broken).await;
        fanout.subscribe(task_id, healthy.clone()).await;

        fanout.emit_progress(task_id, update(task_id, 25.0)).await;
        assert_eq!(*healthy.updates.lock().await, vec![25.0]);
    }

    #[tokio::test]
    async fn test_terminal_delivered_once() {
        let fanout = ProgressFanout::new();
        let task_id = TaskId::new();
        let recorder = Recorder::new(false);

        fanout.subscribe(task_id, recorder.clone()).await;

        let outcome = TaskOutcome {
            task_id: task_id.to_string(),
            status: "completed".into(),
            result: None,
            error: None,
        };
        fanout.emit_terminal(task_id, outcome.clone()).await;
        fanout.emit_terminal(task_id, outcome).await;

        assert_eq!(*recorder.terminals.lock().await, vec!["completed"]);
    }
}
