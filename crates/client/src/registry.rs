//! In-memory registry of tracked transcription tasks.
//!
//! [`TaskRegistry`] owns every task record. A task id lives in exactly
//! one of two maps: `active` (queued or processing, with a running poll
//! loop) or `settled` (completed, errored or retired). Moving from active
//! to settled happens once and is never undone.
//!
//! All check-then-act sequences run under a single write guard, and
//! events are published after the guard is released.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use scribe_core::lifecycle::{LifecycleState, MAX_PROGRESS};
use scribe_core::results::ResultRecord;
use scribe_core::types::{TaskId, Timestamp};
use serde::Serialize;
use tokio::sync::{broadcast, watch, RwLock};

use crate::backend::TranscriptionBackend;
use crate::events::TrackerEvent;
use crate::poller::{PollConfig, PollHandle};

/// Broadcast channel capacity for tracker events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long [`TaskRegistry::shutdown`] waits for each poll loop to exit.
const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// How a task left the active set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed(ResultRecord),
    Failed(String),
    /// Retired by the caller while still active.
    Retired,
}

/// Read-only copy of a task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSnapshot {
    pub task_id: TaskId,
    pub display_name: String,
    pub state: LifecycleState,
    pub progress: u8,
    pub registered_at: Timestamp,
    /// Set once the task has left the active set.
    pub settled_at: Option<Timestamp>,
    pub outcome: Option<TaskOutcome>,
}

impl TaskSnapshot {
    pub fn is_settled(&self) -> bool {
        self.settled_at.is_some()
    }
}

/// A task with a running poll loop.
struct ActiveTask {
    display_name: String,
    state: LifecycleState,
    progress: u8,
    registered_at: Timestamp,
    poll_handle: PollHandle,
}

/// A task that has left the active set.
struct SettledTask {
    display_name: String,
    state: LifecycleState,
    progress: u8,
    registered_at: Timestamp,
    settled_at: Timestamp,
    outcome: TaskOutcome,
}

#[derive(Default)]
struct Inner {
    active: HashMap<TaskId, ActiveTask>,
    settled: HashMap<TaskId, SettledTask>,
}

impl Inner {
    fn contains(&self, task_id: &TaskId) -> bool {
        self.active.contains_key(task_id) || self.settled.contains_key(task_id)
    }

    /// Move a task from active to settled. Returns the poll handle of the
    /// loop that was running and the event to publish, or `None` if the
    /// task was not active.
    fn settle(&mut self, task_id: &TaskId, outcome: TaskOutcome) -> Option<(PollHandle, TrackerEvent)> {
        let task = self.active.remove(task_id)?;
        task.poll_handle.cancel();

        let (state, progress) = match &outcome {
            TaskOutcome::Completed(_) => (LifecycleState::Completed, MAX_PROGRESS),
            TaskOutcome::Failed(_) => (LifecycleState::Errored, task.progress),
            TaskOutcome::Retired => (task.state, task.progress),
        };

        let event = match &outcome {
            TaskOutcome::Completed(result) => TrackerEvent::TaskCompleted {
                task_id: task_id.clone(),
                display_name: task.display_name.clone(),
                result: result.clone(),
            },
            TaskOutcome::Failed(error) => TrackerEvent::TaskFailed {
                task_id: task_id.clone(),
                display_name: task.display_name.clone(),
                error: error.clone(),
            },
            TaskOutcome::Retired => TrackerEvent::TaskRetired {
                task_id: task_id.clone(),
            },
        };

        self.settled.insert(
            task_id.clone(),
            SettledTask {
                display_name: task.display_name,
                state,
                progress,
                registered_at: task.registered_at,
                settled_at: Utc::now(),
                outcome,
            },
        );

        Some((task.poll_handle, event))
    }
}

// ---------------------------------------------------------------------------
// TaskRegistry
// ---------------------------------------------------------------------------

/// Store of every task known to one tracker.
///
/// Created with [`TaskRegistry::new`]; there is no global instance, so
/// independent trackers (and tests) never share state.
pub struct TaskRegistry {
    inner: RwLock<Inner>,
    backend: Arc<dyn TranscriptionBackend>,
    poll: PollConfig,
    event_tx: broadcast::Sender<TrackerEvent>,
    /// Number of active tasks, for [`wait_idle`](Self::wait_idle).
    active_tx: watch::Sender<usize>,
}

impl TaskRegistry {
    pub fn new(backend: Arc<dyn TranscriptionBackend>, poll: PollConfig) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (active_tx, _) = watch::channel(0);

        Arc::new(Self {
            inner: RwLock::new(Inner::default()),
            backend,
            poll,
            event_tx,
            active_tx,
        })
    }

    /// Subscribe to tracker events.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.event_tx.subscribe()
    }

    pub(crate) fn backend(&self) -> Arc<dyn TranscriptionBackend> {
        Arc::clone(&self.backend)
    }

    pub(crate) fn poll_config(&self) -> PollConfig {
        self.poll
    }

    /// Register a task as `Queued` at 0% and start its poll loop.
    ///
    /// Blank ids and ids already known to this registry are skipped with a
    /// log line. Returns `true` if the task was registered.
    pub async fn register(self: &Arc<Self>, task_id: TaskId, display_name: impl Into<String>) -> bool {
        let display_name = display_name.into();
        if task_id.is_blank() {
            tracing::warn!(display_name = %display_name, "Skipping task with blank id");
            return false;
        }

        {
            let mut inner = self.inner.write().await;
            if inner.contains(&task_id) {
                tracing::warn!(task_id = %task_id, "Task already tracked, ignoring duplicate");
                return false;
            }

            // Updates from the new loop take this guard, so the record is
            // in place before the first one lands.
            let poll_handle = PollHandle::start(Arc::clone(self), task_id.clone());
            inner.active.insert(
                task_id.clone(),
                ActiveTask {
                    display_name: display_name.clone(),
                    state: LifecycleState::Queued,
                    progress: 0,
                    registered_at: Utc::now(),
                    poll_handle,
                },
            );
            self.active_tx.send_replace(inner.active.len());
        }

        tracing::info!(task_id = %task_id, display_name = %display_name, "Task registered");
        let _ = self.event_tx.send(TrackerEvent::TaskRegistered {
            task_id,
            display_name,
        });
        true
    }

    /// Overwrite the state and progress of an active task.
    ///
    /// No-op for unknown or settled tasks (a late poll response after
    /// retirement lands here). Terminal states must go through
    /// [`settle`](Self::settle). Returns `true` if the record changed.
    pub async fn apply_update(&self, task_id: &TaskId, state: LifecycleState, progress: u8) -> bool {
        if state.is_terminal() {
            tracing::warn!(task_id = %task_id, ?state, "Terminal state passed to apply_update, ignoring");
            return false;
        }
        let progress = progress.min(MAX_PROGRESS);

        {
            let mut inner = self.inner.write().await;
            let Some(task) = inner.active.get_mut(task_id) else {
                tracing::debug!(task_id = %task_id, "Update for inactive task discarded");
                return false;
            };
            if task.state == state && task.progress == progress {
                return false;
            }
            task.state = state;
            task.progress = progress;
        }

        tracing::debug!(task_id = %task_id, ?state, progress, "Task progress");
        let _ = self.event_tx.send(TrackerEvent::TaskProgress {
            task_id: task_id.clone(),
            state,
            progress,
        });
        true
    }

    /// Move an active task to the settled set with the given outcome and
    /// cancel its poll loop.
    ///
    /// Exactly one caller wins for a given task; every other call (and
    /// every call for an unknown id) returns `false` and does nothing.
    pub async fn settle(&self, task_id: &TaskId, outcome: TaskOutcome) -> bool {
        let settled = {
            let mut inner = self.inner.write().await;
            let settled = inner.settle(task_id, outcome);
            self.active_tx.send_replace(inner.active.len());
            settled
        };

        let Some((_handle, event)) = settled else {
            return false;
        };

        match &event {
            TrackerEvent::TaskCompleted { result, .. } => tracing::info!(
                task_id = %task_id,
                original_file = %result.original_file,
                files = result.files.len(),
                "Task completed",
            ),
            TrackerEvent::TaskFailed { error, .. } => {
                tracing::warn!(task_id = %task_id, error = %error, "Task failed")
            }
            _ => tracing::info!(task_id = %task_id, "Task retired"),
        }
        let _ = self.event_tx.send(event);
        true
    }

    /// Retire a task: stop tracking it without waiting for a terminal
    /// state. Idempotent; unknown and settled ids are a no-op.
    pub async fn retire(&self, task_id: &TaskId) -> bool {
        self.settle(task_id, TaskOutcome::Retired).await
    }

    /// Number of tasks still queued or processing.
    pub async fn active_count(&self) -> usize {
        self.inner.read().await.active.len()
    }

    pub async fn snapshot(&self, task_id: &TaskId) -> Option<TaskSnapshot> {
        let inner = self.inner.read().await;
        if let Some(task) = inner.active.get(task_id) {
            return Some(active_snapshot(task_id, task));
        }
        inner
            .settled
            .get(task_id)
            .map(|task| settled_snapshot(task_id, task))
    }

    /// Snapshots of all active tasks, oldest registration first.
    pub async fn active_tasks(&self) -> Vec<TaskSnapshot> {
        let inner = self.inner.read().await;
        let mut tasks: Vec<_> = inner
            .active
            .iter()
            .map(|(id, task)| active_snapshot(id, task))
            .collect();
        tasks.sort_by_key(|t| t.registered_at);
        tasks
    }

    /// Snapshots of all settled tasks, most recently settled first.
    pub async fn settled_tasks(&self) -> Vec<TaskSnapshot> {
        let inner = self.inner.read().await;
        let mut tasks: Vec<_> = inner
            .settled
            .iter()
            .map(|(id, task)| settled_snapshot(id, task))
            .collect();
        tasks.sort_by(|a, b| b.settled_at.cmp(&a.settled_at));
        tasks
    }

    /// Wait until no task is active.
    pub async fn wait_idle(&self) {
        let mut rx = self.active_tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|count| *count == 0).await;
    }

    /// Retire every active task and wait for the poll loops to exit.
    pub async fn shutdown(&self) {
        let drained: Vec<_> = {
            let mut inner = self.inner.write().await;
            let ids: Vec<TaskId> = inner.active.keys().cloned().collect();
            let drained = ids
                .iter()
                .filter_map(|id| inner.settle(id, TaskOutcome::Retired))
                .collect();
            self.active_tx.send_replace(0);
            drained
        };

        tracing::info!(count = drained.len(), "Stopping poll loops");
        let mut joins = Vec::with_capacity(drained.len());
        for (handle, event) in drained {
            let _ = self.event_tx.send(event);
            joins.push(handle.join(SHUTDOWN_JOIN_TIMEOUT));
        }
        futures::future::join_all(joins).await;
        tracing::info!("Task registry shut down");
    }
}

fn active_snapshot(task_id: &TaskId, task: &ActiveTask) -> TaskSnapshot {
    TaskSnapshot {
        task_id: task_id.clone(),
        display_name: task.display_name.clone(),
        state: task.state,
        progress: task.progress,
        registered_at: task.registered_at,
        settled_at: None,
        outcome: None,
    }
}

fn settled_snapshot(task_id: &TaskId, task: &SettledTask) -> TaskSnapshot {
    TaskSnapshot {
        task_id: task_id.clone(),
        display_name: task.display_name.clone(),
        state: task.state,
        progress: task.progress,
        registered_at: task.registered_at,
        settled_at: Some(task.settled_at),
        outcome: Some(task.outcome.clone()),
    }
}
