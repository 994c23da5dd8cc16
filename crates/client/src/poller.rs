//! Fixed-interval status polling for a single task.
//!
//! Each registered task gets one loop spawned by [`PollHandle::start`].
//! The loop polls immediately, then waits a fixed interval between the
//! end of one poll and the start of the next, so two polls of the same
//! task never overlap. Request failures are logged and retried on the
//! next tick; only a terminal status or cancellation ends the loop.

use std::sync::{Arc, Weak};
use std::time::Duration;

use scribe_core::lifecycle::{project, Projection};
use scribe_core::results::materialize;
use scribe_core::status::StatusPayload;
use scribe_core::types::TaskId;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::DEFAULT_POLL_INTERVAL_MS;
use crate::registry::{TaskOutcome, TaskRegistry};

/// Polling parameters shared by every task of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between the end of one poll and the start of the next.
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

/// Owner of one running poll loop.
pub struct PollHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Spawn the poll loop for `task_id`.
    ///
    /// The loop only holds a weak reference to the registry, so dropping
    /// the last registry handle also stops it.
    pub fn start(registry: Arc<TaskRegistry>, task_id: TaskId) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_poll_loop(
            Arc::downgrade(&registry),
            task_id,
            cancel.clone(),
        ));
        Self { cancel, task }
    }

    /// Stop scheduling further polls. Safe to call more than once.
    ///
    /// A request already in flight is not aborted; the registry discards
    /// its result.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel and wait up to `timeout` for the loop to exit, aborting it
    /// after that.
    pub(crate) async fn join(mut self, timeout: Duration) {
        self.cancel.cancel();
        if tokio::time::timeout(timeout, &mut self.task).await.is_err() {
            tracing::warn!("Poll loop did not stop in time, aborting");
            self.task.abort();
        }
    }
}

async fn run_poll_loop(registry: Weak<TaskRegistry>, task_id: TaskId, cancel: CancellationToken) {
    let Some((backend, interval)) = registry
        .upgrade()
        .map(|r| (r.backend(), r.poll_config().interval))
    else {
        return;
    };

    let mut failures = 0u32;
    loop {
        match backend.status(&task_id).await {
            Ok(payload) => {
                failures = 0;
                let Some(reg) = registry.upgrade() else {
                    return;
                };
                if apply_payload(&reg, &task_id, &payload).await {
                    tracing::debug!(task_id = %task_id, "Poll loop finished");
                    return;
                }
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(
                    task_id = %task_id,
                    attempt = failures,
                    error = %e,
                    "Status poll failed, retrying next tick",
                );
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(task_id = %task_id, "Poll loop cancelled");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// Feed one status payload into the registry. Returns `true` if the task
/// reached a terminal state and the loop should stop.
async fn apply_payload(registry: &TaskRegistry, task_id: &TaskId, payload: &StatusPayload) -> bool {
    match project(payload) {
        Projection::Active { state, progress } => {
            registry.apply_update(task_id, state, progress).await;
            false
        }
        Projection::Completed { .. } => {
            registry
                .settle(task_id, TaskOutcome::Completed(materialize(payload)))
                .await;
            true
        }
        Projection::Errored { message } => {
            registry.settle(task_id, TaskOutcome::Failed(message)).await;
            true
        }
        Projection::Unrecognized { status } => {
            tracing::debug!(task_id = %task_id, status = %status, "Unrecognized status, keeping record");
            false
        }
    }
}
