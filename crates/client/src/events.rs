//! Events emitted by the task tracker.
//!
//! These represent the lifecycle changes a front end renders: a task
//! appearing in the queue, its progress, and its completion or failure.
//! They are published by the registry after every state change.

use scribe_core::lifecycle::LifecycleState;
use scribe_core::results::ResultRecord;
use scribe_core::types::TaskId;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackerEvent {
    /// A task was accepted and its poll loop started.
    TaskRegistered {
        task_id: TaskId,
        display_name: String,
    },

    /// An active task reported a new state or progress.
    TaskProgress {
        task_id: TaskId,
        state: LifecycleState,
        /// Completion percentage (0-100).
        progress: u8,
    },

    /// A task finished and its outputs are ready to download.
    TaskCompleted {
        task_id: TaskId,
        display_name: String,
        result: ResultRecord,
    },

    /// The backend reported a failure for a task. Sibling tasks are not
    /// affected.
    TaskFailed {
        task_id: TaskId,
        display_name: String,
        error: String,
    },

    /// A task was retired by the caller before reaching a terminal state.
    TaskRetired { task_id: TaskId },
}

impl TrackerEvent {
    pub fn task_id(&self) -> &TaskId {
        match self {
            Self::TaskRegistered { task_id, .. }
            | Self::TaskProgress { task_id, .. }
            | Self::TaskCompleted { task_id, .. }
            | Self::TaskFailed { task_id, .. }
            | Self::TaskRetired { task_id } => task_id,
        }
    }

    /// `true` for events after which the task receives no further events.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            Self::TaskCompleted { .. } | Self::TaskFailed { .. } | Self::TaskRetired { .. }
        )
    }
}
