//! Task lifecycle states and the status projector.
//!
//! [`project`] is the single place where a raw backend status payload is
//! turned into something the tracker acts on: a progress update for an
//! active task, a terminal outcome, or an explicit "unrecognized" result
//! that must leave the task untouched.

use serde::{Deserialize, Serialize};

use crate::status::{lenient_number, StatusPayload};

// ---------------------------------------------------------------------------
// Wire status constants
// ---------------------------------------------------------------------------

/// Task accepted by the backend, waiting for a worker.
pub const STATUS_QUEUED: &str = "queued";
/// Task is being transcribed.
pub const STATUS_PROCESSING: &str = "processing";
/// Task finished and produced output files.
pub const STATUS_COMPLETED: &str = "completed";
/// Task failed on the backend.
pub const STATUS_ERROR: &str = "error";

/// Message used when the backend reports `error` without a description.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Error desconocido";

/// Upper bound for progress percentages.
pub const MAX_PROGRESS: u8 = 100;

// ---------------------------------------------------------------------------
// LifecycleState
// ---------------------------------------------------------------------------

/// Lifecycle of a single transcription task.
///
/// `Queued` and `Processing` are active; `Completed` and `Errored` are
/// terminal. A backend may report `Processing -> Queued`, which is
/// accepted like any other active update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Queued,
    Processing,
    Completed,
    Errored,
}

impl LifecycleState {
    /// Map a backend status string to a state.
    ///
    /// Matching is case-sensitive. Returns `None` for anything outside
    /// the four known values.
    pub fn from_wire(status: &str) -> Option<Self> {
        match status {
            STATUS_QUEUED => Some(Self::Queued),
            STATUS_PROCESSING => Some(Self::Processing),
            STATUS_COMPLETED => Some(Self::Completed),
            STATUS_ERROR => Some(Self::Errored),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Errored)
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Human-readable label for display.
    pub fn label(self) -> &'static str {
        match self {
            Self::Queued => "En cola",
            Self::Processing => "Procesando...",
            Self::Completed => "Completado",
            Self::Errored => "Error",
        }
    }
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Classification of one status payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// The task is still queued or processing.
    Active { state: LifecycleState, progress: u8 },
    /// The task finished successfully; the payload carries its outputs.
    Completed { progress: u8 },
    /// The task failed on the backend.
    Errored { message: String },
    /// The status string is not one we know. No transition is inferred.
    Unrecognized { status: String },
}

impl Projection {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Errored { .. })
    }
}

/// Project a raw status payload onto the task lifecycle.
pub fn project(payload: &StatusPayload) -> Projection {
    let progress = progress_percent(payload);

    match LifecycleState::from_wire(&payload.status) {
        Some(state @ (LifecycleState::Queued | LifecycleState::Processing)) => {
            Projection::Active { state, progress }
        }
        Some(LifecycleState::Completed) => Projection::Completed { progress },
        Some(LifecycleState::Errored) => Projection::Errored {
            message: payload
                .error
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or(UNKNOWN_ERROR_MESSAGE)
                .to_string(),
        },
        None => Projection::Unrecognized {
            status: payload.status.clone(),
        },
    }
}

/// Progress percentage of a payload, `0` when absent or falsy, clamped to
/// `0..=100`.
pub fn progress_percent(payload: &StatusPayload) -> u8 {
    lenient_number(payload.progress.as_ref())
        .map(|p| p.round().min(f64::from(MAX_PROGRESS)) as u8)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> StatusPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn known_statuses_map_to_states() {
        assert_eq!(LifecycleState::from_wire("queued"), Some(LifecycleState::Queued));
        assert_eq!(
            LifecycleState::from_wire("processing"),
            Some(LifecycleState::Processing)
        );
        assert_eq!(
            LifecycleState::from_wire("completed"),
            Some(LifecycleState::Completed)
        );
        assert_eq!(LifecycleState::from_wire("error"), Some(LifecycleState::Errored));
    }

    #[test]
    fn status_matching_is_case_sensitive() {
        assert_eq!(LifecycleState::from_wire("Completed"), None);
        assert_eq!(LifecycleState::from_wire("ERROR"), None);
    }

    #[test]
    fn only_completed_and_errored_are_terminal() {
        assert!(!LifecycleState::Queued.is_terminal());
        assert!(!LifecycleState::Processing.is_terminal());
        assert!(LifecycleState::Completed.is_terminal());
        assert!(LifecycleState::Errored.is_terminal());
    }

    #[test]
    fn processing_with_progress() {
        let p = project(&payload(json!({"status": "processing", "progress": 30})));
        assert_eq!(
            p,
            Projection::Active {
                state: LifecycleState::Processing,
                progress: 30
            }
        );
    }

    #[test]
    fn missing_progress_defaults_to_zero() {
        let p = project(&payload(json!({"status": "queued"})));
        assert_eq!(
            p,
            Projection::Active {
                state: LifecycleState::Queued,
                progress: 0
            }
        );
    }

    #[test]
    fn null_progress_defaults_to_zero() {
        let p = project(&payload(json!({"status": "processing", "progress": null})));
        assert_matches!(p, Projection::Active { progress: 0, .. });
    }

    #[test]
    fn progress_is_clamped_to_one_hundred() {
        let p = project(&payload(json!({"status": "processing", "progress": 250})));
        assert_matches!(p, Projection::Active { progress: 100, .. });
    }

    #[test]
    fn completed_is_terminal() {
        let p = project(&payload(json!({"status": "completed", "progress": 100})));
        assert_eq!(p, Projection::Completed { progress: 100 });
        assert!(p.is_terminal());
    }

    #[test]
    fn error_carries_backend_message() {
        let p = project(&payload(json!({"status": "error", "error": "ffmpeg missing"})));
        assert_eq!(
            p,
            Projection::Errored {
                message: "ffmpeg missing".into()
            }
        );
    }

    #[test]
    fn error_without_message_uses_placeholder() {
        let p = project(&payload(json!({"status": "error"})));
        assert_eq!(
            p,
            Projection::Errored {
                message: UNKNOWN_ERROR_MESSAGE.into()
            }
        );
    }

    #[test]
    fn unknown_status_is_unrecognized() {
        let p = project(&payload(json!({"status": "paused", "progress": 80})));
        assert_eq!(
            p,
            Projection::Unrecognized {
                status: "paused".into()
            }
        );
        assert!(!p.is_terminal());
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(LifecycleState::Queued.label(), "En cola");
        assert_eq!(LifecycleState::Completed.label(), "Completado");
    }
}
