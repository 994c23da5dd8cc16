//! Entry point for submitting audio batches and following their tasks.
//!
//! [`Tracker`] glues the backend seam to a [`TaskRegistry`]: it uploads a
//! batch in one request, pairs the returned task ids with the submitted
//! files, and registers each pair so its poll loop starts. Everything
//! after registration is driven by the registry and its events.

use std::sync::Arc;

use scribe_core::error::CoreError;
use scribe_core::submission::{is_supported_audio, SubmitOptions};
use scribe_core::types::TaskId;
use tokio::sync::broadcast;

use crate::api::ApiError;
use crate::backend::TranscriptionBackend;
use crate::events::TrackerEvent;
use crate::poller::PollConfig;
use crate::registry::TaskRegistry;
use crate::upload::AudioFile;

/// Errors from [`Tracker::submit`].
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// Every selected file had an unsupported extension.
    #[error("No supported audio files selected")]
    NoSupportedFiles,

    #[error("Invalid options: {0}")]
    InvalidOptions(#[from] CoreError),

    /// The backend could not be reached at all.
    #[error("Backend unreachable at {url}")]
    Unreachable { url: String },

    /// The backend answered with a non-success status.
    #[error("Upload rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Upload failed: {0}")]
    Transport(String),

    /// The upload response did not match the expected shape.
    #[error("Unexpected upload response: {0}")]
    Protocol(String),
}

impl SubmitError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}

impl From<ApiError> for SubmitError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unreachable { url, .. } => Self::Unreachable { url },
            ApiError::Status { status, message } => Self::Rejected { status, message },
            ApiError::Protocol(msg) => Self::Protocol(msg),
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Submits batches and owns the registry that tracks them.
///
/// Each tracker has its own registry; trackers never share state.
pub struct Tracker {
    backend: Arc<dyn TranscriptionBackend>,
    registry: Arc<TaskRegistry>,
}

impl Tracker {
    pub fn new(backend: Arc<dyn TranscriptionBackend>, poll: PollConfig) -> Self {
        let registry = TaskRegistry::new(Arc::clone(&backend), poll);
        Self { backend, registry }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.registry.subscribe()
    }

    /// Upload `files` in a single request and start tracking the returned
    /// tasks.
    ///
    /// An empty selection is a no-op. Files with unsupported extensions
    /// are dropped first. Returns the ids that were registered, in
    /// submission order.
    pub async fn submit(
        &self,
        files: Vec<AudioFile>,
        options: &SubmitOptions,
    ) -> Result<Vec<TaskId>, SubmitError> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let (files, skipped): (Vec<_>, Vec<_>) =
            files.into_iter().partition(|f| is_supported_audio(&f.name));
        for file in &skipped {
            tracing::warn!(file = %file.name, "Skipping unsupported file type");
        }
        if files.is_empty() {
            return Err(SubmitError::NoSupportedFiles);
        }
        options.validate()?;

        let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        tracing::info!(
            endpoint = self.backend.endpoint(),
            files = names.len(),
            model = %options.model,
            diarization = options.diarization,
            "Submitting batch",
        );

        let ids = self.backend.submit(files, options).await.map_err(|e| {
            tracing::error!(error = %e, "Batch submission failed");
            SubmitError::from(e)
        })?;

        if ids.len() != names.len() {
            tracing::warn!(
                expected = names.len(),
                received = ids.len(),
                "Backend returned a different number of task ids",
            );
        }

        let mut registered = Vec::with_capacity(ids.len());
        for (task_id, name) in ids.into_iter().zip(names) {
            if self.registry.register(task_id.clone(), name).await {
                registered.push(task_id);
            }
        }
        Ok(registered)
    }

    /// Stop tracking one task. See [`TaskRegistry::retire`].
    pub async fn retire(&self, task_id: &TaskId) -> bool {
        self.registry.retire(task_id).await
    }

    /// Wait until every tracked task has settled.
    pub async fn wait_idle(&self) {
        self.registry.wait_idle().await
    }

    pub async fn shutdown(&self) {
        self.registry.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use scribe_core::submission::WhisperModel;

    use crate::testing::PendingBackend;

    fn tracker() -> Tracker {
        Tracker::new(Arc::new(PendingBackend), PollConfig::default())
    }

    #[tokio::test]
    async fn empty_selection_is_a_noop() {
        let t = tracker();
        let ids = t.submit(Vec::new(), &SubmitOptions::default()).await.unwrap();
        assert!(ids.is_empty());
        assert_eq!(t.registry().active_count().await, 0);
    }

    #[tokio::test]
    async fn unsupported_files_are_dropped() {
        let t = tracker();
        let files = vec![
            AudioFile::new("notes.txt", vec![1]),
            AudioFile::new("talk.MP3", vec![1]),
        ];
        let ids = t.submit(files, &SubmitOptions::default()).await.unwrap();
        assert_eq!(ids, vec![TaskId::from("id-talk.MP3")]);
    }

    #[tokio::test]
    async fn only_unsupported_files_is_an_error() {
        let t = tracker();
        let files = vec![AudioFile::new("cover.png", vec![1])];
        assert_matches!(
            t.submit(files, &SubmitOptions::default()).await,
            Err(SubmitError::NoSupportedFiles)
        );
    }

    #[tokio::test]
    async fn invalid_options_are_rejected_before_upload() {
        let t = tracker();
        let options = SubmitOptions {
            model: WhisperModel::Small,
            timestamps: false,
            diarization: true,
            speakers: Some(0),
        };
        let files = vec![AudioFile::new("a.wav", vec![1])];
        assert_matches!(
            t.submit(files, &options).await,
            Err(SubmitError::InvalidOptions(_))
        );
        assert_eq!(t.registry().active_count().await, 0);
    }

    #[test]
    fn api_errors_map_to_submit_errors() {
        assert_matches!(
            SubmitError::from(ApiError::Status {
                status: 400,
                message: "bad".into()
            }),
            SubmitError::Rejected { status: 400, .. }
        );
        assert_matches!(
            SubmitError::from(ApiError::Protocol("no task_ids".into())),
            SubmitError::Protocol(_)
        );
    }
}
