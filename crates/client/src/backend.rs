//! The seam between task tracking and the network.
//!
//! The tracker, registry and poller only need two calls from the
//! backend. Putting them behind [`TranscriptionBackend`] lets the same
//! tracking code run against [`ScribeApi`] or an in-memory fake.

use async_trait::async_trait;
use scribe_core::status::StatusPayload;
use scribe_core::submission::SubmitOptions;
use scribe_core::types::TaskId;

use crate::api::{ApiError, ScribeApi};
use crate::upload::AudioFile;

#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    /// Base address, used in log lines and error messages.
    fn endpoint(&self) -> &str;

    /// Upload a batch; one task id per file, in order.
    async fn submit(
        &self,
        files: Vec<AudioFile>,
        options: &SubmitOptions,
    ) -> Result<Vec<TaskId>, ApiError>;

    /// Fetch the current status payload of one task.
    async fn status(&self, task_id: &TaskId) -> Result<StatusPayload, ApiError>;
}

#[async_trait]
impl TranscriptionBackend for ScribeApi {
    fn endpoint(&self) -> &str {
        self.api_url()
    }

    async fn submit(
        &self,
        files: Vec<AudioFile>,
        options: &SubmitOptions,
    ) -> Result<Vec<TaskId>, ApiError> {
        self.submit_batch(files, options).await
    }

    async fn status(&self, task_id: &TaskId) -> Result<StatusPayload, ApiError> {
        self.get_status(task_id).await
    }
}
