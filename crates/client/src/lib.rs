//! Client for the speech-transcription backend.
//!
//! Provides the HTTP API wrapper, the task registry with per-task status
//! polling, and the [`Tracker`] that submits batches and follows them to
//! completion.

pub mod api;
pub mod backend;
pub mod config;
pub mod events;
pub mod messages;
pub mod poller;
pub mod registry;
pub mod tracker;
pub mod upload;

#[cfg(test)]
mod testing;

pub use api::{ApiError, ScribeApi};
pub use backend::TranscriptionBackend;
pub use config::ClientConfig;
pub use events::TrackerEvent;
pub use poller::PollConfig;
pub use registry::{TaskOutcome, TaskRegistry, TaskSnapshot};
pub use tracker::{SubmitError, Tracker};
pub use upload::AudioFile;
