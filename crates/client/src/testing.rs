//! In-memory backends for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scribe_core::status::StatusPayload;
use scribe_core::submission::SubmitOptions;
use scribe_core::types::TaskId;
use tokio::sync::Notify;

use crate::api::ApiError;
use crate::backend::TranscriptionBackend;
use crate::upload::AudioFile;

/// Reports every task as queued forever.
pub(crate) struct PendingBackend;

#[async_trait]
impl TranscriptionBackend for PendingBackend {
    fn endpoint(&self) -> &str {
        "memory://pending"
    }

    async fn submit(&self, files: Vec<AudioFile>, _: &SubmitOptions) -> Result<Vec<TaskId>, ApiError> {
        Ok(files.iter().map(|f| TaskId::new(format!("id-{}", f.name))).collect())
    }

    async fn status(&self, _: &TaskId) -> Result<StatusPayload, ApiError> {
        Ok(StatusPayload::with_status("queued"))
    }
}

/// One scripted status response.
#[derive(Clone)]
pub(crate) enum Step {
    Reply(StatusPayload),
    Fail,
    /// Block until the gate is notified, then reply.
    Hold(Arc<Notify>, StatusPayload),
}

impl Step {
    pub(crate) fn status(status: &str) -> Self {
        Self::Reply(StatusPayload::with_status(status))
    }
}

/// Replays a script of status responses; the last step repeats once the
/// script runs out.
pub(crate) struct ScriptedBackend {
    script: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    latency: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedBackend {
    pub(crate) fn new(script: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        let mut script = self.script.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        if let Some(step) = script.pop_front() {
            *last = Some(step.clone());
            return step;
        }
        last.clone().unwrap_or(Step::status("queued"))
    }
}

#[async_trait]
impl TranscriptionBackend for ScriptedBackend {
    fn endpoint(&self) -> &str {
        "memory://scripted"
    }

    async fn submit(&self, files: Vec<AudioFile>, _: &SubmitOptions) -> Result<Vec<TaskId>, ApiError> {
        Ok((0..files.len()).map(|i| TaskId::new(format!("t{}", i + 1))).collect())
    }

    async fn status(&self, _: &TaskId) -> Result<StatusPayload, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let step = self.next_step();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let result = match step {
            Step::Reply(payload) => Ok(payload),
            Step::Fail => Err(ApiError::Protocol("scripted failure".into())),
            Step::Hold(gate, payload) => {
                gate.notified().await;
                Ok(payload)
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
