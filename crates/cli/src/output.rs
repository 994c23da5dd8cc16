//! Plain-text rendering for the terminal.

use scribe_client::messages::{ConfigStatus, HealthStatus};
use scribe_client::{TaskOutcome, TaskSnapshot, TrackerEvent};
use scribe_core::estimation::{estimate_processing_secs, format_duration};
use scribe_core::lifecycle::{LifecycleState, MAX_PROGRESS};
use scribe_core::results::ResultRecord;
use scribe_core::submission::WhisperModel;

/// Width of the progress bar in characters.
const BAR_WIDTH: usize = 20;

/// `[#####...............]  25%`
pub fn progress_bar(progress: u8) -> String {
    let progress = progress.min(MAX_PROGRESS);
    let filled = usize::from(progress) * BAR_WIDTH / usize::from(MAX_PROGRESS);
    format!(
        "[{}{}] {progress:>3}%",
        "#".repeat(filled),
        ".".repeat(BAR_WIDTH - filled)
    )
}

/// One line per tracker event.
pub fn format_event(event: &TrackerEvent) -> String {
    match event {
        TrackerEvent::TaskRegistered {
            task_id,
            display_name,
        } => format!("{display_name} ({task_id}): {}", LifecycleState::Queued.label()),
        TrackerEvent::TaskProgress {
            task_id,
            state,
            progress,
        } => format!("{task_id}: {} {}", state.label(), progress_bar(*progress)),
        TrackerEvent::TaskCompleted {
            display_name,
            result,
            ..
        } => match result.split_message() {
            Some(split) => format!("{display_name}: {} ({split})", LifecycleState::Completed.label()),
            None => format!("{display_name}: {}", LifecycleState::Completed.label()),
        },
        TrackerEvent::TaskFailed {
            display_name,
            error,
            ..
        } => format!("{display_name}: {}: {error}", LifecycleState::Errored.label()),
        TrackerEvent::TaskRetired { task_id } => format!("{task_id}: retired"),
    }
}

/// Lines describing a completed result: the source name, the split
/// notice, then one line per downloadable file.
pub fn format_result(result: &ResultRecord) -> Vec<String> {
    let mut lines = vec![result.original_file.clone()];
    if let Some(split) = result.split_message() {
        lines.push(format!("  {split}"));
    }
    lines.extend(
        result
            .files
            .iter()
            .map(|f| format!("  {:<20} {}", f.label(), f.filename)),
    );
    lines
}

/// Summary lines for a settled task.
pub fn format_snapshot(snapshot: &TaskSnapshot) -> Vec<String> {
    match &snapshot.outcome {
        Some(TaskOutcome::Completed(result)) => format_result(result),
        Some(TaskOutcome::Failed(error)) => vec![format!(
            "{}: {}: {error}",
            snapshot.display_name,
            LifecycleState::Errored.label()
        )],
        Some(TaskOutcome::Retired) => vec![format!(
            "{}: stopped tracking at {}",
            snapshot.display_name,
            progress_bar(snapshot.progress)
        )],
        None => vec![format!(
            "{}: {} {}",
            snapshot.display_name,
            snapshot.state.label(),
            progress_bar(snapshot.progress)
        )],
    }
}

/// `"Tiempo estimado: 3 min 20 seg"`, or `None` for an empty batch.
pub fn format_estimate(file_sizes: &[u64], model: WhisperModel) -> Option<String> {
    estimate_processing_secs(file_sizes, model)
        .map(|secs| format!("Tiempo estimado: {}", format_duration(secs)))
}

/// Guidance printed when the backend cannot be reached.
pub fn unreachable_hint(url: &str) -> String {
    format!(
        "Could not reach the transcription backend at {url}.\n\
         Start the backend server, or point SCRIBE_API_URL (or --api-url) at a running instance."
    )
}

pub fn format_config(config: &ConfigStatus) -> String {
    match (config.has_token, config.token_masked.as_deref()) {
        (true, Some(masked)) => format!("Diarization token configured: {masked}"),
        (true, None) => "Diarization token configured".to_string(),
        (false, _) => "No diarization token configured".to_string(),
    }
}

pub fn format_health(health: &HealthStatus) -> String {
    let mut line = format!("status: {}", health.status);
    if let Some(version) = &health.version {
        line.push_str(&format!(", version: {version}"));
    }
    if let Some(model) = &health.model {
        line.push_str(&format!(", model: {model}"));
    }
    if let Some(loaded) = health.model_loaded {
        line.push_str(&format!(", model loaded: {loaded}"));
    }
    line
}
