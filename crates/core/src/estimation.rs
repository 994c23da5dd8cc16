//! Processing-time estimation constants and pure logic.
//!
//! Gives a rough wall-clock estimate for a batch before it is submitted,
//! based only on file sizes and the selected model.

use crate::submission::WhisperModel;

// ---------------------------------------------------------------------------
// Heuristic constants
// ---------------------------------------------------------------------------

/// Seconds of audio assumed per megabyte of compressed input.
pub const AUDIO_SECS_PER_MB: f64 = 30.0;
/// Bytes per megabyte.
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Speed of the `small` model relative to real time.
pub const SMALL_MODEL_SPEED: f64 = 1.5;
/// Speed of the `medium` model relative to real time.
pub const MEDIUM_MODEL_SPEED: f64 = 0.8;
/// Speed assumed for models without a calibrated multiplier.
pub const DEFAULT_MODEL_SPEED: f64 = 1.0;

/// Seconds per minute.
pub const SECS_PER_MINUTE: u64 = 60;
/// Minutes per hour.
pub const MINUTES_PER_HOUR: u64 = 60;

// ---------------------------------------------------------------------------
// Estimation logic
// ---------------------------------------------------------------------------

/// Processing speed of a model as a multiple of real time.
pub fn model_speed(model: WhisperModel) -> f64 {
    match model {
        WhisperModel::Small => SMALL_MODEL_SPEED,
        WhisperModel::Medium => MEDIUM_MODEL_SPEED,
        _ => DEFAULT_MODEL_SPEED,
    }
}

/// Estimate processing seconds for a batch of files of the given sizes.
///
/// Returns `None` for an empty batch.
pub fn estimate_processing_secs(file_sizes: &[u64], model: WhisperModel) -> Option<f64> {
    if file_sizes.is_empty() {
        return None;
    }

    let audio_secs: f64 = file_sizes
        .iter()
        .map(|&bytes| bytes as f64 / BYTES_PER_MB * AUDIO_SECS_PER_MB)
        .sum();

    Some(audio_secs / model_speed(model))
}

/// Format a duration in seconds for display.
///
/// - under a minute: `"42 segundos"`
/// - under an hour: `"3 min 20 seg"`, or `"3 minutos"` on a whole minute
/// - otherwise: `"1h 5min"`
pub fn format_duration(secs: f64) -> String {
    let secs = secs.max(0.0);
    if secs < SECS_PER_MINUTE as f64 {
        return format!("{} segundos", secs.round() as u64);
    }

    let total = secs.round() as u64;
    let minutes = total / SECS_PER_MINUTE;
    let remaining_secs = total % SECS_PER_MINUTE;
    if minutes < MINUTES_PER_HOUR {
        return if remaining_secs > 0 {
            format!("{minutes} min {remaining_secs} seg")
        } else {
            format!("{minutes} minutos")
        };
    }

    let hours = minutes / MINUTES_PER_HOUR;
    let remaining_minutes = minutes % MINUTES_PER_HOUR;
    format!("{hours}h {remaining_minutes}min")
}
