//! Batch submission options and validation.
//!
//! Describes how a batch is configured (model, timestamps, diarization,
//! speaker hint) and which files the backend will accept, and produces
//! the text fields of the multipart upload form.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Form field names
// ---------------------------------------------------------------------------

/// Multipart field carrying each audio file.
pub const FIELD_FILES: &str = "files";
/// Multipart field carrying the model name.
pub const FIELD_MODEL: &str = "model";
/// Multipart field carrying the timestamps flag.
pub const FIELD_TIMESTAMPS: &str = "timestamps";
/// Multipart field carrying the diarization flag.
pub const FIELD_DIARIZATION: &str = "diarization";
/// Multipart field carrying the speaker-count hint.
pub const FIELD_SPEAKERS: &str = "speakers";

// ---------------------------------------------------------------------------
// Accepted audio formats
// ---------------------------------------------------------------------------

/// File extensions the backend accepts, lowercase without the dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "flac", "ogg", "wma", "aac", "mpeg"];

/// `true` if the file name has an extension the backend accepts
/// (case-insensitive).
pub fn is_supported_audio(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// WhisperModel
// ---------------------------------------------------------------------------

/// Transcription model the backend should load for the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhisperModel {
    Tiny,
    Base,
    #[default]
    Small,
    Medium,
    Large,
}

impl WhisperModel {
    pub const ALL: [WhisperModel; 5] = [
        Self::Tiny,
        Self::Base,
        Self::Small,
        Self::Medium,
        Self::Large,
    ];

    /// Wire name sent in the `model` form field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tiny => "tiny",
            Self::Base => "base",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

impl fmt::Display for WhisperModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WhisperModel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown model: '{s}'. Valid models: {}",
                    Self::ALL.map(Self::as_str).join(", ")
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// SubmitOptions
// ---------------------------------------------------------------------------

/// Configuration applied to every file of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOptions {
    pub model: WhisperModel,
    /// Include segment timestamps in the transcript.
    pub timestamps: bool,
    /// Separate speakers. Requires a credential configured on the backend.
    pub diarization: bool,
    /// Expected number of speakers. Only meaningful with `diarization`.
    pub speakers: Option<u32>,
}

impl SubmitOptions {
    /// Reject option combinations the backend cannot honour.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.speakers == Some(0) {
            return Err(CoreError::Validation(
                "Speaker count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Text fields of the upload form, in the order they are attached.
    ///
    /// The speaker hint is only included when diarization is enabled.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            (FIELD_MODEL, self.model.as_str().to_string()),
            (FIELD_TIMESTAMPS, self.timestamps.to_string()),
            (FIELD_DIARIZATION, self.diarization.to_string()),
        ];
        if self.diarization {
            if let Some(speakers) = self.speakers {
                fields.push((FIELD_SPEAKERS, speakers.to_string()));
            }
        }
        fields
    }
}
