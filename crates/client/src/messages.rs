//! Request and response bodies of the auxiliary backend endpoints.
//!
//! The status payload itself lives in `scribe_core::status` because the
//! projector and materializer consume it.

use serde::{Deserialize, Serialize};

/// Response of `GET /config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConfigStatus {
    /// Whether a diarization credential is stored on the backend.
    #[serde(default)]
    pub has_token: bool,
    /// Masked preview of the stored credential, e.g. `hf_A...xyz9`.
    #[serde(default)]
    pub token_masked: Option<String>,
}

/// Body of `POST /config`.
#[derive(Debug, Serialize)]
pub struct SetTokenRequest<'a> {
    pub hf_token: &'a str,
}

/// Body of `POST /set-language`.
#[derive(Debug, Serialize)]
pub struct SetLanguageRequest<'a> {
    pub language: &'a str,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
    /// Model currently selected on the backend.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub model_loaded: Option<bool>,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}
