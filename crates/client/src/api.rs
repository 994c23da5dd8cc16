//! REST API client for the transcription backend.
//!
//! Wraps every HTTP endpoint the client uses (batch upload, status,
//! download, credential config, language, health) using [`reqwest`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use scribe_core::status::StatusPayload;
use scribe_core::submission::{SubmitOptions, FIELD_FILES};
use scribe_core::types::TaskId;
use tokio::io::AsyncWriteExt;

use crate::config::ClientConfig;
use crate::messages::{ConfigStatus, HealthStatus, SetLanguageRequest, SetTokenRequest};
use crate::upload::AudioFile;

/// HTTP client for one transcription backend.
pub struct ScribeApi {
    client: reqwest::Client,
    api_url: String,
    request_timeout: Duration,
}

/// Errors from the REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The connection could not be established (refused, DNS, TLS).
    #[error("Backend unreachable at {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP request failed after the connection was made (timeout,
    /// reset, body decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Backend error ({status}): {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// The backend's `error` field, or the raw body.
        message: String,
    },

    /// The response body does not have the expected shape.
    #[error("Unexpected response: {0}")]
    Protocol(String),

    /// The request could not be built from the given input.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Writing a downloaded file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Suffix of a download that has not finished yet.
const PARTIAL_SUFFIX: &str = ".part";

/// Default per-request timeout for short calls (status, config).
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

impl ScribeApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://127.0.0.1:5000`.
    pub fn new(api_url: String) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Build a client with the timeouts from `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        let mut api = Self::with_client(client, config.api_url.clone());
        api.request_timeout = config.request_timeout;
        Ok(api)
    }

    /// Base URL of the backend.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Upload a batch of files.
    ///
    /// Sends one `POST /upload` multipart request with a `files` part per
    /// file plus the option fields. Returns one task id per file, in
    /// attachment order. Entries that are not strings come back blank.
    pub async fn submit_batch(
        &self,
        files: Vec<AudioFile>,
        options: &SubmitOptions,
    ) -> Result<Vec<TaskId>, ApiError> {
        let mut form = reqwest::multipart::Form::new();
        for file in files {
            let part = reqwest::multipart::Part::bytes(file.content).file_name(file.name);
            form = form.part(FIELD_FILES, part);
        }
        for (name, value) in options.form_fields() {
            form = form.text(name, value);
        }

        let response = self
            .client
            .post(self.endpoint(&["upload"])?)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let response = Self::ensure_success(response).await?;
        let body = response.text().await?;
        parse_task_ids(&body)
    }

    /// Fetch the current status of one task via `GET /status/{task_id}`.
    pub async fn get_status(&self, task_id: &TaskId) -> Result<StatusPayload, ApiError> {
        let response = self
            .client
            .get(self.endpoint(&["status", task_id.as_str()])?)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        Self::parse_response(response).await
    }

    /// Read the credential configuration via `GET /config`.
    pub async fn get_config(&self) -> Result<ConfigStatus, ApiError> {
        let response = self
            .client
            .get(self.endpoint(&["config"])?)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        Self::parse_response(response).await
    }

    /// Store the diarization credential via `POST /config`.
    pub async fn set_token(&self, token: &str) -> Result<(), ApiError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ApiError::InvalidRequest("token must not be empty".into()));
        }

        let response = self
            .client
            .post(self.endpoint(&["config"])?)
            .timeout(self.request_timeout)
            .json(&SetTokenRequest { hf_token: token })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        Self::check_status(response).await
    }

    /// Select the transcription language via `POST /set-language`.
    pub async fn set_language(&self, language: &str) -> Result<(), ApiError> {
        let language = language.trim();
        if language.is_empty() {
            return Err(ApiError::InvalidRequest("language must not be empty".into()));
        }

        let response = self
            .client
            .post(self.endpoint(&["set-language"])?)
            .timeout(self.request_timeout)
            .json(&SetLanguageRequest { language })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        Self::check_status(response).await
    }

    /// Query `GET /health`.
    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        let response = self
            .client
            .get(self.endpoint(&["health"])?)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        Self::parse_response(response).await
    }

    /// URL of an output file, for front ends that open it elsewhere.
    pub fn download_url(&self, filename: &str) -> Result<Url, ApiError> {
        self.endpoint(&["download", filename])
    }

    /// Download an output file into `dest_dir`, returning the local path.
    ///
    /// Only the final component of `filename` is used locally.
    pub async fn download(&self, filename: &str, dest_dir: &Path) -> Result<PathBuf, ApiError> {
        let local_name = Path::new(filename)
            .file_name()
            .ok_or_else(|| ApiError::InvalidRequest(format!("invalid filename: '{filename}'")))?;

        let response = self
            .client
            .get(self.download_url(filename)?)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let mut response = Self::ensure_success(response).await?;

        tokio::fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(local_name);
        let mut partial_name = local_name.to_os_string();
        partial_name.push(PARTIAL_SUFFIX);
        let partial = dest_dir.join(partial_name);

        if let Err(e) = write_body(&mut response, &partial).await {
            if let Err(rm) = tokio::fs::remove_file(&partial).await {
                tracing::debug!(path = %partial.display(), error = %rm, "Could not remove partial download");
            }
            tracing::warn!(filename, error = %e, "Download interrupted");
            return Err(e);
        }
        tokio::fs::rename(&partial, &path).await?;

        tracing::debug!(filename, path = %path.display(), "Output file downloaded");
        Ok(path)
    }

    // ---- private helpers ----

    /// Join path segments onto the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.api_url)
            .map_err(|e| ApiError::InvalidRequest(format!("bad base URL '{}': {e}", self.api_url)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidRequest(format!("base URL '{}' cannot take a path", self.api_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Classify a send error: connection failures are "unreachable".
    fn transport_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_connect() {
            ApiError::Unreachable {
                url: self.api_url.clone(),
                source: e,
            }
        } else {
            ApiError::Request(e)
        }
    }

    /// Ensure the response has a success status code. On failure the
    /// backend's JSON `error` field (or the raw body) becomes the message.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(status.as_u16(), &body),
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

/// Stream a response body into `path`, creating or truncating it.
async fn write_body(response: &mut reqwest::Response, path: &Path) -> Result<(), ApiError> {
    let mut file = tokio::fs::File::create(path).await?;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}

/// Extract the task id list from an upload response body.
///
/// A body that is not JSON, lacks `task_ids`, or holds a non-list there
/// is a protocol violation.
pub fn parse_task_ids(body: &str) -> Result<Vec<TaskId>, ApiError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ApiError::Protocol(format!("upload response is not JSON: {e}")))?;

    let ids = value
        .get("task_ids")
        .ok_or_else(|| ApiError::Protocol("upload response is missing `task_ids`".into()))?
        .as_array()
        .ok_or_else(|| ApiError::Protocol("`task_ids` is not a list".into()))?;

    Ok(ids
        .iter()
        .map(|id| TaskId::new(id.as_str().unwrap_or_default()))
        .collect())
}

/// Human-readable message for a failed response.
fn error_message(status: u16, body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .filter(|m| !m.trim().is_empty());

    from_json.unwrap_or_else(|| {
        let body = body.trim();
        if body.is_empty() {
            format!("Error del servidor: {status}")
        } else {
            body.to_string()
        }
    })
}
