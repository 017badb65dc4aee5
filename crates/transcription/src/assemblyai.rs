//! REST-polling transcription via the AssemblyAI v2 API.
//!
//! One call runs one job: upload → submit → poll → extract.

use std::fmt;
use std::io::Read;
use std::time::Duration;

use log::{debug, error, info, warn};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::engine::TranscriptionEngine;
use crate::error::TranscriptionError;
use crate::poll::{poll_until, PollPolicy, PollStep, Sleeper};

const ASSEMBLYAI_UPLOAD_URL: &str = "https://api.assemblyai.com/v2/upload";
const ASSEMBLYAI_TRANSCRIPT_URL: &str = "https://api.assemblyai.com/v2/transcript";

/// Job creation payload. Speaker labels and topic categorization are always on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRequest {
    pub audio_url: String,
    pub iab_categories: bool,
    pub language_code: String,
    pub speaker_labels: bool,
}

impl JobRequest {
    pub fn new(audio_url: String, language: &str) -> Self {
        Self {
            audio_url,
            iab_categories: true,
            language_code: language.to_string(),
            speaker_labels: true,
        }
    }
}

/// Server-side job lifecycle as reported by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobState {
    Submitted,
    Queued,
    Processing,
    Completed,
    Error,
    #[serde(other)]
    Unknown,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobStatus {
    pub id: String,
    pub status: JobState,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// HTTP surface of a REST-polling transcription provider.
pub trait JobApi: Send + Sync {
    /// Stream raw audio to the provider, returning the URL of the stored file.
    fn upload(&self, audio: Box<dyn Read + Send>) -> Result<String, TranscriptionError>;

    /// Create a transcription job, returning its id.
    fn submit(&self, request: &JobRequest) -> Result<String, TranscriptionError>;

    fn status(&self, job_id: &str) -> Result<JobStatus, TranscriptionError>;
}

#[derive(Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Deserialize)]
struct SubmitResponse {
    id: String,
}

/// AssemblyAI HTTP client
pub struct AssemblyAiClient {
    api_key: SecretString,
    http: reqwest::blocking::Client,
    upload_url: String,
    transcript_url: String,
}

impl AssemblyAiClient {
    pub fn new(api_key: SecretString, timeout: Duration) -> Result<Self, TranscriptionError> {
        Self::with_base_urls(
            api_key,
            timeout,
            ASSEMBLYAI_UPLOAD_URL,
            ASSEMBLYAI_TRANSCRIPT_URL,
        )
    }

    /// Client against custom endpoints (self-hosted proxies, EU region).
    pub fn with_base_urls(
        api_key: SecretString,
        timeout: Duration,
        upload_url: &str,
        transcript_url: &str,
    ) -> Result<Self, TranscriptionError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                TranscriptionError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            api_key,
            http,
            upload_url: upload_url.to_string(),
            transcript_url: transcript_url.trim_end_matches('/').to_string(),
        })
    }

    fn add_auth(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        request.header("authorization", self.api_key.expose_secret())
    }

    fn error_body(response: reqwest::blocking::Response) -> (u16, String) {
        let status = response.status().as_u16();
        let body = response
            .text()
            .unwrap_or_else(|_| "Unknown error".to_string());
        (status, body)
    }
}

impl fmt::Debug for AssemblyAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssemblyAiClient")
            .field("api_key", &"[REDACTED]")
            .field("upload_url", &self.upload_url)
            .field("transcript_url", &self.transcript_url)
            .finish()
    }
}

impl JobApi for AssemblyAiClient {
    fn upload(&self, audio: Box<dyn Read + Send>) -> Result<String, TranscriptionError> {
        let request = self
            .http
            .post(&self.upload_url)
            .header("content-type", "application/octet-stream")
            .body(reqwest::blocking::Body::new(audio));

        let response = self.add_auth(request).send().map_err(|e| {
            error!("Upload request error: {}", e);
            TranscriptionError::Transport(format!("Upload request failed: {}", e))
        })?;

        if !response.status().is_success() {
            let (status, body) = Self::error_body(response);
            error!("Upload error response ({}): {}", status, body);
            return Err(TranscriptionError::Upload { status, body });
        }

        let parsed: UploadResponse = response.json()?;
        Ok(parsed.upload_url)
    }

    fn submit(&self, request: &JobRequest) -> Result<String, TranscriptionError> {
        let builder = self.http.post(&self.transcript_url).json(request);

        let response = self.add_auth(builder).send().map_err(|e| {
            error!("Submission request error: {}", e);
            TranscriptionError::Transport(format!("Submission request failed: {}", e))
        })?;

        if !response.status().is_success() {
            let (status, body) = Self::error_body(response);
            error!("Submission error response ({}): {}", status, body);
            return Err(TranscriptionError::Submission { status, body });
        }

        let parsed: SubmitResponse = response.json()?;
        Ok(parsed.id)
    }

    fn status(&self, job_id: &str) -> Result<JobStatus, TranscriptionError> {
        let url = format!("{}/{}", self.transcript_url, job_id);
        let response = self.add_auth(self.http.get(url)).send()?;

        if !response.status().is_success() {
            let (status, body) = Self::error_body(response);
            error!("Status check error response ({}): {}", status, body);
            return Err(TranscriptionError::Transport(format!(
                "Status check returned {}: {}",
                status, body
            )));
        }

        Ok(response.json()?)
    }
}

/// Transcription engine that uploads audio, submits a job and polls it to completion.
pub struct RestPollingEngine {
    api: Box<dyn JobApi>,
    policy: PollPolicy,
    sleeper: Box<dyn Sleeper>,
}

impl RestPollingEngine {
    pub fn new(api: Box<dyn JobApi>, policy: PollPolicy, sleeper: Box<dyn Sleeper>) -> Self {
        Self {
            api,
            policy,
            sleeper,
        }
    }
}

impl TranscriptionEngine for RestPollingEngine {
    fn transcribe(
        &self,
        language: &str,
        audio: Box<dyn Read + Send>,
        cancel: &CancellationToken,
    ) -> Result<String, TranscriptionError> {
        info!("Uploading audio");
        let audio_url = self.api.upload(audio)?;
        if cancel.is_cancelled() {
            return Err(TranscriptionError::Cancelled);
        }

        let job_id = self.api.submit(&JobRequest::new(audio_url, language))?;
        info!("Submitted transcription job {}", job_id);

        let text = poll_until(&self.policy, self.sleeper.as_ref(), cancel, |attempt| {
            let status = self.api.status(&job_id)?;
            match status.status {
                JobState::Completed => Ok(PollStep::Done(status.text.unwrap_or_default())),
                JobState::Error => {
                    let reason = status
                        .error
                        .unwrap_or_else(|| "provider reported an error".to_string());
                    error!("Transcription job {} failed: {}", job_id, reason);
                    Err(TranscriptionError::TranscriptionFailed(reason))
                }
                JobState::Unknown => {
                    warn!("Job {} reported an unrecognized status", job_id);
                    Ok(PollStep::Pending)
                }
                state => {
                    debug!("Job {} is {} (check {})", job_id, state, attempt);
                    Ok(PollStep::Pending)
                }
            }
        })?;

        info!("Transcription successful: {} characters", text.len());
        Ok(text)
    }
}
