//! Long-running-operation transcription via the Google Cloud Speech-to-Text v1 REST API.

use std::fmt;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{error, info};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::engine::{CredentialSource, TranscriptionEngine};
use crate::error::TranscriptionError;
use crate::poll::{poll_until_after_delay, PollPolicy, PollStep, Sleeper};

const GOOGLE_SPEECH_BASE_URL: &str = "https://speech.googleapis.com/v1";

/// Environment variable holding an OAuth access token, e.g. from
/// `gcloud auth print-access-token`.
pub const GOOGLE_ACCESS_TOKEN_VAR: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionConfig {
    pub encoding: String,
    pub language_code: String,
    pub diarization_config: DiarizationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiarizationConfig {
    pub enable_speaker_diarization: bool,
}

impl RecognitionConfig {
    /// Encoding is left to the service to detect; speaker diarization is on.
    pub fn new(language: &str) -> Self {
        Self {
            encoding: "ENCODING_UNSPECIFIED".to_string(),
            language_code: language.to_string(),
            diarization_config: DiarizationConfig {
                enable_speaker_diarization: true,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionAudio {
    /// Base64 encoded audio bytes
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognizeRequest {
    pub config: RecognitionConfig,
    pub audio: RecognitionAudio,
}

/// Remote operation handle as returned by the operations endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<OperationError>,
    #[serde(default)]
    pub response: Option<RecognizeResponse>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecognizeResponse {
    #[serde(default)]
    pub results: Vec<SpeechResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SpeechResult {
    /// Ranked best-first
    #[serde(default)]
    pub alternatives: Vec<SpeechAlternative>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SpeechAlternative {
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}

impl RecognizeResponse {
    /// Join the top alternative of each segment with single spaces, in order.
    /// Segments without alternatives contribute nothing.
    pub fn joined_transcript(&self) -> String {
        self.results
            .iter()
            .filter_map(|result| result.alternatives.first())
            .map(|alternative| alternative.transcript.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// HTTP surface of a long-running-operation speech provider.
pub trait OperationsApi: Send + Sync {
    /// Start recognition, returning the initial operation handle.
    fn start(&self, request: &RecognizeRequest) -> Result<Operation, TranscriptionError>;

    fn get(&self, name: &str) -> Result<Operation, TranscriptionError>;
}

/// How requests to Google are authenticated.
pub enum GoogleAuth {
    /// API key passed by the caller, sent as the `key` query parameter.
    ApiKey(SecretString),
    /// Bearer token discovered through an injected credential source at request time.
    Ambient(Arc<dyn CredentialSource>),
}

impl fmt::Debug for GoogleAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoogleAuth::ApiKey(_) => f.write_str("ApiKey([REDACTED])"),
            GoogleAuth::Ambient(_) => f.write_str("Ambient"),
        }
    }
}

/// Google Cloud Speech REST client
#[derive(Debug)]
pub struct GoogleSpeechClient {
    auth: GoogleAuth,
    http: reqwest::blocking::Client,
    base_url: String,
}

impl GoogleSpeechClient {
    pub fn new(auth: GoogleAuth, timeout: Duration) -> Result<Self, TranscriptionError> {
        Self::with_base_url(auth, timeout, GOOGLE_SPEECH_BASE_URL)
    }

    pub fn with_base_url(
        auth: GoogleAuth,
        timeout: Duration,
        base_url: &str,
    ) -> Result<Self, TranscriptionError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                TranscriptionError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            auth,
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn add_auth(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<reqwest::blocking::RequestBuilder, TranscriptionError> {
        match &self.auth {
            GoogleAuth::ApiKey(key) => Ok(request.query(&[("key", key.expose_secret())])),
            GoogleAuth::Ambient(source) => {
                let token = source.lookup(GOOGLE_ACCESS_TOKEN_VAR).ok_or_else(|| {
                    TranscriptionError::Configuration(format!(
                        "No Google API key given and {} is not set",
                        GOOGLE_ACCESS_TOKEN_VAR
                    ))
                })?;
                Ok(request.bearer_auth(token.expose_secret()))
            }
        }
    }

    fn send(
        &self,
        request: reqwest::blocking::RequestBuilder,
        rejected: fn(u16, String) -> TranscriptionError,
    ) -> Result<Operation, TranscriptionError> {
        let response = self.add_auth(request)?.send().map_err(|e| {
            error!("Speech API request error: {}", e);
            TranscriptionError::Transport(format!("Request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Speech API error response ({}): {}", status, body);
            return Err(rejected(status.as_u16(), body));
        }

        Ok(response.json()?)
    }
}

impl OperationsApi for GoogleSpeechClient {
    fn start(&self, request: &RecognizeRequest) -> Result<Operation, TranscriptionError> {
        let url = format!("{}/speech:longrunningrecognize", self.base_url);
        self.send(self.http.post(url).json(request), |status, body| {
            TranscriptionError::Submission { status, body }
        })
    }

    fn get(&self, name: &str) -> Result<Operation, TranscriptionError> {
        let url = format!("{}/operations/{}", self.base_url, name);
        self.send(self.http.get(url), |status, body| {
            TranscriptionError::Transport(format!(
                "Operation check returned {}: {}",
                status, body
            ))
        })
    }
}

/// Transcription engine that submits audio as a long-running operation and waits on it.
pub struct LongRunningEngine {
    api: Box<dyn OperationsApi>,
    policy: PollPolicy,
    sleeper: Box<dyn Sleeper>,
}

impl LongRunningEngine {
    pub fn new(api: Box<dyn OperationsApi>, policy: PollPolicy, sleeper: Box<dyn Sleeper>) -> Self {
        Self {
            api,
            policy,
            sleeper,
        }
    }

    fn resolve(operation: Operation) -> Result<PollStep<RecognizeResponse>, TranscriptionError> {
        if !operation.done {
            return Ok(PollStep::Pending);
        }
        if let Some(err) = operation.error {
            error!(
                "Operation {} failed ({}): {}",
                operation.name, err.code, err.message
            );
            return Err(TranscriptionError::TranscriptionFailed(err.message));
        }
        Ok(PollStep::Done(operation.response.unwrap_or_default()))
    }
}

impl TranscriptionEngine for LongRunningEngine {
    fn transcribe(
        &self,
        language: &str,
        mut audio: Box<dyn Read + Send>,
        cancel: &CancellationToken,
    ) -> Result<String, TranscriptionError> {
        // Inline recognition needs the whole file in the request body
        let mut bytes = Vec::new();
        audio.read_to_end(&mut bytes)?;

        let request = RecognizeRequest {
            config: RecognitionConfig::new(language),
            audio: RecognitionAudio {
                content: STANDARD.encode(&bytes),
            },
        };

        info!("Starting long-running recognition ({} bytes)", bytes.len());
        let operation = self.api.start(&request)?;
        let name = operation.name.clone();

        // The start response may already carry the finished result
        let response = match Self::resolve(operation)? {
            PollStep::Done(response) => response,
            PollStep::Pending => {
                info!("Waiting on operation {}", name);
                poll_until_after_delay(&self.policy, self.sleeper.as_ref(), cancel, |_| {
                    Self::resolve(self.api.get(&name)?)
                })?
            }
        };

        let text = response.joined_transcript();
        info!(
            "Transcription successful: {} segments, {} characters",
            response.results.len(),
            text.len()
        );
        Ok(text)
    }
}
