use std::fmt;
use std::io::Read;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use log::info;
use secrecy::{ExposeSecret, SecretString};
use tokio_util::sync::CancellationToken;

use crate::assemblyai::{AssemblyAiClient, RestPollingEngine};
use crate::error::TranscriptionError;
use crate::google::{GoogleAuth, GoogleSpeechClient, LongRunningEngine};
use crate::poll::{PollPolicy, ThreadSleeper};

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Capability shared by all transcription backends.
pub trait TranscriptionEngine: Send + Sync {
    /// Transcribe `audio` to text using `language` as a hint.
    ///
    /// The audio source is consumed once. Blocks until the remote service
    /// finishes, the poll budget is exhausted, or `cancel` fires.
    fn transcribe(
        &self,
        language: &str,
        audio: Box<dyn Read + Send>,
        cancel: &CancellationToken,
    ) -> Result<String, TranscriptionError>;
}

/// Known transcription backends.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
pub enum EngineKind {
    #[strum(
        to_string = "AssemblyAI",
        serialize = "assemblyai",
        serialize = "assembly_ai"
    )]
    AssemblyAi,
    #[strum(to_string = "Google", serialize = "google", serialize = "google_cloud")]
    Google,
}

impl EngineKind {
    pub fn parse(engine_id: &str) -> Result<Self, TranscriptionError> {
        EngineKind::from_str(engine_id.trim()).map_err(|_| {
            TranscriptionError::Configuration(format!("unknown engine '{}'", engine_id))
        })
    }
}

/// Looks up credentials that a backend discovers from its environment
/// rather than receiving from the caller.
pub trait CredentialSource: Send + Sync {
    fn lookup(&self, name: &str) -> Option<SecretString>;
}

/// Reads ambient credentials from process environment variables.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentials;

impl CredentialSource for EnvCredentials {
    fn lookup(&self, name: &str) -> Option<SecretString> {
        std::env::var(name)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(SecretString::from)
    }
}

/// Construction options shared by every engine.
#[derive(Clone)]
pub struct EngineOptions {
    pub poll_policy: PollPolicy,
    pub http_timeout: Duration,
    pub ambient_credentials: Arc<dyn CredentialSource>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            poll_policy: PollPolicy::default(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            ambient_credentials: Arc::new(EnvCredentials),
        }
    }
}

impl fmt::Debug for EngineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineOptions")
            .field("poll_policy", &self.poll_policy)
            .field("http_timeout", &self.http_timeout)
            .finish_non_exhaustive()
    }
}

/// A selected transcription engine.
pub enum Engine {
    RestPolling(RestPollingEngine),
    LongRunning(LongRunningEngine),
}

impl Engine {
    pub fn kind(&self) -> EngineKind {
        match self {
            Engine::RestPolling(_) => EngineKind::AssemblyAi,
            Engine::LongRunning(_) => EngineKind::Google,
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Engine").field(&self.kind()).finish()
    }
}

impl TranscriptionEngine for Engine {
    fn transcribe(
        &self,
        language: &str,
        audio: Box<dyn Read + Send>,
        cancel: &CancellationToken,
    ) -> Result<String, TranscriptionError> {
        match self {
            Engine::RestPolling(engine) => engine.transcribe(language, audio, cancel),
            Engine::LongRunning(engine) => engine.transcribe(language, audio, cancel),
        }
    }
}

/// Select an engine by identifier with default options.
///
/// Performs no network I/O. Unknown identifiers fail with
/// [`TranscriptionError::Configuration`].
pub fn select(
    engine_id: &str,
    credential: Option<SecretString>,
) -> Result<Engine, TranscriptionError> {
    select_with(
        EngineKind::parse(engine_id)?,
        credential,
        &EngineOptions::default(),
    )
}

/// Select an engine with explicit options.
pub fn select_with(
    kind: EngineKind,
    credential: Option<SecretString>,
    options: &EngineOptions,
) -> Result<Engine, TranscriptionError> {
    let credential = credential.filter(|c| !c.expose_secret().trim().is_empty());

    let engine = match kind {
        EngineKind::AssemblyAi => {
            let api_key = credential.ok_or_else(|| {
                TranscriptionError::Configuration("AssemblyAI requires an API key".to_string())
            })?;
            let client = AssemblyAiClient::new(api_key, options.http_timeout)?;
            Engine::RestPolling(RestPollingEngine::new(
                Box::new(client),
                options.poll_policy.clone(),
                Box::new(ThreadSleeper),
            ))
        }
        EngineKind::Google => {
            let auth = match credential {
                Some(api_key) => GoogleAuth::ApiKey(api_key),
                None => GoogleAuth::Ambient(Arc::clone(&options.ambient_credentials)),
            };
            let client = GoogleSpeechClient::new(auth, options.http_timeout)?;
            Engine::LongRunning(LongRunningEngine::new(
                Box::new(client),
                options.poll_policy.clone(),
                Box::new(ThreadSleeper),
            ))
        }
    };

    info!("Selected transcription engine: {}", kind);
    Ok(engine)
}
