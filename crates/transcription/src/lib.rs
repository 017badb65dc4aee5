//! Transcription engines and transcript summarization for the meeting note taker.
//!
//! Engines are picked by name through [`select`] and share the one-method
//! [`TranscriptionEngine`] capability:
//!
//! - [`RestPollingEngine`]: uploads audio, submits a job and polls its status
//!   with capped exponential backoff (AssemblyAI).
//! - [`LongRunningEngine`]: submits audio as a long-running operation and waits
//!   on it (Google Cloud Speech).
//!
//! # Example
//!
//! ```no_run
//! use notetaker_transcription::{select, summarize, transcribe, CancellationToken};
//! use secrecy::SecretString;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = select("AssemblyAI", Some(SecretString::from("aai-key")))?;
//!     let audio = std::fs::File::open("standup.mp3")?;
//!     let transcript = transcribe(&engine, "en", Box::new(audio), &CancellationToken::new())?;
//!
//!     let openai_key = SecretString::from("sk-key");
//!     let summary = summarize(&openai_key, &transcript, "gpt-4", "Summarize:")?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```

mod assemblyai;
mod engine;
mod error;
mod google;
mod poll;
mod summarize;
#[cfg(test)]
mod test_server;

use std::io::Read;

pub use assemblyai::{AssemblyAiClient, JobApi, JobRequest, JobState, JobStatus, RestPollingEngine};
pub use engine::{
    select, select_with, CredentialSource, Engine, EngineKind, EngineOptions, EnvCredentials,
    TranscriptionEngine,
};
pub use error::{SummaryError, TranscriptionError};
pub use google::{
    GoogleAuth, GoogleSpeechClient, LongRunningEngine, Operation, OperationError, OperationsApi,
    RecognitionAudio, RecognitionConfig, RecognizeRequest, RecognizeResponse, SpeechAlternative,
    SpeechResult, GOOGLE_ACCESS_TOKEN_VAR,
};
pub use poll::{
    poll_until, poll_until_after_delay, Backoff, PollPolicy, PollStep, Sleeper, ThreadSleeper,
};
pub use summarize::{
    summarize, Summarizer, DEFAULT_SUMMARY_MODEL, DEFAULT_SUMMARY_PROMPT, SUMMARY_MODELS,
};
pub use tokio_util::sync::CancellationToken;

/// Transcribe `audio` with `engine`.
pub fn transcribe(
    engine: &dyn TranscriptionEngine,
    language: &str,
    audio: Box<dyn Read + Send>,
    cancel: &CancellationToken,
) -> Result<String, TranscriptionError> {
    engine.transcribe(language, audio, cancel)
}
