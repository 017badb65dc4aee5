use std::time::Duration;

/// Errors raised by engine selection and transcription.
///
/// A provider error body is never returned as a transcript: every failing
/// step maps to its own variant.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TranscriptionError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Audio upload failed with status {status}: {body}")]
    Upload { status: u16, body: String },
    #[error("Transcription job submission failed with status {status}: {body}")]
    Submission { status: u16, body: String },
    #[error("Transcription did not finish after {attempts} status checks ({waited:?} waited)")]
    PollTimeout { attempts: u32, waited: Duration },
    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Unexpected response from provider: {0}")]
    InvalidResponse(String),
    #[error("Transcription cancelled")]
    Cancelled,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for TranscriptionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TranscriptionError::InvalidResponse(err.to_string())
        } else {
            TranscriptionError::Transport(err.to_string())
        }
    }
}

impl TranscriptionError {
    /// Transport failures are the only ones worth retrying at the caller's discretion.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TranscriptionError::Transport(_))
    }

    /// Returns a user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            TranscriptionError::Configuration(msg) => format!("Configuration problem: {}", msg),
            TranscriptionError::Upload { status, .. } | TranscriptionError::Submission { status, .. }
                if *status == 401 || *status == 403 =>
            {
                "Invalid transcription API key. Check your settings.".to_string()
            }
            TranscriptionError::Upload { status, .. } | TranscriptionError::Submission { status, .. }
                if *status == 429 =>
            {
                "Rate limit reached. Please wait and retry.".to_string()
            }
            TranscriptionError::Upload { .. } => {
                "Failed to upload the audio file. Please try again.".to_string()
            }
            TranscriptionError::Submission { body, .. } => {
                format!("The transcription service rejected the request: {}", body)
            }
            TranscriptionError::PollTimeout { .. } => {
                "Transcription took too long. Try again.".to_string()
            }
            TranscriptionError::TranscriptionFailed(msg) => {
                format!("Transcription failed: {}", msg)
            }
            TranscriptionError::Transport(_) => {
                "Could not reach the transcription service. Check your connection.".to_string()
            }
            TranscriptionError::InvalidResponse(_) => {
                "The transcription service returned an unexpected response.".to_string()
            }
            TranscriptionError::Cancelled => "Transcription cancelled.".to_string(),
            TranscriptionError::Io(_) => "Failed to read the audio file.".to_string(),
        }
    }
}

/// Errors raised by transcript summarization.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SummaryError {
    #[error("Invalid summarization input: {0}")]
    InvalidInput(&'static str),
    #[error("Summarization API returned status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Summarization API returned no output text")]
    EmptyResponse,
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Unexpected response from summarization API: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for SummaryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SummaryError::InvalidResponse(err.to_string())
        } else {
            SummaryError::Transport(err.to_string())
        }
    }
}

impl SummaryError {
    pub fn user_message(&self) -> String {
        match self {
            SummaryError::InvalidInput(what) => format!("Cannot summarize: {}", what),
            SummaryError::Api { status, .. } if *status == 401 => {
                "Invalid summarization API key. Check your settings.".to_string()
            }
            SummaryError::Api { status, .. } if *status == 429 => {
                "Rate limit reached. Please wait and retry.".to_string()
            }
            SummaryError::Api { status, body } => {
                format!("Summarization failed ({}): {}", status, body)
            }
            SummaryError::EmptyResponse => "The summarization model returned nothing.".to_string(),
            SummaryError::Transport(_) => {
                "Could not reach the summarization service. Check your connection.".to_string()
            }
            SummaryError::InvalidResponse(_) => {
                "The summarization service returned an unexpected response.".to_string()
            }
        }
    }
}
