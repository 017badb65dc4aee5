//! The note-taking workflow: validate audio, transcribe, summarize.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Instant;

use log::{error, info, warn};
use notetaker_transcription::{
    select_with, transcribe, CancellationToken, EngineKind, EngineOptions, SummaryError,
    Summarizer, TranscriptionEngine, TranscriptionError,
};
use secrecy::{ExposeSecret, SecretString};

use crate::config::AppConfig;

/// Audio formats accepted for upload
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "aac", "m4a", "mp3", "webm", "mp4", "mpga", "wav", "mpeg",
];

const MAX_UPLOAD_BYTES: u64 = 1024 * 1024 * 1024; // 1GB
const MAX_INLINE_BYTES: u64 = 10 * 1024 * 1024; // 10MB inline content limit

#[derive(Debug, thiserror::Error)]
pub enum NotesError {
    #[error("Audio file not found: {0}")]
    FileNotFound(String),
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),
    #[error("File too large: {size_bytes} bytes (maximum {max_bytes})")]
    FileTooLarge { size_bytes: u64, max_bytes: u64 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Transcription(#[from] TranscriptionError),
    #[error(transparent)]
    Summary(#[from] SummaryError),
}

impl NotesError {
    /// Returns a user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            NotesError::FileNotFound(path) => format!("Audio file not found: {}", path),
            NotesError::UnsupportedFormat(ext) => format!(
                "Unsupported audio format '{}'. Use one of: {}.",
                ext,
                SUPPORTED_EXTENSIONS.join(", ")
            ),
            NotesError::FileTooLarge { size_bytes, max_bytes } => format!(
                "Audio file too large ({}MB). Maximum is {}MB for this engine.",
                size_bytes / (1024 * 1024),
                max_bytes / (1024 * 1024)
            ),
            NotesError::Io(_) => "Failed to read audio file. Please try again.".to_string(),
            NotesError::Transcription(e) => e.user_message(),
            NotesError::Summary(e) => e.user_message(),
        }
    }
}

/// Summarization backend used by [`take_notes`].
pub trait SummaryBackend {
    fn summarize(
        &self,
        credential: &SecretString,
        transcript: &str,
        model: &str,
        prompt: &str,
    ) -> Result<String, SummaryError>;
}

impl SummaryBackend for Summarizer {
    fn summarize(
        &self,
        credential: &SecretString,
        transcript: &str,
        model: &str,
        prompt: &str,
    ) -> Result<String, SummaryError> {
        Summarizer::summarize(self, credential, transcript, model, prompt)
    }
}

/// Transcript and summary of one recording.
#[derive(Debug, Clone, PartialEq)]
pub struct Notes {
    pub transcript: String,
    /// `None` when the recording had no speech to summarize
    pub summary: Option<String>,
}

impl Notes {
    pub fn to_markdown(&self) -> String {
        let summary = self
            .summary
            .as_deref()
            .unwrap_or("_No speech detected, nothing to summarize._");
        format!(
            "### Transcription:\n\n<details><summary>Click to view</summary><p><pre><code>{}</code></pre></p></details>\n\n### Summary:\n\n{}\n",
            escape_html(&self.transcript),
            summary
        )
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Largest audio file the engine accepts.
pub fn max_audio_bytes(engine: EngineKind) -> u64 {
    match engine {
        EngineKind::AssemblyAi => MAX_UPLOAD_BYTES,
        // Audio is sent base64-encoded inside the request body
        EngineKind::Google => MAX_INLINE_BYTES,
    }
}

/// Validate file exists, has a supported extension and is within size limits
pub fn validate_audio_file(path: &Path, engine: EngineKind) -> Result<(), NotesError> {
    if !path.is_file() {
        error!("File not found: {:?}", path);
        return Err(NotesError::FileNotFound(path.to_string_lossy().to_string()));
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        error!("Unsupported audio format: {:?}", path);
        return Err(NotesError::UnsupportedFormat(extension));
    }

    let size_bytes = std::fs::metadata(path)?.len();
    let max_bytes = max_audio_bytes(engine);
    if size_bytes > max_bytes {
        error!("File too large: {} bytes > {} bytes", size_bytes, max_bytes);
        return Err(NotesError::FileTooLarge {
            size_bytes,
            max_bytes,
        });
    }

    Ok(())
}

/// Transcribe and summarize `audio_path` with the given engine and summarizer.
pub fn take_notes(
    engine: &dyn TranscriptionEngine,
    summarizer: &dyn SummaryBackend,
    config: &AppConfig,
    audio_path: &Path,
    cancel: &CancellationToken,
) -> Result<Notes, NotesError> {
    validate_audio_file(audio_path, config.engine)?;

    let started_at = Instant::now();
    info!("Transcribing {:?} ({})", audio_path, config.language);
    let audio = BufReader::new(File::open(audio_path)?);
    let transcript = transcribe(engine, &config.language, Box::new(audio), cancel)?;
    info!(
        "Transcription finished in {}ms",
        started_at.elapsed().as_millis()
    );

    if transcript.trim().is_empty() {
        warn!("Transcript is empty, skipping summarization");
        return Ok(Notes {
            transcript,
            summary: None,
        });
    }
    if cancel.is_cancelled() {
        return Err(TranscriptionError::Cancelled.into());
    }

    info!("Summarizing with {}", config.openai_model);
    let summary = summarizer.summarize(
        &config.openai_api_key,
        &transcript,
        &config.openai_model,
        &config.prompt,
    )?;

    Ok(Notes {
        transcript,
        summary: Some(summary),
    })
}

/// Select the configured engine and produce notes for `audio_path`.
pub fn generate_notes(
    config: &AppConfig,
    audio_path: &Path,
    cancel: &CancellationToken,
) -> Result<Notes, NotesError> {
    let options = EngineOptions {
        poll_policy: config.poll_policy.clone(),
        ..EngineOptions::default()
    };
    let credential = config
        .transcription_key
        .as_ref()
        .map(|key| SecretString::from(key.expose_secret().to_owned()));
    let engine = select_with(config.engine, credential, &options)?;
    let summarizer = Summarizer::new()?;

    take_notes(&engine, &summarizer, config, audio_path, cancel)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io::Read;
    use std::path::PathBuf;

    use notetaker_transcription::PollPolicy;

    use super::*;

    struct TempAudio {
        path: PathBuf,
    }

    impl TempAudio {
        fn new(extension: &str, bytes: &[u8]) -> Self {
            let path = std::env::temp_dir().join(format!(
                "notetaker-test-{}.{}",
                uuid::Uuid::new_v4(),
                extension
            ));
            std::fs::write(&path, bytes).unwrap();
            Self { path }
        }
    }

    impl Drop for TempAudio {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    struct FixedEngine(Result<&'static str, fn() -> TranscriptionError>);

    impl TranscriptionEngine for FixedEngine {
        fn transcribe(
            &self,
            _language: &str,
            mut audio: Box<dyn Read + Send>,
            _cancel: &CancellationToken,
        ) -> Result<String, TranscriptionError> {
            let mut bytes = Vec::new();
            audio.read_to_end(&mut bytes)?;
            match &self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(make_error) => Err(make_error()),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSummarizer {
        calls: RefCell<Vec<(String, String, String)>>,
    }

    impl SummaryBackend for RecordingSummarizer {
        fn summarize(
            &self,
            _credential: &SecretString,
            transcript: &str,
            model: &str,
            prompt: &str,
        ) -> Result<String, SummaryError> {
            self.calls.borrow_mut().push((
                transcript.to_string(),
                model.to_string(),
                prompt.to_string(),
            ));
            Ok(format!("- {} words", transcript.split_whitespace().count()))
        }
    }

    fn config(engine: EngineKind) -> AppConfig {
        AppConfig {
            engine,
            transcription_key: Some(SecretString::from("aai")),
            openai_api_key: SecretString::from("sk"),
            openai_model: "gpt-4".to_string(),
            language: "en".to_string(),
            prompt: "Summarize:".to_string(),
            poll_policy: PollPolicy::default(),
        }
    }

    #[test]
    fn test_take_notes_passes_transcript_to_summarizer() {
        let audio = TempAudio::new("mp3", b"ID3 audio");
        let summarizer = RecordingSummarizer::default();

        let notes = take_notes(
            &FixedEngine(Ok("we shipped the release")),
            &summarizer,
            &config(EngineKind::AssemblyAi),
            &audio.path,
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(notes.transcript, "we shipped the release");
        assert_eq!(notes.summary.as_deref(), Some("- 4 words"));
        assert_eq!(
            *summarizer.calls.borrow(),
            vec![(
                "we shipped the release".to_string(),
                "gpt-4".to_string(),
                "Summarize:".to_string()
            )]
        );
    }

    #[test]
    fn test_empty_transcript_skips_summary() {
        let audio = TempAudio::new("wav", b"RIFF");
        let summarizer = RecordingSummarizer::default();

        let notes = take_notes(
            &FixedEngine(Ok("  ")),
            &summarizer,
            &config(EngineKind::AssemblyAi),
            &audio.path,
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(notes.summary, None);
        assert!(summarizer.calls.borrow().is_empty());
    }

    #[test]
    fn test_transcription_error_is_propagated_not_summarized() {
        let audio = TempAudio::new("m4a", b"audio");
        let summarizer = RecordingSummarizer::default();

        let result = take_notes(
            &FixedEngine(Err(|| TranscriptionError::Submission {
                status: 400,
                body: r#"{"error":"bad request"}"#.to_string(),
            })),
            &summarizer,
            &config(EngineKind::AssemblyAi),
            &audio.path,
            &CancellationToken::new(),
        );

        assert!(matches!(
            result,
            Err(NotesError::Transcription(TranscriptionError::Submission { .. }))
        ));
        assert!(summarizer.calls.borrow().is_empty());
    }

    #[test]
    fn test_validate_audio_file() {
        let mp3 = TempAudio::new("MP3", b"audio");
        let txt = TempAudio::new("txt", b"not audio");
        let missing = std::env::temp_dir().join("notetaker-test-missing.wav");

        assert!(validate_audio_file(&mp3.path, EngineKind::AssemblyAi).is_ok());
        assert!(matches!(
            validate_audio_file(&txt.path, EngineKind::AssemblyAi),
            Err(NotesError::UnsupportedFormat(ext)) if ext == "txt"
        ));
        assert!(matches!(
            validate_audio_file(&missing, EngineKind::AssemblyAi),
            Err(NotesError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_inline_engine_rejects_large_files() {
        let big = TempAudio::new("wav", &vec![0u8; (MAX_INLINE_BYTES + 1) as usize]);

        assert!(matches!(
            validate_audio_file(&big.path, EngineKind::Google),
            Err(NotesError::FileTooLarge { .. })
        ));
        assert!(validate_audio_file(&big.path, EngineKind::AssemblyAi).is_ok());
    }

    #[test]
    fn test_markdown_rendering() {
        let notes = Notes {
            transcript: "A <b>bold</b> claim & more".to_string(),
            summary: Some("- One point".to_string()),
        };
        let markdown = notes.to_markdown();

        assert!(markdown.starts_with("### Transcription:"));
        assert!(markdown.contains("A &lt;b&gt;bold&lt;/b&gt; claim &amp; more"));
        assert!(markdown.contains("### Summary:\n\n- One point"));

        let silent = Notes {
            transcript: String::new(),
            summary: None,
        };
        assert!(silent.to_markdown().contains("nothing to summarize"));
    }
}
