use std::path::PathBuf;

use clap::Parser;
use secrecy::SecretString;

use crate::config::ConfigOverrides;

/// Transcribe a meeting recording and generate notes from it.
///
/// Any option left out is read from the environment (or a `.env` file) and
/// otherwise asked for interactively.
#[derive(Debug, Parser)]
#[command(name = "notetaker", version, about)]
pub struct Cli {
    /// Audio file to transcribe (aac, m4a, mp3, webm, mp4, mpga, wav, mpeg)
    pub audio: PathBuf,

    /// Transcription engine: AssemblyAI or Google [env: TRANSCRIPTION_ENGINE]
    #[arg(short, long)]
    pub engine: Option<String>,

    /// API key for the transcription engine [env: ASSEMBLYAI_API_KEY / GOOGLE_API_KEY]
    #[arg(long, value_name = "KEY")]
    pub transcription_key: Option<String>,

    /// OpenAI API key used for summarization [env: OPENAI_API_KEY]
    #[arg(long, value_name = "KEY")]
    pub openai_key: Option<String>,

    /// Summarization model [env: OPENAI_MODEL]
    #[arg(short, long)]
    pub model: Option<String>,

    /// Language code of the audio [env: AUDIO_LANGUAGE]
    #[arg(short, long)]
    pub language: Option<String>,

    /// Instructions given to the summarization model [env: SUMMARY_PROMPT]
    #[arg(long)]
    pub prompt: Option<String>,

    /// Maximum number of transcription status checks [env: NOTETAKER_MAX_POLLS]
    #[arg(long)]
    pub max_polls: Option<u32>,

    /// Maximum seconds to wait for the transcription [env: NOTETAKER_MAX_WAIT_SECS]
    #[arg(long, value_name = "SECS")]
    pub max_wait: Option<u64>,

    /// Never prompt; fail when a required setting is missing
    #[arg(long)]
    pub non_interactive: bool,
}

impl Cli {
    /// Split the parsed arguments into the audio path and configuration overrides.
    pub fn into_parts(self) -> (PathBuf, ConfigOverrides, bool) {
        let overrides = ConfigOverrides {
            engine: self.engine,
            transcription_key: self.transcription_key.map(SecretString::from),
            openai_api_key: self.openai_key.map(SecretString::from),
            openai_model: self.model,
            language: self.language,
            prompt: self.prompt,
            max_polls: self.max_polls,
            max_wait_secs: self.max_wait,
        };
        (self.audio, overrides, !self.non_interactive)
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags_into_overrides() {
        let cli = Cli::try_parse_from([
            "notetaker",
            "standup.m4a",
            "--engine",
            "Google",
            "--openai-key",
            "sk-1",
            "-l",
            "es",
            "--max-polls",
            "12",
            "--non-interactive",
        ])
        .unwrap();

        let (audio, overrides, interactive) = cli.into_parts();
        assert_eq!(audio, PathBuf::from("standup.m4a"));
        assert_eq!(overrides.engine.as_deref(), Some("Google"));
        assert_eq!(
            overrides.openai_api_key.as_ref().map(|k| k.expose_secret()),
            Some("sk-1")
        );
        assert_eq!(overrides.language.as_deref(), Some("es"));
        assert_eq!(overrides.max_polls, Some(12));
        assert!(overrides.transcription_key.is_none());
        assert!(!interactive);
    }

    #[test]
    fn test_audio_path_is_required() {
        assert!(Cli::try_parse_from(["notetaker"]).is_err());
    }
}
