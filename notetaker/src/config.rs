//! Configuration resolution.
//!
//! Every value is looked up in order: command-line flag, environment (after
//! `.env` is loaded), interactive prompt. Values missing from all three fall
//! back to a default where one exists.

use std::fmt;
use std::io::{self, BufRead, Write};
use std::marker::PhantomData;
use std::time::Duration;

use log::debug;
use notetaker_transcription::{
    EngineKind, PollPolicy, DEFAULT_SUMMARY_MODEL, DEFAULT_SUMMARY_PROMPT, SUMMARY_MODELS,
};
use secrecy::{ExposeSecret, SecretString};

pub const LANGUAGE_CHOICES: &[&str] = &["en", "es"];
const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("Failed to read input: {0}")]
    Prompt(#[from] io::Error),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::Missing(key) => format!(
                "{} is not configured. Set it in the environment, a .env file, or pass it as a flag.",
                key
            ),
            ConfigError::Invalid { key, reason } => format!("{} is invalid: {}", key, reason),
            ConfigError::Prompt(_) => "Could not read your answer from the terminal.".to_string(),
        }
    }
}

/// Values that can be read from a raw configuration string.
pub trait ConfigValue: Sized {
    /// Secret values are never echoed or logged.
    const SECRET: bool = false;

    fn parse_value(raw: &str) -> Result<Self, String>;
}

impl ConfigValue for String {
    fn parse_value(raw: &str) -> Result<Self, String> {
        Ok(raw.to_string())
    }
}

impl ConfigValue for SecretString {
    const SECRET: bool = true;

    fn parse_value(raw: &str) -> Result<Self, String> {
        Ok(SecretString::from(raw.to_string()))
    }
}

impl ConfigValue for EngineKind {
    fn parse_value(raw: &str) -> Result<Self, String> {
        EngineKind::parse(raw).map_err(|e| e.to_string())
    }
}

impl ConfigValue for u32 {
    fn parse_value(raw: &str) -> Result<Self, String> {
        raw.parse().map_err(|e| format!("{}", e))
    }
}

impl ConfigValue for u64 {
    fn parse_value(raw: &str) -> Result<Self, String> {
        raw.parse().map_err(|e| format!("{}", e))
    }
}

/// Type-safe configuration key that associates an environment name with its value type
#[derive(Debug, Clone, Copy)]
pub struct ConfigKey<T> {
    name: &'static str,
    label: &'static str,
    _phantom: PhantomData<T>,
}

impl<T> ConfigKey<T> {
    const fn new(name: &'static str, label: &'static str) -> Self {
        Self {
            name,
            label,
            _phantom: PhantomData,
        }
    }

    pub fn key_name(&self) -> &'static str {
        self.name
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl ConfigKey<EngineKind> {
    pub const ENGINE: Self = Self::new("TRANSCRIPTION_ENGINE", "Transcription engine");
}

impl ConfigKey<SecretString> {
    pub const ASSEMBLYAI_API_KEY: Self = Self::new("ASSEMBLYAI_API_KEY", "AssemblyAI API key");
    pub const GOOGLE_API_KEY: Self = Self::new("GOOGLE_API_KEY", "Google Cloud API key");
    pub const OPENAI_API_KEY: Self = Self::new("OPENAI_API_KEY", "OpenAI API key");
}

impl ConfigKey<String> {
    pub const OPENAI_MODEL: Self = Self::new("OPENAI_MODEL", "Summarization model");
    pub const AUDIO_LANGUAGE: Self = Self::new("AUDIO_LANGUAGE", "Language code of the audio");
    pub const SUMMARY_PROMPT: Self = Self::new("SUMMARY_PROMPT", "Summary prompt");
}

impl ConfigKey<u32> {
    pub const MAX_POLLS: Self = Self::new("NOTETAKER_MAX_POLLS", "Maximum status checks");
}

impl ConfigKey<u64> {
    pub const MAX_WAIT_SECS: Self = Self::new("NOTETAKER_MAX_WAIT_SECS", "Maximum wait in seconds");
}

/// Read-only source of raw configuration strings.
pub trait ConfigSource {
    fn get_raw(&self, name: &str) -> Option<String>;
}

/// Process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn get_raw(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Asks the user for values that are not configured anywhere else.
pub trait Prompter {
    /// Returns `None` when no answer is available (non-interactive or empty input).
    fn ask(&self, label: &str, secret: bool, choices: &[&str]) -> io::Result<Option<String>>;
}

/// Never prompts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl Prompter for NoPrompt {
    fn ask(&self, _label: &str, _secret: bool, _choices: &[&str]) -> io::Result<Option<String>> {
        Ok(None)
    }
}

/// Prompts on stderr and reads a line from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn ask(&self, label: &str, secret: bool, choices: &[&str]) -> io::Result<Option<String>> {
        let mut stderr = io::stderr();
        if choices.is_empty() {
            write!(stderr, "Enter your {}: ", label)?;
        } else {
            write!(stderr, "{} [{}]: ", label, choices.join(", "))?;
        }
        if secret {
            write!(stderr, "(input is visible) ")?;
        }
        stderr.flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        let answer = line.trim();

        if answer.is_empty() {
            return Ok(None);
        }
        // A bare number picks from the offered choices
        if let Ok(index) = answer.parse::<usize>() {
            if let Some(choice) = index.checked_sub(1).and_then(|i| choices.get(i)) {
                return Ok(Some(choice.to_string()));
            }
        }
        Ok(Some(answer.to_string()))
    }
}

/// Values given on the command line; they win over every other source.
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub engine: Option<String>,
    pub transcription_key: Option<SecretString>,
    pub openai_api_key: Option<SecretString>,
    pub openai_model: Option<String>,
    pub language: Option<String>,
    pub prompt: Option<String>,
    pub max_polls: Option<u32>,
    pub max_wait_secs: Option<u64>,
}

/// Fully resolved application settings.
pub struct AppConfig {
    pub engine: EngineKind,
    /// Absent for engines that discover credentials from their environment
    pub transcription_key: Option<SecretString>,
    pub openai_api_key: SecretString,
    pub openai_model: String,
    pub language: String,
    pub prompt: String,
    pub poll_policy: PollPolicy,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("engine", &self.engine)
            .field(
                "transcription_key",
                &self.transcription_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("openai_api_key", &"[REDACTED]")
            .field("openai_model", &self.openai_model)
            .field("language", &self.language)
            .field("prompt", &self.prompt)
            .field("poll_policy", &self.poll_policy)
            .finish()
    }
}

/// Resolves configuration keys against a source and a prompter.
pub struct Resolver<'a> {
    source: &'a dyn ConfigSource,
    prompter: &'a dyn Prompter,
}

impl<'a> Resolver<'a> {
    pub fn new(source: &'a dyn ConfigSource, prompter: &'a dyn Prompter) -> Self {
        Self { source, prompter }
    }

    /// Resolve `key` from the environment, then the prompter. Blank values count as unset.
    pub fn lookup<T: ConfigValue>(
        &self,
        key: &ConfigKey<T>,
        choices: &[&str],
    ) -> Result<Option<T>, ConfigError> {
        let raw = match self.source.get_raw(key.key_name()) {
            Some(value) if !value.trim().is_empty() => {
                debug!("{} taken from environment", key.key_name());
                Some(value)
            }
            _ => self
                .prompter
                .ask(key.label(), T::SECRET, choices)?
                .filter(|value| !value.trim().is_empty()),
        };

        raw.map(|value| {
            T::parse_value(value.trim()).map_err(|reason| ConfigError::Invalid {
                key: key.key_name(),
                reason,
            })
        })
        .transpose()
    }

    fn resolve<T: ConfigValue>(
        &self,
        key: &ConfigKey<T>,
        flag: Option<T>,
        choices: &[&str],
    ) -> Result<Option<T>, ConfigError> {
        match flag {
            Some(value) => Ok(Some(value)),
            None => self.lookup(key, choices),
        }
    }

    fn resolve_silent<T: ConfigValue>(
        &self,
        key: &ConfigKey<T>,
        flag: Option<T>,
    ) -> Result<Option<T>, ConfigError> {
        if flag.is_some() {
            return Ok(flag);
        }
        Resolver::new(self.source, &NoPrompt).lookup(key, &[])
    }

    /// Resolve the full application configuration.
    pub fn resolve_app_config(&self, overrides: ConfigOverrides) -> Result<AppConfig, ConfigError> {
        let engine_flag = overrides
            .engine
            .as_deref()
            .map(EngineKind::parse_value)
            .transpose()
            .map_err(|reason| ConfigError::Invalid {
                key: ConfigKey::ENGINE.key_name(),
                reason,
            })?;
        let engine = self
            .resolve_silent(&ConfigKey::ENGINE, engine_flag)?
            .unwrap_or(EngineKind::AssemblyAi);

        let transcription_key = match engine {
            EngineKind::AssemblyAi => Some(
                self.resolve(
                    &ConfigKey::ASSEMBLYAI_API_KEY,
                    overrides.transcription_key,
                    &[],
                )?
                .ok_or(ConfigError::Missing(ConfigKey::ASSEMBLYAI_API_KEY.key_name()))?,
            ),
            // Google falls back to ambient credentials, so never prompt for a key
            EngineKind::Google => {
                self.resolve_silent(&ConfigKey::GOOGLE_API_KEY, overrides.transcription_key)?
            }
        };

        let openai_api_key = self
            .resolve(&ConfigKey::OPENAI_API_KEY, overrides.openai_api_key, &[])?
            .filter(|key| !key.expose_secret().trim().is_empty())
            .ok_or(ConfigError::Missing(ConfigKey::OPENAI_API_KEY.key_name()))?;

        let openai_model = self
            .resolve(&ConfigKey::OPENAI_MODEL, overrides.openai_model, SUMMARY_MODELS)?
            .unwrap_or_else(|| DEFAULT_SUMMARY_MODEL.to_string());

        let language = self
            .resolve(&ConfigKey::AUDIO_LANGUAGE, overrides.language, LANGUAGE_CHOICES)?
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        let prompt = self
            .resolve_silent(&ConfigKey::SUMMARY_PROMPT, overrides.prompt)?
            .unwrap_or_else(|| DEFAULT_SUMMARY_PROMPT.to_string());

        let mut poll_policy = PollPolicy::default();
        if let Some(max_polls) = self.resolve_silent(&ConfigKey::MAX_POLLS, overrides.max_polls)? {
            if max_polls == 0 {
                return Err(ConfigError::Invalid {
                    key: ConfigKey::MAX_POLLS.key_name(),
                    reason: "must be at least 1".to_string(),
                });
            }
            poll_policy.max_attempts = max_polls;
        }
        let max_wait_secs =
            self.resolve_silent(&ConfigKey::MAX_WAIT_SECS, overrides.max_wait_secs)?;
        if let Some(secs) = max_wait_secs {
            poll_policy.max_wait = Duration::from_secs(secs);
        }

        Ok(AppConfig {
            engine,
            transcription_key,
            openai_api_key,
            openai_model,
            language,
            prompt,
            poll_policy,
        })
    }
}
