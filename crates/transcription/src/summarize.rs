use std::time::{Duration, Instant};

use log::{error, info, warn};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use crate::error::SummaryError;

const OPENAI_RESPONSES_URL: &str = "https://api.openai.com/v1/responses";
const OPENAI_SUMMARY_TIMEOUT_SECS: u64 = 120;

pub const DEFAULT_SUMMARY_MODEL: &str = "gpt-4";
pub const DEFAULT_SUMMARY_PROMPT: &str = "Summarize the following audio transcription with a list of the key points with the speakers in the original language:";

/// Models offered when the caller has not picked one.
pub const SUMMARY_MODELS: &[&str] = &["gpt-3.5-turbo", "gpt-3.5-turbo-16k", "gpt-4-0613"];

/// Summarizes transcripts with the OpenAI Responses API.
#[derive(Debug, Clone)]
pub struct Summarizer {
    http: reqwest::blocking::Client,
    url: String,
}

impl Summarizer {
    pub fn new() -> Result<Self, SummaryError> {
        Self::with_url(
            OPENAI_RESPONSES_URL,
            Duration::from_secs(OPENAI_SUMMARY_TIMEOUT_SECS),
        )
    }

    pub fn with_url(url: &str, timeout: Duration) -> Result<Self, SummaryError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SummaryError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }

    /// Summarize `transcript` with `model`, using `prompt` as the instructions.
    pub fn summarize(
        &self,
        credential: &SecretString,
        transcript: &str,
        model: &str,
        prompt: &str,
    ) -> Result<String, SummaryError> {
        let started_at = Instant::now();
        let payload = build_payload(credential, transcript, model, prompt)?;

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(credential.expose_secret())
            .json(&payload)
            .send()
            .map_err(|e| {
                error!("Summarization request failed: {e}");
                SummaryError::Transport(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .unwrap_or_else(|_| "Unknown error body".to_string());
            error!("Summarization API error ({status}): {body}");
            return Err(SummaryError::Api { status, body });
        }

        let json: Value = response.json()?;

        match extract_output_text(&json) {
            Some(summary) => {
                info!(
                    "Summarization succeeded in {}ms (input_len={}, output_len={})",
                    started_at.elapsed().as_millis(),
                    transcript.len(),
                    summary.len()
                );
                Ok(summary)
            }
            None => {
                warn!(
                    "Summarization response had no output text after {}ms",
                    started_at.elapsed().as_millis()
                );
                Err(SummaryError::EmptyResponse)
            }
        }
    }
}

/// Summarize with a fresh client against the default endpoint.
pub fn summarize(
    credential: &SecretString,
    transcript: &str,
    model: &str,
    prompt: &str,
) -> Result<String, SummaryError> {
    Summarizer::new()?.summarize(credential, transcript, model, prompt)
}

fn build_payload(
    credential: &SecretString,
    transcript: &str,
    model: &str,
    prompt: &str,
) -> Result<Value, SummaryError> {
    if credential.expose_secret().trim().is_empty() {
        return Err(SummaryError::InvalidInput("API key is empty"));
    }
    let transcript = transcript.trim();
    if transcript.is_empty() {
        return Err(SummaryError::InvalidInput("transcript is empty"));
    }
    let model = model.trim();
    if model.is_empty() {
        return Err(SummaryError::InvalidInput("model is empty"));
    }
    let prompt = match prompt.trim() {
        "" => DEFAULT_SUMMARY_PROMPT,
        prompt => prompt,
    };

    Ok(json!({
        "model": model,
        "instructions": prompt,
        "input": transcript
    }))
}

fn extract_output_text(response_json: &Value) -> Option<String> {
    // Some API shapes include top-level "output_text"
    if let Some(text) = response_json.get("output_text").and_then(Value::as_str) {
        let text = text.trim();
        if !text.is_empty() {
            return Some(text.to_string());
        }
    }

    // output[].content[] where content.type == "output_text"
    let output = response_json.get("output")?.as_array()?;
    let merged = output
        .iter()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|content| content.get("type").and_then(Value::as_str) == Some("output_text"))
        .filter_map(|content| content.get("text").and_then(Value::as_str))
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if merged.is_empty() {
        None
    } else {
        Some(merged)
    }
}
