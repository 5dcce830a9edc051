//! Gemini text generation backend
//!
//! Calls the Generative Language REST API (`models/{model}:generateContent`).
//! All settings come from an explicit [`GeminiConfig`]; reading the API key
//! from the environment is left to the binaries.

use crate::error::{MtError, MtResult};
use crate::generator::TextGenerator;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Connection settings for the Gemini API
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 60,
        }
    }
}

impl GeminiConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &mask_key(&self.api_key))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn mask_key(key: &str) -> String {
    if key.is_empty() {
        "<unset>".to_string()
    } else {
        "***".to_string()
    }
}

/// Gemini API provider
#[derive(Debug)]
pub struct GeminiProvider {
    config: GeminiConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiProvider {
    /// Create a new GeminiProvider from explicit settings
    ///
    /// # Arguments
    ///
    /// * `config` - API key, model, endpoint and timeout
    ///
    /// # Returns
    ///
    /// * `Ok(Self)` - New provider instance
    /// * `Err(MtError)` - If the API key is empty or HTTP client creation fails
    ///
    /// # Example
    ///
    /// ```ignore
    /// let provider = GeminiProvider::new(GeminiConfig::with_api_key("your-api-key"))?;
    /// ```
    pub fn new(config: GeminiConfig) -> MtResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(MtError::ConfigError(
                "Gemini API key is not configured".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MtError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

/// JSON body of a `generateContent` request
fn request_body(prompt: &str, max_output_tokens: u32) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "generationConfig": { "maxOutputTokens": max_output_tokens },
    })
}

/// Concatenated text parts of the first candidate
fn extract_text(response: GenerateResponse) -> MtResult<String> {
    let candidate = response.candidates.into_iter().next().ok_or_else(|| {
        MtError::TranslationError("Gemini response contained no candidates".to_string())
    })?;

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(MtError::TranslationError(format!(
            "Gemini candidate has no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(text)
}

#[async_trait]
impl TextGenerator for GeminiProvider {
    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> MtResult<String> {
        debug!(
            "Gemini request: model={}, prompt_chars={}, max_output_tokens={}",
            self.config.model,
            prompt.chars().count(),
            max_output_tokens
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request_body(prompt, max_output_tokens))
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(MtError::ConfigError(format!(
                "Gemini API rejected the request ({}): {}",
                status, body
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MtError::TranslationError(format!(
                "Gemini API error ({}): {}",
                status, body
            )));
        }

        extract_text(response.json::<GenerateResponse>().await?)
    }

    fn provider_name(&self) -> &str {
        "Gemini"
    }
}
