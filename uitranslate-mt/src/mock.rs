//! Mock text generator for testing
//!
//! A deterministic, API-free backend that reads the payload out of a
//! translation prompt and answers the way a language model might, including
//! the ways a model misbehaves.
//!
//! # Example
//!
//! ```ignore
//! use uitranslate_mt::{MockGenerator, MockMode, TextGenerator};
//!
//! #[tokio::test]
//! async fn test_translation() {
//!     let mock = MockGenerator::new(MockMode::Suffix);
//!     let raw = mock.generate(&prompt, 8192).await.unwrap();
//!     // [{"id":"save","key":"save","text":"Save","context":"","translation":"Save_French"}]
//! }
//! ```

use crate::error::{MtError, MtResult};
use crate::generator::TextGenerator;
use crate::prompt::{TranslationItem, extract_entry_text, extract_payload};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Mock response modes for testing different scenarios
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Well-formed JSON array, translation = `text_<language>`
    Suffix,

    /// Same data as `Suffix`, but fenced, commented, with bare keys and
    /// trailing commas
    Sloppy,

    /// Always answer with this exact text
    Fixed(String),

    /// Simulate backend errors on every call
    Error(String),

    /// Backend error whenever a batch prompt contains one of these keys;
    /// single-string prompts are answered
    FailForKeys(HashSet<String>),

    /// Well-formed answer that silently leaves these keys out
    OmitKeys(HashSet<String>),

    /// The first `n` calls fail, later calls behave like `Suffix`
    FlakyThenSuffix(usize),
}

/// Mock generator that simulates model responses
#[derive(Debug)]
pub struct MockGenerator {
    mode: MockMode,
    /// Optional simulated network delay (in milliseconds)
    delay_ms: u64,
    calls: AtomicUsize,
}

impl MockGenerator {
    pub fn new(mode: MockMode) -> Self {
        Self::with_delay(mode, 0)
    }

    /// Create a MockGenerator with simulated network delay
    pub fn with_delay(mode: MockMode, delay_ms: u64) -> Self {
        Self {
            mode,
            delay_ms,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `generate` calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn apply_delay(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
    }

    fn respond(&self, prompt: &str, call: usize) -> MtResult<String> {
        match &self.mode {
            MockMode::Fixed(text) => return Ok(text.clone()),
            MockMode::Error(msg) => return Err(MtError::TranslationError(msg.clone())),
            MockMode::FlakyThenSuffix(failures) if call <= *failures => {
                return Err(MtError::NetworkError(format!(
                    "simulated failure on call {}",
                    call
                )));
            }
            _ => {}
        }

        if let Some(text) = extract_entry_text(prompt) {
            let translation = suffixed(&text, target_language(prompt));
            return Ok(match &self.mode {
                MockMode::Sloppy => format!("Translation: \"{}\"", translation),
                _ => translation,
            });
        }

        let items = extract_payload(prompt).ok_or_else(|| {
            MtError::TranslationError("mock could not read the prompt payload".to_string())
        })?;
        let language = target_language(prompt);

        if let MockMode::FailForKeys(keys) = &self.mode {
            if let Some(item) = items.iter().find(|item| keys.contains(&item.key)) {
                return Err(MtError::TranslationError(format!(
                    "simulated failure for key '{}'",
                    item.key
                )));
            }
        }

        let kept: Vec<&TranslationItem> = match &self.mode {
            MockMode::OmitKeys(keys) => items
                .iter()
                .filter(|item| !keys.contains(&item.key))
                .collect(),
            _ => items.iter().collect(),
        };

        match &self.mode {
            MockMode::Sloppy => Ok(sloppy_response(&kept, language)),
            _ => {
                let answer: Vec<_> = kept
                    .iter()
                    .map(|item| {
                        json!({
                            "id": item.id,
                            "key": item.key,
                            "text": item.text,
                            "context": item.context,
                            "translation": suffixed(&item.text, language),
                        })
                    })
                    .collect();
                serde_json::to_string(&answer)
                    .map_err(|e| MtError::TranslationError(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &str, _max_output_tokens: u32) -> MtResult<String> {
        self.apply_delay().await;
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.respond(prompt, call)
    }

    fn provider_name(&self) -> &str {
        "Mock Generator"
    }
}

fn suffixed(text: &str, language: &str) -> String {
    format!("{}_{}", text, language)
}

/// Target language named in the first prompt line
fn target_language(prompt: &str) -> &str {
    prompt
        .lines()
        .next()
        .and_then(|line| {
            line.strip_prefix("Translate the following UI strings to ")
                .or_else(|| line.strip_prefix("Translate the following UI string to "))
        })
        .map(|rest| rest.trim_end_matches(&['.', ':'][..]).trim())
        .unwrap_or("xx")
}

fn quoted(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

fn sloppy_response(items: &[&TranslationItem], language: &str) -> String {
    let mut out = String::from("Sure! Here are the translations:\n```json\n[\n  // translated items\n");
    for item in items {
        out.push_str(&format!(
            "  {{key: {}, \"text\": {}, /* done */ translation: {},}}\n",
            quoted(&item.key),
            quoted(&item.text),
            quoted(&suffixed(&item.text, language)),
        ));
    }
    out.push_str("]\n```\nLet me know if you need anything else.");
    out
}
