//! Text generation backend trait
//!
//! The pipeline treats the language model as "send a prompt, get text back".
//! Nothing about the returned text is trusted; see [`crate::reconcile`].
//!
//! # Example
//!
//! ```ignore
//! use uitranslate_mt::{GeminiProvider, GeminiConfig, TextGenerator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = GeminiProvider::new(GeminiConfig::with_api_key("..."))?;
//!     let text = provider.generate("Translate 'Save' to French", 256).await?;
//!     println!("{}", text);
//!     Ok(())
//! }
//! ```

use crate::error::{MtError, MtResult};
use async_trait::async_trait;

/// Longest accepted target language name
const MAX_LANGUAGE_LEN: usize = 64;

/// Generic trait for prompt → text backends
///
/// Implementations handle the actual model call, whether through an API
/// (Gemini) or deterministic logic (mock). Output is not required to be
/// well-formed in any way.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send `prompt` and return the raw model output
    ///
    /// `max_output_tokens` bounds the length of the answer.
    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> MtResult<String>;

    /// Name of this backend, used in logs
    fn provider_name(&self) -> &str;
}

/// Validate a target language before it is interpolated into a prompt
///
/// Accepts display names ("Chinese (Simplified)") and codes ("zh-CN");
/// rejects empty names, control characters and overlong input.
pub fn validate_language(language: &str) -> MtResult<()> {
    let trimmed = language.trim();
    if trimmed.is_empty() {
        return Err(MtError::InvalidLanguage(
            "Target language is empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_LANGUAGE_LEN {
        return Err(MtError::InvalidLanguage(format!(
            "Target language exceeds {} characters",
            MAX_LANGUAGE_LEN
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(MtError::InvalidLanguage(format!(
            "Invalid characters in target language: {:?}",
            language
        )));
    }
    Ok(())
}
