//! Translation request payloads and prompt text

use crate::error::{MtError, MtResult};
use serde::{Deserialize, Serialize};
use uitranslate::TextEntry;

/// Line introducing the JSON payload inside a prompt
const INPUT_MARKER: &str = "Input:";
/// First words of the instruction that follows the payload
const RETURN_MARKER: &str = "Return ONLY a valid JSON array";
/// Prefix of the line carrying the text in a single-string prompt
const ORIGINAL_TEXT_MARKER: &str = "Original text: ";

/// One item of the JSON array sent to the model
///
/// The model is asked to echo the array back with a `translation` field
/// added to every item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationItem {
    pub id: String,
    pub key: String,
    pub text: String,
    #[serde(default)]
    pub context: String,
}

impl From<&TextEntry> for TranslationItem {
    fn from(entry: &TextEntry) -> Self {
        Self {
            id: entry.key.clone(),
            key: entry.key.clone(),
            text: entry.source_text.clone(),
            context: entry.context.clone(),
        }
    }
}

pub fn build_items(entries: &[TextEntry]) -> Vec<TranslationItem> {
    entries.iter().map(TranslationItem::from).collect()
}

/// Rough token estimate of a payload: serialized characters / 4, rounded up
pub fn estimate_tokens(items: &[TranslationItem]) -> MtResult<usize> {
    let serialized = serde_json::to_string(items)
        .map_err(|e| MtError::TranslationError(format!("Failed to serialize payload: {}", e)))?;
    Ok(serialized.chars().count().div_ceil(4))
}

/// Build the translation prompt for a payload
pub fn build_prompt(items: &[TranslationItem], target_language: &str) -> MtResult<String> {
    let payload = serde_json::to_string_pretty(items)
        .map_err(|e| MtError::TranslationError(format!("Failed to serialize payload: {}", e)))?;

    Ok(format!(
        r#"Translate the following UI strings to {language}.

Each item includes:
- id: A unique identifier
- key: The string identifier
- text: The text to translate
- context: (Optional) Where/how this string is used in the UI

Guidelines:
- Keep translations concise and natural
- Use everyday language, not formal or complex terms
- Maintain the same meaning and intent as the original
- Don't add extra words or explanations
- Ensure translations would fit well on buttons or UI elements
- Preserve any placeholders like {{variable}} or %s
- Preserve formatting and special characters
- DO NOT include any comments in the JSON output
- DO NOT use comment lines with // or /* */ in your response

{input}
{payload}

{ret} with the same structure as input, but add a "translation" field to each item.
Don't include any explanations, comments, or additional text outside or inside the JSON array.
"#,
        language = target_language,
        input = INPUT_MARKER,
        payload = payload,
        ret = RETURN_MARKER,
    ))
}

/// Recover the payload from a prompt produced by [`build_prompt`]
pub fn extract_payload(prompt: &str) -> Option<Vec<TranslationItem>> {
    let start = prompt.find(&format!("\n{}\n", INPUT_MARKER))? + INPUT_MARKER.len() + 2;
    let end = start + prompt[start..].find(RETURN_MARKER)?;
    serde_json::from_str(prompt[start..end].trim()).ok()
}

/// Build the prompt for translating one string on its own
///
/// The text is embedded as a JSON string literal so quotes and newlines in
/// it survive.
pub fn build_entry_prompt(entry: &TextEntry, target_language: &str) -> MtResult<String> {
    let text = serde_json::to_string(&entry.source_text)
        .map_err(|e| MtError::TranslationError(format!("Failed to serialize text: {}", e)))?;

    Ok(format!(
        r#"Translate the following UI string to {language}:

{marker}{text}

Context: {context}

Guidelines:
- Keep the translation concise and natural
- Use everyday language, not formal or complex terms
- Maintain the same meaning and intent as the original
- Don't add extra words or explanations
- Ensure the translation would fit well on a button or UI element
- Preserve any placeholders like {{variable}} or %s

Return ONLY the translated text without any explanations or additional comments.
"#,
        language = target_language,
        marker = ORIGINAL_TEXT_MARKER,
        text = text,
        context = entry.context,
    ))
}

/// Recover the source text from a prompt produced by [`build_entry_prompt`]
pub fn extract_entry_text(prompt: &str) -> Option<String> {
    prompt
        .lines()
        .find_map(|line| line.strip_prefix(ORIGINAL_TEXT_MARKER))
        .and_then(|literal| serde_json::from_str(literal).ok())
}

/// Clean a free-text answer to a single-string prompt
///
/// Models like to answer `Translation: "Enregistrer"`. Everything up to the
/// first `:` is dropped, then surrounding quotes. This also cuts legitimate
/// translations that contain a colon. `None` when nothing is left.
pub fn clean_entry_translation(raw: &str) -> Option<String> {
    let mut text = raw.trim();
    if let Some((_, rest)) = text.split_once(':') {
        text = rest.trim();
    }
    let text = text.trim_matches(&['"', '\''][..]);
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
