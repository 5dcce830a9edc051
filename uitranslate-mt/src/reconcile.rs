//! Recovering key → translation pairs from raw model output
//!
//! Model output is not guaranteed to be well-formed JSON. The reconciler tries
//! a cascade of strategies and keeps the first one that yields anything:
//!
//! 1. Strip a fenced code block (```` ```json ```` preferred over a bare fence).
//! 2. Normalize common syntax slips: comments, trailing commas, bare object
//!    keys, adjacent objects without a separating comma.
//! 3. Parse strictly; accept either an array of `{key, translation}` items or
//!    an object keyed by string key.
//! 4. On a parse error, pull balanced `{ "key": .., "translation": .. }`
//!    fragments out of the text one by one.
//! 5. Failing that, scan loosely for `"key": ".."` followed by
//!    `"translation": ".."` before the next `}`.
//!
//! Known limitations, kept on purpose because callers may rely on them:
//! comment stripping removes everything from `//` to the end of the line even
//! inside string values (so `https://…` in a translation is truncated), and
//! bare-key quoting also rewrites `, word:` sequences that occur inside
//! string values. Either slip usually breaks the strict parse and the
//! fragment passes take over.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;
use uitranslate::TranslationMap;

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*//.*").expect("line comment pattern is valid"));
static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("block comment pattern is valid"));
static TRAILING_COMMA_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*\}").expect("trailing comma pattern is valid"));
static TRAILING_COMMA_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*\]").expect("trailing comma pattern is valid"));
static BARE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([{,]\s*)([a-zA-Z0-9_]+)(\s*:)").expect("bare key pattern is valid")
});
static ADJACENT_OBJECTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\}\s*\{").expect("adjacent object pattern is valid"));
static FRAGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\{[^{}]*"key"\s*:\s*"([^"]+)"[^{}]*"translation"\s*:\s*"([^"]+)"[^{}]*\}"#,
    )
    .expect("fragment pattern is valid")
});
static LOOSE_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""key"\s*:\s*"([^"]+)"[^}]+"translation"\s*:\s*"([^"]+)""#)
        .expect("loose pair pattern is valid")
});

/// Which step of the cascade produced the translations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The normalized text parsed as JSON
    Strict,
    /// Individual `{key, translation}` fragments were recovered
    Fragment,
    /// Pairs were found by the loose key/translation scan
    LooseScan,
}

/// Outcome of reconciling one model response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// At least one key → translation pair was recovered
    Success {
        translations: TranslationMap,
        strategy: Strategy,
    },
    /// Nothing usable in the response
    Empty,
}

impl Reconciliation {
    fn from_map(translations: TranslationMap, strategy: Strategy) -> Self {
        if translations.is_empty() {
            Reconciliation::Empty
        } else {
            Reconciliation::Success {
                translations,
                strategy,
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Reconciliation::Empty)
    }

    pub fn translations(&self) -> Option<&TranslationMap> {
        match self {
            Reconciliation::Success { translations, .. } => Some(translations),
            Reconciliation::Empty => None,
        }
    }

    pub fn strategy(&self) -> Option<Strategy> {
        match self {
            Reconciliation::Success { strategy, .. } => Some(*strategy),
            Reconciliation::Empty => None,
        }
    }

    /// The recovered mapping; empty for [`Reconciliation::Empty`]
    pub fn into_map(self) -> TranslationMap {
        match self {
            Reconciliation::Success { translations, .. } => translations,
            Reconciliation::Empty => TranslationMap::new(),
        }
    }
}

/// Recover key → translation pairs from raw model output
///
/// Never fails; an unusable response yields [`Reconciliation::Empty`].
pub fn reconcile(raw: &str) -> Reconciliation {
    let normalized = normalize(strip_fences(raw.trim()));

    match serde_json::from_str::<Value>(&normalized) {
        Ok(value) => Reconciliation::from_map(collect_parsed(&value), Strategy::Strict),
        Err(err) => {
            debug!("Strict parse failed ({}), extracting fragments", err);
            let fragments = extract_fragments(&normalized);
            if !fragments.is_empty() {
                return Reconciliation::from_map(fragments, Strategy::Fragment);
            }
            Reconciliation::from_map(scan_pairs(&normalized), Strategy::LooseScan)
        }
    }
}

/// [`reconcile`] flattened to a plain mapping
pub fn reconcile_map(raw: &str) -> TranslationMap {
    reconcile(raw).into_map()
}

/// Keep only the content of the first fenced block, if there is one
pub fn strip_fences(text: &str) -> &str {
    if let Some((_, rest)) = text.split_once(JSON_FENCE) {
        return rest.split(FENCE).next().unwrap_or(rest).trim();
    }
    if text.contains(FENCE) {
        return text.split(FENCE).nth(1).unwrap_or_default().trim();
    }
    text
}

/// Apply the syntax repairs, in order
pub fn normalize(text: &str) -> String {
    let text = LINE_COMMENT.replace_all(text, "");
    let text = BLOCK_COMMENT.replace_all(&text, "");
    let text = TRAILING_COMMA_OBJECT.replace_all(&text, "}");
    let text = TRAILING_COMMA_ARRAY.replace_all(&text, "]");
    let text = BARE_KEY.replace_all(&text, r#"${1}"${2}"${3}"#);
    ADJACENT_OBJECTS.replace_all(&text, "},{").into_owned()
}

fn collect_parsed(value: &Value) -> TranslationMap {
    let mut translations = TranslationMap::new();
    match value {
        Value::Array(items) => {
            for item in items.iter().filter_map(Value::as_object) {
                let key = item.get("key").and_then(value_text);
                let translation = item.get("translation").and_then(value_text);
                if let (Some(key), Some(translation)) = (key, translation) {
                    if !key.is_empty() && !translation.is_empty() {
                        translations.insert(key, translation);
                    }
                }
            }
        }
        Value::Object(entries) => {
            for (key, item) in entries {
                let translation = match item {
                    Value::Object(inner) if inner.contains_key("translation") => {
                        inner.get("translation").and_then(value_text)
                    }
                    other => value_text(other),
                };
                if let Some(translation) = translation {
                    translations.insert(key.clone(), translation);
                }
            }
        }
        _ => {}
    }
    translations
}

fn extract_fragments(text: &str) -> TranslationMap {
    let mut translations = TranslationMap::new();
    for captures in FRAGMENT.captures_iter(text) {
        let fragment = TRAILING_COMMA_OBJECT.replace_all(&captures[0], "}");
        match serde_json::from_str::<Value>(&fragment) {
            Ok(Value::Object(object)) => {
                let key = object.get("key").and_then(value_text);
                let translation = object.get("translation").and_then(value_text);
                if let (Some(key), Some(translation)) = (key, translation) {
                    translations.insert(key, translation);
                }
            }
            Ok(_) => {}
            Err(_) => {
                translations.insert(
                    decode_captured(&captures[1]),
                    decode_captured(&captures[2]),
                );
            }
        }
    }
    translations
}

fn scan_pairs(text: &str) -> TranslationMap {
    LOOSE_PAIR
        .captures_iter(text)
        .map(|captures| {
            (
                decode_captured(&captures[1]),
                decode_captured(&captures[2]),
            )
        })
        .collect()
}

/// Textual form of a JSON value; `null` has none
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Resolve JSON escapes in a captured string body, keeping it verbatim if
/// it is not a valid JSON string literal
fn decode_captured(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string())
}
