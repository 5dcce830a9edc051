//! Resource file formats: loading into a collection and rendering translations

use crate::codec::{apple, json, xml};
use crate::collection::{KeyedTextCollection, TranslationMap};
use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Supported resource file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceFormat {
    /// Nested JSON object, keys flattened to dot-paths
    Json,
    /// Android `strings.xml`
    AndroidXml,
    /// Apple `Localizable.strings`
    AppleStrings,
}

/// A resource file read into a collection
#[derive(Debug, Clone)]
pub struct LoadedResource {
    pub collection: KeyedTextCollection,
    /// Keys whose values are not strings and therefore not translatable
    pub skipped: Vec<String>,
}

impl ResourceFormat {
    /// Guess the format from a file path
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Some(Self::Json),
            Some(ext) if ext.eq_ignore_ascii_case("xml") => Some(Self::AndroidXml),
            Some(ext) if ext.eq_ignore_ascii_case("strings") => Some(Self::AppleStrings),
            _ => None,
        }
    }

    /// Parse a format name as used on the command line (`json`, `xml`, `strings`)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "xml" | "android" | "strings.xml" => Some(Self::AndroidXml),
            "strings" | "ios" | "apple" => Some(Self::AppleStrings),
            _ => None,
        }
    }

    /// Conventional file name for an exported resource
    pub fn default_file_name(&self) -> &'static str {
        match self {
            Self::Json => "translations.json",
            Self::AndroidXml => "strings.xml",
            Self::AppleStrings => "Localizable.strings",
        }
    }

    /// Read resource content into a collection
    pub fn load(&self, content: &str) -> Result<LoadedResource, CodecError> {
        match self {
            Self::Json => {
                let flat = json::flatten(&json::parse(content)?)?;
                let (collection, skipped) = KeyedTextCollection::from_flattened(&flat);
                Ok(LoadedResource {
                    collection,
                    skipped,
                })
            }
            Self::AndroidXml => Ok(LoadedResource {
                collection: KeyedTextCollection::from_map(xml::xml_to_map(content)?),
                skipped: Vec::new(),
            }),
            Self::AppleStrings => Ok(LoadedResource {
                collection: KeyedTextCollection::from_map(apple::parse_strings_file(content)?),
                skipped: Vec::new(),
            }),
        }
    }

    /// Render translations into this format
    ///
    /// Dot-path keys become nested objects for JSON and `_`-joined resource
    /// names for Android.
    pub fn render(&self, translations: &TranslationMap) -> Result<String, CodecError> {
        match self {
            Self::Json => json::to_pretty_string(&json::unflatten_strings(translations)?),
            Self::AndroidXml => xml::map_to_xml(&android_names(translations)?),
            Self::AppleStrings => Ok(apple::to_strings_file(translations)),
        }
    }
}

/// Re-key translations by Android resource name, rejecting keys that collide
fn android_names(translations: &TranslationMap) -> Result<TranslationMap, CodecError> {
    let mut renamed = TranslationMap::with_capacity(translations.len());
    let mut origin: HashMap<String, &str> = HashMap::with_capacity(translations.len());
    for (key, value) in translations {
        let name = xml::android_resource_name(key);
        if let Some(first) = origin.get(&name) {
            return Err(CodecError::ResourceNameCollision {
                name,
                first: first.to_string(),
                second: key.clone(),
            });
        }
        origin.insert(name.clone(), key);
        renamed.insert(name, value.clone());
    }
    Ok(renamed)
}
