//! The set of translatable strings handed to the translation pipeline

use crate::error::CollectionError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Key → translated text, in source order
pub type TranslationMap = IndexMap<String, String>;

/// One translatable UI string
///
/// `key` is an opaque identifier: a dot-path such as `home.title` for JSON
/// resources or a resource name for `strings.xml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEntry {
    pub key: String,
    pub source_text: String,
    /// Optional hint on where/how the string is used in the UI
    #[serde(default)]
    pub context: String,
}

impl TextEntry {
    pub fn new(key: impl Into<String>, source_text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            source_text: source_text.into(),
            context: String::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

/// Ordered set of [`TextEntry`] values with unique keys
///
/// Built once per source file and left untouched for the duration of a
/// translation run; the pipeline only borrows it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyedTextCollection {
    entries: Vec<TextEntry>,
    index: HashMap<String, usize>,
}

impl KeyedTextCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from `(key, text)` pairs, rejecting duplicate keys
    pub fn from_pairs<K, V, I>(pairs: I) -> Result<Self, CollectionError>
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut collection = Self::new();
        for (key, text) in pairs {
            collection.push(key, text)?;
        }
        Ok(collection)
    }

    /// Build a collection from a key → text map
    ///
    /// Map keys are unique, so this cannot fail.
    pub fn from_map(strings: IndexMap<String, String>) -> Self {
        let mut collection = Self::new();
        for (key, text) in strings {
            collection.insert_unchecked(TextEntry::new(key, text));
        }
        collection
    }

    /// Build a collection from a flattened resource tree
    ///
    /// Only string leaves are translatable; the keys of every other leaf
    /// (numbers, booleans, arrays, null) are returned alongside so callers
    /// can report them.
    pub fn from_flattened(flat: &IndexMap<String, Value>) -> (Self, Vec<String>) {
        let mut collection = Self::new();
        let mut skipped = Vec::new();
        for (key, value) in flat {
            match value.as_str() {
                Some(text) => {
                    collection.insert_unchecked(TextEntry::new(key.clone(), text));
                }
                None => skipped.push(key.clone()),
            }
        }
        (collection, skipped)
    }

    pub fn push(
        &mut self,
        key: impl Into<String>,
        source_text: impl Into<String>,
    ) -> Result<&mut Self, CollectionError> {
        self.push_entry(TextEntry::new(key, source_text))
    }

    pub fn push_entry(&mut self, entry: TextEntry) -> Result<&mut Self, CollectionError> {
        if self.index.contains_key(&entry.key) {
            return Err(CollectionError::DuplicateKey(entry.key));
        }
        self.insert_unchecked(entry);
        Ok(self)
    }

    fn insert_unchecked(&mut self, entry: TextEntry) {
        self.index.insert(entry.key.clone(), self.entries.len());
        self.entries.push(entry);
    }

    /// Attach a usage context to an existing key
    pub fn with_context(
        &mut self,
        key: &str,
        context: impl Into<String>,
    ) -> Result<&mut Self, CollectionError> {
        let position = *self
            .index
            .get(key)
            .ok_or_else(|| CollectionError::UnknownKey(key.to_string()))?;
        self.entries[position].context = context.into();
        Ok(self)
    }

    /// Attach contexts from a key → context map; keys not in the collection are ignored
    pub fn apply_contexts<'a, I>(&mut self, contexts: I)
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (key, context) in contexts {
            if let Some(&position) = self.index.get(key) {
                self.entries[position].context = context.clone();
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&TextEntry> {
        self.index.get(key).map(|&position| &self.entries[position])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.key.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TextEntry> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[TextEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Contiguous slices of at most `size` entries, in collection order
    ///
    /// A `size` of zero is treated as one.
    pub fn batches(&self, size: usize) -> std::slice::Chunks<'_, TextEntry> {
        self.entries.chunks(size.max(1))
    }

    /// Every key mapped to its own source text
    pub fn source_map(&self) -> TranslationMap {
        self.entries
            .iter()
            .map(|entry| (entry.key.clone(), entry.source_text.clone()))
            .collect()
    }
}

impl<'a> IntoIterator for &'a KeyedTextCollection {
    type Item = &'a TextEntry;
    type IntoIter = std::slice::Iter<'a, TextEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
