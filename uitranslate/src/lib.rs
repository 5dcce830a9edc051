//! Keyed UI string collections and the resource codecs around them.
//!
//! A source resource file (nested JSON, Android `strings.xml` or Apple `.strings`)
//! is flattened into a [`KeyedTextCollection`]; translated values come back as a
//! [`TranslationMap`] and are rendered into the target resource format again.
//!
//! # Example
//!
//! ```ignore
//! use uitranslate::{ResourceFormat, TranslationMap};
//!
//! let loaded = ResourceFormat::Json.load(r#"{"home": {"title": "Welcome"}}"#)?;
//! assert_eq!(loaded.collection.keys().collect::<Vec<_>>(), vec!["home.title"]);
//!
//! let mut translations = TranslationMap::new();
//! translations.insert("home.title".to_string(), "Bienvenue".to_string());
//! let json = ResourceFormat::Json.render(&translations)?;
//! ```

pub mod codec;
pub mod collection;
pub mod error;
pub mod resource;

pub use codec::{apple, json, xml};
pub use collection::{KeyedTextCollection, TextEntry, TranslationMap};
pub use error::{CodecError, CollectionError};
pub use resource::{LoadedResource, ResourceFormat};
