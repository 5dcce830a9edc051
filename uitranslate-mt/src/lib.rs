//! LLM-assisted translation of UI string collections
//!
//! This crate turns a [`uitranslate::KeyedTextCollection`] into a complete
//! key → translation mapping using a text-generation backend whose output is
//! not trusted to be well-formed.
//!
//! # Workflow Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use uitranslate::ResourceFormat;
//! use uitranslate_mt::{
//!     BatchConfig, GeminiConfig, GeminiProvider, SingleCallConfig, SingleCallTranslator,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 1. Load a resource file into a collection
//!     let loaded = ResourceFormat::Json.load(&std::fs::read_to_string("en.json")?)?;
//!
//!     // 2. Pick a backend
//!     let provider = Arc::new(GeminiProvider::new(GeminiConfig::with_api_key("..."))?);
//!
//!     // 3. Translate; oversized or failed single calls fall back to batches
//!     let translator =
//!         SingleCallTranslator::new(provider, SingleCallConfig::default(), BatchConfig::default());
//!     let outcome = translator.translate_all(&loaded.collection, "French").await?;
//!
//!     // 4. Export
//!     println!("{}", ResourceFormat::Json.render(&outcome.translations)?);
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod gemini;
pub mod generator;
pub mod languages;
pub mod mock;
pub mod prompt;
pub mod reconcile;
pub mod scanner;
pub mod single_call;

// Re-export main types for convenient access
pub use batch::{
    BatchConfig, BatchOutcome, BatchProgress, BatchReport, BatchStatus, BatchTranslator,
    ProgressCallback, fill_missing,
};
pub use config::AppConfig;
pub use error::{MtError, MtResult};
pub use gemini::{GeminiConfig, GeminiProvider};
pub use generator::{TextGenerator, validate_language};
pub use languages::{LANGUAGES, Language};
pub use mock::{MockGenerator, MockMode};
pub use prompt::{
    TranslationItem, build_entry_prompt, build_items, build_prompt, clean_entry_translation,
    estimate_tokens,
};
pub use reconcile::{Reconciliation, Strategy, reconcile, reconcile_map};
pub use scanner::{
    FsScanner, GithubConfig, GithubScanner, RepoRef, RepositoryScanner, ScanFailure, ScanReport,
    ScanRequest,
};
pub use single_call::{BatchReason, Route, SingleCallConfig, SingleCallTranslator, TranslationOutcome};
