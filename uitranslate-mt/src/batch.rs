//! Batched translation with retries and guaranteed key coverage
//!
//! A collection is cut into contiguous batches, each batch is sent to the
//! backend as one prompt, and the answer goes through [`reconcile`]. A batch
//! whose answers stay unusable after every attempt degrades to its source
//! text instead of failing the run, and a final completeness pass fills any
//! key the model silently dropped. The result always holds exactly the keys
//! of the input collection, in collection order.
//!
//! With [`BatchConfig::per_entry_fallback`] set, a batch that exhausts its
//! attempts is retried one string at a time before any source text is kept.

use crate::error::{MtError, MtResult};
use crate::generator::{TextGenerator, validate_language};
use crate::prompt::{build_entry_prompt, build_items, build_prompt, clean_entry_translation};
use crate::reconcile::{Reconciliation, Strategy, reconcile};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uitranslate::{KeyedTextCollection, TextEntry, TranslationMap};

/// Tuning knobs for [`BatchTranslator`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum entries per backend call
    pub batch_size: usize,
    /// Calls per batch before it degrades to source text (includes the first)
    pub max_attempts: usize,
    pub retry_delay_ms: u64,
    /// Pause before each batch after the first
    pub batch_delay_ms: u64,
    pub max_output_tokens: u32,
    /// Batches in flight at once
    pub concurrency: usize,
    /// Translate the strings of an exhausted batch one by one
    pub per_entry_fallback: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            max_attempts: 3,
            retry_delay_ms: 1000,
            batch_delay_ms: 500,
            max_output_tokens: 8192,
            concurrency: 1,
            per_entry_fallback: false,
        }
    }
}

/// How a single batch ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchStatus {
    /// A usable answer arrived on attempt `attempts`
    Translated { attempts: usize, strategy: Strategy },
    /// Every attempt failed; the batch carries its source text
    Degraded { attempts: usize, last_error: String },
    /// Every attempt failed and the strings were sent one at a time;
    /// `translated` of them came back usable
    PerEntry {
        attempts: usize,
        last_error: String,
        translated: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub index: usize,
    pub size: usize,
    pub status: BatchStatus,
    /// Keys the model returned that do not belong to the batch
    pub discarded: Vec<String>,
    /// Keys of this batch left with their source text
    pub untranslated: Vec<String>,
}

impl BatchOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self.status, BatchStatus::Degraded { .. })
    }
}

/// Result of [`BatchTranslator::translate_in_batches`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// One value per collection key, in collection order
    pub translations: TranslationMap,
    pub batches: Vec<BatchOutcome>,
    /// Keys missing from otherwise successful answers, filled with source text
    pub filled: Vec<String>,
}

impl BatchReport {
    pub fn degraded(&self) -> impl Iterator<Item = &BatchOutcome> {
        self.batches.iter().filter(|batch| batch.is_degraded())
    }

    /// Number of keys that carry source text instead of a translation
    pub fn untranslated_count(&self) -> usize {
        self.batches
            .iter()
            .map(|batch| batch.untranslated.len())
            .sum::<usize>()
            + self.filled.len()
    }

    /// Keys that carry source text instead of a translation, in collection order
    pub fn untranslated_keys(&self) -> Vec<String> {
        let untranslated: HashSet<&str> = self
            .batches
            .iter()
            .flat_map(|batch| batch.untranslated.iter())
            .chain(self.filled.iter())
            .map(String::as_str)
            .collect();
        self.translations
            .keys()
            .filter(|key| untranslated.contains(key.as_str()))
            .cloned()
            .collect()
    }

    pub fn is_fully_translated(&self) -> bool {
        self.untranslated_count() == 0
    }
}

/// Reported after each finished batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// Batches finished so far, this one included
    pub completed: usize,
    pub total: usize,
    pub index: usize,
    pub size: usize,
    /// Keys of this batch left with their source text
    pub untranslated: usize,
}

pub type ProgressCallback = Arc<dyn Fn(BatchProgress) + Send + Sync>;

struct BatchResult {
    outcome: BatchOutcome,
    translations: TranslationMap,
}

/// Translates a collection batch by batch through a [`TextGenerator`]
pub struct BatchTranslator {
    generator: Arc<dyn TextGenerator>,
    config: BatchConfig,
    cancel: Option<CancellationToken>,
    progress: Option<ProgressCallback>,
}

impl BatchTranslator {
    pub fn new(generator: Arc<dyn TextGenerator>, config: BatchConfig) -> Self {
        Self {
            generator,
            config,
            cancel: None,
            progress: None,
        }
    }

    /// Stop the run before the next batch starts once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Call `callback` in batch order as batches finish
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(BatchProgress) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Translate every entry of `collection` into `target_language`
    ///
    /// Backend failures and unusable answers never surface as errors; they
    /// show up as degraded batches in the report. The only errors are an
    /// invalid target language and cancellation.
    pub async fn translate_in_batches(
        &self,
        collection: &KeyedTextCollection,
        target_language: &str,
    ) -> MtResult<BatchReport> {
        validate_language(target_language)?;

        let batches: Vec<Vec<TextEntry>> = collection
            .batches(self.config.batch_size)
            .map(<[TextEntry]>::to_vec)
            .collect();
        let total = batches.len();
        info!(
            "Translating {} strings to {} in {} batch(es) via {}",
            collection.len(),
            target_language,
            total,
            self.generator.provider_name()
        );

        let mut results = stream::iter(batches.into_iter().enumerate())
            .map(move |(index, batch)| async move {
                self.run_batch(index, &batch, target_language).await
            })
            .buffered(self.config.concurrency.max(1));

        let mut translations = TranslationMap::with_capacity(collection.len());
        let mut outcomes = Vec::new();
        while let Some(result) = results.next().await {
            let Some(result) = result else {
                info!("Translation cancelled after {} batch(es)", outcomes.len());
                return Err(MtError::Cancelled {
                    completed_batches: outcomes.len(),
                });
            };
            if let Some(progress) = &self.progress {
                progress(BatchProgress {
                    completed: outcomes.len() + 1,
                    total,
                    index: result.outcome.index,
                    size: result.outcome.size,
                    untranslated: result.outcome.untranslated.len(),
                });
            }
            translations.extend(result.translations);
            outcomes.push(result.outcome);
        }

        let filled = fill_missing(collection, &mut translations);
        if !filled.is_empty() {
            warn!(
                "{} key(s) missing from model answers were filled with source text",
                filled.len()
            );
        }

        Ok(BatchReport {
            translations,
            batches: outcomes,
            filled,
        })
    }

    /// `None` when cancelled before the batch started
    async fn run_batch(
        &self,
        index: usize,
        batch: &[TextEntry],
        target_language: &str,
    ) -> Option<BatchResult> {
        if self.is_cancelled() {
            return None;
        }
        if index > 0 && self.config.batch_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.batch_delay_ms)).await;
            if self.is_cancelled() {
                return None;
            }
        }
        Some(self.translate_batch(index, batch, target_language).await)
    }

    async fn translate_batch(
        &self,
        index: usize,
        batch: &[TextEntry],
        target_language: &str,
    ) -> BatchResult {
        debug!("Batch {}: {} strings", index, batch.len());
        let keys: HashSet<&str> = batch.iter().map(|entry| entry.key.as_str()).collect();
        let max_attempts = self.config.max_attempts.max(1);

        let prompt = match build_prompt(&build_items(batch), target_language) {
            Ok(prompt) => prompt,
            Err(e) => return degraded(index, batch, 0, e.to_string(), Vec::new()),
        };

        let mut last_error = String::new();
        let mut discarded = Vec::new();
        for attempt in 1..=max_attempts {
            if attempt > 1 {
                warn!(
                    "Batch {}: retrying (attempt {}/{}) after: {}",
                    index, attempt, max_attempts, last_error
                );
                if self.config.retry_delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                }
            }

            let raw = match self
                .generator
                .generate(&prompt, self.config.max_output_tokens)
                .await
            {
                Ok(raw) => raw,
                Err(e) => {
                    last_error = e.to_string();
                    continue;
                }
            };

            let (translations, strategy) = match reconcile(&raw) {
                Reconciliation::Success {
                    translations,
                    strategy,
                } => (translations, strategy),
                Reconciliation::Empty => {
                    last_error = "no translations could be recovered from the response".to_string();
                    continue;
                }
            };

            let (kept, foreign): (TranslationMap, TranslationMap) = translations
                .into_iter()
                .partition(|(key, _)| keys.contains(key.as_str()));
            discarded = foreign.into_keys().collect();
            if !discarded.is_empty() {
                debug!("Batch {}: discarding unknown keys {:?}", index, discarded);
            }
            if kept.is_empty() {
                last_error = "response only contained keys outside the batch".to_string();
                continue;
            }

            debug!(
                "Batch {}: {}/{} translated on attempt {} ({:?})",
                index,
                kept.len(),
                batch.len(),
                attempt,
                strategy
            );
            return BatchResult {
                outcome: BatchOutcome {
                    index,
                    size: batch.len(),
                    status: BatchStatus::Translated {
                        attempts: attempt,
                        strategy,
                    },
                    discarded,
                    untranslated: Vec::new(),
                },
                translations: kept,
            };
        }

        if self.config.per_entry_fallback {
            warn!(
                "Batch {}: giving up after {} attempt(s), translating strings one by one: {}",
                index, max_attempts, last_error
            );
            return self
                .translate_entries(index, batch, target_language, max_attempts, last_error, discarded)
                .await;
        }

        warn!(
            "Batch {}: giving up after {} attempt(s), keeping source text: {}",
            index, max_attempts, last_error
        );
        degraded(index, batch, max_attempts, last_error, discarded)
    }

    /// One backend call per entry; entries without a usable answer keep
    /// their source text
    async fn translate_entries(
        &self,
        index: usize,
        batch: &[TextEntry],
        target_language: &str,
        attempts: usize,
        last_error: String,
        discarded: Vec<String>,
    ) -> BatchResult {
        let mut translations = TranslationMap::with_capacity(batch.len());
        let mut untranslated = Vec::new();
        for entry in batch {
            let answer = match build_entry_prompt(entry, target_language) {
                Ok(prompt) => self
                    .generator
                    .generate(&prompt, self.config.max_output_tokens)
                    .await
                    .map(|raw| clean_entry_translation(&raw)),
                Err(e) => Err(e),
            };
            match answer {
                Ok(Some(translation)) => {
                    translations.insert(entry.key.clone(), translation);
                }
                Ok(None) => {
                    debug!("Batch {}: empty answer for '{}'", index, entry.key);
                    untranslated.push(entry.key.clone());
                    translations.insert(entry.key.clone(), entry.source_text.clone());
                }
                Err(e) => {
                    debug!("Batch {}: '{}' failed: {}", index, entry.key, e);
                    untranslated.push(entry.key.clone());
                    translations.insert(entry.key.clone(), entry.source_text.clone());
                }
            }
        }

        let translated = batch.len() - untranslated.len();
        info!(
            "Batch {}: {}/{} strings translated one by one",
            index,
            translated,
            batch.len()
        );
        BatchResult {
            outcome: BatchOutcome {
                index,
                size: batch.len(),
                status: BatchStatus::PerEntry {
                    attempts,
                    last_error,
                    translated,
                },
                discarded,
                untranslated,
            },
            translations,
        }
    }
}

fn degraded(
    index: usize,
    batch: &[TextEntry],
    attempts: usize,
    last_error: String,
    discarded: Vec<String>,
) -> BatchResult {
    BatchResult {
        outcome: BatchOutcome {
            index,
            size: batch.len(),
            status: BatchStatus::Degraded {
                attempts,
                last_error,
            },
            discarded,
            untranslated: batch.iter().map(|entry| entry.key.clone()).collect(),
        },
        translations: batch
            .iter()
            .map(|entry| (entry.key.clone(), entry.source_text.clone()))
            .collect(),
    }
}

/// Completeness pass over a translation map
///
/// Every collection key missing from `translations` gets its source text.
/// Keys outside the collection are dropped and the map is reordered to
/// collection order. Returns the keys that were filled.
pub fn fill_missing(collection: &KeyedTextCollection, translations: &mut TranslationMap) -> Vec<String> {
    let mut ordered = TranslationMap::with_capacity(collection.len());
    let mut filled = Vec::new();
    for entry in collection {
        match translations.swap_remove(&entry.key) {
            Some(text) => {
                ordered.insert(entry.key.clone(), text);
            }
            None => {
                filled.push(entry.key.clone());
                ordered.insert(entry.key.clone(), entry.source_text.clone());
            }
        }
    }
    *translations = ordered;
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockGenerator, MockMode};
    use async_trait::async_trait;

    fn fast_config() -> BatchConfig {
        BatchConfig {
            retry_delay_ms: 0,
            batch_delay_ms: 0,
            ..BatchConfig::default()
        }
    }

    fn collection(size: usize) -> KeyedTextCollection {
        KeyedTextCollection::from_pairs((0..size).map(|i| (format!("k{}", i), format!("t{}", i))))
            .unwrap()
    }

    fn keys(keys: &[&str]) -> HashSet<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    fn translator(mock: &Arc<MockGenerator>, config: BatchConfig) -> BatchTranslator {
        let generator: Arc<dyn TextGenerator> = mock.clone();
        BatchTranslator::new(generator, config)
    }

    fn assert_same_keys(report: &BatchReport, collection: &KeyedTextCollection) {
        assert_eq!(
            report.translations.keys().map(String::as_str).collect::<Vec<_>>(),
            collection.keys().collect::<Vec<_>>()
        );
    }

    // ========== Core Scenarios ==========

    #[tokio::test]
    async fn test_all_batches_translated() {
        let mock = Arc::new(MockGenerator::new(MockMode::Suffix));
        let source = collection(120);
        let report = translator(&mock, fast_config())
            .translate_in_batches(&source, "French")
            .await
            .unwrap();

        assert_same_keys(&report, &source);
        assert_eq!(report.translations["k0"], "t0_French");
        assert_eq!(report.translations["k119"], "t119_French");
        assert_eq!(report.batches.len(), 3);
        assert!(report.is_fully_translated());
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_failing_middle_batch_degrades_to_source_text() {
        let mock = Arc::new(MockGenerator::new(MockMode::FailForKeys(keys(&["k50"]))));
        let source = collection(120);
        let report = translator(&mock, fast_config())
            .translate_in_batches(&source, "French")
            .await
            .unwrap();

        assert_same_keys(&report, &source);
        for i in 0..50 {
            assert_eq!(report.translations[&format!("k{}", i)], format!("t{}_French", i));
        }
        for i in 50..100 {
            assert_eq!(report.translations[&format!("k{}", i)], format!("t{}", i));
        }
        for i in 100..120 {
            assert_eq!(report.translations[&format!("k{}", i)], format!("t{}_French", i));
        }

        assert!(!report.batches[0].is_degraded());
        assert!(!report.batches[2].is_degraded());
        match &report.batches[1].status {
            BatchStatus::Degraded {
                attempts,
                last_error,
            } => {
                assert_eq!(*attempts, 3);
                assert!(last_error.contains("k50"));
            }
            other => panic!("Expected degraded batch, got {:?}", other),
        }
        assert_eq!(report.untranslated_count(), 50);
        // 1 + 3 retries of batch 1 + 1
        assert_eq!(mock.calls(), 5);
    }

    #[tokio::test]
    async fn test_backend_always_failing_is_still_complete() {
        let mock = Arc::new(MockGenerator::new(MockMode::Error("quota exceeded".to_string())));
        let source = collection(75);
        let report = translator(&mock, fast_config())
            .translate_in_batches(&source, "German")
            .await
            .unwrap();

        assert_same_keys(&report, &source);
        assert_eq!(report.translations, source.source_map());
        assert_eq!(report.degraded().count(), 2);
        assert_eq!(mock.calls(), 6);
    }

    #[tokio::test]
    async fn test_garbage_response_is_retried_then_degraded() {
        let mock = Arc::new(MockGenerator::new(MockMode::Fixed(
            "I'm sorry, I can't help with that.".to_string(),
        )));
        let source = collection(3);
        let report = translator(&mock, fast_config())
            .translate_in_batches(&source, "French")
            .await
            .unwrap();

        assert_eq!(report.translations, source.source_map());
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_completeness_for_various_sizes() {
        for size in [0, 1, 49, 50, 51, 120] {
            for mode in [MockMode::Suffix, MockMode::Error("down".to_string())] {
                let mock = Arc::new(MockGenerator::new(mode));
                let source = collection(size);
                let report = translator(&mock, fast_config())
                    .translate_in_batches(&source, "Spanish")
                    .await
                    .unwrap();
                assert_same_keys(&report, &source);
            }
        }
    }

    #[tokio::test]
    async fn test_untranslated_keys_in_collection_order() {
        let mock = Arc::new(MockGenerator::new(MockMode::FailForKeys(keys(&["k3"]))));
        let source = collection(8);
        let config = BatchConfig {
            batch_size: 3,
            ..fast_config()
        };
        let report = translator(&mock, config)
            .translate_in_batches(&source, "French")
            .await
            .unwrap();

        assert_eq!(report.batches[1].untranslated, vec!["k3", "k4", "k5"]);
        assert!(report.batches[0].untranslated.is_empty());
        assert_eq!(report.untranslated_keys(), vec!["k3", "k4", "k5"]);
    }

    // ========== Per-Entry Fallback ==========

    #[tokio::test]
    async fn test_per_entry_fallback_recovers_failed_batch() {
        let mock = Arc::new(MockGenerator::new(MockMode::FailForKeys(keys(&["k50"]))));
        let source = collection(120);
        let config = BatchConfig {
            per_entry_fallback: true,
            ..fast_config()
        };
        let report = translator(&mock, config)
            .translate_in_batches(&source, "French")
            .await
            .unwrap();

        assert_same_keys(&report, &source);
        assert_eq!(report.translations["k50"], "t50_French");
        assert_eq!(report.translations["k99"], "t99_French");
        assert!(report.is_fully_translated());
        match &report.batches[1].status {
            BatchStatus::PerEntry {
                attempts,
                translated,
                ..
            } => {
                assert_eq!(*attempts, 3);
                assert_eq!(*translated, 50);
            }
            other => panic!("Expected per-entry batch, got {:?}", other),
        }
        assert!(!report.batches[1].is_degraded());
        // 1 + 3 attempts + 50 single strings + 1
        assert_eq!(mock.calls(), 55);
    }

    #[tokio::test]
    async fn test_per_entry_fallback_keeps_source_for_failed_entries() {
        let mock = Arc::new(MockGenerator::new(MockMode::Error("down".to_string())));
        let source = collection(4);
        let config = BatchConfig {
            per_entry_fallback: true,
            ..fast_config()
        };
        let report = translator(&mock, config)
            .translate_in_batches(&source, "French")
            .await
            .unwrap();

        assert_eq!(report.translations, source.source_map());
        assert_eq!(report.untranslated_keys(), vec!["k0", "k1", "k2", "k3"]);
        assert!(matches!(
            report.batches[0].status,
            BatchStatus::PerEntry { translated: 0, .. }
        ));
        assert_eq!(mock.calls(), 3 + 4);
    }

    #[tokio::test]
    async fn test_per_entry_answers_are_cleaned() {
        let mock = Arc::new(MockGenerator::new(MockMode::Fixed(
            "Translation: \"Enregistrer\"".to_string(),
        )));
        let config = BatchConfig {
            per_entry_fallback: true,
            ..fast_config()
        };
        let report = translator(&mock, config)
            .translate_in_batches(&collection(2), "French")
            .await
            .unwrap();

        assert_eq!(report.translations["k0"], "Enregistrer");
        assert_eq!(report.translations["k1"], "Enregistrer");
        assert_eq!(report.untranslated_count(), 0);
    }

    // ========== Partial Answers ==========

    #[tokio::test]
    async fn test_omitted_keys_are_filled() {
        let mock = Arc::new(MockGenerator::new(MockMode::OmitKeys(keys(&["k1", "k3"]))));
        let source = collection(5);
        let report = translator(&mock, fast_config())
            .translate_in_batches(&source, "French")
            .await
            .unwrap();

        assert_same_keys(&report, &source);
        assert_eq!(report.filled, vec!["k1", "k3"]);
        assert_eq!(report.translations["k1"], "t1");
        assert_eq!(report.translations["k2"], "t2_French");
        assert!(!report.batches[0].is_degraded());
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_foreign_keys_are_discarded() {
        let mock = Arc::new(MockGenerator::new(MockMode::Fixed(
            r#"[{"key": "k0", "translation": "zero"}, {"key": "ghost", "translation": "boo"}]"#
                .to_string(),
        )));
        let source = collection(2);
        let report = translator(&mock, fast_config())
            .translate_in_batches(&source, "French")
            .await
            .unwrap();

        assert_same_keys(&report, &source);
        assert_eq!(report.translations["k0"], "zero");
        assert_eq!(report.batches[0].discarded, vec!["ghost"]);
        assert_eq!(report.filled, vec!["k1"]);
    }

    #[tokio::test]
    async fn test_only_foreign_keys_counts_as_empty() {
        let mock = Arc::new(MockGenerator::new(MockMode::Fixed(
            r#"{"ghost": "boo"}"#.to_string(),
        )));
        let source = collection(2);
        let report = translator(&mock, fast_config())
            .translate_in_batches(&source, "French")
            .await
            .unwrap();

        assert_eq!(report.translations, source.source_map());
        assert!(report.batches[0].is_degraded());
        assert_eq!(mock.calls(), 3);
    }

    // ========== Retries ==========

    #[tokio::test]
    async fn test_flaky_backend_recovers_on_last_attempt() {
        let mock = Arc::new(MockGenerator::new(MockMode::FlakyThenSuffix(2)));
        let source = collection(10);
        let report = translator(&mock, fast_config())
            .translate_in_batches(&source, "Italian")
            .await
            .unwrap();

        assert!(report.is_fully_translated());
        assert_eq!(
            report.batches[0].status,
            BatchStatus::Translated {
                attempts: 3,
                strategy: Strategy::Strict
            }
        );
    }

    #[tokio::test]
    async fn test_max_attempts_zero_still_calls_once() {
        let mock = Arc::new(MockGenerator::new(MockMode::Error("down".to_string())));
        let config = BatchConfig {
            max_attempts: 0,
            ..fast_config()
        };
        let report = translator(&mock, config)
            .translate_in_batches(&collection(1), "French")
            .await
            .unwrap();
        assert_eq!(mock.calls(), 1);
        assert!(report.batches[0].is_degraded());
    }

    #[tokio::test]
    async fn test_sloppy_answers_are_reconciled() {
        let mock = Arc::new(MockGenerator::new(MockMode::Sloppy));
        let source = collection(60);
        let report = translator(&mock, fast_config())
            .translate_in_batches(&source, "French")
            .await
            .unwrap();
        assert!(report.is_fully_translated());
        assert_eq!(report.translations["k59"], "t59_French");
    }

    // ========== Concurrency & Cancellation ==========

    #[tokio::test]
    async fn test_concurrent_batches_merge_in_order() {
        let mock = Arc::new(MockGenerator::with_delay(MockMode::Suffix, 10));
        let source = collection(230);
        let config = BatchConfig {
            concurrency: 4,
            ..fast_config()
        };
        let report = translator(&mock, config)
            .translate_in_batches(&source, "French")
            .await
            .unwrap();

        assert_same_keys(&report, &source);
        assert_eq!(
            report.batches.iter().map(|b| b.index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4]
        );
        assert!(report.is_fully_translated());
        assert_eq!(mock.calls(), 5);
    }

    #[tokio::test]
    async fn test_progress_reported_in_batch_order() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mock = Arc::new(MockGenerator::with_delay(
            MockMode::FailForKeys(keys(&["k0"])),
            5,
        ));
        let config = BatchConfig {
            concurrency: 3,
            ..fast_config()
        };
        translator(&mock, config)
            .with_progress(move |progress| sink.lock().unwrap().push(progress))
            .translate_in_batches(&collection(120), "French")
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.iter().map(|p| (p.completed, p.index)).collect::<Vec<_>>(),
            vec![(1, 0), (2, 1), (3, 2)]
        );
        assert!(seen.iter().all(|p| p.total == 3));
        assert_eq!(seen[0].untranslated, 50);
        assert_eq!(seen[2].size, 20);
        assert_eq!(seen[2].untranslated, 0);
    }

    #[tokio::test]
    async fn test_translation_runs_inside_spawned_task() {
        let mock = Arc::new(MockGenerator::new(MockMode::Suffix));
        let translator = translator(&mock, fast_config());
        let source = collection(60);

        let report = tokio::spawn(async move {
            translator.translate_in_batches(&source, "French").await
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(report.translations.len(), 60);
        assert!(report.is_fully_translated());
    }

    /// Cancels the token during the first backend call
    struct CancelOnFirstCall {
        token: CancellationToken,
        inner: MockGenerator,
    }

    #[async_trait]
    impl TextGenerator for CancelOnFirstCall {
        async fn generate(&self, prompt: &str, max_output_tokens: u32) -> MtResult<String> {
            self.token.cancel();
            self.inner.generate(prompt, max_output_tokens).await
        }

        fn provider_name(&self) -> &str {
            "cancelling mock"
        }
    }

    #[tokio::test]
    async fn test_cancellation_between_batches() {
        let token = CancellationToken::new();
        let generator = Arc::new(CancelOnFirstCall {
            token: token.clone(),
            inner: MockGenerator::new(MockMode::Suffix),
        });
        let translator =
            BatchTranslator::new(generator.clone(), fast_config()).with_cancellation(token);

        match translator.translate_in_batches(&collection(120), "French").await {
            Err(MtError::Cancelled { completed_batches }) => assert_eq!(completed_batches, 1),
            other => panic!("Expected Cancelled, got {:?}", other),
        }
        assert_eq!(generator.inner.calls(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let mock = Arc::new(MockGenerator::new(MockMode::Suffix));
        let result = translator(&mock, fast_config())
            .with_cancellation(token)
            .translate_in_batches(&collection(10), "French")
            .await;

        assert!(matches!(
            result,
            Err(MtError::Cancelled {
                completed_batches: 0
            })
        ));
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_language_rejected_before_any_call() {
        let mock = Arc::new(MockGenerator::new(MockMode::Suffix));
        let result = translator(&mock, fast_config())
            .translate_in_batches(&collection(3), "")
            .await;
        assert!(matches!(result, Err(MtError::InvalidLanguage(_))));
        assert_eq!(mock.calls(), 0);
    }

    // ========== fill_missing ==========

    #[test]
    fn test_fill_missing_restricts_and_reorders() {
        let source = collection(3);
        let mut translations: TranslationMap = [
            ("ghost".to_string(), "boo".to_string()),
            ("k2".to_string(), "deux".to_string()),
            ("k0".to_string(), "zéro".to_string()),
        ]
        .into_iter()
        .collect();

        let filled = fill_missing(&source, &mut translations);
        assert_eq!(filled, vec!["k1"]);
        assert_eq!(
            translations.into_iter().collect::<Vec<_>>(),
            vec![
                ("k0".to_string(), "zéro".to_string()),
                ("k1".to_string(), "t1".to_string()),
                ("k2".to_string(), "deux".to_string()),
            ]
        );
    }

    #[test]
    fn test_batch_config_defaults() {
        let config = BatchConfig::default();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.max_output_tokens, 8192);
        assert_eq!(config.concurrency, 1);
        assert!(!config.per_entry_fallback);
    }
}
