//! Whole-collection translation in one backend call
//!
//! Small collections go out as a single prompt. Oversized input, backend
//! errors and unusable answers all fall through to [`BatchTranslator`].

use crate::batch::{BatchConfig, BatchProgress, BatchReport, BatchTranslator, fill_missing};
use crate::error::MtResult;
use crate::generator::{TextGenerator, validate_language};
use crate::prompt::{build_items, build_prompt, estimate_tokens};
use crate::reconcile::{Reconciliation, reconcile};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uitranslate::{KeyedTextCollection, TranslationMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SingleCallConfig {
    /// Payloads estimated above this many tokens skip the single call
    pub max_estimated_tokens: usize,
    pub max_output_tokens: u32,
    /// Run the completeness pass on single-call answers
    pub ensure_complete: bool,
}

impl Default for SingleCallConfig {
    fn default() -> Self {
        Self {
            max_estimated_tokens: 30_000,
            max_output_tokens: 8192,
            ensure_complete: true,
        }
    }
}

/// Why a run went through the batch path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchReason {
    Oversize {
        estimated_tokens: usize,
        limit: usize,
    },
    EmptyResponse,
    BackendError(String),
    /// The caller asked for batches
    Forced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `filled` lists keys completed with source text
    SingleCall { filled: Vec<String> },
    Batched {
        reason: BatchReason,
        report: BatchReport,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationOutcome {
    pub translations: TranslationMap,
    pub route: Route,
}

impl TranslationOutcome {
    pub fn is_batched(&self) -> bool {
        matches!(self.route, Route::Batched { .. })
    }

    /// Keys that ended up with source text instead of a translation
    pub fn untranslated_count(&self) -> usize {
        match &self.route {
            Route::SingleCall { filled } => filled.len(),
            Route::Batched { report, .. } => report.untranslated_count(),
        }
    }

    pub fn untranslated_keys(&self) -> Vec<String> {
        match &self.route {
            Route::SingleCall { filled } => filled.clone(),
            Route::Batched { report, .. } => report.untranslated_keys(),
        }
    }
}

pub struct SingleCallTranslator {
    generator: Arc<dyn TextGenerator>,
    config: SingleCallConfig,
    batch: BatchTranslator,
}

impl SingleCallTranslator {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        config: SingleCallConfig,
        batch_config: BatchConfig,
    ) -> Self {
        let batch = BatchTranslator::new(generator.clone(), batch_config);
        Self {
            generator,
            config,
            batch,
        }
    }

    /// Cancellation applies to the batch path
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.batch = self.batch.with_cancellation(token);
        self
    }

    /// Progress applies to the batch path
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(BatchProgress) + Send + Sync + 'static,
    {
        self.batch = self.batch.with_progress(callback);
        self
    }

    pub fn config(&self) -> &SingleCallConfig {
        &self.config
    }

    /// Translate `collection`, trying one call before batching
    ///
    /// # Arguments
    ///
    /// * `collection` - Strings to translate; borrowed for the whole run
    /// * `target_language` - Language name or code interpolated into the prompt
    ///
    /// # Returns
    ///
    /// * `Ok(TranslationOutcome)` - Translations plus the route that produced them
    /// * `Err(MtError)` - Invalid target language, or cancellation on the batch path
    pub async fn translate_all(
        &self,
        collection: &KeyedTextCollection,
        target_language: &str,
    ) -> MtResult<TranslationOutcome> {
        validate_language(target_language)?;
        if collection.is_empty() {
            return Ok(TranslationOutcome {
                translations: TranslationMap::new(),
                route: Route::SingleCall { filled: Vec::new() },
            });
        }

        let items = build_items(collection.entries());
        let estimated_tokens = estimate_tokens(&items)?;
        if estimated_tokens > self.config.max_estimated_tokens {
            info!(
                "Estimated {} tokens exceeds the single-call limit of {}, using batches",
                estimated_tokens, self.config.max_estimated_tokens
            );
            return self
                .batched(
                    collection,
                    target_language,
                    BatchReason::Oversize {
                        estimated_tokens,
                        limit: self.config.max_estimated_tokens,
                    },
                )
                .await;
        }

        info!(
            "Translating {} strings to {} in a single call (~{} tokens)",
            collection.len(),
            target_language,
            estimated_tokens
        );
        let prompt = build_prompt(&items, target_language)?;
        let raw = match self
            .generator
            .generate(&prompt, self.config.max_output_tokens)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Single call failed, falling back to batches: {}", e);
                return self
                    .batched(
                        collection,
                        target_language,
                        BatchReason::BackendError(e.to_string()),
                    )
                    .await;
            }
        };

        let mut translations = match reconcile(&raw) {
            Reconciliation::Success { translations, .. } => translations,
            Reconciliation::Empty => {
                warn!("Single call returned nothing usable, falling back to batches");
                return self
                    .batched(collection, target_language, BatchReason::EmptyResponse)
                    .await;
            }
        };

        if !self.config.ensure_complete {
            return Ok(TranslationOutcome {
                translations,
                route: Route::SingleCall { filled: Vec::new() },
            });
        }

        if !translations.keys().any(|key| collection.contains_key(key)) {
            warn!("Single call answered only unknown keys, falling back to batches");
            return self
                .batched(collection, target_language, BatchReason::EmptyResponse)
                .await;
        }

        let filled = fill_missing(collection, &mut translations);
        if !filled.is_empty() {
            warn!(
                "{} key(s) missing from the single-call answer were filled with source text",
                filled.len()
            );
        }
        Ok(TranslationOutcome {
            translations,
            route: Route::SingleCall { filled },
        })
    }

    /// Skip the single call and translate in batches
    pub async fn translate_in_batches(
        &self,
        collection: &KeyedTextCollection,
        target_language: &str,
    ) -> MtResult<TranslationOutcome> {
        self.batched(collection, target_language, BatchReason::Forced)
            .await
    }

    async fn batched(
        &self,
        collection: &KeyedTextCollection,
        target_language: &str,
        reason: BatchReason,
    ) -> MtResult<TranslationOutcome> {
        let report = self
            .batch
            .translate_in_batches(collection, target_language)
            .await?;
        Ok(TranslationOutcome {
            translations: report.translations.clone(),
            route: Route::Batched { reason, report },
        })
    }
}
