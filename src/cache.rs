//! Translate-on-read cache for record descriptions.
//!
//! A record's `translations` map is the cache: one entry per target language,
//! written once and trusted forever. The cache is consulted before any call
//! to the translator, and an entry is only written after the translator
//! succeeds. Writes go through [`PersistQueue`] and are never awaited by the
//! read path.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::TranslationError;
use crate::language::{LanguageCode, AUTO_DETECT};
use crate::record::{Record, RecordKey};
use crate::store::{Lookup, RecordStore, WriteOutcome};
use crate::translator::Translator;

/// What to hand back when the translator fails on a cache miss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Surface a service error to the caller
    #[default]
    Strict,
    /// Return a placeholder text as a degraded success
    Lenient,
}

impl std::str::FromStr for FailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => anyhow::bail!("unknown failure policy '{}'", other),
        }
    }
}

/// How the record to translate is located
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordLocator {
    Key { partition_key: String, sort_key: String },
    /// Only the sort key is known; resolved by scanning partitions
    SortKey(String),
}

#[derive(Debug)]
pub enum TranslateOutcome {
    Translated {
        record: Record,
        translated_text: String,
        cache_hit: bool,
    },
    /// Lenient policy: translator failed, placeholder returned, nothing cached
    Degraded {
        record: Record,
        placeholder: String,
        error: TranslationError,
    },
    /// Strict policy: translator failed, nothing cached
    TranslationFailed {
        record: Record,
        error: TranslationError,
    },
    NotFound,
    StoreUnavailable,
}

/// Placeholder used by the lenient policy
pub fn placeholder_text(language: &LanguageCode, description: &str) -> String {
    format!("[{}] {}", language, description)
}

enum PersistJob {
    Write {
        key: RecordKey,
        language: LanguageCode,
        text: String,
    },
    Flush(oneshot::Sender<()>),
}

/// Write-behind queue for cache entries.
///
/// A single detached worker drains jobs in order. Each write re-reads the
/// current record and merges one (language, text) entry into it, so entries
/// for other languages and concurrent updates to other attributes survive.
/// Failures are logged and otherwise ignored: the next read of that language
/// simply misses and translates again.
#[derive(Clone)]
pub struct PersistQueue {
    tx: mpsc::UnboundedSender<PersistJob>,
}

impl PersistQueue {
    /// Spawn the worker on the current tokio runtime
    pub fn spawn(store: RecordStore) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match job {
                    PersistJob::Write {
                        key,
                        language,
                        text,
                    } => merge_translation(&store, &key, &language, text).await,
                    PersistJob::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
            debug!("Persist queue worker stopped");
        });

        (Self { tx }, worker)
    }

    /// Enqueue one cache entry. Never blocks; if the worker is gone the write is dropped.
    pub fn enqueue(&self, key: RecordKey, language: &LanguageCode, text: String) {
        let job = PersistJob::Write {
            key: key.clone(),
            language: language.clone(),
            text,
        };
        if self.tx.send(job).is_err() {
            warn!(
                "Persist queue closed, translation cache write for {} ({}) lost",
                key, language
            );
        }
    }

    /// Wait until every write enqueued before this call has been attempted
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(PersistJob::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

async fn merge_translation(
    store: &RecordStore,
    key: &RecordKey,
    language: &LanguageCode,
    text: String,
) {
    let mut record = match store.get_by_key(&key.partition_key, &key.sort_key).await {
        Lookup::Found(record) => record,
        Lookup::NotFound => {
            warn!("Record {} vanished before its {} translation was cached", key, language);
            return;
        }
        Lookup::Unavailable => {
            warn!("Dropping translation cache write for {} ({})", key, language);
            return;
        }
    };

    if record.translations.contains_key(language.as_str()) {
        debug!("Translation {} for {} already cached", language, key);
        return;
    }
    record.translations.insert(language.as_str().to_string(), text);

    match store.insert(&record).await {
        WriteOutcome::Written => debug!("Persisted {} translation for {}", language, key),
        WriteOutcome::Failed => warn!("Dropping translation cache write for {} ({})", key, language),
    }
}

/// Decides when to call the translator and merges results into the record
#[derive(Clone)]
pub struct TranslationCache {
    store: RecordStore,
    translator: Arc<dyn Translator>,
    policy: FailurePolicy,
    persist: PersistQueue,
}

impl TranslationCache {
    pub fn new(
        store: RecordStore,
        translator: Arc<dyn Translator>,
        policy: FailurePolicy,
        persist: PersistQueue,
    ) -> Self {
        Self {
            store,
            translator,
            policy,
            persist,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub async fn get_translated_description(
        &self,
        locator: &RecordLocator,
        language: &LanguageCode,
    ) -> TranslateOutcome {
        let lookup = match locator {
            RecordLocator::Key {
                partition_key,
                sort_key,
            } => self.store.get_by_key(partition_key, sort_key).await,
            RecordLocator::SortKey(sort_key) => self.store.get_by_sort_key(sort_key).await,
        };

        let record = match lookup {
            Lookup::Found(record) => record,
            Lookup::NotFound => return TranslateOutcome::NotFound,
            Lookup::Unavailable => return TranslateOutcome::StoreUnavailable,
        };

        self.translate_record(record, language).await
    }

    /// Cache protocol for an already-resolved record
    pub async fn translate_record(
        &self,
        mut record: Record,
        language: &LanguageCode,
    ) -> TranslateOutcome {
        if record.description.trim().is_empty() {
            return TranslateOutcome::Translated {
                record,
                translated_text: String::new(),
                cache_hit: false,
            };
        }

        if let Some(cached) = record.translations.get(language.as_str()) {
            debug!("Translation cache hit for {} ({})", record.key(), language);
            let translated_text = cached.clone();
            return TranslateOutcome::Translated {
                record,
                translated_text,
                cache_hit: true,
            };
        }

        let result = self
            .translator
            .translate(&record.description, AUTO_DETECT, language.as_str())
            .await;

        match result {
            Ok(translated) => {
                info!("Translated {} into {}", record.key(), language);
                let translated_text = record
                    .translations
                    .entry(language.as_str().to_string())
                    .or_insert(translated)
                    .clone();
                self.persist.enqueue(record.key(), language, translated_text.clone());
                TranslateOutcome::Translated {
                    record,
                    translated_text,
                    cache_hit: false,
                }
            }
            Err(error) => {
                warn!(
                    "Translation of {} into {} failed [{}]: {}",
                    record.key(),
                    language,
                    error.code(),
                    error
                );
                match self.policy {
                    FailurePolicy::Strict => TranslateOutcome::TranslationFailed { record, error },
                    FailurePolicy::Lenient => {
                        let placeholder = placeholder_text(language, &record.description);
                        TranslateOutcome::Degraded {
                            record,
                            placeholder,
                            error,
                        }
                    }
                }
            }
        }
    }
}
