//! Journal poster: compose, guard idempotency, persist atomically.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{Span, info, instrument, warn};

use tallyerp_accounting::{
    AccountDefaults, BusinessEvent, ChartOfAccounts, ComposeError, ComposedJournal, JournalComposer,
    JournalEntry, SourceType, reference_for,
};
use tallyerp_core::JournalEntryId;

use crate::journal_store::{JournalStore, SourceRecord, StoreError};
use crate::reconcile::repair_entry;

/// Posting failure taxonomy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PostingError {
    /// The event could not be composed; nothing was persisted.
    #[error(transparent)]
    Compose(#[from] ComposeError),

    /// The source record already carries a posted journal. Terminal, not retryable.
    #[error("{source_type} {source_id} is already posted as {reference}")]
    AlreadyPosted {
        source_type: SourceType,
        source_id: String,
        reference: String,
    },

    #[error("source record {source_type} {source_id} not found")]
    SourceNotFound {
        source_type: SourceType,
        source_id: String,
    },

    /// The atomic write failed and was rolled back or compensated.
    #[error("persistence failed: {message}")]
    PersistenceFailure { retryable: bool, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),
}

impl From<StoreError> for PostingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(m) => PostingError::NotFound(m),
            StoreError::InvalidState(m) => PostingError::InvalidTransition(m),
            StoreError::Backend { retryable, message } => {
                PostingError::PersistenceFailure { retryable, message }
            }
            // Callers that know the source resolve the reference themselves.
            StoreError::UniqueViolation(message) => PostingError::PersistenceFailure {
                retryable: false,
                message,
            },
        }
    }
}

/// Retry policy for ambiguous persistence failures.
///
/// `max_attempts` counts the first attempt, so `1` disables retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Exponential backoff after attempt `attempt` (1-indexed), capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt - 1);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Transactional writer for composed journals.
#[derive(Debug)]
pub struct JournalPoster<S> {
    store: S,
    coa: Arc<ChartOfAccounts>,
    defaults: AccountDefaults,
    retry: RetryPolicy,
}

impl<S: JournalStore> JournalPoster<S> {
    pub fn new(store: S, coa: Arc<ChartOfAccounts>, defaults: AccountDefaults) -> Self {
        Self {
            store,
            coa,
            defaults,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn chart(&self) -> &ChartOfAccounts {
        &self.coa
    }

    /// Compose without persisting.
    pub fn compose(&self, event: &BusinessEvent) -> Result<ComposedJournal, PostingError> {
        Ok(JournalComposer::new(&self.coa, &self.defaults).compose(event)?)
    }

    /// Compose and persist in a single attempt.
    #[instrument(
        skip(self, event),
        fields(
            source_type = %event.source_type(),
            source_id = %event.source_id(),
            operation = tracing::field::Empty
        ),
        err
    )]
    pub async fn post(&self, event: &BusinessEvent) -> Result<JournalEntry, PostingError> {
        Span::current().record("operation", "post");

        let entry = self.prepare(self.compose(event)?);
        self.ensure_not_posted(entry.source_type, &entry.source_id).await?;
        self.persist(&entry).await?;
        Ok(entry)
    }

    /// Compose and persist, retrying transient failures.
    ///
    /// Before every re-attempt the store is re-read for the previous attempt's
    /// entry. A complete entry that landed despite the reported failure is
    /// linked if needed and returned; an incomplete one is voided and the
    /// retry proceeds under a fresh id. A source posted by someone else is
    /// `AlreadyPosted`.
    #[instrument(
        skip(self, event),
        fields(
            source_type = %event.source_type(),
            source_id = %event.source_id(),
            operation = tracing::field::Empty
        ),
        err
    )]
    pub async fn post_with_retry(&self, event: &BusinessEvent) -> Result<JournalEntry, PostingError> {
        Span::current().record("operation", "post_with_retry");

        let composed = self.compose(event)?;
        let mut entry = self.prepare(composed.clone());

        let mut attempt = 1;
        loop {
            if attempt > 1 {
                if let Some(landed) = self.store.entry(entry.id).await? {
                    if landed.is_posted() && repair_entry(&self.store, &landed).await?.is_kept() {
                        info!(
                            entry_id = %landed.id,
                            attempt,
                            "previous attempt had landed, not re-posting"
                        );
                        return Ok(landed);
                    }
                    warn!(
                        entry_id = %landed.id,
                        attempt,
                        "previous attempt left an incomplete entry, retrying under a new id"
                    );
                    entry = self.prepare(composed.clone());
                }
            }
            self.ensure_not_posted(entry.source_type, &entry.source_id).await?;

            match self.persist(&entry).await {
                Ok(()) => return Ok(entry),
                Err(PostingError::PersistenceFailure {
                    retryable: true,
                    message,
                }) if self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        entry_id = %entry.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "posting attempt failed, re-checking before retry"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// `Posted -> Voided`. The source record becomes postable again.
    #[instrument(skip(self, reason), fields(entry_id = %id), err)]
    pub async fn void(&self, id: JournalEntryId, reason: &str) -> Result<JournalEntry, PostingError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(PostingError::InvalidTransition(
                "a void reason is required".to_string(),
            ));
        }

        let entry = self.store.void_entry(id, reason, Utc::now()).await?;
        info!(entry_id = %entry.id, reference = %entry.reference, "journal entry voided");
        Ok(entry)
    }

    /// Register an originating record ahead of posting.
    pub async fn register_source(
        &self,
        source_type: SourceType,
        source_id: &str,
    ) -> Result<SourceRecord, PostingError> {
        Ok(self.store.register_source(source_type, source_id.trim()).await?)
    }

    /// Posting state of an originating record.
    pub async fn source_status(
        &self,
        source_type: SourceType,
        source_id: &str,
    ) -> Result<SourceRecord, PostingError> {
        self.store
            .source_record(source_type, source_id)
            .await?
            .ok_or_else(|| PostingError::SourceNotFound {
                source_type,
                source_id: source_id.to_string(),
            })
    }

    fn prepare(&self, composed: ComposedJournal) -> JournalEntry {
        let reference = reference_for(composed.source_type, composed.entry_date, &composed.source_id);
        JournalEntry::posted(JournalEntryId::new(), reference, composed, Utc::now())
    }

    async fn ensure_not_posted(&self, source_type: SourceType, source_id: &str) -> Result<(), PostingError> {
        match self.store.source_record(source_type, source_id).await? {
            Some(record) if record.is_posted() => Err(PostingError::AlreadyPosted {
                source_type,
                source_id: source_id.to_string(),
                reference: record.journal_ref.unwrap_or_default(),
            }),
            _ => Ok(()),
        }
    }

    async fn persist(&self, entry: &JournalEntry) -> Result<(), PostingError> {
        match self.store.persist_posting(entry).await {
            Ok(()) => {
                info!(
                    entry_id = %entry.id,
                    reference = %entry.reference,
                    total = %entry.total_debit,
                    "journal entry posted"
                );
                Ok(())
            }
            Err(StoreError::UniqueViolation(detail)) => {
                // Lost the race against a concurrent poster of the same source.
                let reference = self
                    .store
                    .source_record(entry.source_type, &entry.source_id)
                    .await
                    .ok()
                    .flatten()
                    .and_then(|r| r.journal_ref)
                    .unwrap_or(detail);
                Err(PostingError::AlreadyPosted {
                    source_type: entry.source_type,
                    source_id: entry.source_id.clone(),
                    reference,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}
