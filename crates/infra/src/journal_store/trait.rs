use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tallyerp_accounting::{DateRange, JournalEntry, LedgerRow, SourceType};
use tallyerp_core::{DomainError, DomainResult, JournalEntryId};

/// Posting state of an originating business record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    /// Registered, not yet journalized.
    Pending,
    Posted,
    /// Its journal entry was voided; the record may be posted again.
    Voided,
}

impl SourceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceStatus::Pending => "pending",
            SourceStatus::Posted => "posted",
            SourceStatus::Voided => "voided",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "pending" => Ok(SourceStatus::Pending),
            "posted" => Ok(SourceStatus::Posted),
            "voided" => Ok(SourceStatus::Voided),
            other => Err(DomainError::validation(format!("unknown source status: {other}"))),
        }
    }
}

/// Back-reference row on the originating business record.
///
/// Carries the journal link the poster writes after a successful posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub source_type: SourceType,
    pub source_id: String,
    pub status: SourceStatus,
    pub journal_entry_id: Option<JournalEntryId>,
    pub journal_ref: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SourceRecord {
    pub fn pending(source_type: SourceType, source_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            source_type,
            source_id: source_id.into(),
            status: SourceStatus::Pending,
            journal_entry_id: None,
            journal_ref: None,
            updated_at: at,
        }
    }

    /// Source row linked to `entry` and marked posted.
    pub fn posted_by(entry: &JournalEntry, at: DateTime<Utc>) -> Self {
        Self {
            source_type: entry.source_type,
            source_id: entry.source_id.clone(),
            status: SourceStatus::Posted,
            journal_entry_id: Some(entry.id),
            journal_ref: Some(entry.reference.clone()),
            updated_at: at,
        }
    }

    pub fn is_posted(&self) -> bool {
        self.status == SourceStatus::Posted
    }

    /// `true` when this record points at `entry_id`.
    pub fn references(&self, entry_id: JournalEntryId) -> bool {
        self.journal_entry_id == Some(entry_id)
    }
}

/// Journal store operation error.
///
/// Infrastructure failures only. Composition errors never reach a store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A posted entry already exists for the same `(source_type, source_id)`.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The requested state change is not allowed (e.g. voiding twice).
    #[error("invalid state transition: {0}")]
    InvalidState(String),

    /// Anything else the backend reported. `retryable` marks transient causes.
    #[error("storage backend error: {message}")]
    Backend { retryable: bool, message: String },
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            retryable: false,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Backend {
            retryable: true,
            message: message.into(),
        }
    }
}

/// Read side of the journal: entries, general-ledger rows, source links.
#[async_trait::async_trait]
pub trait JournalLedger: Send + Sync {
    async fn source_record(
        &self,
        source_type: SourceType,
        source_id: &str,
    ) -> Result<Option<SourceRecord>, StoreError>;

    /// Entry header with its lines, in line order.
    async fn entry(&self, id: JournalEntryId) -> Result<Option<JournalEntry>, StoreError>;

    /// All entries (posted and voided), ordered by entry date then reference.
    async fn entries(&self) -> Result<Vec<JournalEntry>, StoreError>;

    /// General-ledger rows of posted entries dated inside `range`.
    async fn ledger_rows(&self, range: &DateRange) -> Result<Vec<LedgerRow>, StoreError>;

    /// General-ledger rows written for one entry, regardless of its status.
    async fn entry_ledger_rows(&self, id: JournalEntryId) -> Result<Vec<LedgerRow>, StoreError>;

    /// `true` when any posted entry has a line on `account_code`.
    async fn has_posted_lines(&self, account_code: &str) -> Result<bool, StoreError>;

    /// Monotonic counter bumped by every write.
    async fn revision(&self) -> Result<u64, StoreError>;
}

/// Transactional journal store.
///
/// ## Atomicity
///
/// `persist_posting` writes the entry header, its lines, the general-ledger
/// mirror rows and the source-record link as one unit: either all of them
/// become visible or none do.
///
/// ## Uniqueness
///
/// At most one `Posted` entry may exist per `(source_type, source_id)`. A
/// second one fails with [`StoreError::UniqueViolation`], which closes the
/// race between the poster's idempotency check and its write.
#[async_trait::async_trait]
pub trait JournalStore: JournalLedger {
    /// Create a `Pending` source record, or return the existing one.
    async fn register_source(
        &self,
        source_type: SourceType,
        source_id: &str,
    ) -> Result<SourceRecord, StoreError>;

    async fn persist_posting(&self, entry: &JournalEntry) -> Result<(), StoreError>;

    /// `Posted -> Voided`, plus the source record when it points at this entry.
    async fn void_entry(
        &self,
        id: JournalEntryId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<JournalEntry, StoreError>;

    /// Point the entry's source record at it and mark it posted.
    async fn link_source(&self, entry: &JournalEntry) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<S> JournalLedger for Arc<S>
where
    S: JournalLedger + ?Sized,
{
    async fn source_record(
        &self,
        source_type: SourceType,
        source_id: &str,
    ) -> Result<Option<SourceRecord>, StoreError> {
        (**self).source_record(source_type, source_id).await
    }

    async fn entry(&self, id: JournalEntryId) -> Result<Option<JournalEntry>, StoreError> {
        (**self).entry(id).await
    }

    async fn entries(&self) -> Result<Vec<JournalEntry>, StoreError> {
        (**self).entries().await
    }

    async fn ledger_rows(&self, range: &DateRange) -> Result<Vec<LedgerRow>, StoreError> {
        (**self).ledger_rows(range).await
    }

    async fn entry_ledger_rows(&self, id: JournalEntryId) -> Result<Vec<LedgerRow>, StoreError> {
        (**self).entry_ledger_rows(id).await
    }

    async fn has_posted_lines(&self, account_code: &str) -> Result<bool, StoreError> {
        (**self).has_posted_lines(account_code).await
    }

    async fn revision(&self) -> Result<u64, StoreError> {
        (**self).revision().await
    }
}

#[async_trait::async_trait]
impl<S> JournalStore for Arc<S>
where
    S: JournalStore + ?Sized,
{
    async fn register_source(
        &self,
        source_type: SourceType,
        source_id: &str,
    ) -> Result<SourceRecord, StoreError> {
        (**self).register_source(source_type, source_id).await
    }

    async fn persist_posting(&self, entry: &JournalEntry) -> Result<(), StoreError> {
        (**self).persist_posting(entry).await
    }

    async fn void_entry(
        &self,
        id: JournalEntryId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<JournalEntry, StoreError> {
        (**self).void_entry(id, reason, at).await
    }

    async fn link_source(&self, entry: &JournalEntry) -> Result<(), StoreError> {
        (**self).link_source(entry).await
    }
}
