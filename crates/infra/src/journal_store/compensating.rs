//! Compensating adapter for stores without multi-table transactions.
//!
//! Writes a posting as header -> lines -> ledger mirror -> source update and
//! deletes what was written when a later step fails. A crash between steps can
//! still leave an orphaned header; [`crate::reconcile`] detects and resolves it.

use chrono::{DateTime, Utc};
use tracing::{error, warn};

use tallyerp_accounting::{DateRange, JournalEntry, LedgerRow, SourceType};
use tallyerp_core::JournalEntryId;

use super::r#trait::{JournalLedger, JournalStore, SourceRecord, SourceStatus, StoreError};

/// Individually committed writes of a posting.
///
/// `insert_header` must enforce the header constraints (unique id, one posted
/// entry per source) and report them as [`StoreError::UniqueViolation`].
#[async_trait::async_trait]
pub trait StepwiseJournalStore: JournalLedger {
    async fn register_source(
        &self,
        source_type: SourceType,
        source_id: &str,
    ) -> Result<SourceRecord, StoreError>;

    async fn insert_header(&self, entry: &JournalEntry) -> Result<(), StoreError>;

    async fn insert_lines(&self, entry: &JournalEntry) -> Result<(), StoreError>;

    async fn insert_ledger_rows(&self, entry: &JournalEntry) -> Result<(), StoreError>;

    async fn write_source(&self, record: &SourceRecord) -> Result<(), StoreError>;

    /// Persist `status`, `voided_at` and `void_reason` of an existing header.
    async fn write_entry_status(&self, entry: &JournalEntry) -> Result<(), StoreError>;

    /// Remove a header with its lines and ledger rows.
    async fn delete_entry(&self, id: JournalEntryId) -> Result<(), StoreError>;
}

/// [`JournalStore`] over a [`StepwiseJournalStore`], undoing partial writes.
#[derive(Debug, Default)]
pub struct CompensatingJournalStore<S> {
    inner: S,
}

impl<S> CompensatingJournalStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: StepwiseJournalStore> CompensatingJournalStore<S> {
    async fn write_after_header(&self, entry: &JournalEntry) -> Result<(), StoreError> {
        self.inner.insert_lines(entry).await?;
        self.inner.insert_ledger_rows(entry).await?;
        self.inner
            .write_source(&SourceRecord::posted_by(entry, Utc::now()))
            .await
    }

    async fn void_source(&self, entry: &JournalEntry, at: DateTime<Utc>) -> Result<(), StoreError> {
        let linked = self
            .inner
            .source_record(entry.source_type, &entry.source_id)
            .await?
            .filter(|s| s.references(entry.id));
        match linked {
            Some(source) => {
                self.inner
                    .write_source(&SourceRecord {
                        status: SourceStatus::Voided,
                        updated_at: at,
                        ..source
                    })
                    .await
            }
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl<S: StepwiseJournalStore> JournalLedger for CompensatingJournalStore<S> {
    async fn source_record(
        &self,
        source_type: SourceType,
        source_id: &str,
    ) -> Result<Option<SourceRecord>, StoreError> {
        self.inner.source_record(source_type, source_id).await
    }

    async fn entry(&self, id: JournalEntryId) -> Result<Option<JournalEntry>, StoreError> {
        self.inner.entry(id).await
    }

    async fn entries(&self) -> Result<Vec<JournalEntry>, StoreError> {
        self.inner.entries().await
    }

    async fn ledger_rows(&self, range: &DateRange) -> Result<Vec<LedgerRow>, StoreError> {
        self.inner.ledger_rows(range).await
    }

    async fn entry_ledger_rows(&self, id: JournalEntryId) -> Result<Vec<LedgerRow>, StoreError> {
        self.inner.entry_ledger_rows(id).await
    }

    async fn has_posted_lines(&self, account_code: &str) -> Result<bool, StoreError> {
        self.inner.has_posted_lines(account_code).await
    }

    async fn revision(&self) -> Result<u64, StoreError> {
        self.inner.revision().await
    }
}

#[async_trait::async_trait]
impl<S: StepwiseJournalStore> JournalStore for CompensatingJournalStore<S> {
    async fn register_source(
        &self,
        source_type: SourceType,
        source_id: &str,
    ) -> Result<SourceRecord, StoreError> {
        self.inner.register_source(source_type, source_id).await
    }

    async fn persist_posting(&self, entry: &JournalEntry) -> Result<(), StoreError> {
        self.inner.insert_header(entry).await?;

        if let Err(err) = self.write_after_header(entry).await {
            warn!(
                entry_id = %entry.id,
                reference = %entry.reference,
                error = %err,
                "posting failed after header write, compensating"
            );
            if let Err(cleanup) = self.inner.delete_entry(entry.id).await {
                error!(
                    entry_id = %entry.id,
                    error = %cleanup,
                    "compensation failed, orphaned header left for reconciliation"
                );
            }
            return Err(err);
        }
        Ok(())
    }

    async fn void_entry(
        &self,
        id: JournalEntryId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<JournalEntry, StoreError> {
        let original = self
            .inner
            .entry(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("journal entry {id}")))?;

        let mut voided = original.clone();
        voided
            .void(reason, at)
            .map_err(|e| StoreError::InvalidState(e.to_string()))?;

        self.inner.write_entry_status(&voided).await?;

        if let Err(err) = self.void_source(&voided, at).await {
            warn!(entry_id = %id, error = %err, "void failed at source update, restoring entry status");
            if let Err(restore) = self.inner.write_entry_status(&original).await {
                error!(entry_id = %id, error = %restore, "could not restore entry status");
            }
            return Err(err);
        }
        Ok(voided)
    }

    async fn link_source(&self, entry: &JournalEntry) -> Result<(), StoreError> {
        self.inner
            .write_source(&SourceRecord::posted_by(entry, Utc::now()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal_store::in_memory::{InMemoryStepwiseStore, Step};
    use chrono::NaiveDate;
    use tallyerp_accounting::{ComposedJournal, JournalLine};
    use tallyerp_core::Decimal;

    fn entry(source_id: &str) -> JournalEntry {
        let amount = Decimal::from(250_000);
        let composed = ComposedJournal {
            source_type: SourceType::CashDisbursement,
            source_id: source_id.to_string(),
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            description: "Bayar listrik".to_string(),
            lines: vec![
                JournalLine::debit("6-1200", amount, "Bayar listrik"),
                JournalLine::credit("1-1001", amount, "Bayar listrik"),
            ],
            total_debit: amount,
            total_credit: amount,
        };
        JournalEntry::posted(JournalEntryId::new(), "CD-20240115-ab12cd34", composed, Utc::now())
    }

    #[tokio::test]
    async fn later_step_failure_removes_everything_written() {
        for step in [Step::Lines, Step::LedgerRows, Step::Source] {
            let store = CompensatingJournalStore::new(InMemoryStepwiseStore::new());
            let e = entry("ab12cd34");
            store.inner().fail_next(step);

            let err = store.persist_posting(&e).await.unwrap_err();
            assert!(matches!(err, StoreError::Backend { retryable: true, .. }), "{step:?}");
            assert!(store.entry(e.id).await.unwrap().is_none(), "{step:?}");
            assert!(store.entry_ledger_rows(e.id).await.unwrap().is_empty(), "{step:?}");
            assert!(store
                .source_record(SourceType::CashDisbursement, "ab12cd34")
                .await
                .unwrap()
                .is_none());
        }
    }

    #[tokio::test]
    async fn failed_compensation_leaves_an_orphan_header() {
        let store = CompensatingJournalStore::new(InMemoryStepwiseStore::new());
        let e = entry("ab12cd34");
        store.inner().fail_next(Step::Source);
        store.inner().fail_next(Step::Delete);

        assert!(store.persist_posting(&e).await.is_err());
        let orphan = store.entry(e.id).await.unwrap().unwrap();
        assert!(orphan.is_posted());
        assert!(store
            .source_record(SourceType::CashDisbursement, "ab12cd34")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn void_restores_status_when_source_update_fails() {
        let store = CompensatingJournalStore::new(InMemoryStepwiseStore::new());
        let e = entry("ab12cd34");
        store.persist_posting(&e).await.unwrap();

        store.inner().fail_next(Step::Source);
        assert!(store.void_entry(e.id, "wrong amount", Utc::now()).await.is_err());
        assert!(store.entry(e.id).await.unwrap().unwrap().is_posted());

        let voided = store.void_entry(e.id, "wrong amount", Utc::now()).await.unwrap();
        assert!(!voided.is_posted());
        let source = store
            .source_record(SourceType::CashDisbursement, "ab12cd34")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(source.status, SourceStatus::Voided);
    }
}
