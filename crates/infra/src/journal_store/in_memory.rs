use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use tallyerp_accounting::{DateRange, JournalEntry, JournalLine, LedgerRow, SourceType};
use tallyerp_core::JournalEntryId;

use super::compensating::StepwiseJournalStore;
use super::r#trait::{JournalLedger, JournalStore, SourceRecord, SourceStatus, StoreError};

type SourceKey = (SourceType, String);

/// Table-shaped in-memory state shared by both in-memory stores.
///
/// Headers are kept without their lines; lines and ledger rows live in their
/// own tables, so a stepwise writer can leave them out of sync.
#[derive(Debug, Default)]
struct Tables {
    headers: BTreeMap<JournalEntryId, JournalEntry>,
    lines: HashMap<JournalEntryId, Vec<JournalLine>>,
    ledger: Vec<LedgerRow>,
    sources: HashMap<SourceKey, SourceRecord>,
    revision: u64,
}

impl Tables {
    fn entry(&self, id: JournalEntryId) -> Option<JournalEntry> {
        let mut entry = self.headers.get(&id)?.clone();
        entry.lines = self.lines.get(&id).cloned().unwrap_or_default();
        Some(entry)
    }

    fn entries(&self) -> Vec<JournalEntry> {
        let mut all: Vec<_> = self.headers.keys().filter_map(|id| self.entry(*id)).collect();
        all.sort_by(|a, b| {
            a.entry_date
                .cmp(&b.entry_date)
                .then_with(|| a.reference.cmp(&b.reference))
        });
        all
    }

    fn is_posted(&self, id: JournalEntryId) -> bool {
        self.headers.get(&id).is_some_and(JournalEntry::is_posted)
    }

    fn ledger_rows(&self, range: &DateRange) -> Vec<LedgerRow> {
        self.ledger
            .iter()
            .filter(|r| range.contains(r.entry_date) && self.is_posted(r.entry_id))
            .cloned()
            .collect()
    }

    fn entry_ledger_rows(&self, id: JournalEntryId) -> Vec<LedgerRow> {
        self.ledger
            .iter()
            .filter(|r| r.entry_id == id)
            .cloned()
            .collect()
    }

    fn has_posted_lines(&self, account_code: &str) -> bool {
        self.lines.iter().any(|(id, lines)| {
            self.is_posted(*id) && lines.iter().any(|l| l.account_code == account_code)
        })
    }

    fn source(&self, source_type: SourceType, source_id: &str) -> Option<SourceRecord> {
        self.sources
            .get(&(source_type, source_id.to_string()))
            .cloned()
    }

    fn register_source(&mut self, source_type: SourceType, source_id: &str, at: DateTime<Utc>) -> SourceRecord {
        let key = (source_type, source_id.to_string());
        if let Some(existing) = self.sources.get(&key) {
            return existing.clone();
        }
        let record = SourceRecord::pending(source_type, source_id, at);
        self.sources.insert(key, record.clone());
        self.revision += 1;
        record
    }

    /// Header-table constraints: primary key plus one posted entry per source.
    fn check_header(&self, entry: &JournalEntry) -> Result<(), StoreError> {
        if self.headers.contains_key(&entry.id) {
            return Err(StoreError::UniqueViolation(format!(
                "journal entry {} already exists",
                entry.id
            )));
        }
        let duplicate = self.headers.values().find(|h| {
            h.is_posted() && h.source_type == entry.source_type && h.source_id == entry.source_id
        });
        if let Some(existing) = duplicate {
            return Err(StoreError::UniqueViolation(format!(
                "{} {} already posted as {}",
                entry.source_type, entry.source_id, existing.reference
            )));
        }
        Ok(())
    }

    fn require_header(&self, id: JournalEntryId) -> Result<(), StoreError> {
        if self.headers.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("journal entry {id}")))
        }
    }

    fn put_header(&mut self, entry: &JournalEntry) {
        let header = JournalEntry {
            lines: Vec::new(),
            ..entry.clone()
        };
        self.headers.insert(entry.id, header);
        self.revision += 1;
    }

    fn put_lines(&mut self, entry: &JournalEntry) {
        self.lines.insert(entry.id, entry.lines.clone());
        self.revision += 1;
    }

    fn put_ledger_rows(&mut self, entry: &JournalEntry) {
        self.ledger.extend(entry.ledger_rows());
        self.revision += 1;
    }

    fn put_source(&mut self, record: &SourceRecord) {
        self.sources.insert(
            (record.source_type, record.source_id.clone()),
            record.clone(),
        );
        self.revision += 1;
    }

    fn put_status(&mut self, entry: &JournalEntry) {
        if let Some(header) = self.headers.get_mut(&entry.id) {
            header.status = entry.status;
            header.voided_at = entry.voided_at;
            header.void_reason = entry.void_reason.clone();
            self.revision += 1;
        }
    }

    fn remove_entry(&mut self, id: JournalEntryId) {
        self.headers.remove(&id);
        self.lines.remove(&id);
        self.ledger.retain(|r| r.entry_id != id);
        self.revision += 1;
    }

    /// Source row after voiding `entry`, if the row points at it.
    fn voided_source(&self, entry: &JournalEntry, at: DateTime<Utc>) -> Option<SourceRecord> {
        self.source(entry.source_type, &entry.source_id)
            .filter(|s| s.references(entry.id))
            .map(|s| SourceRecord {
                status: SourceStatus::Voided,
                updated_at: at,
                ..s
            })
    }
}

fn poisoned() -> StoreError {
    StoreError::backend("lock poisoned")
}

/// In-memory transactional journal store.
///
/// Intended for tests/dev. Every write runs under a single write lock, which
/// gives the same all-or-nothing visibility as a database transaction.
#[derive(Debug, Default)]
pub struct InMemoryJournalStore {
    tables: RwLock<Tables>,
}

impl InMemoryJournalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables.write().map_err(|_| poisoned())
    }
}

#[async_trait::async_trait]
impl JournalLedger for InMemoryJournalStore {
    async fn source_record(
        &self,
        source_type: SourceType,
        source_id: &str,
    ) -> Result<Option<SourceRecord>, StoreError> {
        Ok(self.read()?.source(source_type, source_id))
    }

    async fn entry(&self, id: JournalEntryId) -> Result<Option<JournalEntry>, StoreError> {
        Ok(self.read()?.entry(id))
    }

    async fn entries(&self) -> Result<Vec<JournalEntry>, StoreError> {
        Ok(self.read()?.entries())
    }

    async fn ledger_rows(&self, range: &DateRange) -> Result<Vec<LedgerRow>, StoreError> {
        Ok(self.read()?.ledger_rows(range))
    }

    async fn entry_ledger_rows(&self, id: JournalEntryId) -> Result<Vec<LedgerRow>, StoreError> {
        Ok(self.read()?.entry_ledger_rows(id))
    }

    async fn has_posted_lines(&self, account_code: &str) -> Result<bool, StoreError> {
        Ok(self.read()?.has_posted_lines(account_code))
    }

    async fn revision(&self) -> Result<u64, StoreError> {
        Ok(self.read()?.revision)
    }
}

#[async_trait::async_trait]
impl JournalStore for InMemoryJournalStore {
    async fn register_source(
        &self,
        source_type: SourceType,
        source_id: &str,
    ) -> Result<SourceRecord, StoreError> {
        Ok(self.write()?.register_source(source_type, source_id, Utc::now()))
    }

    async fn persist_posting(&self, entry: &JournalEntry) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        tables.check_header(entry)?;

        tables.put_header(entry);
        tables.put_lines(entry);
        tables.put_ledger_rows(entry);
        tables.put_source(&SourceRecord::posted_by(entry, Utc::now()));
        Ok(())
    }

    async fn void_entry(
        &self,
        id: JournalEntryId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<JournalEntry, StoreError> {
        let mut tables = self.write()?;
        let mut entry = tables
            .entry(id)
            .ok_or_else(|| StoreError::NotFound(format!("journal entry {id}")))?;
        entry
            .void(reason, at)
            .map_err(|e| StoreError::InvalidState(e.to_string()))?;

        tables.put_status(&entry);
        if let Some(source) = tables.voided_source(&entry, at) {
            tables.put_source(&source);
        }
        Ok(entry)
    }

    async fn link_source(&self, entry: &JournalEntry) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        tables.require_header(entry.id)?;
        tables.put_source(&SourceRecord::posted_by(entry, Utc::now()));
        Ok(())
    }
}

/// Individual write of a stepwise posting, used for fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Header,
    Lines,
    LedgerRows,
    Source,
    EntryStatus,
    Delete,
}

/// In-memory store without multi-table transactions.
///
/// Each step takes the lock on its own, so a failure between steps leaves the
/// earlier writes visible. `fail_next` injects a one-shot failure at a step.
#[derive(Debug, Default)]
pub struct InMemoryStepwiseStore {
    tables: RwLock<Tables>,
    faults: Mutex<HashSet<Step>>,
}

impl InMemoryStepwiseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next write at `step` fail with a retryable backend error.
    pub fn fail_next(&self, step: Step) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(step);
        }
    }

    fn trip(&self, step: Step) -> Result<(), StoreError> {
        let mut faults = self.faults.lock().map_err(|_| poisoned())?;
        if faults.remove(&step) {
            return Err(StoreError::transient(format!("injected failure at {step:?}")));
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables.write().map_err(|_| poisoned())
    }
}

#[async_trait::async_trait]
impl JournalLedger for InMemoryStepwiseStore {
    async fn source_record(
        &self,
        source_type: SourceType,
        source_id: &str,
    ) -> Result<Option<SourceRecord>, StoreError> {
        Ok(self.read()?.source(source_type, source_id))
    }

    async fn entry(&self, id: JournalEntryId) -> Result<Option<JournalEntry>, StoreError> {
        Ok(self.read()?.entry(id))
    }

    async fn entries(&self) -> Result<Vec<JournalEntry>, StoreError> {
        Ok(self.read()?.entries())
    }

    async fn ledger_rows(&self, range: &DateRange) -> Result<Vec<LedgerRow>, StoreError> {
        Ok(self.read()?.ledger_rows(range))
    }

    async fn entry_ledger_rows(&self, id: JournalEntryId) -> Result<Vec<LedgerRow>, StoreError> {
        Ok(self.read()?.entry_ledger_rows(id))
    }

    async fn has_posted_lines(&self, account_code: &str) -> Result<bool, StoreError> {
        Ok(self.read()?.has_posted_lines(account_code))
    }

    async fn revision(&self) -> Result<u64, StoreError> {
        Ok(self.read()?.revision)
    }
}

#[async_trait::async_trait]
impl StepwiseJournalStore for InMemoryStepwiseStore {
    async fn register_source(
        &self,
        source_type: SourceType,
        source_id: &str,
    ) -> Result<SourceRecord, StoreError> {
        Ok(self.write()?.register_source(source_type, source_id, Utc::now()))
    }

    async fn insert_header(&self, entry: &JournalEntry) -> Result<(), StoreError> {
        self.trip(Step::Header)?;
        let mut tables = self.write()?;
        tables.check_header(entry)?;
        tables.put_header(entry);
        Ok(())
    }

    async fn insert_lines(&self, entry: &JournalEntry) -> Result<(), StoreError> {
        self.trip(Step::Lines)?;
        let mut tables = self.write()?;
        tables.require_header(entry.id)?;
        tables.put_lines(entry);
        Ok(())
    }

    async fn insert_ledger_rows(&self, entry: &JournalEntry) -> Result<(), StoreError> {
        self.trip(Step::LedgerRows)?;
        let mut tables = self.write()?;
        tables.require_header(entry.id)?;
        tables.put_ledger_rows(entry);
        Ok(())
    }

    async fn write_source(&self, record: &SourceRecord) -> Result<(), StoreError> {
        self.trip(Step::Source)?;
        self.write()?.put_source(record);
        Ok(())
    }

    async fn write_entry_status(&self, entry: &JournalEntry) -> Result<(), StoreError> {
        self.trip(Step::EntryStatus)?;
        let mut tables = self.write()?;
        tables.require_header(entry.id)?;
        tables.put_status(entry);
        Ok(())
    }

    async fn delete_entry(&self, id: JournalEntryId) -> Result<(), StoreError> {
        self.trip(Step::Delete)?;
        self.write()?.remove_entry(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tallyerp_accounting::{ComposedJournal, JournalLine};
    use tallyerp_core::Decimal;

    fn entry(source_id: &str, amount: i64) -> JournalEntry {
        let amount = Decimal::from(amount);
        let composed = ComposedJournal {
            source_type: SourceType::Expense,
            source_id: source_id.to_string(),
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            description: "Listrik".to_string(),
            lines: vec![
                JournalLine::debit("6-1200", amount, "Listrik"),
                JournalLine::credit("1-1100", amount, "Listrik"),
            ],
            total_debit: amount,
            total_credit: amount,
        };
        JournalEntry::posted(JournalEntryId::new(), format!("EXP-20240115-{source_id}"), composed, Utc::now())
    }

    #[tokio::test]
    async fn posting_writes_header_lines_ledger_and_source() {
        let store = InMemoryJournalStore::new();
        let e = entry("exp-1", 500);
        store.persist_posting(&e).await.unwrap();

        assert_eq!(store.entry(e.id).await.unwrap(), Some(e.clone()));
        assert_eq!(store.entry_ledger_rows(e.id).await.unwrap().len(), 2);
        let source = store
            .source_record(SourceType::Expense, "exp-1")
            .await
            .unwrap()
            .unwrap();
        assert!(source.is_posted());
        assert_eq!(source.journal_ref.as_deref(), Some(e.reference.as_str()));
        assert!(store.has_posted_lines("6-1200").await.unwrap());
    }

    #[tokio::test]
    async fn second_posted_entry_for_a_source_is_a_unique_violation() {
        let store = InMemoryJournalStore::new();
        store.persist_posting(&entry("exp-1", 500)).await.unwrap();
        let before = store.revision().await.unwrap();

        let err = store.persist_posting(&entry("exp-1", 700)).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
        assert_eq!(store.entries().await.unwrap().len(), 1);
        assert_eq!(store.revision().await.unwrap(), before);
    }

    #[tokio::test]
    async fn voiding_hides_rows_and_frees_the_source() {
        let store = InMemoryJournalStore::new();
        let e = entry("exp-1", 500);
        store.persist_posting(&e).await.unwrap();

        let voided = store.void_entry(e.id, "duplicate", Utc::now()).await.unwrap();
        assert!(!voided.is_posted());
        assert!(store.ledger_rows(&DateRange::all()).await.unwrap().is_empty());
        assert!(!store.has_posted_lines("6-1200").await.unwrap());
        let source = store
            .source_record(SourceType::Expense, "exp-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(source.status, SourceStatus::Voided);

        let again = store.void_entry(e.id, "again", Utc::now()).await.unwrap_err();
        assert!(matches!(again, StoreError::InvalidState(_)));

        store.persist_posting(&entry("exp-1", 600)).await.unwrap();
        assert_eq!(store.ledger_rows(&DateRange::all()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn register_source_is_idempotent() {
        let store = InMemoryJournalStore::new();
        let first = store.register_source(SourceType::CashDisbursement, "cd-1").await.unwrap();
        let second = store.register_source(SourceType::CashDisbursement, "cd-1").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.status, SourceStatus::Pending);
    }

    #[tokio::test]
    async fn stepwise_faults_are_one_shot() {
        let store = InMemoryStepwiseStore::new();
        let e = entry("exp-1", 500);
        store.fail_next(Step::Lines);

        store.insert_header(&e).await.unwrap();
        let err = store.insert_lines(&e).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend { retryable: true, .. }));
        store.insert_lines(&e).await.unwrap();
        assert_eq!(store.entry(e.id).await.unwrap().unwrap().lines.len(), 2);
    }
}
