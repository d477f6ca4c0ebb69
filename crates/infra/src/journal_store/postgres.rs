//! Postgres-backed journal store.
//!
//! Every write runs in one transaction. The one-posted-entry-per-source rule
//! is backed by a partial unique index on `journal_entries`, which is what
//! closes the check-then-write race between concurrent posters.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `UniqueViolation` |
//! | Database (serialization failure / deadlock) | `40001` / `40P01` | `Backend { retryable: true }` |
//! | Database (other) | any other | `Backend { retryable: false }` |
//! | Io / PoolTimedOut | N/A | `Backend { retryable: true }` |
//! | Other | N/A | `Backend { retryable: false }` |

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::{Span, instrument};

use tallyerp_accounting::{
    Account, AccountType, ChartOfAccounts, DateRange, EntryStatus, JournalEntry, JournalLine,
    LedgerRow, NormalBalance, SourceType,
};
use tallyerp_core::{Decimal, JournalEntryId};

use super::r#trait::{JournalLedger, JournalStore, SourceRecord, SourceStatus, StoreError};

/// Postgres-backed journal store.
///
/// Uses the SQLx connection pool, which is `Send + Sync` and cheap to clone.
#[derive(Debug, Clone)]
pub struct PostgresJournalStore {
    pool: Arc<PgPool>,
}

impl PostgresJournalStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect with a bounded pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&*self.pool)
            .await
            .map_err(|e| StoreError::backend(format!("migration failed: {e}")))
    }

    /// Load the chart of accounts. `None` when the table is empty.
    #[instrument(skip(self), err)]
    pub async fn load_chart(&self) -> Result<Option<ChartOfAccounts>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT code, name, account_type, normal_balance, is_active
            FROM chart_of_accounts
            ORDER BY code
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_chart", e))?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut accounts = Vec::with_capacity(rows.len());
        for row in &rows {
            accounts.push(account_from_row(row)?);
        }
        ChartOfAccounts::from_accounts(accounts)
            .map(Some)
            .map_err(|e| StoreError::backend(format!("invalid chart of accounts: {e}")))
    }

    /// Insert accounts that are not in the table yet. Existing rows are kept.
    #[instrument(skip(self, coa), fields(accounts = coa.len()), err)]
    pub async fn seed_chart(&self, coa: &ChartOfAccounts) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;
        for account in coa.iter() {
            sqlx::query(
                r#"
                INSERT INTO chart_of_accounts (code, name, account_type, normal_balance, is_active)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (code) DO NOTHING
                "#,
            )
            .bind(&account.code)
            .bind(&account.name)
            .bind(account.account_type.label())
            .bind(normal_balance_str(account.normal_balance))
            .bind(account.is_active)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("seed_chart", e))?;
        }
        commit(tx).await
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }

    async fn lines_of(&self, id: JournalEntryId) -> Result<Vec<JournalLine>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT account_code, debit, credit, description
            FROM journal_entry_lines
            WHERE entry_id = $1
            ORDER BY line_no ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_lines", e))?;

        rows.iter().map(line_from_row).collect()
    }
}

const ENTRY_COLUMNS: &str = "id, reference, entry_date, description, total_debit, total_credit, \
     status, source_type, source_id, posted_at, voided_at, void_reason";

#[async_trait::async_trait]
impl JournalLedger for PostgresJournalStore {
    #[instrument(skip(self), fields(operation = tracing::field::Empty), err)]
    async fn source_record(
        &self,
        source_type: SourceType,
        source_id: &str,
    ) -> Result<Option<SourceRecord>, StoreError> {
        Span::current().record("operation", "source_record");

        let row = sqlx::query(
            r#"
            SELECT source_type, source_id, status, journal_entry_id, journal_ref, updated_at
            FROM journal_sources
            WHERE source_type = $1 AND source_id = $2
            "#,
        )
        .bind(source_type.as_str())
        .bind(source_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("source_record", e))?;

        row.as_ref().map(source_from_row).transpose()
    }

    #[instrument(skip(self), fields(entry_id = %id), err)]
    async fn entry(&self, id: JournalEntryId) -> Result<Option<JournalEntry>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM journal_entries WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_entry", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut entry = header_from_row(&row)?;
        entry.lines = self.lines_of(id).await?;
        Ok(Some(entry))
    }

    #[instrument(skip(self), fields(entry_count = tracing::field::Empty), err)]
    async fn entries(&self) -> Result<Vec<JournalEntry>, StoreError> {
        let headers = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM journal_entries ORDER BY entry_date ASC, reference ASC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_entries", e))?;

        let mut entries = Vec::with_capacity(headers.len());
        for row in &headers {
            let mut entry = header_from_row(row)?;
            entry.lines = self.lines_of(entry.id).await?;
            entries.push(entry);
        }
        Span::current().record("entry_count", entries.len());
        Ok(entries)
    }

    #[instrument(skip(self), fields(from = ?range.from, to = ?range.to), err)]
    async fn ledger_rows(&self, range: &DateRange) -> Result<Vec<LedgerRow>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT g.entry_id, g.reference, g.entry_date, g.account_code, g.debit, g.credit, g.description
            FROM general_ledger g
            JOIN journal_entries e ON e.id = g.entry_id
            WHERE e.status = 'posted'
                AND ($1::date IS NULL OR g.entry_date >= $1)
                AND ($2::date IS NULL OR g.entry_date <= $2)
            ORDER BY g.entry_date ASC, g.reference ASC, g.line_no ASC
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ledger_rows", e))?;

        rows.iter().map(ledger_row_from_row).collect()
    }

    #[instrument(skip(self), fields(entry_id = %id), err)]
    async fn entry_ledger_rows(&self, id: JournalEntryId) -> Result<Vec<LedgerRow>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT entry_id, reference, entry_date, account_code, debit, credit, description
            FROM general_ledger
            WHERE entry_id = $1
            ORDER BY line_no ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("entry_ledger_rows", e))?;

        rows.iter().map(ledger_row_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn has_posted_lines(&self, account_code: &str) -> Result<bool, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM journal_entry_lines l
                JOIN journal_entries e ON e.id = l.entry_id
                WHERE l.account_code = $1 AND e.status = 'posted'
            ) AS used
            "#,
        )
        .bind(account_code)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("has_posted_lines", e))?;

        row.try_get("used")
            .map_err(|e| StoreError::backend(format!("failed to read flag: {e}")))
    }

    async fn revision(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT revision FROM journal_revision WHERE id = 1")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("revision", e))?;
        let revision: i64 = row
            .try_get("revision")
            .map_err(|e| StoreError::backend(format!("failed to read revision: {e}")))?;
        Ok(u64::try_from(revision).unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl JournalStore for PostgresJournalStore {
    #[instrument(skip(self), err)]
    async fn register_source(
        &self,
        source_type: SourceType,
        source_id: &str,
    ) -> Result<SourceRecord, StoreError> {
        let mut tx = self.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO journal_sources (source_type, source_id, status, updated_at)
            VALUES ($1, $2, 'pending', now())
            ON CONFLICT (source_type, source_id) DO NOTHING
            "#,
        )
        .bind(source_type.as_str())
        .bind(source_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("register_source", e))?;
        bump_revision(&mut tx).await?;
        commit(tx).await?;

        self.source_record(source_type, source_id)
            .await?
            .ok_or_else(|| StoreError::backend("registered source record vanished"))
    }

    /// Header, lines, ledger mirror and source link in one transaction.
    #[instrument(
        skip(self, entry),
        fields(
            entry_id = %entry.id,
            reference = %entry.reference,
            source_type = %entry.source_type,
            source_id = %entry.source_id,
            line_count = entry.lines.len(),
            operation = tracing::field::Empty
        ),
        err
    )]
    async fn persist_posting(&self, entry: &JournalEntry) -> Result<(), StoreError> {
        Span::current().record("operation", "persist_posting");

        let mut tx = self.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO journal_entries (
                id, reference, entry_date, description, total_debit, total_credit,
                status, source_type, source_id, posted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(&entry.reference)
        .bind(entry.entry_date)
        .bind(&entry.description)
        .bind(entry.total_debit)
        .bind(entry.total_credit)
        .bind(entry.status.as_str())
        .bind(entry.source_type.as_str())
        .bind(&entry.source_id)
        .bind(entry.posted_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_entry", e))?;

        for (line_no, line) in entry.lines.iter().enumerate() {
            let line_no = line_no as i32;
            sqlx::query(
                r#"
                INSERT INTO journal_entry_lines (entry_id, line_no, account_code, debit, credit, description)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(entry.id.as_uuid())
            .bind(line_no)
            .bind(&line.account_code)
            .bind(line.debit)
            .bind(line.credit)
            .bind(&line.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_line", e))?;

            sqlx::query(
                r#"
                INSERT INTO general_ledger (
                    entry_id, line_no, reference, entry_date, account_code, debit, credit, description
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(entry.id.as_uuid())
            .bind(line_no)
            .bind(&entry.reference)
            .bind(entry.entry_date)
            .bind(&line.account_code)
            .bind(line.debit)
            .bind(line.credit)
            .bind(&line.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_ledger_row", e))?;
        }

        upsert_source(&mut tx, &SourceRecord::posted_by(entry, Utc::now())).await?;
        bump_revision(&mut tx).await?;
        commit(tx).await
    }

    #[instrument(
        skip(self, reason),
        fields(entry_id = %id, operation = tracing::field::Empty),
        err
    )]
    async fn void_entry(
        &self,
        id: JournalEntryId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<JournalEntry, StoreError> {
        Span::current().record("operation", "void_entry");

        let mut entry = self
            .entry(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("journal entry {id}")))?;
        entry
            .void(reason, at)
            .map_err(|e| StoreError::InvalidState(e.to_string()))?;

        let mut tx = self.begin().await?;

        // Guarded on the current status so a concurrent void loses cleanly.
        let updated = sqlx::query(
            r#"
            UPDATE journal_entries
            SET status = 'voided', voided_at = $2, void_reason = $3
            WHERE id = $1 AND status = 'posted'
            "#,
        )
        .bind(id.as_uuid())
        .bind(at)
        .bind(reason)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("void_entry", e))?;

        if updated.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::InvalidState(format!(
                "journal entry {} is already voided",
                entry.reference
            )));
        }

        sqlx::query(
            r#"
            UPDATE journal_sources
            SET status = 'voided', updated_at = $2
            WHERE journal_entry_id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("void_source", e))?;

        bump_revision(&mut tx).await?;
        commit(tx).await?;
        Ok(entry)
    }

    #[instrument(skip(self, entry), fields(entry_id = %entry.id), err)]
    async fn link_source(&self, entry: &JournalEntry) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;
        upsert_source(&mut tx, &SourceRecord::posted_by(entry, Utc::now())).await?;
        bump_revision(&mut tx).await?;
        commit(tx).await
    }
}

async fn upsert_source(
    tx: &mut Transaction<'static, Postgres>,
    record: &SourceRecord,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO journal_sources (source_type, source_id, status, journal_entry_id, journal_ref, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (source_type, source_id) DO UPDATE
        SET status = EXCLUDED.status,
            journal_entry_id = EXCLUDED.journal_entry_id,
            journal_ref = EXCLUDED.journal_ref,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(record.source_type.as_str())
    .bind(&record.source_id)
    .bind(record.status.as_str())
    .bind(record.journal_entry_id.map(uuid::Uuid::from))
    .bind(&record.journal_ref)
    .bind(record.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("upsert_source", e))?;
    Ok(())
}

async fn bump_revision(tx: &mut Transaction<'static, Postgres>) -> Result<(), StoreError> {
    sqlx::query("UPDATE journal_revision SET revision = revision + 1 WHERE id = 1")
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("bump_revision", e))?;
    Ok(())
}

async fn commit(tx: Transaction<'static, Postgres>) -> Result<(), StoreError> {
    tx.commit()
        .await
        .map_err(|e| map_sqlx_error("commit_transaction", e))
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation(msg),
                Some("40001") | Some("40P01") => StoreError::transient(msg),
                _ => StoreError::backend(msg),
            }
        }
        sqlx::Error::Io(e) => StoreError::transient(format!("io error in {operation}: {e}")),
        sqlx::Error::PoolTimedOut => {
            StoreError::transient(format!("connection pool timed out in {operation}"))
        }
        sqlx::Error::PoolClosed => {
            StoreError::backend(format!("connection pool closed in {operation}"))
        }
        other => StoreError::backend(format!("sqlx error in {operation}: {other}")),
    }
}

// SQLx row decoding

fn decode<T>(row: &PgRow, column: &str) -> Result<T, StoreError>
where
    T: for<'r> sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::backend(format!("failed to decode column {column}: {e}")))
}

fn domain<T>(result: tallyerp_core::DomainResult<T>) -> Result<T, StoreError> {
    result.map_err(|e| StoreError::backend(format!("invalid stored value: {e}")))
}

fn header_from_row(row: &PgRow) -> Result<JournalEntry, StoreError> {
    let id: uuid::Uuid = decode(row, "id")?;
    let status: String = decode(row, "status")?;
    let source_type: String = decode(row, "source_type")?;

    Ok(JournalEntry {
        id: JournalEntryId::from_uuid(id),
        reference: decode(row, "reference")?,
        entry_date: decode::<NaiveDate>(row, "entry_date")?,
        description: decode(row, "description")?,
        total_debit: decode::<Decimal>(row, "total_debit")?,
        total_credit: decode::<Decimal>(row, "total_credit")?,
        status: domain(EntryStatus::parse(&status))?,
        source_type: domain(SourceType::parse(&source_type))?,
        source_id: decode(row, "source_id")?,
        lines: Vec::new(),
        posted_at: decode(row, "posted_at")?,
        voided_at: decode(row, "voided_at")?,
        void_reason: decode(row, "void_reason")?,
    })
}

fn line_from_row(row: &PgRow) -> Result<JournalLine, StoreError> {
    Ok(JournalLine {
        account_code: decode(row, "account_code")?,
        debit: decode(row, "debit")?,
        credit: decode(row, "credit")?,
        description: decode(row, "description")?,
    })
}

fn ledger_row_from_row(row: &PgRow) -> Result<LedgerRow, StoreError> {
    let entry_id: uuid::Uuid = decode(row, "entry_id")?;
    Ok(LedgerRow {
        entry_id: JournalEntryId::from_uuid(entry_id),
        reference: decode(row, "reference")?,
        entry_date: decode(row, "entry_date")?,
        account_code: decode(row, "account_code")?,
        debit: decode(row, "debit")?,
        credit: decode(row, "credit")?,
        description: decode(row, "description")?,
    })
}

fn source_from_row(row: &PgRow) -> Result<SourceRecord, StoreError> {
    let source_type: String = decode(row, "source_type")?;
    let status: String = decode(row, "status")?;
    let entry_id: Option<uuid::Uuid> = decode(row, "journal_entry_id")?;

    Ok(SourceRecord {
        source_type: domain(SourceType::parse(&source_type))?,
        source_id: decode(row, "source_id")?,
        status: domain(SourceStatus::parse(&status))?,
        journal_entry_id: entry_id.map(JournalEntryId::from_uuid),
        journal_ref: decode(row, "journal_ref")?,
        updated_at: decode(row, "updated_at")?,
    })
}

fn account_from_row(row: &PgRow) -> Result<Account, StoreError> {
    let label: String = decode(row, "account_type")?;
    let side: String = decode(row, "normal_balance")?;
    let normal_balance = match side.as_str() {
        "debit" => NormalBalance::Debit,
        "credit" => NormalBalance::Credit,
        other => return Err(StoreError::backend(format!("unknown normal balance: {other}"))),
    };

    Ok(Account {
        code: decode(row, "code")?,
        name: decode(row, "name")?,
        account_type: AccountType::parse_label(&label),
        normal_balance,
        is_active: decode(row, "is_active")?,
    })
}

fn normal_balance_str(side: NormalBalance) -> &'static str {
    match side {
        NormalBalance::Debit => "debit",
        NormalBalance::Credit => "credit",
    }
}

// Need a live database: `DATABASE_URL=postgres://... cargo test -p tallyerp-infra -- --ignored`.
#[cfg(test)]
mod tests {
    use super::*;
    use tallyerp_accounting::{
        AccountDefaults, BusinessEvent, CashDisbursement, ComposedJournal, reference_for,
    };

    use crate::poster::{JournalPoster, PostingError};

    async fn store() -> PostgresJournalStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let store = PostgresJournalStore::connect(&url, 2).await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    fn unique_source(prefix: &str) -> String {
        format!("{prefix}-{}", uuid::Uuid::new_v4())
    }

    fn disbursement(source_id: &str) -> BusinessEvent {
        BusinessEvent::CashDisbursement(CashDisbursement {
            source_id: source_id.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            description: Some("Bayar listrik".to_string()),
            expense_account: "6-1200".to_string(),
            amount: Decimal::from(250_000),
            tax_amount: None,
            tax_account: None,
            credit_account: None,
        })
    }

    fn entry(source_id: &str, debit: i64, credit: i64) -> JournalEntry {
        let composed = ComposedJournal {
            source_type: SourceType::CashDisbursement,
            source_id: source_id.to_string(),
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            description: "Bayar listrik".to_string(),
            lines: vec![
                JournalLine::debit("6-1200", Decimal::from(debit), "Bayar listrik"),
                JournalLine::credit("1-1001", Decimal::from(credit), "Bayar listrik"),
            ],
            total_debit: Decimal::from(debit),
            total_credit: Decimal::from(credit),
        };
        let reference = reference_for(composed.source_type, composed.entry_date, source_id);
        JournalEntry::posted(JournalEntryId::new(), reference, composed, Utc::now())
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn second_posted_entry_for_a_source_hits_the_unique_index() {
        let store = store().await;
        let source_id = unique_source("cd");
        let before = store.revision().await.unwrap();

        let first = entry(&source_id, 250_000, 250_000);
        store.persist_posting(&first).await.unwrap();
        assert!(store.revision().await.unwrap() > before);

        let err = store
            .persist_posting(&entry(&source_id, 250_000, 250_000))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));

        let stored = store.entry(first.id).await.unwrap().unwrap();
        assert_eq!(stored.lines, first.lines);
        assert_eq!(store.entry_ledger_rows(first.id).await.unwrap().len(), 2);
        let source = store
            .source_record(SourceType::CashDisbursement, &source_id)
            .await
            .unwrap()
            .unwrap();
        assert!(source.references(first.id));
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn unbalanced_header_is_rolled_back() {
        let store = store().await;
        let unbalanced = entry(&unique_source("cd"), 250_000, 200_000);

        let err = store.persist_posting(&unbalanced).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend { retryable: false, .. }));
        assert!(store.entry(unbalanced.id).await.unwrap().is_none());
        assert!(store.entry_ledger_rows(unbalanced.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn poster_refuses_duplicates_until_voided() {
        let store = store().await;
        let poster = JournalPoster::new(
            store.clone(),
            Arc::new(ChartOfAccounts::standard()),
            AccountDefaults::default(),
        );
        let source_id = unique_source("cd");

        let first = poster.post(&disbursement(&source_id)).await.unwrap();
        let err = poster.post(&disbursement(&source_id)).await.unwrap_err();
        assert_eq!(
            err,
            PostingError::AlreadyPosted {
                source_type: SourceType::CashDisbursement,
                source_id: source_id.clone(),
                reference: first.reference.clone(),
            }
        );

        poster.void(first.id, "wrong account").await.unwrap();
        assert!(matches!(
            poster.void(first.id, "again").await,
            Err(PostingError::InvalidTransition(_))
        ));
        assert_eq!(store.entry_ledger_rows(first.id).await.unwrap().len(), 2);

        let second = poster.post(&disbursement(&source_id)).await.unwrap();
        assert_ne!(second.id, first.id);
        let source = poster
            .source_status(SourceType::CashDisbursement, &source_id)
            .await
            .unwrap();
        assert_eq!(source.status, SourceStatus::Posted);
        assert!(source.references(second.id));
    }
}
