use std::sync::Arc;

use tracing::info;

use tallyerp_accounting::{
    Account, AccountBalance, BalanceSheet, BusinessEvent, ChartOfAccounts, ComposedJournal,
    DateRange, GeneralLedger, JournalEntry, ProfitAndLoss, SourceType, TrialBalance,
};
use tallyerp_core::JournalEntryId;
use tallyerp_infra::{
    InMemoryJournalStore, JournalLedger, JournalPoster, JournalStore, LedgerReader,
    PostgresJournalStore, PostingError, ReadError, Settings, SourceRecord, StoreError,
};

/// Store handle shared by the poster and the reader.
pub type SharedStore = Arc<dyn JournalStore>;

/// Everything the handlers need: one store, one chart, poster and reader over both.
pub struct AppServices {
    coa: Arc<ChartOfAccounts>,
    poster: JournalPoster<SharedStore>,
    reader: LedgerReader<SharedStore>,
}

impl AppServices {
    pub fn new(store: SharedStore, coa: Arc<ChartOfAccounts>, settings: &Settings) -> Self {
        let poster = JournalPoster::new(store.clone(), coa.clone(), settings.accounts.clone())
            .with_retry_policy(settings.posting.retry_policy());
        let reader = LedgerReader::new(store, coa.clone());
        Self { coa, poster, reader }
    }

    /// In-memory store over the standard chart.
    pub fn in_memory(settings: &Settings) -> Self {
        Self::new(
            Arc::new(InMemoryJournalStore::new()),
            Arc::new(ChartOfAccounts::standard()),
            settings,
        )
    }

    pub fn accounts(&self, prefix: Option<&str>) -> Vec<Account> {
        self.coa.list_active(prefix).into_iter().cloned().collect()
    }

    pub fn compose(&self, event: &BusinessEvent) -> Result<ComposedJournal, PostingError> {
        self.poster.compose(event)
    }

    pub async fn post(&self, event: &BusinessEvent) -> Result<JournalEntry, PostingError> {
        self.poster.post_with_retry(event).await
    }

    pub async fn void(&self, id: JournalEntryId, reason: &str) -> Result<JournalEntry, PostingError> {
        self.poster.void(id, reason).await
    }

    pub async fn entry(&self, id: JournalEntryId) -> Result<Option<JournalEntry>, StoreError> {
        self.poster.store().entry(id).await
    }

    pub async fn source_status(
        &self,
        source_type: SourceType,
        source_id: &str,
    ) -> Result<SourceRecord, PostingError> {
        self.poster.source_status(source_type, source_id).await
    }

    pub async fn balances(&self, range: DateRange) -> Result<Arc<Vec<AccountBalance>>, ReadError> {
        self.reader.balances(range).await
    }

    pub async fn general_ledger(&self, code: &str, range: DateRange) -> Result<GeneralLedger, ReadError> {
        self.reader.general_ledger(code, range).await
    }

    pub async fn trial_balance(&self, range: DateRange) -> Result<TrialBalance, ReadError> {
        self.reader.trial_balance(range).await
    }

    pub async fn balance_sheet(&self, range: DateRange) -> Result<BalanceSheet, ReadError> {
        self.reader.balance_sheet(range).await
    }

    pub async fn profit_and_loss(&self, range: DateRange) -> Result<ProfitAndLoss, ReadError> {
        self.reader.profit_and_loss(range).await
    }
}

/// Postgres when `database_url` is set, in-memory otherwise.
pub async fn build_services(settings: &Settings) -> Result<AppServices, StoreError> {
    let Some(url) = settings.database_url.as_deref() else {
        info!("no database_url configured, using in-memory journal store");
        return Ok(AppServices::in_memory(settings));
    };

    let store = PostgresJournalStore::connect(url, settings.max_connections).await?;
    store.migrate().await?;

    let coa = match store.load_chart().await? {
        Some(coa) => coa,
        None => {
            let coa = ChartOfAccounts::standard();
            store.seed_chart(&coa).await?;
            info!(accounts = coa.len(), "seeded standard chart of accounts");
            coa
        }
    };

    info!(accounts = coa.len(), "using postgres journal store");
    Ok(AppServices::new(Arc::new(store), Arc::new(coa), settings))
}
