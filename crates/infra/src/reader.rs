//! Read side: balances and reports over posted ledger rows.
//!
//! Balances are cached per date range and stamped with the store revision they
//! were computed at; a post or void bumps the revision, so stale entries are
//! recomputed on next access.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, instrument, warn};

use tallyerp_accounting::{
    AccountBalance, BalanceSheet, ChartOfAccounts, DateRange, GeneralLedger, ProfitAndLoss,
    ReportWarning, TrialBalance, aggregate_balances, balance_sheet, general_ledger,
    profit_and_loss, trial_balance,
};

use crate::journal_store::{JournalLedger, StoreError};

/// Read-side failures.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ReadError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Domain(#[from] tallyerp_core::DomainError),
}

#[derive(Debug)]
struct Cached {
    revision: u64,
    balances: Arc<Vec<AccountBalance>>,
}

/// Cached balance and report reader over a [`JournalLedger`].
#[derive(Debug)]
pub struct LedgerReader<L> {
    ledger: L,
    coa: Arc<ChartOfAccounts>,
    cache: RwLock<HashMap<DateRange, Cached>>,
}

impl<L: JournalLedger> LedgerReader<L> {
    pub fn new(ledger: L, coa: Arc<ChartOfAccounts>) -> Self {
        Self {
            ledger,
            coa,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Drop every cached aggregation.
    pub fn invalidate(&self) {
        match self.cache.write() {
            Ok(mut cache) => cache.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }

    /// Per-account balances for `range`, sorted by account code.
    #[instrument(skip(self), err)]
    pub async fn balances(&self, range: DateRange) -> Result<Arc<Vec<AccountBalance>>, ReadError> {
        let revision = self.ledger.revision().await?;

        if let Some(hit) = self.cached(&range, revision) {
            debug!(revision, "balance cache hit");
            return Ok(hit);
        }

        let rows = self.ledger.ledger_rows(&range).await?;
        let balances = Arc::new(aggregate_balances(&rows, &self.coa, &range));

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(
                range,
                Cached {
                    revision,
                    balances: balances.clone(),
                },
            );
        }
        Ok(balances)
    }

    /// Chronological activity of one account with running balance.
    #[instrument(skip(self), err)]
    pub async fn general_ledger(&self, account_code: &str, range: DateRange) -> Result<GeneralLedger, ReadError> {
        // Opening balance needs the rows before `from`.
        let history = DateRange {
            from: None,
            to: range.to,
        };
        let rows = self.ledger.ledger_rows(&history).await?;
        Ok(general_ledger(account_code, &rows, &self.coa, &range)?)
    }

    pub async fn trial_balance(&self, range: DateRange) -> Result<TrialBalance, ReadError> {
        let balances = self.balances(range).await?;
        let report = trial_balance(&balances);
        if !report.is_balanced {
            warn!(
                total_debit = %report.total_debit,
                total_credit = %report.total_credit,
                "trial balance does not balance"
            );
        }
        Ok(report)
    }

    pub async fn profit_and_loss(&self, range: DateRange) -> Result<ProfitAndLoss, ReadError> {
        let balances = self.balances(range).await?;
        let report = profit_and_loss(&balances);
        log_gaps(&report.warnings);
        Ok(report)
    }

    pub async fn balance_sheet(&self, range: DateRange) -> Result<BalanceSheet, ReadError> {
        let balances = self.balances(range).await?;
        let report = balance_sheet(&balances);
        log_gaps(&report.warnings);
        if !report.check.is_balanced {
            warn!(
                difference = %report.check.difference,
                larger_side = ?report.check.larger_side,
                "balance sheet does not balance"
            );
        }
        Ok(report)
    }

    fn cached(&self, range: &DateRange, revision: u64) -> Option<Arc<Vec<AccountBalance>>> {
        let cache = self.cache.read().ok()?;
        cache
            .get(range)
            .filter(|c| c.revision == revision)
            .map(|c| c.balances.clone())
    }
}

fn log_gaps(warnings: &[ReportWarning]) {
    for w in warnings {
        warn!(warning = %w, "account left out of report");
    }
}
