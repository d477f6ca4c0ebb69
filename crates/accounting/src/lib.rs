//! Accounting module (double-entry journal composition and balance aggregation).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.
//!
//! Data flows one way: a [`BusinessEvent`] is turned into balanced
//! [`JournalLine`]s by the [`JournalComposer`], persisted elsewhere as a
//! [`JournalEntry`], and later folded back into [`AccountBalance`]s that the
//! report assemblers group into trial balance, balance sheet and profit & loss.

pub mod balance;
pub mod coa;
pub mod composer;
pub mod config;
pub mod error;
pub mod event;
pub mod journal;
pub mod report;

pub use balance::{
    AccountBalance, DateRange, GeneralLedger, GeneralLedgerRow, aggregate_balances,
    general_ledger,
};
pub use coa::{Account, AccountType, ChartOfAccounts, NormalBalance};
pub use composer::{JournalComposer, cost_of_goods_sold};
pub use config::AccountDefaults;
pub use error::ComposeError;
pub use event::{
    BusinessEvent, CashDisbursement, Expense, InternalUsage, PaymentMethod, SalesOfGoods,
    SalesOfServices, SourceType, TaxPayment,
};
pub use journal::{ComposedJournal, EntryStatus, JournalEntry, JournalLine, LedgerRow, reference_for};
pub use report::{
    BalanceCheck, BalanceSheet, LargerSide, ProfitAndLoss, ReportLine, ReportSection,
    ReportWarning, TrialBalance, TrialBalanceRow, balance_sheet, profit_and_loss, trial_balance,
};
