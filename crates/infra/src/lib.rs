//! Infrastructure layer: journal persistence, posting orchestration, read side, config.

pub mod chart;
pub mod config;
pub mod external;
pub mod journal_store;
pub mod poster;
pub mod reader;
pub mod reconcile;


pub use chart::{ChartError, change_normal_balance};
pub use config::{PostingSettings, Settings};
pub use journal_store::{
    CompensatingJournalStore, InMemoryJournalStore, JournalLedger, JournalStore,
    PostgresJournalStore, SourceRecord, SourceStatus, StepwiseJournalStore, StoreError,
};
pub use poster::{JournalPoster, PostingError, RetryPolicy};
pub use reader::{LedgerReader, ReadError};
pub use reconcile::{ReconciliationReport, reconcile};
