//! Journal persistence boundary.
//!
//! Defines the storage-facing contract the poster writes through, plus an
//! in-memory store, a Postgres store and a compensating adapter for backends
//! that cannot commit several tables in one transaction.

pub mod compensating;
pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use compensating::{CompensatingJournalStore, StepwiseJournalStore};
pub use in_memory::{InMemoryJournalStore, InMemoryStepwiseStore, Step};
pub use postgres::PostgresJournalStore;
pub use r#trait::{JournalLedger, JournalStore, SourceRecord, SourceStatus, StoreError};
