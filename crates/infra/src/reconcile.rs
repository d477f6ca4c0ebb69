//! Detection and repair of partially applied postings.
//!
//! Only needed for backends that go through [`crate::journal_store::CompensatingJournalStore`]:
//! a crash between its steps can leave a posted header whose source record was
//! never linked, or whose lines / ledger mirror are incomplete.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use tallyerp_accounting::JournalEntry;
use tallyerp_core::JournalEntryId;

use crate::journal_store::{JournalStore, StoreError};

pub const INCOMPLETE_POSTING_REASON: &str = "reconciliation: incomplete posting";

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    /// Complete entries whose source link was restored.
    pub completed: Vec<JournalEntryId>,
    /// Incomplete entries voided so the source can be posted again.
    pub voided: Vec<JournalEntryId>,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.completed.is_empty() && self.voided.is_empty()
    }
}

/// What [`repair_entry`] did with a posted entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repair {
    /// Complete and referenced by its source.
    Intact,
    /// Complete; the source link was restored.
    Linked,
    /// Incomplete; voided so the source can be posted again.
    Voided,
}

impl Repair {
    /// The entry stands as a valid posting.
    pub fn is_kept(self) -> bool {
        matches!(self, Repair::Intact | Repair::Linked)
    }
}

/// Bring one posted entry to a consistent state.
///
/// An entry counts as complete when it has lines, balances, and every line is
/// mirrored in the general ledger.
pub async fn repair_entry<S: JournalStore + ?Sized>(
    store: &S,
    entry: &JournalEntry,
) -> Result<Repair, StoreError> {
    let linked = store
        .source_record(entry.source_type, &entry.source_id)
        .await?
        .is_some_and(|s| s.is_posted() && s.references(entry.id));
    let mirrored = store.entry_ledger_rows(entry.id).await?.len();
    let complete = !entry.lines.is_empty() && entry.is_consistent() && mirrored == entry.lines.len();

    if complete && linked {
        return Ok(Repair::Intact);
    }
    if complete {
        store.link_source(entry).await?;
        info!(entry_id = %entry.id, reference = %entry.reference, "linked orphaned entry to its source");
        return Ok(Repair::Linked);
    }

    store
        .void_entry(entry.id, INCOMPLETE_POSTING_REASON, Utc::now())
        .await?;
    warn!(
        entry_id = %entry.id,
        reference = %entry.reference,
        lines = entry.lines.len(),
        mirrored,
        "voided incomplete posting"
    );
    Ok(Repair::Voided)
}

/// Scan posted entries and repair any that are not referenced by their source.
#[instrument(skip(store), err)]
pub async fn reconcile<S: JournalStore + ?Sized>(store: &S) -> Result<ReconciliationReport, StoreError> {
    let mut report = ReconciliationReport::default();

    for entry in store.entries().await? {
        if !entry.is_posted() {
            continue;
        }
        match repair_entry(store, &entry).await? {
            Repair::Intact => {}
            Repair::Linked => report.completed.push(entry.id),
            Repair::Voided => report.voided.push(entry.id),
        }
    }

    Ok(report)
}
