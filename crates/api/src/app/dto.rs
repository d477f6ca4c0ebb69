use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use tallyerp_accounting::{DateRange, JournalEntry, LedgerRow};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

/// `?from=YYYY-MM-DD&to=YYYY-MM-DD`, both optional.
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl RangeQuery {
    pub fn to_range(&self) -> Result<DateRange, axum::response::Response> {
        DateRange::new(self.from, self.to).map_err(errors::domain_error_to_response)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AccountsQuery {
    pub prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VoidRequest {
    pub reason: String,
}

// -------------------------
// Response DTOs
// -------------------------

/// Posted entry plus the general-ledger rows it produced.
#[derive(Debug, Serialize)]
pub struct EntryResponse {
    #[serde(flatten)]
    pub entry: JournalEntry,
    pub ledger_rows: Vec<LedgerRow>,
}

impl From<JournalEntry> for EntryResponse {
    fn from(entry: JournalEntry) -> Self {
        let ledger_rows = if entry.is_posted() {
            entry.ledger_rows()
        } else {
            Vec::new()
        };
        Self { entry, ledger_rows }
    }
}
