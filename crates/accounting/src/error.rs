//! Composition failures.

use thiserror::Error;

use tallyerp_core::{Decimal, DomainError};

/// Why a business event could not be turned into a journal.
///
/// All variants are deterministic: nothing has been persisted and retrying
/// with the same input fails the same way.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComposeError {
    /// A referenced account code has no active chart-of-accounts entry.
    #[error("account {code} does not resolve to an active account")]
    UnresolvedAccount { code: String },

    /// Debit and credit totals differ by more than the tolerance.
    #[error("journal is unbalanced: debit {total_debit} vs credit {total_credit}")]
    UnbalancedJournal {
        total_debit: Decimal,
        total_credit: Decimal,
    },

    /// The event itself failed validation.
    #[error("invalid business event: {0}")]
    InvalidEvent(#[from] DomainError),
}
