//! Chart maintenance that has to consult posted history.

use thiserror::Error;
use tracing::{info, instrument};

use tallyerp_accounting::{ChartOfAccounts, NormalBalance};
use tallyerp_core::DomainError;

use crate::journal_store::{JournalLedger, StoreError};

#[derive(Debug, Error)]
pub enum ChartError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Change an account's normal side, refused once the ledger holds posted lines for it.
#[instrument(skip(ledger, coa), fields(account_code = %code), err)]
pub async fn change_normal_balance<L: JournalLedger + ?Sized>(
    ledger: &L,
    coa: &mut ChartOfAccounts,
    code: &str,
    side: NormalBalance,
) -> Result<(), ChartError> {
    let has_posted_lines = ledger.has_posted_lines(code).await?;
    coa.change_normal_balance(code, side, has_posted_lines)?;
    info!(?side, "normal balance updated");
    Ok(())
}
