//! Fallback account codes used when a business event does not name one.

use serde::{Deserialize, Serialize};

/// Named fallback accounts injected into the composer.
///
/// Every field can be overridden from configuration; missing fields keep the
/// default below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountDefaults {
    /// Cash account debited by cash sales and credited by expenses/tax payments.
    pub cash: String,
    /// Cash account credited by cash disbursements (petty cash).
    pub disbursement_cash: String,
    /// Trade receivable debited by credit sales.
    pub receivable: String,
    pub inventory: String,
    /// Input VAT (PPN Masukan).
    pub tax_receivable: String,
    /// Output VAT (PPN Keluaran).
    pub tax_payable: String,
    pub sales_revenue: String,
    pub service_revenue: String,
    /// Debited by internal usage of inventory.
    pub operating_expense: String,
}

impl Default for AccountDefaults {
    fn default() -> Self {
        Self {
            cash: "1-1100".to_string(),
            disbursement_cash: "1-1001".to_string(),
            receivable: "1-1200".to_string(),
            inventory: "1-1400".to_string(),
            tax_receivable: "1-1700".to_string(),
            tax_payable: "2-1300".to_string(),
            sales_revenue: "4-1000".to_string(),
            service_revenue: "4-2000".to_string(),
            operating_expense: "6-1000".to_string(),
        }
    }
}
