//! Balance aggregation over general-ledger rows.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use tallyerp_core::{Decimal, DomainError, DomainResult, JournalEntryId};

use crate::coa::{AccountType, ChartOfAccounts, NormalBalance};
use crate::journal::LedgerRow;

/// Inclusive date range. Open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> DomainResult<Self> {
        if let (Some(f), Some(t)) = (from, to) {
            if f > t {
                return Err(DomainError::validation(format!(
                    "date range start {f} is after its end {t}"
                )));
            }
        }
        Ok(Self { from, to })
    }

    /// The full history.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|f| date >= f) && self.to.is_none_or(|t| date <= t)
    }

    /// `true` when `date` falls before the start of the range.
    pub fn precedes(&self, date: NaiveDate) -> bool {
        self.from.is_some_and(|f| date < f)
    }
}

/// Per-account fold result for a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account_code: String,
    pub account_name: String,
    pub account_type: AccountType,
    pub normal_balance: NormalBalance,
    pub debit_total: Decimal,
    pub credit_total: Decimal,
    /// Signed by the account's normal side.
    pub balance: Decimal,
}

/// Balance signed by the account's normal side.
pub fn signed_balance(side: NormalBalance, debit: Decimal, credit: Decimal) -> Decimal {
    match side {
        NormalBalance::Debit => debit - credit,
        NormalBalance::Credit => credit - debit,
    }
}

/// Name given to ledger codes that have no chart entry.
pub const UNKNOWN_ACCOUNT_NAME: &str = "(unknown account)";

/// Fold ledger rows into per-account balances for `range`.
///
/// Rows must come from posted entries only. Accounts without any debit or
/// credit activity in the range are left out. Codes missing from the chart
/// are folded debit-normal and typed `Unclassified` so the reports flag them.
pub fn aggregate_balances<'r>(
    rows: impl IntoIterator<Item = &'r LedgerRow>,
    coa: &ChartOfAccounts,
    range: &DateRange,
) -> Vec<AccountBalance> {
    let mut totals: BTreeMap<&str, (Decimal, Decimal)> = BTreeMap::new();
    for row in rows.into_iter().filter(|r| range.contains(r.entry_date)) {
        let entry = totals.entry(row.account_code.as_str()).or_default();
        entry.0 += row.debit;
        entry.1 += row.credit;
    }

    totals
        .into_iter()
        .filter(|(_, (debit, credit))| !(debit.is_zero() && credit.is_zero()))
        .map(|(code, (debit_total, credit_total))| {
            let (name, account_type, normal_balance) = match coa.lookup(code) {
                Ok(a) => (a.name.clone(), a.account_type.clone(), a.normal_balance),
                Err(_) => (
                    UNKNOWN_ACCOUNT_NAME.to_string(),
                    AccountType::Unclassified(String::new()),
                    NormalBalance::Debit,
                ),
            };
            AccountBalance {
                account_code: code.to_string(),
                account_name: name,
                account_type,
                normal_balance,
                debit_total,
                credit_total,
                balance: signed_balance(normal_balance, debit_total, credit_total),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralLedgerRow {
    pub entry_id: JournalEntryId,
    pub reference: String,
    pub entry_date: NaiveDate,
    pub description: String,
    pub debit: Decimal,
    pub credit: Decimal,
    pub running_balance: Decimal,
}

/// Chronological activity of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralLedger {
    pub account_code: String,
    pub account_name: String,
    pub normal_balance: NormalBalance,
    pub range: DateRange,
    pub opening_balance: Decimal,
    pub rows: Vec<GeneralLedgerRow>,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    pub closing_balance: Decimal,
}

/// Build the general ledger of `account_code` for `range`.
///
/// Activity dated before the range start is folded into the opening balance.
/// Rows are ordered by date, then reference, keeping line order within an entry.
pub fn general_ledger<'r>(
    account_code: &str,
    rows: impl IntoIterator<Item = &'r LedgerRow>,
    coa: &ChartOfAccounts,
    range: &DateRange,
) -> DomainResult<GeneralLedger> {
    let account = coa.lookup(account_code)?;
    let side = account.normal_balance;

    let mut opening_balance = Decimal::ZERO;
    let mut in_range: Vec<&LedgerRow> = Vec::new();
    for row in rows.into_iter().filter(|r| r.account_code == account_code) {
        if range.precedes(row.entry_date) {
            opening_balance += signed_balance(side, row.debit, row.credit);
        } else if range.contains(row.entry_date) {
            in_range.push(row);
        }
    }
    in_range.sort_by(|a, b| {
        a.entry_date
            .cmp(&b.entry_date)
            .then_with(|| a.reference.cmp(&b.reference))
    });

    let mut running = opening_balance;
    let mut total_debit = Decimal::ZERO;
    let mut total_credit = Decimal::ZERO;
    let rows = in_range
        .into_iter()
        .map(|row| {
            running += signed_balance(side, row.debit, row.credit);
            total_debit += row.debit;
            total_credit += row.credit;
            GeneralLedgerRow {
                entry_id: row.entry_id,
                reference: row.reference.clone(),
                entry_date: row.entry_date,
                description: row.description.clone(),
                debit: row.debit,
                credit: row.credit,
                running_balance: running,
            }
        })
        .collect();

    Ok(GeneralLedger {
        account_code: account.code.clone(),
        account_name: account.name.clone(),
        normal_balance: side,
        range: *range,
        opening_balance,
        rows,
        total_debit,
        total_credit,
        closing_balance: running,
    })
}
