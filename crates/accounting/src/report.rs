//! Report assemblers: trial balance, balance sheet, profit & loss.
//!
//! Thin grouping over [`AccountBalance`]s. Section amounts are signed toward
//! the section's natural side (assets and expenses debit, the rest credit), so
//! a contra account reduces its section instead of inflating it.

use serde::{Deserialize, Serialize};

use tallyerp_core::money::within_tolerance;
use tallyerp_core::Decimal;

use crate::balance::AccountBalance;
use crate::coa::{AccountType, NormalBalance};

/// Non-fatal diagnostics attached to a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportWarning {
    /// The account's type maps to no report bucket; it is left out of the totals.
    ClassificationGap {
        account_code: String,
        account_type: String,
    },
}

impl core::fmt::Display for ReportWarning {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ReportWarning::ClassificationGap {
                account_code,
                account_type,
            } => write!(
                f,
                "account {account_code} has unclassified type {account_type:?}"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportLine {
    /// `None` for computed lines such as current-period earnings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_code: Option<String>,
    pub account_name: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    pub title: String,
    pub lines: Vec<ReportLine>,
    pub total: Decimal,
}

impl ReportSection {
    fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            lines: Vec::new(),
            total: Decimal::ZERO,
        }
    }

    fn push(&mut self, line: ReportLine) {
        self.total += line.amount;
        self.lines.push(line);
    }

    fn push_account(&mut self, balance: &AccountBalance, side: NormalBalance) {
        self.push(ReportLine {
            account_code: Some(balance.account_code.clone()),
            account_name: balance.account_name.clone(),
            amount: crate::balance::signed_balance(side, balance.debit_total, balance.credit_total),
        });
    }
}

fn gap(balance: &AccountBalance) -> ReportWarning {
    ReportWarning::ClassificationGap {
        account_code: balance.account_code.clone(),
        account_type: balance.account_type.label().to_string(),
    }
}

// ---- trial balance ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    pub account_code: String,
    pub account_name: String,
    pub account_type: AccountType,
    pub debit: Decimal,
    pub credit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub rows: Vec<TrialBalanceRow>,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    pub is_balanced: bool,
}

/// One row per account, its net balance placed in the debit or credit column.
pub fn trial_balance(balances: &[AccountBalance]) -> TrialBalance {
    let mut total_debit = Decimal::ZERO;
    let mut total_credit = Decimal::ZERO;

    let rows = balances
        .iter()
        .map(|b| {
            let net_debit = b.debit_total - b.credit_total;
            let (debit, credit) = if net_debit >= Decimal::ZERO {
                (net_debit, Decimal::ZERO)
            } else {
                (Decimal::ZERO, -net_debit)
            };
            total_debit += debit;
            total_credit += credit;
            TrialBalanceRow {
                account_code: b.account_code.clone(),
                account_name: b.account_name.clone(),
                account_type: b.account_type.clone(),
                debit,
                credit,
            }
        })
        .collect();

    TrialBalance {
        rows,
        total_debit,
        total_credit,
        is_balanced: within_tolerance(total_debit, total_credit),
    }
}

// ---- profit & loss ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitAndLoss {
    pub revenue: ReportSection,
    pub cost_of_goods_sold: ReportSection,
    pub operating_expenses: ReportSection,
    pub gross_profit: Decimal,
    pub net_income: Decimal,
    pub warnings: Vec<ReportWarning>,
}

/// Revenue less COGS and operating expenses. Balance-sheet accounts are skipped.
pub fn profit_and_loss(balances: &[AccountBalance]) -> ProfitAndLoss {
    let mut revenue = ReportSection::new("Revenue");
    let mut cogs = ReportSection::new("Cost of Goods Sold");
    let mut opex = ReportSection::new("Operating Expenses");
    let mut warnings = Vec::new();

    for b in balances {
        match &b.account_type {
            AccountType::Revenue => revenue.push_account(b, NormalBalance::Credit),
            AccountType::Cogs => cogs.push_account(b, NormalBalance::Debit),
            AccountType::OperatingExpense => opex.push_account(b, NormalBalance::Debit),
            AccountType::Asset | AccountType::Liability | AccountType::Equity => {}
            AccountType::Unclassified(_) => warnings.push(gap(b)),
        }
    }

    let gross_profit = revenue.total - cogs.total;
    let net_income = gross_profit - opex.total;

    ProfitAndLoss {
        revenue,
        cost_of_goods_sold: cogs,
        operating_expenses: opex,
        gross_profit,
        net_income,
        warnings,
    }
}

// ---- balance sheet ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LargerSide {
    Assets,
    LiabilitiesAndEquity,
}

/// Diagnostic `assets == liabilities + equity` check. Never blocks the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceCheck {
    pub is_balanced: bool,
    /// `total_assets - (total_liabilities + total_equity)`.
    pub difference: Decimal,
    pub larger_side: Option<LargerSide>,
}

impl BalanceCheck {
    pub fn compare(assets: Decimal, liabilities_and_equity: Decimal) -> Self {
        let difference = assets - liabilities_and_equity;
        let is_balanced = within_tolerance(assets, liabilities_and_equity);
        let larger_side = if is_balanced {
            None
        } else if difference > Decimal::ZERO {
            Some(LargerSide::Assets)
        } else {
            Some(LargerSide::LiabilitiesAndEquity)
        };
        Self {
            is_balanced,
            difference,
            larger_side,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub assets: ReportSection,
    pub liabilities: ReportSection,
    pub equity: ReportSection,
    /// Net income not yet closed to retained earnings; included in equity.
    pub current_earnings: Decimal,
    pub check: BalanceCheck,
    pub warnings: Vec<ReportWarning>,
}

pub const CURRENT_EARNINGS_LABEL: &str = "Current period earnings";

/// Group balances into assets, liabilities and equity.
///
/// Revenue and expense balances are rolled into a single current-earnings
/// equity line so an unclosed period still balances.
pub fn balance_sheet(balances: &[AccountBalance]) -> BalanceSheet {
    let mut assets = ReportSection::new("Assets");
    let mut liabilities = ReportSection::new("Liabilities");
    let mut equity = ReportSection::new("Equity");
    let mut warnings = Vec::new();

    for b in balances {
        match &b.account_type {
            AccountType::Asset => assets.push_account(b, NormalBalance::Debit),
            AccountType::Liability => liabilities.push_account(b, NormalBalance::Credit),
            AccountType::Equity => equity.push_account(b, NormalBalance::Credit),
            AccountType::Revenue | AccountType::Cogs | AccountType::OperatingExpense => {}
            AccountType::Unclassified(_) => warnings.push(gap(b)),
        }
    }

    let current_earnings = profit_and_loss(balances).net_income;
    if !current_earnings.is_zero() {
        equity.push(ReportLine {
            account_code: None,
            account_name: CURRENT_EARNINGS_LABEL.to_string(),
            amount: current_earnings,
        });
    }

    let check = BalanceCheck::compare(assets.total, liabilities.total + equity.total);

    BalanceSheet {
        assets,
        liabilities,
        equity,
        current_earnings,
        check,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::{DateRange, aggregate_balances};
    use crate::coa::{Account, ChartOfAccounts};
    use crate::journal::LedgerRow;
    use chrono::NaiveDate;
    use tallyerp_core::JournalEntryId;

    fn d(n: i64) -> Decimal {
        Decimal::from(n)
    }

    fn row(code: &str, debit: i64, credit: i64) -> LedgerRow {
        LedgerRow {
            entry_id: JournalEntryId::new(),
            reference: "R".to_string(),
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            account_code: code.to_string(),
            debit: d(debit),
            credit: d(credit),
            description: String::new(),
        }
    }

    /// Owner invests 1,000,000; cash sale with COGS; expense with input VAT.
    fn history() -> Vec<LedgerRow> {
        vec![
            row("1-1100", 1_000_000, 0),
            row("3-1000", 0, 1_000_000),
            row("1-1100", 55_500, 0),
            row("4-1000", 0, 50_000),
            row("2-1300", 0, 5_500),
            row("5-1000", 10_000, 0),
            row("1-1400", 0, 10_000),
            row("6-1000", 100_000, 0),
            row("1-1700", 11_000, 0),
            row("1-1100", 0, 111_000),
        ]
    }

    #[test]
    fn trial_balance_columns_balance() {
        let coa = ChartOfAccounts::standard();
        let balances = aggregate_balances(&history(), &coa, &DateRange::all());
        let tb = trial_balance(&balances);

        assert!(tb.is_balanced);
        assert_eq!(tb.total_debit, tb.total_credit);
        let inventory = tb.rows.iter().find(|r| r.account_code == "1-1400").unwrap();
        assert_eq!((inventory.debit, inventory.credit), (d(0), d(10_000)));
    }

    #[test]
    fn profit_and_loss_sections() {
        let coa = ChartOfAccounts::standard();
        let balances = aggregate_balances(&history(), &coa, &DateRange::all());
        let pl = profit_and_loss(&balances);

        assert_eq!(pl.revenue.total, d(50_000));
        assert_eq!(pl.cost_of_goods_sold.total, d(10_000));
        assert_eq!(pl.operating_expenses.total, d(100_000));
        assert_eq!(pl.gross_profit, d(40_000));
        assert_eq!(pl.net_income, d(-60_000));
        assert!(pl.warnings.is_empty());
    }

    #[test]
    fn balance_sheet_balances_by_construction() {
        let coa = ChartOfAccounts::standard();
        let balances = aggregate_balances(&history(), &coa, &DateRange::all());
        let bs = balance_sheet(&balances);

        assert_eq!(bs.assets.total, d(945_500));
        assert_eq!(bs.liabilities.total, d(5_500));
        assert_eq!(bs.equity.total, d(940_000));
        assert_eq!(bs.current_earnings, d(-60_000));
        assert!(bs.check.is_balanced);
        assert!(bs.check.difference.abs() < tallyerp_core::BALANCE_TOLERANCE);
        assert_eq!(bs.check.larger_side, None);
    }

    #[test]
    fn unknown_type_is_a_warning_not_a_failure() {
        let mut coa = ChartOfAccounts::standard();
        coa.register(Account::new(
            "7-1000",
            "Suspense",
            AccountType::parse_label("Unknown"),
        ))
        .unwrap();

        let mut rows = history();
        rows.push(row("7-1000", 2_500, 0));
        rows.push(row("3-1000", 0, 2_500));
        let balances = aggregate_balances(&rows, &coa, &DateRange::all());
        let bs = balance_sheet(&balances);

        assert_eq!(
            bs.warnings,
            vec![ReportWarning::ClassificationGap {
                account_code: "7-1000".to_string(),
                account_type: "Unknown".to_string(),
            }]
        );
        assert_eq!(bs.assets.total, d(945_500));
        assert!(bs.assets.lines.iter().all(|l| l.account_code.as_deref() != Some("7-1000")));
        assert!(!bs.check.is_balanced);
        assert_eq!(bs.check.difference, d(-2_500));
        assert_eq!(bs.check.larger_side, Some(LargerSide::LiabilitiesAndEquity));
    }

    #[test]
    fn localized_labels_land_in_the_same_buckets() {
        let coa = ChartOfAccounts::from_accounts([
            Account::new("A", "Kas", AccountType::parse_label("aktiva")),
            Account::new("L", "Utang", AccountType::parse_label("KEWAJIBAN")),
            Account::new("E", "Modal", AccountType::parse_label("Ekuitas")),
        ])
        .unwrap();
        let rows = vec![row("A", 300, 0), row("L", 0, 100), row("E", 0, 200)];
        let bs = balance_sheet(&aggregate_balances(&rows, &coa, &DateRange::all()));

        assert_eq!(bs.assets.total, d(300));
        assert_eq!(bs.liabilities.total + bs.equity.total, d(300));
        assert!(bs.check.is_balanced);
    }

    #[test]
    fn check_reports_larger_side() {
        let check = BalanceCheck::compare(d(110), d(100));
        assert_eq!(check.larger_side, Some(LargerSide::Assets));
        assert_eq!(check.difference, d(10));

        let near = BalanceCheck::compare(Decimal::new(10_000, 2), Decimal::new(99_995, 3));
        assert!(near.is_balanced);
    }
}
