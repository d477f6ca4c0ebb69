//! Journal composer: business event -> balanced journal lines.
//!
//! Pure mapping. Nothing here reads a clock or touches storage, so the same
//! event against the same chart always yields the same lines.

use tallyerp_core::money::exceeds_tolerance;
use tallyerp_core::{Decimal, DomainError};

use crate::coa::ChartOfAccounts;
use crate::config::AccountDefaults;
use crate::error::ComposeError;
use crate::event::{
    BusinessEvent, CashDisbursement, Expense, InternalUsage, PaymentMethod, SalesOfGoods,
    SalesOfServices, TaxPayment,
};
use crate::journal::{ComposedJournal, JournalLine};

/// Cost of goods sold for a sale: `quantity * (unit_price - subtotal / quantity)`.
///
/// Algebraically `quantity * unit_price - subtotal`, i.e. the markup removed
/// from the gross line value. Returns `None` for a zero quantity or overflow.
pub fn cost_of_goods_sold(quantity: Decimal, unit_price: Decimal, subtotal: Decimal) -> Option<Decimal> {
    let per_unit = subtotal.checked_div(quantity)?;
    quantity.checked_mul(unit_price.checked_sub(per_unit)?)
}

/// Composes journals against a chart of accounts and a set of fallback codes.
#[derive(Debug, Clone, Copy)]
pub struct JournalComposer<'a> {
    coa: &'a ChartOfAccounts,
    defaults: &'a AccountDefaults,
}

impl<'a> JournalComposer<'a> {
    pub fn new(coa: &'a ChartOfAccounts, defaults: &'a AccountDefaults) -> Self {
        Self { coa, defaults }
    }

    /// Translate an event into an ordered, balanced, account-resolved journal.
    ///
    /// Either every line resolves and the totals balance, or an error is
    /// returned and no lines are.
    pub fn compose(&self, event: &BusinessEvent) -> Result<ComposedJournal, ComposeError> {
        event.validate()?;

        let description = event.description();
        let lines = self.lines_for(event, &description)?;

        for line in &lines {
            if self.coa.resolve_active(&line.account_code).is_none() {
                return Err(ComposeError::UnresolvedAccount {
                    code: line.account_code.clone(),
                });
            }
        }

        let total_debit: Decimal = lines.iter().map(|l| l.debit).sum();
        let total_credit: Decimal = lines.iter().map(|l| l.credit).sum();
        if lines.is_empty() || exceeds_tolerance(total_debit, total_credit) {
            return Err(ComposeError::UnbalancedJournal {
                total_debit,
                total_credit,
            });
        }

        Ok(ComposedJournal {
            source_type: event.source_type(),
            source_id: event.source_id().trim().to_string(),
            entry_date: event.date(),
            description,
            lines,
            total_debit,
            total_credit,
        })
    }

    fn lines_for(&self, event: &BusinessEvent, desc: &str) -> Result<Vec<JournalLine>, ComposeError> {
        let lines = match event {
            BusinessEvent::SalesOfGoods(e) => self.sales_of_goods(e, desc)?,
            BusinessEvent::SalesOfServices(e) => self.sales_of_services(e, desc),
            BusinessEvent::Expense(e) => self.expense(e, desc),
            BusinessEvent::TaxPayment(e) => self.tax_payment(e, desc),
            BusinessEvent::InternalUsage(e) => self.internal_usage(e, desc),
            BusinessEvent::CashDisbursement(e) => self.cash_disbursement(e, desc),
        };
        Ok(lines)
    }

    fn settlement_account(&self, method: PaymentMethod) -> &str {
        match method {
            PaymentMethod::Receivable => &self.defaults.receivable,
            PaymentMethod::Cash => &self.defaults.cash,
        }
    }

    fn sales_of_goods(&self, e: &SalesOfGoods, desc: &str) -> Result<Vec<JournalLine>, ComposeError> {
        let mut lines = vec![
            JournalLine::debit(self.settlement_account(e.payment_method), e.total, desc),
            JournalLine::credit(&self.defaults.sales_revenue, e.subtotal, desc),
        ];
        if e.tax_amount > Decimal::ZERO {
            lines.push(JournalLine::credit(&self.defaults.tax_payable, e.tax_amount, desc));
        }

        if let Some(cogs_account) = e.cogs_account.as_deref() {
            let cogs = cost_of_goods_sold(e.quantity, e.unit_price, e.subtotal).ok_or_else(|| {
                DomainError::validation("cost of goods sold could not be computed")
            })?;
            if cogs < Decimal::ZERO {
                return Err(DomainError::validation(format!(
                    "cost of goods sold is negative ({cogs}): unit_price * quantity is below subtotal"
                ))
                .into());
            }
            if !cogs.is_zero() {
                lines.push(JournalLine::debit(cogs_account, cogs, desc));
                lines.push(JournalLine::credit(&self.defaults.inventory, cogs, desc));
            }
        }

        Ok(lines)
    }

    fn sales_of_services(&self, e: &SalesOfServices, desc: &str) -> Vec<JournalLine> {
        let mut lines = vec![
            JournalLine::debit(self.settlement_account(e.payment_method), e.total, desc),
            JournalLine::credit(&self.defaults.service_revenue, e.subtotal, desc),
        ];
        if e.tax_amount > Decimal::ZERO {
            lines.push(JournalLine::credit(&self.defaults.tax_payable, e.tax_amount, desc));
        }
        lines
    }

    fn expense(&self, e: &Expense, desc: &str) -> Vec<JournalLine> {
        let cash = e.cash_account.as_deref().unwrap_or(&self.defaults.cash);
        let mut lines = vec![JournalLine::debit(&e.expense_account, e.amount, desc)];
        if e.tax_amount > Decimal::ZERO {
            lines.push(JournalLine::debit(&self.defaults.tax_receivable, e.tax_amount, desc));
        }
        lines.push(JournalLine::credit(cash, e.amount + e.tax_amount, desc));
        lines
    }

    fn tax_payment(&self, e: &TaxPayment, desc: &str) -> Vec<JournalLine> {
        let cash = e.cash_account.as_deref().unwrap_or(&self.defaults.cash);
        vec![
            JournalLine::debit(&e.tax_account, e.amount, desc),
            JournalLine::credit(cash, e.amount, desc),
        ]
    }

    fn internal_usage(&self, e: &InternalUsage, desc: &str) -> Vec<JournalLine> {
        let expense = e
            .expense_account
            .as_deref()
            .unwrap_or(&self.defaults.operating_expense);
        let inventory = e
            .inventory_account
            .as_deref()
            .unwrap_or(&self.defaults.inventory);
        vec![
            JournalLine::debit(expense, e.total_cost, desc),
            JournalLine::credit(inventory, e.total_cost, desc),
        ]
    }

    fn cash_disbursement(&self, e: &CashDisbursement, desc: &str) -> Vec<JournalLine> {
        let tax = e.tax_amount.filter(|t| *t > Decimal::ZERO);
        let credit = e
            .credit_account
            .as_deref()
            .unwrap_or(&self.defaults.disbursement_cash);

        let mut lines = Vec::with_capacity(3);
        match tax {
            Some(tax) => {
                let tax_account = e
                    .tax_account
                    .as_deref()
                    .unwrap_or(&self.defaults.tax_receivable);
                lines.push(JournalLine::debit(&e.expense_account, e.amount - tax, desc));
                lines.push(JournalLine::debit(tax_account, tax, desc));
            }
            None => lines.push(JournalLine::debit(&e.expense_account, e.amount, desc)),
        }
        lines.push(JournalLine::credit(credit, e.amount, desc));
        lines
    }
}
