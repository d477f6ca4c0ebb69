//! Business events that produce journal entries.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use tallyerp_core::money::{non_negative, positive};
use tallyerp_core::{Decimal, DomainError, DomainResult};

/// Kind of business record a journal entry was posted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Sales,
    Expense,
    TaxPayment,
    InternalUsage,
    CashDisbursement,
}

impl SourceType {
    pub const ALL: [SourceType; 5] = [
        SourceType::Sales,
        SourceType::Expense,
        SourceType::TaxPayment,
        SourceType::InternalUsage,
        SourceType::CashDisbursement,
    ];

    /// Short mnemonic used as the journal reference prefix.
    pub fn type_code(self) -> &'static str {
        match self {
            SourceType::Sales => "SALE",
            SourceType::Expense => "EXP",
            SourceType::TaxPayment => "TAX",
            SourceType::InternalUsage => "USAGE",
            SourceType::CashDisbursement => "CD",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Sales => "sales",
            SourceType::Expense => "expense",
            SourceType::TaxPayment => "tax_payment",
            SourceType::InternalUsage => "internal_usage",
            SourceType::CashDisbursement => "cash_disbursement",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        SourceType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown source type: {s}")))
    }
}

impl core::fmt::Display for SourceType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a sale was settled.
///
/// Deserializes from any payment label through [`PaymentMethod::from_label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum PaymentMethod {
    Cash,
    Receivable,
}

impl PaymentMethod {
    /// Map a free-form payment label. Only credit sales ("Piutang") go to receivables.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "piutang" | "credit" | "kredit" | "receivable" => PaymentMethod::Receivable,
            _ => PaymentMethod::Cash,
        }
    }
}

impl From<String> for PaymentMethod {
    fn from(label: String) -> Self {
        PaymentMethod::from_label(&label)
    }
}

/// Sale of inventory items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesOfGoods {
    pub source_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
    pub payment_method: PaymentMethod,
    pub subtotal: Decimal,
    #[serde(default)]
    pub tax_amount: Decimal,
    /// Amount received or receivable (subtotal + tax).
    pub total: Decimal,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// COGS account; without it the sale carries no cost lines.
    #[serde(default)]
    pub cogs_account: Option<String>,
}

/// Sale of services (no inventory movement).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesOfServices {
    pub source_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
    pub payment_method: PaymentMethod,
    pub subtotal: Decimal,
    #[serde(default)]
    pub tax_amount: Decimal,
    pub total: Decimal,
}

/// Purchase of an expense, optionally with recoverable input VAT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub source_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
    pub expense_account: String,
    /// Net amount, excluding tax.
    pub amount: Decimal,
    #[serde(default)]
    pub tax_amount: Decimal,
    /// Cash/bank account paid from; defaults to the configured cash account.
    #[serde(default)]
    pub cash_account: Option<String>,
}

/// Settlement of a tax liability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxPayment {
    pub source_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
    pub tax_account: String,
    pub amount: Decimal,
    #[serde(default)]
    pub cash_account: Option<String>,
}

/// Inventory consumed internally (expensed at cost).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalUsage {
    pub source_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
    pub total_cost: Decimal,
    #[serde(default)]
    pub expense_account: Option<String>,
    #[serde(default)]
    pub inventory_account: Option<String>,
}

/// Cash paid out against an expense account (e.g. a scanned receipt).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashDisbursement {
    pub source_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
    pub expense_account: String,
    /// Gross amount paid, tax included.
    pub amount: Decimal,
    #[serde(default)]
    pub tax_amount: Option<Decimal>,
    /// Input-tax account; defaults to the configured tax receivable.
    #[serde(default)]
    pub tax_account: Option<String>,
    /// Account credited; defaults to the configured disbursement cash account.
    #[serde(default)]
    pub credit_account: Option<String>,
}

/// Closed set of events the composer understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BusinessEvent {
    SalesOfGoods(SalesOfGoods),
    SalesOfServices(SalesOfServices),
    Expense(Expense),
    TaxPayment(TaxPayment),
    InternalUsage(InternalUsage),
    CashDisbursement(CashDisbursement),
}

impl BusinessEvent {
    pub fn source_type(&self) -> SourceType {
        match self {
            BusinessEvent::SalesOfGoods(_) | BusinessEvent::SalesOfServices(_) => SourceType::Sales,
            BusinessEvent::Expense(_) => SourceType::Expense,
            BusinessEvent::TaxPayment(_) => SourceType::TaxPayment,
            BusinessEvent::InternalUsage(_) => SourceType::InternalUsage,
            BusinessEvent::CashDisbursement(_) => SourceType::CashDisbursement,
        }
    }

    pub fn source_id(&self) -> &str {
        match self {
            BusinessEvent::SalesOfGoods(e) => &e.source_id,
            BusinessEvent::SalesOfServices(e) => &e.source_id,
            BusinessEvent::Expense(e) => &e.source_id,
            BusinessEvent::TaxPayment(e) => &e.source_id,
            BusinessEvent::InternalUsage(e) => &e.source_id,
            BusinessEvent::CashDisbursement(e) => &e.source_id,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            BusinessEvent::SalesOfGoods(e) => e.date,
            BusinessEvent::SalesOfServices(e) => e.date,
            BusinessEvent::Expense(e) => e.date,
            BusinessEvent::TaxPayment(e) => e.date,
            BusinessEvent::InternalUsage(e) => e.date,
            BusinessEvent::CashDisbursement(e) => e.date,
        }
    }

    /// Caller-supplied description, or a default per event kind.
    pub fn description(&self) -> String {
        let (given, fallback) = match self {
            BusinessEvent::SalesOfGoods(e) => (&e.description, "Sales of goods"),
            BusinessEvent::SalesOfServices(e) => (&e.description, "Sales of services"),
            BusinessEvent::Expense(e) => (&e.description, "Expense"),
            BusinessEvent::TaxPayment(e) => (&e.description, "Tax payment"),
            BusinessEvent::InternalUsage(e) => (&e.description, "Internal usage of inventory"),
            BusinessEvent::CashDisbursement(e) => (&e.description, "Cash disbursement"),
        };
        given
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(fallback)
            .to_string()
    }

    /// Check required fields and amount ranges.
    ///
    /// Cross-field consistency (e.g. `total == subtotal + tax`) is left to the
    /// composer's balance check, which reports it as an unbalanced journal.
    pub fn validate(&self) -> DomainResult<()> {
        if self.source_id().trim().is_empty() {
            return Err(DomainError::validation("source_id must not be empty"));
        }

        match self {
            BusinessEvent::SalesOfGoods(e) => {
                positive("subtotal", e.subtotal)?;
                non_negative("tax_amount", e.tax_amount)?;
                positive("total", e.total)?;
                positive("quantity", e.quantity)?;
                non_negative("unit_price", e.unit_price)?;
                optional_code("cogs_account", e.cogs_account.as_deref())?;
            }
            BusinessEvent::SalesOfServices(e) => {
                positive("subtotal", e.subtotal)?;
                non_negative("tax_amount", e.tax_amount)?;
                positive("total", e.total)?;
            }
            BusinessEvent::Expense(e) => {
                required_code("expense_account", &e.expense_account)?;
                positive("amount", e.amount)?;
                non_negative("tax_amount", e.tax_amount)?;
                optional_code("cash_account", e.cash_account.as_deref())?;
            }
            BusinessEvent::TaxPayment(e) => {
                required_code("tax_account", &e.tax_account)?;
                positive("amount", e.amount)?;
                optional_code("cash_account", e.cash_account.as_deref())?;
            }
            BusinessEvent::InternalUsage(e) => {
                positive("total_cost", e.total_cost)?;
                optional_code("expense_account", e.expense_account.as_deref())?;
                optional_code("inventory_account", e.inventory_account.as_deref())?;
            }
            BusinessEvent::CashDisbursement(e) => {
                required_code("expense_account", &e.expense_account)?;
                positive("amount", e.amount)?;
                if let Some(tax) = e.tax_amount {
                    non_negative("tax_amount", tax)?;
                    if tax >= e.amount {
                        return Err(DomainError::validation(
                            "tax_amount must be smaller than the disbursed amount",
                        ));
                    }
                }
                optional_code("tax_account", e.tax_account.as_deref())?;
                optional_code("credit_account", e.credit_account.as_deref())?;
            }
        }

        Ok(())
    }
}

fn required_code(field: &str, code: &str) -> DomainResult<()> {
    if code.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

fn optional_code(field: &str, code: Option<&str>) -> DomainResult<()> {
    match code {
        Some(c) => required_code(field, c),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    fn disbursement(amount: i64, tax: Option<i64>) -> BusinessEvent {
        BusinessEvent::CashDisbursement(CashDisbursement {
            source_id: "ab12cd34-0000".to_string(),
            date: date(),
            description: None,
            expense_account: "6-1200".to_string(),
            amount: Decimal::from(amount),
            tax_amount: tax.map(Decimal::from),
            tax_account: None,
            credit_account: None,
        })
    }

    #[test]
    fn sales_variants_share_the_sales_source_type() {
        let services = BusinessEvent::SalesOfServices(SalesOfServices {
            source_id: "s-1".to_string(),
            date: date(),
            description: Some("  ".to_string()),
            payment_method: PaymentMethod::Cash,
            subtotal: Decimal::from(100),
            tax_amount: Decimal::ZERO,
            total: Decimal::from(100),
        });
        assert_eq!(services.source_type(), SourceType::Sales);
        assert_eq!(services.description(), "Sales of services");
    }

    #[test]
    fn payment_labels_only_route_credit_to_receivables() {
        assert_eq!(PaymentMethod::from_label("Piutang"), PaymentMethod::Receivable);
        assert_eq!(PaymentMethod::from_label("Tunai"), PaymentMethod::Cash);
        assert_eq!(PaymentMethod::from_label("Transfer"), PaymentMethod::Cash);
    }

    #[test]
    fn payment_labels_deserialize_through_from_label() {
        let parse = |label: &str| serde_json::from_str::<PaymentMethod>(&format!("\"{label}\"")).unwrap();
        assert_eq!(parse("Tunai"), PaymentMethod::Cash);
        assert_eq!(parse("Piutang"), PaymentMethod::Receivable);
        assert_eq!(parse("Transfer"), PaymentMethod::Cash);
        assert_eq!(parse("receivable"), PaymentMethod::Receivable);
        assert_eq!(serde_json::to_string(&PaymentMethod::Receivable).unwrap(), "\"receivable\"");
    }

    #[test]
    fn validation_rejects_missing_and_negative_fields() {
        assert!(disbursement(100, None).validate().is_ok());
        assert!(disbursement(0, None).validate().is_err());
        assert!(disbursement(100, Some(-1)).validate().is_err());
        assert!(disbursement(100, Some(100)).validate().is_err());

        let mut blank = disbursement(100, None);
        if let BusinessEvent::CashDisbursement(e) = &mut blank {
            e.source_id = " ".to_string();
        }
        assert!(matches!(blank.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn events_deserialize_from_tagged_json() {
        let json = r#"{
            "kind": "expense",
            "source_id": "exp-1",
            "date": "2024-01-15",
            "expense_account": "6-1000",
            "amount": "100000",
            "tax_amount": "11000",
            "cash_account": "1-1100"
        }"#;
        let event: BusinessEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.source_type(), SourceType::Expense);
        assert_eq!(event.date(), date());
        assert!(event.validate().is_ok());
    }

    #[test]
    fn source_type_round_trips_through_its_label() {
        for t in SourceType::ALL {
            assert_eq!(SourceType::parse(t.as_str()).unwrap(), t);
        }
        assert!(SourceType::parse("payroll").is_err());
    }
}
