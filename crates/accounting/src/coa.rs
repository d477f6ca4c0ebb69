//! Chart of accounts registry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use tallyerp_core::{DomainError, DomainResult, Entity};

/// Side on which an account's balance is conventionally positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalBalance {
    Debit,
    Credit,
}

/// Account classification used by the report assemblers.
///
/// Labels are parsed case-insensitively in English or Indonesian. Anything
/// unrecognised is kept verbatim as `Unclassified` so reports can flag it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Cogs,
    OperatingExpense,
    Unclassified(String),
}

impl AccountType {
    pub fn parse_label(label: &str) -> Self {
        let normalized = label
            .trim()
            .to_lowercase()
            .replace(['_', '-'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        match normalized.as_str() {
            "asset" | "assets" | "aset" | "aktiva" | "harta" => AccountType::Asset,
            "liability" | "liabilities" | "kewajiban" | "liabilitas" | "utang" | "hutang" => {
                AccountType::Liability
            }
            "equity" | "ekuitas" | "modal" => AccountType::Equity,
            "revenue" | "income" | "pendapatan" | "penjualan" => AccountType::Revenue,
            "cogs" | "cost of goods sold" | "hpp" | "harga pokok penjualan"
            | "beban pokok penjualan" => AccountType::Cogs,
            "operating expense" | "operating expenses" | "expense" | "expenses" | "beban"
            | "beban operasional" | "biaya" | "biaya operasional" => AccountType::OperatingExpense,
            _ => AccountType::Unclassified(label.trim().to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            AccountType::Asset => "Asset",
            AccountType::Liability => "Liability",
            AccountType::Equity => "Equity",
            AccountType::Revenue => "Revenue",
            AccountType::Cogs => "COGS",
            AccountType::OperatingExpense => "Operating Expense",
            AccountType::Unclassified(label) => label,
        }
    }

    /// Conventional normal side for the type, if the type is known.
    pub fn default_normal_balance(&self) -> Option<NormalBalance> {
        match self {
            AccountType::Asset | AccountType::Cogs | AccountType::OperatingExpense => {
                Some(NormalBalance::Debit)
            }
            AccountType::Liability | AccountType::Equity | AccountType::Revenue => {
                Some(NormalBalance::Credit)
            }
            AccountType::Unclassified(_) => None,
        }
    }

    pub fn is_classified(&self) -> bool {
        !matches!(self, AccountType::Unclassified(_))
    }
}

impl From<String> for AccountType {
    fn from(value: String) -> Self {
        AccountType::parse_label(&value)
    }
}

impl From<AccountType> for String {
    fn from(value: AccountType) -> Self {
        value.label().to_string()
    }
}

impl core::fmt::Display for AccountType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Account metadata (static reference data).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub code: String, // e.g. "1-1100"
    pub name: String, // e.g. "Kas"
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub normal_balance: NormalBalance,
    pub is_active: bool,
}

impl Account {
    /// Active account whose normal side follows its type (debit for unknown types).
    pub fn new(code: impl Into<String>, name: impl Into<String>, account_type: AccountType) -> Self {
        let normal_balance = account_type
            .default_normal_balance()
            .unwrap_or(NormalBalance::Debit);
        Self {
            code: code.into(),
            name: name.into(),
            account_type,
            normal_balance,
            is_active: true,
        }
    }

    pub fn with_normal_balance(mut self, side: NormalBalance) -> Self {
        self.normal_balance = side;
        self
    }
}

impl Entity for Account {
    type Id = String;

    fn id(&self) -> &Self::Id {
        &self.code
    }
}

/// Registry of accounts keyed (and ordered) by code.
///
/// Accounts are never removed: history keeps referencing them, so retiring an
/// account means deactivating it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartOfAccounts {
    accounts: BTreeMap<String, Account>,
}

impl ChartOfAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_accounts(accounts: impl IntoIterator<Item = Account>) -> DomainResult<Self> {
        let mut coa = Self::new();
        for account in accounts {
            coa.register(account)?;
        }
        Ok(coa)
    }

    /// Default chart for an Indonesian trading/service SME.
    ///
    /// Contains every code referenced by [`crate::AccountDefaults::default`].
    pub fn standard() -> Self {
        use AccountType::*;

        let seed = [
            ("1-1001", "Kas Kecil", Asset),
            ("1-1100", "Kas", Asset),
            ("1-1110", "Bank", Asset),
            ("1-1200", "Piutang Usaha", Asset),
            ("1-1400", "Persediaan Barang Dagang", Asset),
            ("1-1700", "PPN Masukan", Asset),
            ("1-2100", "Peralatan", Asset),
            ("2-1100", "Utang Usaha", Liability),
            ("2-1300", "PPN Keluaran", Liability),
            ("2-1400", "Utang PPh", Liability),
            ("3-1000", "Modal Pemilik", Equity),
            ("3-2000", "Laba Ditahan", Equity),
            ("4-1000", "Penjualan Barang", Revenue),
            ("4-2000", "Pendapatan Jasa", Revenue),
            ("5-1000", "Harga Pokok Penjualan", Cogs),
            ("6-1000", "Beban Operasional", OperatingExpense),
            ("6-1100", "Beban Gaji", OperatingExpense),
            ("6-1200", "Beban Listrik dan Air", OperatingExpense),
            ("6-1300", "Beban Sewa", OperatingExpense),
            ("6-1400", "Beban Perlengkapan", OperatingExpense),
        ];

        let accounts = seed
            .into_iter()
            .map(|(code, name, kind)| Account::new(code, name, kind))
            .map(|account| (account.id().clone(), account))
            .collect();

        Self { accounts }
    }

    /// Look up an account by code (active or not).
    pub fn lookup(&self, code: &str) -> DomainResult<&Account> {
        self.accounts
            .get(code)
            .ok_or_else(|| DomainError::not_found(format!("account {code}")))
    }

    /// Look up an account that may be used for new journal lines.
    pub fn resolve_active(&self, code: &str) -> Option<&Account> {
        self.accounts.get(code).filter(|a| a.is_active)
    }

    /// Active accounts ordered by code, optionally restricted to a code prefix.
    pub fn list_active(&self, prefix: Option<&str>) -> Vec<&Account> {
        self.accounts
            .values()
            .filter(|a| a.is_active)
            .filter(|a| prefix.is_none_or(|p| a.code.starts_with(p)))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn register(&mut self, account: Account) -> DomainResult<()> {
        let code = account.code.trim();
        if code.is_empty() {
            return Err(DomainError::validation("account code must not be empty"));
        }
        if self.accounts.contains_key(code) {
            return Err(DomainError::conflict(format!("account {code} already exists")));
        }
        self.accounts.insert(code.to_string(), Account {
            code: code.to_string(),
            ..account
        });
        Ok(())
    }

    pub fn deactivate(&mut self, code: &str) -> DomainResult<()> {
        let account = self
            .accounts
            .get_mut(code)
            .ok_or_else(|| DomainError::not_found(format!("account {code}")))?;
        account.is_active = false;
        Ok(())
    }

    pub fn reactivate(&mut self, code: &str) -> DomainResult<()> {
        let account = self
            .accounts
            .get_mut(code)
            .ok_or_else(|| DomainError::not_found(format!("account {code}")))?;
        account.is_active = true;
        Ok(())
    }

    /// Change the normal side of an account that has never been posted to.
    ///
    /// Flipping the side under existing lines would silently invert every
    /// historical balance, so it is refused once `has_posted_lines` is true.
    pub fn change_normal_balance(
        &mut self,
        code: &str,
        side: NormalBalance,
        has_posted_lines: bool,
    ) -> DomainResult<()> {
        let account = self
            .accounts
            .get_mut(code)
            .ok_or_else(|| DomainError::not_found(format!("account {code}")))?;
        if account.normal_balance == side {
            return Ok(());
        }
        if has_posted_lines {
            return Err(DomainError::invariant(format!(
                "cannot change normal balance of account {code}: it has posted journal lines"
            )));
        }
        account.normal_balance = side;
        Ok(())
    }
}
