//! Journal entries, their lines and general-ledger mirror rows.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tallyerp_core::{Decimal, DomainError, DomainResult, Entity, JournalEntryId};

use crate::event::SourceType;

/// One side of a journal entry.
///
/// Lines produced by the composer carry exactly one non-zero side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    pub account_code: String,
    pub debit: Decimal,
    pub credit: Decimal,
    pub description: String,
}

impl JournalLine {
    pub fn debit(account_code: impl Into<String>, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            account_code: account_code.into(),
            debit: amount,
            credit: Decimal::ZERO,
            description: description.into(),
        }
    }

    pub fn credit(account_code: impl Into<String>, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            account_code: account_code.into(),
            debit: Decimal::ZERO,
            credit: amount,
            description: description.into(),
        }
    }

    pub fn is_debit(&self) -> bool {
        !self.debit.is_zero()
    }
}

/// Balanced, account-resolved output of the composer. Not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedJournal {
    pub source_type: SourceType,
    pub source_id: String,
    pub entry_date: NaiveDate,
    pub description: String,
    pub lines: Vec<JournalLine>,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Posted,
    Voided,
}

impl EntryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryStatus::Posted => "posted",
            EntryStatus::Voided => "voided",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "posted" => Ok(EntryStatus::Posted),
            "voided" => Ok(EntryStatus::Voided),
            other => Err(DomainError::validation(format!("unknown entry status: {other}"))),
        }
    }
}

/// Persisted journal entry (header + owned lines).
///
/// Created in one step by the poster. The only permitted change afterwards is
/// the `Posted -> Voided` transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: JournalEntryId,
    pub reference: String,
    pub entry_date: NaiveDate,
    pub description: String,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    pub status: EntryStatus,
    pub source_type: SourceType,
    pub source_id: String,
    pub lines: Vec<JournalLine>,
    pub posted_at: DateTime<Utc>,
    #[serde(default)]
    pub voided_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub void_reason: Option<String>,
}

impl JournalEntry {
    pub fn posted(
        id: JournalEntryId,
        reference: impl Into<String>,
        composed: ComposedJournal,
        posted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            reference: reference.into(),
            entry_date: composed.entry_date,
            description: composed.description,
            total_debit: composed.total_debit,
            total_credit: composed.total_credit,
            status: EntryStatus::Posted,
            source_type: composed.source_type,
            source_id: composed.source_id,
            lines: composed.lines,
            posted_at,
            voided_at: None,
            void_reason: None,
        }
    }

    pub fn is_posted(&self) -> bool {
        self.status == EntryStatus::Posted
    }

    /// Check that the stored totals match the lines and each other.
    pub fn is_consistent(&self) -> bool {
        let debit: Decimal = self.lines.iter().map(|l| l.debit).sum();
        let credit: Decimal = self.lines.iter().map(|l| l.credit).sum();
        !self.lines.is_empty()
            && debit == self.total_debit
            && credit == self.total_credit
            && !tallyerp_core::money::exceeds_tolerance(debit, credit)
    }

    pub fn void(&mut self, reason: impl Into<String>, at: DateTime<Utc>) -> DomainResult<()> {
        if self.status == EntryStatus::Voided {
            return Err(DomainError::invariant(format!(
                "journal entry {} is already voided",
                self.reference
            )));
        }
        self.status = EntryStatus::Voided;
        self.voided_at = Some(at);
        self.void_reason = Some(reason.into());
        Ok(())
    }

    /// General-ledger mirror rows, one per line, in line order.
    pub fn ledger_rows(&self) -> Vec<LedgerRow> {
        self.lines
            .iter()
            .map(|line| LedgerRow {
                entry_id: self.id,
                reference: self.reference.clone(),
                entry_date: self.entry_date,
                account_code: line.account_code.clone(),
                debit: line.debit,
                credit: line.credit,
                description: line.description.clone(),
            })
            .collect()
    }
}

impl Entity for JournalEntry {
    type Id = JournalEntryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// General-ledger mirror row (per-account view of a journal line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub entry_id: JournalEntryId,
    pub reference: String,
    pub entry_date: NaiveDate,
    pub account_code: String,
    pub debit: Decimal,
    pub credit: Decimal,
    pub description: String,
}

/// Human-readable journal reference: `{TypeCode}-{YYYYMMDD}-{suffix}`.
///
/// The suffix is the first eight characters of the source id, or random when
/// the source id is blank. Advisory only: not a key.
pub fn reference_for(source_type: SourceType, date: NaiveDate, source_id: &str) -> String {
    let trimmed = source_id.trim();
    let suffix: String = if trimmed.is_empty() {
        uuid::Uuid::new_v4().simple().to_string().chars().take(8).collect()
    } else {
        trimmed.chars().take(8).collect()
    };
    format!(
        "{}-{}-{}",
        source_type.type_code(),
        date.format("%Y%m%d"),
        suffix
    )
}
