//! Collaborators outside the journal engine: document extraction and blob storage.
//!
//! Only the contracts live here. Extracted records are flat string maps; the
//! mapping into a validated [`CashDisbursement`] is the one piece of logic the
//! engine owns.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use thiserror::Error;

use tallyerp_accounting::{BusinessEvent, CashDisbursement, SourceType};
use tallyerp_core::{Decimal, DomainError};

/// Flat field map produced by a document extractor.
pub type ExtractedRecord = BTreeMap<String, String>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("extractor unavailable: {0}")]
    Unavailable(String),

    #[error("document not supported: {0}")]
    Unsupported(String),

    #[error("missing field '{0}'")]
    MissingField(String),

    #[error("field '{field}' has unparseable value '{value}'")]
    InvalidField { field: String, value: String },

    #[error(transparent)]
    Invalid(#[from] DomainError),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("blob backend: {0}")]
    Backend(String),
}

/// Turns a stored document (receipt, invoice scan) into a flat record.
#[async_trait::async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(
        &self,
        doc_ref: &str,
        type_hint: Option<SourceType>,
    ) -> Result<ExtractedRecord, ExtractionError>;
}

/// Object storage for source documents.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` and return their URL.
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, BlobError>;

    /// Time-limited URL for a stored object.
    async fn signed_url(&self, path: &str, ttl_seconds: u64) -> Result<String, BlobError>;
}

/// Extract `doc_ref` and map it into a cash disbursement event.
pub async fn extract_cash_disbursement<E: DocumentExtractor + ?Sized>(
    extractor: &E,
    doc_ref: &str,
    source_id: &str,
) -> Result<CashDisbursement, ExtractionError> {
    let record = extractor
        .extract(doc_ref, Some(SourceType::CashDisbursement))
        .await?;
    cash_disbursement_from_record(&record, source_id)
}

/// Map extracted fields into a validated [`CashDisbursement`].
///
/// Expects `amount`, `date` and `account_code`; `tax_amount` and
/// `description` are optional. Blank values count as missing.
pub fn cash_disbursement_from_record(
    record: &ExtractedRecord,
    source_id: &str,
) -> Result<CashDisbursement, ExtractionError> {
    let amount = parse_amount("amount", required(record, "amount")?)?;
    let date = parse_date("date", required(record, "date")?)?;
    let expense_account = required(record, "account_code")?.to_string();
    let tax_amount = optional(record, "tax_amount")
        .map(|v| parse_amount("tax_amount", v))
        .transpose()?;

    let event = CashDisbursement {
        source_id: source_id.trim().to_string(),
        date,
        description: optional(record, "description").map(str::to_string),
        expense_account,
        amount,
        tax_amount,
        tax_account: None,
        credit_account: None,
    };

    BusinessEvent::CashDisbursement(event.clone()).validate()?;
    Ok(event)
}

fn optional<'a>(record: &'a ExtractedRecord, field: &str) -> Option<&'a str> {
    record
        .get(field)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn required<'a>(record: &'a ExtractedRecord, field: &str) -> Result<&'a str, ExtractionError> {
    optional(record, field).ok_or_else(|| ExtractionError::MissingField(field.to_string()))
}

fn invalid(field: &str, value: &str) -> ExtractionError {
    ExtractionError::InvalidField {
        field: field.to_string(),
        value: value.to_string(),
    }
}

/// Parse an amount written the Indonesian way (`Rp 1.234.567,89`) or plainly (`1234567.89`).
///
/// With both separators present the dot groups thousands and the comma marks
/// decimals. A lone comma is decimal. Lone dots are thousands separators when
/// every group after the first has three digits.
pub fn parse_amount(field: &str, raw: &str) -> Result<Decimal, ExtractionError> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches("Rp")
        .trim_start_matches("rp")
        .trim_start_matches("IDR")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let normalized = match (cleaned.contains('.'), cleaned.contains(',')) {
        (true, true) => cleaned.replace('.', "").replace(',', "."),
        (false, true) => cleaned.replace(',', "."),
        (true, false) => {
            let groups: Vec<&str> = cleaned.split('.').collect();
            if groups.len() > 2 || groups[1..].iter().all(|g| g.len() == 3) {
                cleaned.replace('.', "")
            } else {
                cleaned.clone()
            }
        }
        (false, false) => cleaned.clone(),
    };

    Decimal::from_str(&normalized).map_err(|_| invalid(field, raw))
}

/// ISO `YYYY-MM-DD`, falling back to `DD/MM/YYYY`.
pub fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, ExtractionError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .map_err(|_| invalid(field, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn record(pairs: &[(&str, &str)]) -> ExtractedRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn indonesian_amounts() {
        let cases = [
            ("1.234.567,89", Decimal::new(123_456_789, 2)),
            ("Rp 250.000", Decimal::from(250_000)),
            ("1.500", Decimal::from(1_500)),
            ("12,5", Decimal::new(125, 1)),
            ("99.95", Decimal::new(9_995, 2)),
            ("250000", Decimal::from(250_000)),
        ];
        for (raw, expected) in cases {
            assert_eq!(parse_amount("amount", raw).unwrap(), expected, "{raw}");
        }
        assert!(matches!(
            parse_amount("amount", "abc"),
            Err(ExtractionError::InvalidField { .. })
        ));
    }

    #[test]
    fn dates_accept_iso_and_day_first() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(parse_date("date", "2024-01-15").unwrap(), expected);
        assert_eq!(parse_date("date", "15/01/2024").unwrap(), expected);
        assert!(parse_date("date", "January 15").is_err());
    }

    #[test]
    fn maps_a_receipt_into_a_disbursement() {
        let event = cash_disbursement_from_record(
            &record(&[
                ("amount", "Rp 1.110.000"),
                ("tax_amount", "110.000"),
                ("date", "2024-01-15"),
                ("description", "Servis AC"),
                ("account_code", "6-1000"),
            ]),
            " ab12cd34 ",
        )
        .unwrap();

        assert_eq!(event.source_id, "ab12cd34");
        assert_eq!(event.amount, Decimal::from(1_110_000));
        assert_eq!(event.tax_amount, Some(Decimal::from(110_000)));
        assert_eq!(event.description.as_deref(), Some("Servis AC"));
    }

    #[test]
    fn missing_and_invalid_fields_are_reported() {
        let err = cash_disbursement_from_record(
            &record(&[("amount", "100"), ("date", "2024-01-15"), ("account_code", " ")]),
            "r-1",
        )
        .unwrap_err();
        assert_eq!(err, ExtractionError::MissingField("account_code".to_string()));

        let err = cash_disbursement_from_record(
            &record(&[
                ("amount", "100"),
                ("tax_amount", "200"),
                ("date", "2024-01-15"),
                ("account_code", "6-1000"),
            ]),
            "r-1",
        )
        .unwrap_err();
        assert!(matches!(err, ExtractionError::Invalid(_)));
    }

    struct FixedExtractor(ExtractedRecord);

    #[async_trait::async_trait]
    impl DocumentExtractor for FixedExtractor {
        async fn extract(
            &self,
            _doc_ref: &str,
            type_hint: Option<SourceType>,
        ) -> Result<ExtractedRecord, ExtractionError> {
            match type_hint {
                Some(SourceType::CashDisbursement) => Ok(self.0.clone()),
                other => Err(ExtractionError::Unsupported(format!("{other:?}"))),
            }
        }
    }

    #[derive(Default)]
    struct MemoryBlobs(Mutex<HashMap<String, Vec<u8>>>);

    #[async_trait::async_trait]
    impl BlobStore for MemoryBlobs {
        async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, BlobError> {
            let mut blobs = self.0.lock().map_err(|e| BlobError::Backend(e.to_string()))?;
            let path = format!("receipts/{}.{}", blobs.len(), content_type.rsplit('/').next().unwrap_or("bin"));
            blobs.insert(path.clone(), bytes);
            Ok(format!("mem://{path}"))
        }

        async fn signed_url(&self, path: &str, ttl_seconds: u64) -> Result<String, BlobError> {
            let blobs = self.0.lock().map_err(|e| BlobError::Backend(e.to_string()))?;
            if !blobs.contains_key(path) {
                return Err(BlobError::NotFound(path.to_string()));
            }
            Ok(format!("mem://{path}?expires_in={ttl_seconds}"))
        }
    }

    #[tokio::test]
    async fn stored_receipt_flows_into_a_disbursement() {
        let blobs = MemoryBlobs::default();
        let url = blobs.put(b"%PDF".to_vec(), "application/pdf").await.unwrap();
        let path = url.trim_start_matches("mem://");
        assert!(blobs.signed_url(path, 300).await.unwrap().ends_with("expires_in=300"));
        assert!(matches!(
            blobs.signed_url("receipts/missing.pdf", 300).await,
            Err(BlobError::NotFound(_))
        ));

        let extractor = FixedExtractor(record(&[
            ("amount", "75.000"),
            ("date", "02/03/2024"),
            ("account_code", "6-1400"),
        ]));
        let event = extract_cash_disbursement(&extractor, &url, "rcpt-0001").await.unwrap();
        assert_eq!(event.amount, Decimal::from(75_000));
        assert_eq!(event.date, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }
}
