//! Money arithmetic.
//!
//! Amounts are exact base-10 decimals in currency units (not minor units), so
//! the tax and COGS formulas keep their fractional parts until display.

use crate::error::{DomainError, DomainResult};

pub use rust_decimal::Decimal;

/// Largest debit/credit difference still considered balanced (0.01 currency units).
pub const BALANCE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Upper bound accepted for any single input amount or quantity.
///
/// Keeps sums of a handful of amounts far away from `Decimal`'s overflow range.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(2_764_472_320, 232_830, 0, false, 0);

/// `true` when `a` and `b` differ by less than [`BALANCE_TOLERANCE`].
pub fn within_tolerance(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() < BALANCE_TOLERANCE
}

/// `true` when the difference between `a` and `b` is larger than [`BALANCE_TOLERANCE`].
pub fn exceeds_tolerance(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() > BALANCE_TOLERANCE
}

/// Validate a required amount: must be zero or positive.
pub fn non_negative(field: &str, amount: Decimal) -> DomainResult<Decimal> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(DomainError::validation(format!(
            "{field} must not be negative (got {amount})"
        )));
    }
    within_max(field, amount)
}

/// Validate a strictly positive amount.
pub fn positive(field: &str, amount: Decimal) -> DomainResult<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(DomainError::validation(format!(
            "{field} must be positive (got {amount})"
        )));
    }
    within_max(field, amount)
}

fn within_max(field: &str, amount: Decimal) -> DomainResult<Decimal> {
    if amount > MAX_AMOUNT {
        return Err(DomainError::validation(format!(
            "{field} exceeds the maximum supported amount ({MAX_AMOUNT})"
        )));
    }
    Ok(amount)
}

/// Round to two decimal places for presentation.
pub fn for_display(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}
