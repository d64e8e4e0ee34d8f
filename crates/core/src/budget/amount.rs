//! Storage bounds for monetary amounts.

use rust_decimal::Decimal;

use super::error::BudgetError;

/// Decimal places kept by the ledger columns.
pub const AMOUNT_SCALE: u32 = 4;

/// Exclusive upper bound on an amount's magnitude (15 integer digits).
pub const AMOUNT_LIMIT: Decimal = Decimal::from_parts(0xA4C6_8000, 0x0003_8D7E, 0, false, 0);

/// Checks that `amount` fits a `NUMERIC(19, 4)` column without rounding.
///
/// Trailing zeros do not count towards the scale, so `10.50000` is accepted.
///
/// # Errors
///
/// Returns `BudgetError::AmountOutOfRange` naming `field` when the amount has
/// more than four decimal places or fifteen integer digits.
pub fn ensure_storable(field: &'static str, amount: Decimal) -> Result<(), BudgetError> {
    if amount.normalize().scale() > AMOUNT_SCALE || amount.abs() >= AMOUNT_LIMIT {
        return Err(BudgetError::AmountOutOfRange { field, amount });
    }
    Ok(())
}
