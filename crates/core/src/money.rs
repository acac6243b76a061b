//! Minor-unit (grosz) money arithmetic.
//!
//! All persisted amounts are integer minor units of a single currency.
//! Providers that report major-unit amounts ("3002.55") are converted with
//! exact decimal arithmetic; multiplying floats would already be wrong for
//! everyday invoice totals.

use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};

/// Minor units per major unit.
const MINOR_PER_MAJOR: i64 = 100;

/// Errors converting a provider amount into minor units.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    /// The raw value was empty or whitespace.
    #[error("empty amount")]
    Empty,

    /// The raw value is not a decimal number.
    #[error("malformed amount: {0:?}")]
    Malformed(String),

    /// The amount does not fit into 64-bit minor units.
    #[error("amount out of range")]
    OutOfRange,
}

/// Convert a major-unit decimal string into minor units.
///
/// `"3002.55"` becomes `300255`. Sub-cent precision is rounded half-up,
/// which only matters for malformed vendor data; real invoice amounts carry
/// at most two decimals.
pub fn parse_major_units(raw: &str) -> Result<i64, AmountError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }
    let amount = BigDecimal::from_str(trimmed)
        .map_err(|_| AmountError::Malformed(trimmed.to_string()))?;
    let minor = (amount * BigDecimal::from(MINOR_PER_MAJOR)).with_scale_round(0, RoundingMode::HalfUp);
    minor.to_i64().ok_or(AmountError::OutOfRange)
}

/// Outstanding balance. Never trust a provider-reported remainder; this is
/// recomputed on every write.
pub fn left_to_pay(gross: i64, paid: i64) -> i64 {
    gross - paid
}

/// Render minor units as a major-unit decimal string for email templates.
pub fn format_minor(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!(
        "{sign}{}.{:02}",
        abs / MINOR_PER_MAJOR as u64,
        abs % MINOR_PER_MAJOR as u64
    )
}
