//! Decimal parsing and display helpers.
//!
//! The exchange reports every numeric order/position field as a decimal
//! string to avoid float precision loss.
//! Arithmetic over these fields (cumulative notional, realized PnL sums,
//! ratios) is done with [`rust_decimal::Decimal`] end to end; strings are
//! only parsed on the way in and formatted on the way out.

use rust_decimal::Decimal;
use std::str::FromStr;

/// Parses an exchange decimal string, treating absent/empty/unparsable
/// input as `None` rather than an error — most callers fall back to the
/// next candidate field in a priority chain.
pub fn parse_opt(raw: &str) -> Option<Decimal> {
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw).ok()
}

/// Parses an exchange decimal string, defaulting to zero on absence or
/// parse failure. Used for fields whose "missing" behaviour is already
/// well-defined as zero (e.g. quantities, `rp` deltas).
pub fn parse_or_zero(raw: &str) -> Decimal {
    parse_opt(raw).unwrap_or(Decimal::ZERO)
}

/// Formats a price to 8 decimal places, as required for `displayPrice`
/// in fill/life-cycle notifications.
pub fn format_price_8dp(value: Decimal) -> String {
    format!("{:.8}", value)
}

/// Formats a notional amount to 2 decimal places, or 4 when the magnitude
/// is below 1.
pub fn format_notional(value: Decimal) -> String {
    if value.abs() < Decimal::ONE {
        format!("{:.4}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// Formats a ratio (0..1) as a percentage with 2 decimal places.
pub fn format_percent(ratio: Decimal) -> String {
    format!("{:.2}%", ratio * Decimal::ONE_HUNDRED)
}

/// Formats a realized-PnL amount: `+`/`-` prefixed at 2 decimals, or a
/// bare `0.00` when the sum is exactly zero.
pub fn format_signed_notional(value: Decimal) -> String {
    if value.is_zero() {
        "0.00".to_string()
    } else if value.is_sign_negative() {
        format!("-{:.2}", value.abs())
    } else {
        format!("+{:.2}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_valid_decimal() {
        assert_eq!(parse_opt("45000.50"), Some(dec!(45000.50)));
    }

    #[test]
    fn treats_empty_as_none() {
        assert_eq!(parse_opt(""), None);
    }

    #[test]
    fn treats_garbage_as_none() {
        assert_eq!(parse_opt("not-a-number"), None);
    }

    #[test]
    fn formats_small_notional_with_four_places() {
        assert_eq!(format_notional(dec!(0.5)), "0.5000");
    }

    #[test]
    fn formats_large_notional_with_two_places() {
        assert_eq!(format_notional(dec!(45000)), "45000.00");
    }

    #[test]
    fn formats_signed_pnl() {
        assert_eq!(format_signed_notional(dec!(12.3)), "+12.30");
        assert_eq!(format_signed_notional(dec!(-12.3)), "-12.30");
    }
}
