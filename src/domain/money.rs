//! Money conversions
//!
//! Amounts travel over the API as integer cents and are stored as
//! `NUMERIC(12, 2)` in Postgres.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Largest amount a `NUMERIC(12, 2)` column holds, in cents
pub const MAX_CENTS: i64 = 999_999_999_999;

/// Rejects amounts the money columns cannot store
pub fn check_cents(field: &str, cents: i64) -> Result<i64, String> {
    if cents < 0 {
        Err(format!("{} cannot be negative", field))
    } else if cents > MAX_CENTS {
        Err(format!("{} cannot exceed {}", field, format_cents(MAX_CENTS)))
    } else {
        Ok(cents)
    }
}

pub fn cents_to_decimal(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

pub fn decimal_to_cents(amount: Decimal) -> i64 {
    (amount * Decimal::from(100)).round().to_i64().unwrap_or(0)
}

/// Formats cents as a dollar string, e.g. `$12,345.67`
pub fn format_cents(cents: i64) -> String {
    let negative = cents < 0;
    let abs = cents.unsigned_abs();
    let dollars = (abs / 100).to_string();
    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (i, ch) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!(
        "{}${}.{:02}",
        if negative { "-" } else { "" },
        grouped,
        abs % 100
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cents_convert_both_ways() {
        assert_eq!(cents_to_decimal(123_456).to_string(), "1234.56");
        assert_eq!(decimal_to_cents(Decimal::new(1234_56, 2)), 123_456);
        assert_eq!(decimal_to_cents(Decimal::new(10_006, 3)), 1_001);
    }

    #[test]
    fn amounts_must_fit_the_column() {
        assert_eq!(check_cents("cost_amount", 0), Ok(0));
        assert_eq!(check_cents("cost_amount", MAX_CENTS), Ok(MAX_CENTS));
        assert!(check_cents("cost_amount", -1).is_err());
        assert_eq!(
            check_cents("estimated_value", 1_000_000_000_000),
            Err("estimated_value cannot exceed $9,999,999,999.99".to_string())
        );
        assert!(check_cents("estimated_value", i64::MAX).is_err());
    }

    #[test]
    fn formats_with_grouping() {
        assert_eq!(format_cents(0), "$0.00");
        assert_eq!(format_cents(99), "$0.99");
        assert_eq!(format_cents(1_234_567), "$12,345.67");
        assert_eq!(format_cents(100_000_000), "$1,000,000.00");
        assert_eq!(format_cents(-2_550), "-$25.50");
    }
}
