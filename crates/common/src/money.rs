//! Exact currency amounts.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Money amount represented in cents to avoid floating point issues.
///
/// Serialized as a two-decimal string (`"30.00"`), the same shape a
/// `NUMERIC(12,2)` column renders. Deserializes from such a string or from a
/// JSON number with at most two fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = 10.00)
    cents: i64,
}

/// Error returned when a decimal string is not a valid money amount.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid money amount '{input}': {reason}")]
pub struct ParseMoneyError {
    input: String,
    reason: &'static str,
}

impl ParseMoneyError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

impl Money {
    /// Largest amount a `NUMERIC(12,2)` column holds: 9,999,999,999.99.
    pub const MAX_STORED: Money = Money::from_cents(999_999_999_999);

    /// Creates a new Money amount from cents.
    pub const fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Adds another amount, returning `None` on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.cents.checked_add(other.cents).map(Money::from_cents)
    }

    /// Multiplies by a quantity, returning `None` on overflow.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl FromStr for Money {
    type Err = ParseMoneyError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (whole, fraction) = match unsigned.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (unsigned, ""),
        };

        if whole.is_empty() {
            return Err(ParseMoneyError::new(input, "missing whole part"));
        }
        if !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(ParseMoneyError::new(input, "not a decimal number"));
        }

        let fraction = fraction.trim_end_matches('0');
        if fraction.len() > 2 {
            return Err(ParseMoneyError::new(input, "more than two fractional digits"));
        }

        let whole: i64 = whole
            .parse()
            .map_err(|_| ParseMoneyError::new(input, "amount out of range"))?;
        let fraction_cents = match fraction.len() {
            0 => 0,
            1 => i64::from(fraction.as_bytes()[0] - b'0') * 10,
            _ => fraction
                .parse::<i64>()
                .map_err(|_| ParseMoneyError::new(input, "not a decimal number"))?,
        };

        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction_cents))
            .ok_or_else(|| ParseMoneyError::new(input, "amount out of range"))?;

        Ok(Money::from_cents(if negative { -cents } else { cents }))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct MoneyVisitor;

impl Visitor<'_> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal amount with at most two fractional digits")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        v.checked_mul(100)
            .map(Money::from_cents)
            .ok_or_else(|| E::custom("amount out of range"))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        i64::try_from(v)
            .map_err(|_| E::custom("amount out of range"))
            .and_then(|v| self.visit_i64(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        if !v.is_finite() {
            return Err(E::custom("amount must be finite"));
        }
        // Shortest round-trip rendering, so 10.1 parses as "10.1" and not
        // as its binary expansion.
        self.visit_str(&v.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(1234).to_string(), "12.34");
        assert_eq!(Money::from_cents(100).to_string(), "1.00");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-12.34");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_money_parse() {
        assert_eq!("10".parse::<Money>().unwrap().cents(), 1000);
        assert_eq!("10.5".parse::<Money>().unwrap().cents(), 1050);
        assert_eq!("10.05".parse::<Money>().unwrap().cents(), 1005);
        assert_eq!(" 19.990 ".parse::<Money>().unwrap().cents(), 1999);
        assert_eq!("-3.25".parse::<Money>().unwrap().cents(), -325);
    }

    #[test]
    fn test_money_parse_rejects_garbage() {
        assert!("".parse::<Money>().is_err());
        assert!(".5".parse::<Money>().is_err());
        assert!("1.234".parse::<Money>().is_err());
        assert!("1e3".parse::<Money>().is_err());
        assert!("ten".parse::<Money>().is_err());
        assert!("99999999999999999999".parse::<Money>().is_err());
    }

    #[test]
    fn test_money_checked_arithmetic() {
        let a = Money::from_cents(1000);
        assert_eq!(a.checked_multiply(3), Some(Money::from_cents(3000)));
        assert_eq!(
            a.checked_add(Money::from_cents(5)),
            Some(Money::from_cents(1005))
        );
        assert_eq!(Money::from_cents(i64::MAX).checked_multiply(2), None);
        assert_eq!(Money::from_cents(i64::MAX).checked_add(a), None);
    }

    #[test]
    fn test_money_serializes_as_decimal_string() {
        let json = serde_json::to_string(&Money::from_cents(3000)).unwrap();
        assert_eq!(json, "\"30.00\"");
    }

    #[test]
    fn test_money_deserializes_from_numbers_and_strings() {
        let from_str: Money = serde_json::from_str("\"12.30\"").unwrap();
        let from_int: Money = serde_json::from_str("12").unwrap();
        let from_float: Money = serde_json::from_str("12.3").unwrap();
        assert_eq!(from_str.cents(), 1230);
        assert_eq!(from_int.cents(), 1200);
        assert_eq!(from_float.cents(), 1230);

        // 0.1 + 0.2 style drift must not sneak in
        let tenth: Money = serde_json::from_str("0.1").unwrap();
        assert_eq!(tenth.cents(), 10);

        assert!(serde_json::from_str::<Money>("12.345").is_err());
        assert!(serde_json::from_str::<Money>("true").is_err());
    }
}
