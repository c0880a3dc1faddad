//! Exact decimal numbers.
//!
//! The store carries numbers as decimal text. `Number` keeps that text as-is
//! after validating it, so values round-trip without passing through binary
//! floating point.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

static DECIMAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?$")
        .unwrap_or_else(|e| panic!("invalid decimal pattern: {}", e))
});

/// Validated decimal text of arbitrary precision.
///
/// Equality, hashing and `Ord` work on the text, not the value: `"1"` and
/// `"1.0"` are different keys in a `HashSet<Number>` or a number set. Use
/// [`Number::cmp_numeric`] to compare values. The exponent must fit in an
/// `i32`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Number(String);

impl Number {
    /// Parse decimal text, keeping it verbatim.
    pub fn parse(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if !DECIMAL.is_match(&text) {
            return Err(Error::MalformedNumber(text));
        }
        if let Some(pos) = text.find(|c: char| c == 'e' || c == 'E') {
            if text[pos + 1..].parse::<i32>().is_err() {
                return Err(Error::MalformedNumber(format!("exponent out of range: {}", text)));
            }
        }
        Ok(Number(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Parse the text into a target numeric type.
    ///
    /// Fails with `MalformedNumber` when the text does not fit the target,
    /// e.g. `"1.5"` into an integer or `"300"` into a `u8`.
    pub fn to_integer<T: FromStr>(&self) -> Result<T> {
        self.0
            .parse::<T>()
            .map_err(|_| Error::MalformedNumber(format!("'{}' does not fit the target type", self.0)))
    }

    /// Compare by numeric value rather than by text, so `"1.0"` equals `"1"`
    /// and `"10"` sorts after `"9"`.
    pub fn cmp_numeric(&self, other: &Number) -> Ordering {
        Decimal::from_text(&self.0).cmp(&Decimal::from_text(&other.0))
    }

    pub fn is_zero(&self) -> bool {
        Decimal::from_text(&self.0).digits.is_empty()
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Number {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Number::parse(s)
    }
}

impl TryFrom<String> for Number {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Number::parse(value)
    }
}

impl From<Number> for String {
    fn from(n: Number) -> String {
        n.0
    }
}

macro_rules! number_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Number {
                fn from(n: $t) -> Self {
                    Number(n.to_string())
                }
            }
        )*
    };
}

number_from_integer!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

/// Normalized form used for numeric comparison: value = 0.digits × 10^exponent.
#[derive(Debug, PartialEq, Eq)]
struct Decimal {
    negative: bool,
    digits: Vec<u8>,
    exponent: i64,
}

impl Decimal {
    /// Text is assumed to have passed `Number::parse`.
    fn from_text(text: &str) -> Decimal {
        let (negative, rest) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };
        let (mantissa, exp) = match rest.find(|c: char| c == 'e' || c == 'E') {
            Some(pos) => (&rest[..pos], rest[pos + 1..].parse::<i32>().map_or(0, i64::from)),
            None => (rest, 0),
        };
        let (int_part, frac_part) = match mantissa.find('.') {
            Some(pos) => (&mantissa[..pos], &mantissa[pos + 1..]),
            None => (mantissa, ""),
        };

        let mut digits: Vec<u8> = int_part
            .bytes()
            .chain(frac_part.bytes())
            .map(|b| b - b'0')
            .collect();
        let mut exponent = (int_part.len() as i64).saturating_add(exp);

        let leading = digits.iter().take_while(|d| **d == 0).count();
        digits.drain(..leading);
        exponent = exponent.saturating_sub(leading as i64);
        while digits.last() == Some(&0) {
            digits.pop();
        }

        if digits.is_empty() {
            return Decimal {
                negative: false,
                digits,
                exponent: 0,
            };
        }
        Decimal {
            negative,
            digits,
            exponent,
        }
    }

    fn cmp_magnitude(&self, other: &Decimal) -> Ordering {
        match (self.digits.is_empty(), other.digits.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
        self.exponent
            .cmp(&other.exponent)
            .then_with(|| self.digits.cmp(&other.digits))
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        let self_zero = self.digits.is_empty();
        let other_zero = other.digits.is_empty();
        match (self.negative && !self_zero, other.negative && !other_zero) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => self.cmp_magnitude(other),
            (true, true) => other.cmp_magnitude(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_valid() {
        for text in ["0", "-1", "+2", "3.25", ".5", "5.", "1e10", "-2.5E-3", "123456789012345678901234567890.000001"] {
            assert_eq!(Number::parse(text).unwrap().as_str(), text);
        }
    }

    #[test]
    fn test_parse_invalid() {
        for text in ["", "abc", "1.2.3", "--1", "1e", "NaN", "inf", " 1", "1e99999999999999999999", "11e9223372036854775807"] {
            match Number::parse(text) {
                Err(Error::MalformedNumber(_)) => {}
                other => panic!("Expected MalformedNumber for {:?}, got {:?}", text, other),
            }
        }
    }

    #[test]
    fn test_to_integer() {
        let n = Number::parse("42").unwrap();
        assert_eq!(n.to_integer::<i64>().unwrap(), 42);
        assert_eq!(n.to_integer::<u8>().unwrap(), 42);

        assert!(matches!(
            Number::parse("1.5").unwrap().to_integer::<i32>(),
            Err(Error::MalformedNumber(_))
        ));
        assert!(matches!(
            Number::parse("300").unwrap().to_integer::<u8>(),
            Err(Error::MalformedNumber(_))
        ));
    }

    #[test]
    fn test_cmp_numeric() {
        let n = |s: &str| Number::parse(s).unwrap();
        assert_eq!(n("1.0").cmp_numeric(&n("1")), Ordering::Equal);
        assert_eq!(n("10").cmp_numeric(&n("9")), Ordering::Greater);
        assert_eq!(n("-10").cmp_numeric(&n("-9")), Ordering::Less);
        assert_eq!(n("0.001").cmp_numeric(&n("1e-3")), Ordering::Equal);
        assert_eq!(n("-0").cmp_numeric(&n("0.0")), Ordering::Equal);
        assert_eq!(n("0.12").cmp_numeric(&n("0.123")), Ordering::Less);
        assert_eq!(n("-1").cmp_numeric(&n("0")), Ordering::Less);
    }

    #[test]
    fn test_cmp_numeric_large_exponents() {
        let n = |s: &str| Number::parse(s).unwrap();
        assert_eq!(n("1e2147483647").cmp_numeric(&n("2")), Ordering::Greater);
        assert_eq!(n("11e2147483647").cmp_numeric(&n("1e2147483647")), Ordering::Greater);
        assert_eq!(n("-1e2147483647").cmp_numeric(&n("-2")), Ordering::Less);
        assert_eq!(n("1e-2147483648").cmp_numeric(&n("0")), Ordering::Greater);
        assert_eq!(n("0.001e-2147483648").cmp_numeric(&n("1e-2147483648")), Ordering::Less);
    }

    #[test]
    fn test_equality_is_textual() {
        let one = Number::parse("1").unwrap();
        let one_point_zero = Number::parse("1.0").unwrap();
        assert_ne!(one, one_point_zero);
        assert_eq!(one.cmp_numeric(&one_point_zero), Ordering::Equal);

        let set: std::collections::HashSet<Number> = [one, one_point_zero].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_serde_as_string() {
        let n = Number::parse("19.99").unwrap();
        assert_eq!(serde_json::to_string(&n).unwrap(), "\"19.99\"");
        let back: Number = serde_json::from_str("\"19.99\"").unwrap();
        assert_eq!(back, n);
        assert!(serde_json::from_str::<Number>("\"x\"").is_err());
    }

    proptest! {
        #[test]
        fn prop_integer_text_preserved(v in any::<i64>()) {
            let n = Number::from(v);
            prop_assert_eq!(n.as_str(), v.to_string());
            prop_assert_eq!(n.to_integer::<i64>().unwrap(), v);
        }

        #[test]
        fn prop_cmp_numeric_matches_integers(a in any::<i32>(), b in any::<i32>()) {
            prop_assert_eq!(Number::from(a).cmp_numeric(&Number::from(b)), a.cmp(&b));
        }
    }
}
