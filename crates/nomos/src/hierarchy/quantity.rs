//! Resource quantities such as `500m`, `2Gi` or `1e3`.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,

    #[error("invalid quantity `{0}`")]
    Invalid(String),

    #[error("quantity `{0}` is out of range")]
    OutOfRange(String),
}

/// A quantity normalised to billionths of its base unit. Fractions below
/// one nano-unit are rounded up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity {
    nanos: i128,
}

enum Scale {
    Decimal(i32),
    Binary(u32),
}

impl Quantity {
    pub fn as_nanos(&self) -> i128 {
        self.nanos
    }
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(QuantityError::Empty);
        }
        let invalid = || QuantityError::Invalid(s.to_string());
        let out_of_range = || QuantityError::OutOfRange(s.to_string());

        let split = s
            .char_indices()
            .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '+' || c == '-'))))
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        let (number, suffix) = s.split_at(split);

        let (negative, digits) = match number.as_bytes().first() {
            Some(b'-') => (true, &number[1..]),
            Some(b'+') => (false, &number[1..]),
            _ => (false, number),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if fraction.contains('.') {
            return Err(invalid());
        }
        let mut mantissa: i128 = 0;
        for c in whole.chars().chain(fraction.chars()) {
            let digit = c.to_digit(10).ok_or_else(invalid)? as i128;
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(digit))
                .ok_or_else(out_of_range)?;
        }
        let fraction_len = i32::try_from(fraction.len()).map_err(|_| out_of_range())?;

        let scale = match suffix {
            "" => Scale::Decimal(0),
            "n" => Scale::Decimal(-9),
            "u" => Scale::Decimal(-6),
            "m" => Scale::Decimal(-3),
            "k" => Scale::Decimal(3),
            "M" => Scale::Decimal(6),
            "G" => Scale::Decimal(9),
            "T" => Scale::Decimal(12),
            "P" => Scale::Decimal(15),
            "E" => Scale::Decimal(18),
            "Ki" => Scale::Binary(1),
            "Mi" => Scale::Binary(2),
            "Gi" => Scale::Binary(3),
            "Ti" => Scale::Binary(4),
            "Pi" => Scale::Binary(5),
            "Ei" => Scale::Binary(6),
            exp if exp.len() > 1 && (exp.starts_with('e') || exp.starts_with('E')) => {
                Scale::Decimal(exp[1..].parse::<i32>().map_err(|_| invalid())?)
            }
            _ => return Err(invalid()),
        };

        let (multiplier, exponent) = match scale {
            Scale::Decimal(e) => (
                1i128,
                e.checked_add(9)
                    .and_then(|x| x.checked_sub(fraction_len))
                    .ok_or_else(out_of_range)?,
            ),
            Scale::Binary(k) => (
                1024i128.checked_pow(k).ok_or_else(out_of_range)?,
                9i32.checked_sub(fraction_len).ok_or_else(out_of_range)?,
            ),
        };
        let scaled = mantissa.checked_mul(multiplier).ok_or_else(out_of_range)?;
        let nanos = if exponent >= 0 {
            let factor = 10i128
                .checked_pow(exponent as u32)
                .ok_or_else(out_of_range)?;
            scaled.checked_mul(factor).ok_or_else(out_of_range)?
        } else {
            match 10i128.checked_pow(exponent.unsigned_abs()) {
                Some(divisor) => scaled / divisor + i128::from(scaled % divisor > 0),
                None => i128::from(scaled > 0),
            }
        };

        Ok(Self {
            nanos: if negative { -nanos } else { nanos },
        })
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}n", self.nanos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    #[test]
    fn test_decimal_and_binary_suffixes() {
        assert_eq!(q("1").as_nanos(), 1_000_000_000);
        assert_eq!(q("500m").as_nanos(), 500_000_000);
        assert_eq!(q("0.5"), q("500m"));
        assert_eq!(q("1k"), q("1000"));
        assert_eq!(q("1Ki").as_nanos(), 1024 * 1_000_000_000);
        assert_eq!(q("1e3"), q("1k"));
        assert_eq!(q("1.5Gi"), q("1536Mi"));
    }

    #[test]
    fn test_ordering() {
        assert!(q("1Gi") > q("1G"));
        assert!(q("100m") < q("1"));
        assert!(q("-1") < q("0"));
        assert!(q("10") > q("9.999"));
    }

    #[test]
    fn test_rounds_up_below_nano() {
        assert_eq!(q("1e-12").as_nanos(), 1);
    }

    #[test]
    fn test_invalid() {
        assert_eq!("".parse::<Quantity>(), Err(QuantityError::Empty));
        assert!(matches!("abc".parse::<Quantity>(), Err(QuantityError::Invalid(_))));
        assert!(matches!("1Xi".parse::<Quantity>(), Err(QuantityError::Invalid(_))));
        assert!(matches!("1.2.3".parse::<Quantity>(), Err(QuantityError::Invalid(_))));
        assert!(matches!("1e99".parse::<Quantity>(), Err(QuantityError::OutOfRange(_))));
    }

    #[test]
    fn test_extreme_exponents() {
        assert!(matches!(
            "1e2147483647".parse::<Quantity>(),
            Err(QuantityError::OutOfRange(_))
        ));
        assert!(matches!(
            "0.0000000001e-2147483648".parse::<Quantity>(),
            Err(QuantityError::OutOfRange(_))
        ));
        assert_eq!(q("1e-2147483648").as_nanos(), 1);
        assert!(matches!(
            "1e99999999999".parse::<Quantity>(),
            Err(QuantityError::Invalid(_))
        ));
        assert_eq!(q("0.1e-2147483630").as_nanos(), 1);
    }
}
