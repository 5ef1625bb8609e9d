use rust_decimal::{prelude::FromPrimitive as _, Decimal};
use std::str::FromStr as _;
use thiserror::Error;

use super::sheet::CellValue;

/// Characters dropped from textual amounts before conversion: thousands
/// separators, currency glyphs and whitespace.
const IGNORED_CHARS: &[char] = &[',', '¥', '￥', '元', '$', '€', '£'];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("empty target cell")]
    Empty,
    #[error("could not parse amount from {0:?}")]
    Unparsable(String),
}

/// Converts a raw cell value into an amount. Numeric cells are taken as they
/// are, text is cleaned first. The sign is never changed.
pub fn parse_amount(raw: Option<&CellValue>) -> Result<Decimal, AmountError> {
    match raw {
        None => Err(AmountError::Empty),
        Some(CellValue::Number(number)) => {
            Decimal::from_f64(*number).ok_or_else(|| AmountError::Unparsable(number.to_string()))
        }
        Some(CellValue::Text(text)) => parse_amount_str(text),
        Some(CellValue::Bool(value)) => Err(AmountError::Unparsable(value.to_string())),
    }
}

pub fn parse_amount_str(raw: &str) -> Result<Decimal, AmountError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !IGNORED_CHARS.contains(c))
        .collect();
    if cleaned.is_empty() {
        return Err(AmountError::Empty);
    }
    let number = leading_number(&cleaned).ok_or_else(|| AmountError::Unparsable(raw.to_string()))?;
    Decimal::from_str(number)
        .or_else(|_| Decimal::from_scientific(number))
        .map_err(|_| AmountError::Unparsable(raw.to_string()))
}

/// Longest prefix of `text` that reads as a number: optional sign, digits,
/// optional fraction and optional exponent. Trailing text such as `元整` or
/// `(含税)` is ignored.
fn leading_number(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let digits_from = |start: usize| {
        bytes[start..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let integer_digits = digits_from(end);
    end += integer_digits;
    let mut fraction_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        fraction_digits = digits_from(end + 1);
        if fraction_digits > 0 {
            end += 1 + fraction_digits;
        }
    }
    if integer_digits == 0 && fraction_digits == 0 {
        return None;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent_end = end + 1;
        if matches!(bytes.get(exponent_end), Some(b'+' | b'-')) {
            exponent_end += 1;
        }
        let exponent_digits = digits_from(exponent_end);
        if exponent_digits > 0 {
            end = exponent_end + exponent_digits;
        }
    }
    Some(&text[..end])
}

/// Lenient form that maps every failure to zero. Callers that need to tell a
/// real zero from a failure use [parse_amount].
pub fn parse_amount_or_zero(raw: Option<&CellValue>) -> Decimal {
    parse_amount(raw).unwrap_or(Decimal::ZERO)
}
