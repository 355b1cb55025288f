//! Number rounding and display formatting for converted values

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

/// Round half away from zero to `decimals` places
///
/// Goes through `Decimal` so that values like 2.675 round on their decimal
/// digits rather than on their binary approximation.
pub fn round_to_decimals(value: f64, decimals: u32) -> f64 {
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

pub fn round_to_two_decimal(value: f64) -> f64 {
    round_to_decimals(value, 2)
}

// Helper to add thousands separators to a string of digits
fn add_thousands_separators(s: &str) -> String {
    let mut result = String::new();
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, ch) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*ch);
    }
    result.chars().rev().collect()
}

/// Format with thousands separators, at most `decimals` decimals, trailing zeros stripped
/// Examples: 130000.000 -> "130,000", 12.500 -> "12.5", 12.567 -> "12.57"
pub fn format_number_with(value: f64, decimals: u32) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value.is_sign_positive() { "∞".to_string() } else { "-∞".to_string() };
    }

    let text = match Decimal::from_f64(value) {
        Some(d) => d
            .round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero)
            .normalize()
            .to_string(),
        // Outside the Decimal range
        None => format!("{:.0}", value),
    };

    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };

    match digits.split_once('.') {
        Some((integer, fraction)) => {
            format!("{}{}.{}", sign, add_thousands_separators(integer), fraction)
        }
        None => format!("{}{}", sign, add_thousands_separators(digits)),
    }
}

pub fn format_number(value: f64) -> String {
    format_number_with(value, 2)
}
