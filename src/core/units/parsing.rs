//! Quantity parsing from free text
//!
//! Accepts what users type or paste into quantity inputs: "2.5 ha", "50 kg/ha",
//! "3 acres", "100lbs", "12,5 l". The first number/unit pair found wins.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::convert::Quantity;
use super::registry::lookup;
use crate::shared::errors::{ConversionError, ConversionResult};

// Compile regex patterns once at module level
// Using expect is safe here since these are compile-time constant patterns

/// Whole input is a number followed by a (possibly multi-word) unit
static RE_NUMBER_THEN_REST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?\d+(?:\.\d+)?)\s*(.+?)\s*$").expect("Failed to compile number/rest pattern")
});

/// Number followed by a unit token anywhere in the text
static RE_NUMBER_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([+-]?\d+(?:\.\d+)?)\s*([a-zA-Z²][a-zA-Z²\-]*(?:\s*/\s*[a-zA-Z²][a-zA-Z²]*)?)")
        .expect("Failed to compile number/unit pattern")
});

/// Unit token followed by a number (e.g. "ha 12")
static RE_UNIT_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([a-zA-Z²][a-zA-Z²\-]*(?:\s*/\s*[a-zA-Z²][a-zA-Z²]*)?)\s*([+-]?\d+(?:\.\d+)?)")
        .expect("Failed to compile unit/number pattern")
});

fn normalize_simple_unit(unit: &str) -> Option<&'static str> {
    let unit = unit.trim().to_lowercase().replace('²', "2");
    let unit = unit.split_whitespace().collect::<Vec<_>>().join(" ");
    match unit.as_str() {
        // Area
        "m2" | "sq m" | "sqm" | "square meter" | "square meters" | "square metre" | "square metres" => Some("m2"),
        "ha" | "hectare" | "hectares" => Some("ha"),
        "ft2" | "sq ft" | "sqft" | "square foot" | "square feet" => Some("ft2"),
        "ac" | "acre" | "acres" => Some("ac"),
        // Weight
        "g" | "gram" | "grams" => Some("g"),
        "kg" | "kgs" | "kilo" | "kilos" | "kilogram" | "kilograms" => Some("kg"),
        "mt" | "tonne" | "tonnes" | "metric ton" | "metric tons" => Some("mt"),
        "oz" | "ounce" | "ounces" => Some("oz"),
        "lb" | "lbs" | "pound" | "pounds" => Some("lb"),
        "t" | "ton" | "tons" | "short ton" | "short tons" => Some("t"),
        // Volume
        "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" => Some("ml"),
        "l" | "liter" | "liters" | "litre" | "litres" => Some("l"),
        "fl-oz" | "floz" | "fl oz" | "fluid ounce" | "fluid ounces" => Some("fl-oz"),
        "gal" | "gallon" | "gallons" => Some("gal"),
        _ => None,
    }
}

/// Map a unit alias to its registry symbol, including rate forms like "lb per acre"
pub fn normalize_unit(unit: &str) -> Option<&'static str> {
    let lowered = unit.trim().to_lowercase();
    let per = lowered
        .split_once('/')
        .or_else(|| lowered.split_once(" per "));

    match per {
        Some((numerator, denominator)) => {
            let numerator = normalize_simple_unit(numerator)?;
            let denominator = normalize_simple_unit(denominator)?;
            lookup(&format!("{}/{}", numerator, denominator))
                .ok()
                .map(|def| def.symbol)
        }
        None => normalize_simple_unit(&lowered),
    }
}

/// Drop thousands separators ("1,000") and turn decimal commas ("12,5") into dots
fn normalize_separators(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len());

    for (i, ch) in chars.iter().enumerate() {
        if *ch != ',' || i == 0 || !chars[i - 1].is_ascii_digit() {
            result.push(*ch);
            continue;
        }
        let digits = chars[i + 1..].iter().take_while(|c| c.is_ascii_digit()).count();
        match digits {
            0 => result.push(*ch),
            3 => {}
            _ => result.push('.'),
        }
    }
    result
}

/// Extract the first amount and unit from text
pub fn parse_quantity(text: &str) -> ConversionResult<Quantity> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ConversionError::UnparseableQuantity(String::new()));
    }

    let normalized = normalize_separators(text);

    if let Some(caps) = RE_NUMBER_THEN_REST.captures(&normalized) {
        if let (Ok(amount), Some(unit)) = (caps[1].parse::<f64>(), normalize_unit(&caps[2])) {
            debug!(amount, unit, "parsed quantity from '{}'", text);
            return Quantity::new(amount, unit);
        }
    }

    for caps in RE_NUMBER_UNIT.captures_iter(&normalized) {
        if let (Ok(amount), Some(unit)) = (caps[1].parse::<f64>(), normalize_unit(&caps[2])) {
            debug!(amount, unit, "parsed quantity from '{}'", text);
            return Quantity::new(amount, unit);
        }
    }

    for caps in RE_UNIT_NUMBER.captures_iter(&normalized) {
        if let (Some(unit), Ok(amount)) = (normalize_unit(&caps[1]), caps[2].parse::<f64>()) {
            debug!(amount, unit, "parsed quantity from '{}'", text);
            return Quantity::new(amount, unit);
        }
    }

    debug!("failed to parse quantity from '{}'", text);
    Err(ConversionError::UnparseableQuantity(text.to_string()))
}
