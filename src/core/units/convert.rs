//! Conversions between units of a single dimension
//!
//! Every conversion goes through the canonical unit of the dimension, so a new
//! unit only needs its factor relative to canonical.

use serde::Serialize;
use std::fmt;
use tracing::trace;

use super::registry::{canonical_factor, canonical_unit, lookup, Dimension, UnitDefinition};
use crate::shared::errors::{ensure_physical, ConversionError, ConversionResult};

/// Resolve a unit and check it belongs to `dimension`
fn member_of(
    dimension: Dimension,
    symbol: &str,
    from_unit: &str,
    to_unit: &str,
) -> ConversionResult<&'static UnitDefinition> {
    let def = lookup(symbol)?;
    if def.dimension != dimension {
        return Err(ConversionError::IncompatibleUnits {
            from: from_unit.to_string(),
            to: to_unit.to_string(),
            dimension,
        });
    }
    Ok(def)
}

/// Convert `value` from one unit to another within `dimension`
pub fn convert(value: f64, dimension: Dimension, from_unit: &str, to_unit: &str) -> ConversionResult<f64> {
    let value = ensure_physical(value)?;
    let from_def = member_of(dimension, from_unit, from_unit, to_unit)?;
    let to_def = member_of(dimension, to_unit, from_unit, to_unit)?;

    if from_def.symbol == to_def.symbol {
        return Ok(value);
    }

    // Step 1: source unit -> canonical unit
    let canonical = value * canonical_factor(from_def)?;
    // Step 2: canonical unit -> target unit
    let result = canonical / canonical_factor(to_def)?;

    trace!(
        value,
        from = from_unit,
        to = to_unit,
        canonical,
        result,
        "converted {}",
        dimension
    );

    Ok(result)
}

pub fn to_canonical(value: f64, dimension: Dimension, unit: &str) -> ConversionResult<f64> {
    convert(value, dimension, unit, canonical_unit(dimension))
}

pub fn from_canonical(value: f64, dimension: Dimension, unit: &str) -> ConversionResult<f64> {
    convert(value, dimension, canonical_unit(dimension), unit)
}

/// A finite, non-negative amount in a registered unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quantity {
    value: f64,
    unit: &'static str,
    dimension: Dimension,
}

impl Quantity {
    pub fn new(value: f64, unit: &str) -> ConversionResult<Self> {
        let value = ensure_physical(value)?;
        let def = lookup(unit)?;
        Ok(Self {
            value,
            unit: def.symbol,
            dimension: def.dimension,
        })
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> &'static str {
        self.unit
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    /// Same amount expressed in another unit of the dimension
    pub fn to(&self, unit: &str) -> ConversionResult<Quantity> {
        let value = convert(self.value, self.dimension, self.unit, unit)?;
        Quantity::new(value, unit)
    }

    /// Value in the dimension's canonical (database) unit
    pub fn canonical_value(&self) -> ConversionResult<f64> {
        to_canonical(self.value, self.dimension, self.unit)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}
