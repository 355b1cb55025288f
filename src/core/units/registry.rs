//! Unit registry for farm task quantities
//!
//! Maps each [`Dimension`] to its allowed units, the canonical (database)
//! unit values are stored in, and the per-system display scale used to pick
//! a default unit from a value's magnitude.
//!
//! Every unit only carries its factor relative to the canonical unit of its
//! dimension. Compound rate units (`kg/ha`, `gal/ac`, ...) carry their
//! numerator and denominator symbols instead and derive the factor from them.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use super::convert::convert;
use crate::shared::errors::{ensure_physical, ConversionError, ConversionResult};

// ============================================================================
// Dimensions & systems
// ============================================================================

/// Category of physical quantity handled by task-product forms
///
/// The rate dimension is split by numerator so that weight-per-area and
/// volume-per-area rates each have a single canonical unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings.ts")]
pub enum Dimension {
    Area,
    Weight,
    Volume,
    WeightRate,
    VolumeRate,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Area,
        Dimension::Weight,
        Dimension::Volume,
        Dimension::WeightRate,
        Dimension::VolumeRate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Area => "area",
            Dimension::Weight => "weight",
            Dimension::Volume => "volume",
            Dimension::WeightRate => "weight_rate",
            Dimension::VolumeRate => "volume_rate",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "area" => Ok(Dimension::Area),
            "weight" | "mass" => Ok(Dimension::Weight),
            "volume" => Ok(Dimension::Volume),
            "weight_rate" | "application_rate_weight" => Ok(Dimension::WeightRate),
            "volume_rate" | "application_rate_volume" => Ok(Dimension::VolumeRate),
            _ => Err(ConversionError::UnknownDimension(s.to_string())),
        }
    }
}

/// Measurement system configured for the farm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings.ts")]
pub enum MeasurementSystem {
    #[default]
    Metric,
    Imperial,
}

impl fmt::Display for MeasurementSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasurementSystem::Metric => f.write_str("metric"),
            MeasurementSystem::Imperial => f.write_str("imperial"),
        }
    }
}

// ============================================================================
// Unit definitions
// ============================================================================

/// How a unit relates to the canonical unit of its dimension
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnitScale {
    /// Multiplier converting a value in this unit to the canonical unit
    Linear(f64),
    /// Compound unit converted numerator and denominator independently
    Per {
        numerator: &'static str,
        denominator: &'static str,
    },
}

#[derive(Debug, Clone)]
pub struct UnitDefinition {
    pub symbol: &'static str,
    pub label: &'static str,
    pub name: &'static str,
    pub dimension: Dimension,
    pub scale: UnitScale,
}

const fn linear(
    symbol: &'static str,
    label: &'static str,
    name: &'static str,
    dimension: Dimension,
    factor: f64,
) -> UnitDefinition {
    UnitDefinition { symbol, label, name, dimension, scale: UnitScale::Linear(factor) }
}

const fn per(
    symbol: &'static str,
    label: &'static str,
    name: &'static str,
    dimension: Dimension,
    numerator: &'static str,
    denominator: &'static str,
) -> UnitDefinition {
    UnitDefinition {
        symbol,
        label,
        name,
        dimension,
        scale: UnitScale::Per { numerator, denominator },
    }
}

static UNITS: &[UnitDefinition] = &[
    // Area (canonical: m2)
    linear("m2", "m²", "Square meters", Dimension::Area, 1.0),
    linear("ha", "ha", "Hectares", Dimension::Area, 10_000.0),
    linear("ft2", "ft²", "Square feet", Dimension::Area, 0.09290304),
    linear("ac", "ac", "Acres", Dimension::Area, 4_046.8564224),
    // Weight (canonical: kg)
    linear("g", "g", "Grams", Dimension::Weight, 0.001),
    linear("kg", "kg", "Kilograms", Dimension::Weight, 1.0),
    linear("mt", "mt", "Metric tonnes", Dimension::Weight, 1_000.0),
    linear("oz", "oz", "Ounces", Dimension::Weight, 0.028349523125),
    linear("lb", "lb", "Pounds", Dimension::Weight, 0.45359237),
    linear("t", "t", "Short tons", Dimension::Weight, 907.18474),
    // Volume (canonical: l)
    linear("ml", "ml", "Milliliters", Dimension::Volume, 0.001),
    linear("l", "l", "Liters", Dimension::Volume, 1.0),
    linear("fl-oz", "fl oz", "Fluid ounces", Dimension::Volume, 0.0295735295625),
    linear("gal", "gal", "Gallons", Dimension::Volume, 3.785411784),
    // Weight per area (canonical: kg/ha)
    per("g/m2", "g/m²", "Grams per square meter", Dimension::WeightRate, "g", "m2"),
    per("kg/m2", "kg/m²", "Kilograms per square meter", Dimension::WeightRate, "kg", "m2"),
    per("kg/ha", "kg/ha", "Kilograms per hectare", Dimension::WeightRate, "kg", "ha"),
    per("mt/ha", "mt/ha", "Metric tonnes per hectare", Dimension::WeightRate, "mt", "ha"),
    per("oz/ft2", "oz/ft²", "Ounces per square foot", Dimension::WeightRate, "oz", "ft2"),
    per("lb/ac", "lb/ac", "Pounds per acre", Dimension::WeightRate, "lb", "ac"),
    per("t/ac", "t/ac", "Short tons per acre", Dimension::WeightRate, "t", "ac"),
    // Volume per area (canonical: l/ha)
    per("ml/m2", "ml/m²", "Milliliters per square meter", Dimension::VolumeRate, "ml", "m2"),
    per("l/m2", "l/m²", "Liters per square meter", Dimension::VolumeRate, "l", "m2"),
    per("l/ha", "l/ha", "Liters per hectare", Dimension::VolumeRate, "l", "ha"),
    per("fl-oz/ft2", "fl oz/ft²", "Fluid ounces per square foot", Dimension::VolumeRate, "fl-oz", "ft2"),
    per("gal/ac", "gal/ac", "Gallons per acre", Dimension::VolumeRate, "gal", "ac"),
];

/// Symbol index over [`UNITS`], built once
static UNIT_REGISTRY: Lazy<HashMap<&'static str, &'static UnitDefinition>> =
    Lazy::new(|| UNITS.iter().map(|def| (def.symbol, def)).collect());

// ============================================================================
// Display scales
// ============================================================================

/// Units offered by one measurement system for one dimension
#[derive(Debug, Clone, Copy)]
pub struct SystemScale {
    /// Units selectable in this system
    pub units: &'static [&'static str],
    /// Unit used when no breakpoint applies; breakpoints are expressed in it
    pub default_unit: &'static str,
    /// `ladder[i]` is chosen below `breakpoints[i]`, the last entry above all
    pub ladder: &'static [&'static str],
    pub breakpoints: &'static [f64],
}

#[derive(Debug)]
struct DimensionScales {
    canonical: &'static str,
    metric: SystemScale,
    imperial: SystemScale,
}

static AREA: DimensionScales = DimensionScales {
    canonical: "m2",
    metric: SystemScale {
        units: &["m2", "ha"],
        default_unit: "m2",
        ladder: &["m2", "ha"],
        breakpoints: &[1_000.0],
    },
    imperial: SystemScale {
        units: &["ft2", "ac"],
        default_unit: "ft2",
        ladder: &["ft2", "ac"],
        breakpoints: &[10_890.0],
    },
};

static WEIGHT: DimensionScales = DimensionScales {
    canonical: "kg",
    metric: SystemScale {
        units: &["g", "kg", "mt"],
        default_unit: "kg",
        ladder: &["kg", "mt"],
        breakpoints: &[1_000.0],
    },
    imperial: SystemScale {
        units: &["oz", "lb", "t"],
        default_unit: "lb",
        ladder: &["lb", "t"],
        breakpoints: &[2_000.0],
    },
};

static VOLUME: DimensionScales = DimensionScales {
    canonical: "l",
    metric: SystemScale {
        units: &["ml", "l"],
        default_unit: "l",
        ladder: &["l"],
        breakpoints: &[],
    },
    imperial: SystemScale {
        units: &["fl-oz", "gal"],
        default_unit: "gal",
        ladder: &["gal"],
        breakpoints: &[],
    },
};

static WEIGHT_RATE: DimensionScales = DimensionScales {
    canonical: "kg/ha",
    metric: SystemScale {
        units: &["g/m2", "kg/m2", "kg/ha", "mt/ha"],
        default_unit: "kg/ha",
        ladder: &["kg/ha", "mt/ha"],
        breakpoints: &[1_000.0],
    },
    imperial: SystemScale {
        units: &["oz/ft2", "lb/ac", "t/ac"],
        default_unit: "lb/ac",
        ladder: &["lb/ac", "t/ac"],
        breakpoints: &[2_000.0],
    },
};

static VOLUME_RATE: DimensionScales = DimensionScales {
    canonical: "l/ha",
    metric: SystemScale {
        units: &["ml/m2", "l/m2", "l/ha"],
        default_unit: "l/ha",
        ladder: &["l/ha"],
        breakpoints: &[],
    },
    imperial: SystemScale {
        units: &["fl-oz/ft2", "gal/ac"],
        default_unit: "gal/ac",
        ladder: &["gal/ac"],
        breakpoints: &[],
    },
};

fn scales(dimension: Dimension) -> &'static DimensionScales {
    match dimension {
        Dimension::Area => &AREA,
        Dimension::Weight => &WEIGHT,
        Dimension::Volume => &VOLUME,
        Dimension::WeightRate => &WEIGHT_RATE,
        Dimension::VolumeRate => &VOLUME_RATE,
    }
}

// ============================================================================
// Lookups
// ============================================================================

/// Display option for a unit, as rendered by unit selectors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings.ts")]
pub struct UnitOption {
    pub value: String,
    pub label: String,
}

pub fn lookup(symbol: &str) -> ConversionResult<&'static UnitDefinition> {
    UNIT_REGISTRY
        .get(symbol)
        .copied()
        .ok_or_else(|| ConversionError::UnknownUnit(symbol.to_string()))
}

/// All unit symbols of a dimension, in registry order
pub fn units_for(dimension: Dimension) -> Vec<&'static str> {
    UNITS
        .iter()
        .filter(|def| def.dimension == dimension)
        .map(|def| def.symbol)
        .collect()
}

pub fn units_for_name(dimension: &str) -> ConversionResult<Vec<&'static str>> {
    Ok(units_for(dimension.parse()?))
}

pub fn canonical_unit(dimension: Dimension) -> &'static str {
    scales(dimension).canonical
}

pub fn system_scale(dimension: Dimension, system: MeasurementSystem) -> &'static SystemScale {
    let scales = scales(dimension);
    match system {
        MeasurementSystem::Metric => &scales.metric,
        MeasurementSystem::Imperial => &scales.imperial,
    }
}

pub fn system_units(dimension: Dimension, system: MeasurementSystem) -> &'static [&'static str] {
    system_scale(dimension, system).units
}

/// Measurement system a unit is offered in
pub fn system_of(symbol: &str) -> ConversionResult<MeasurementSystem> {
    let def = lookup(symbol)?;
    if system_units(def.dimension, MeasurementSystem::Metric).contains(&def.symbol) {
        Ok(MeasurementSystem::Metric)
    } else {
        Ok(MeasurementSystem::Imperial)
    }
}

pub fn unit_option(symbol: &str) -> ConversionResult<UnitOption> {
    let def = lookup(symbol)?;
    Ok(UnitOption {
        value: def.symbol.to_string(),
        label: def.label.to_string(),
    })
}

/// Canonical quantity per canonical area (`kg/m2`, `l/m2`) for a rate dimension
pub fn per_area_unit(rate: Dimension) -> ConversionResult<&'static str> {
    match rate {
        Dimension::WeightRate => Ok("kg/m2"),
        Dimension::VolumeRate => Ok("l/m2"),
        other => Err(ConversionError::UnknownDimension(format!("{} per area", other))),
    }
}

fn raw_factor(def: &UnitDefinition) -> ConversionResult<f64> {
    match def.scale {
        UnitScale::Linear(factor) => Ok(factor),
        UnitScale::Per { numerator, denominator } => {
            let numerator = raw_factor(lookup(numerator)?)?;
            let denominator = raw_factor(lookup(denominator)?)?;
            Ok(numerator / denominator)
        }
    }
}

/// Multiplier converting a value in `def` to the canonical unit of its dimension
pub fn canonical_factor(def: &UnitDefinition) -> ConversionResult<f64> {
    let canonical = lookup(canonical_unit(def.dimension))?;
    Ok(raw_factor(def)? / raw_factor(canonical)?)
}

// ============================================================================
// Default unit selection
// ============================================================================

/// Pick the display unit for a canonical value using the system breakpoints
pub fn default_unit(
    dimension: Dimension,
    value: f64,
    system: MeasurementSystem,
) -> ConversionResult<&'static str> {
    let value = ensure_physical(value)?;
    let scale = system_scale(dimension, system);

    if scale.breakpoints.is_empty() || value == 0.0 {
        return Ok(scale.default_unit);
    }

    let in_default = convert(value, dimension, canonical_unit(dimension), scale.default_unit)?;
    let step = scale
        .breakpoints
        .iter()
        .position(|breakpoint| in_default < *breakpoint)
        .unwrap_or(scale.breakpoints.len());

    Ok(scale.ladder.get(step).copied().unwrap_or(scale.default_unit))
}

/// Keep a stored unit when it belongs to the system, else pick the default
pub fn preferred_unit(
    dimension: Dimension,
    value: f64,
    system: MeasurementSystem,
    stored: Option<&str>,
) -> ConversionResult<&'static str> {
    let units = system_units(dimension, system);
    match stored.and_then(|unit| units.iter().find(|candidate| **candidate == unit)) {
        Some(unit) => Ok(*unit),
        None => default_unit(dimension, value, system),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_units_for_area() {
        assert_eq!(units_for(Dimension::Area), vec!["m2", "ha", "ft2", "ac"]);
    }

    #[test]
    fn test_units_for_unknown_dimension() {
        assert_eq!(
            units_for_name("temperature"),
            Err(ConversionError::UnknownDimension("temperature".to_string()))
        );
        assert_eq!(units_for_name("Volume").unwrap(), vec!["ml", "l", "fl-oz", "gal"]);
    }

    #[test]
    fn test_every_system_unit_is_registered_in_its_dimension() {
        for dimension in Dimension::ALL {
            for system in [MeasurementSystem::Metric, MeasurementSystem::Imperial] {
                let scale = system_scale(dimension, system);
                assert_eq!(scale.ladder.len(), scale.breakpoints.len() + 1);
                for unit in scale.units.iter().chain(scale.ladder) {
                    assert_eq!(lookup(unit).unwrap().dimension, dimension, "{unit}");
                }
            }
            assert_eq!(lookup(canonical_unit(dimension)).unwrap().dimension, dimension);
        }
    }

    #[test]
    fn test_canonical_factor_of_rates() {
        assert_relative_eq!(canonical_factor(lookup("kg/ha").unwrap()).unwrap(), 1.0);
        assert_relative_eq!(canonical_factor(lookup("kg/m2").unwrap()).unwrap(), 10_000.0, max_relative = 1e-12);
        assert_relative_eq!(canonical_factor(lookup("l/m2").unwrap()).unwrap(), 10_000.0, max_relative = 1e-12);
    }

    #[test]
    fn test_default_unit_area_metric() {
        assert_eq!(default_unit(Dimension::Area, 999.0, MeasurementSystem::Metric), Ok("m2"));
        assert_eq!(default_unit(Dimension::Area, 1_000.0, MeasurementSystem::Metric), Ok("ha"));
        assert_eq!(default_unit(Dimension::Area, 0.0, MeasurementSystem::Metric), Ok("m2"));
    }

    #[test]
    fn test_default_unit_area_imperial() {
        // 500 m2 is about 5382 ft2, 2000 m2 about 21528 ft2
        assert_eq!(default_unit(Dimension::Area, 500.0, MeasurementSystem::Imperial), Ok("ft2"));
        assert_eq!(default_unit(Dimension::Area, 2_000.0, MeasurementSystem::Imperial), Ok("ac"));
    }

    #[test]
    fn test_default_unit_without_breakpoints() {
        assert_eq!(default_unit(Dimension::Volume, 0.25, MeasurementSystem::Metric), Ok("l"));
        assert_eq!(default_unit(Dimension::Volume, 9_000.0, MeasurementSystem::Imperial), Ok("gal"));
        assert_eq!(default_unit(Dimension::Weight, 1_500.0, MeasurementSystem::Metric), Ok("mt"));
    }

    #[test]
    fn test_default_unit_rejects_negative() {
        assert_eq!(
            default_unit(Dimension::Area, -5.0, MeasurementSystem::Metric),
            Err(ConversionError::InvalidValue(-5.0))
        );
    }

    #[test]
    fn test_preferred_unit() {
        let metric = MeasurementSystem::Metric;
        assert_eq!(preferred_unit(Dimension::Area, 5.0, metric, Some("ha")), Ok("ha"));
        // stale imperial unit on a metric farm falls back to the breakpoint choice
        assert_eq!(preferred_unit(Dimension::Area, 5.0, metric, Some("ac")), Ok("m2"));
        assert_eq!(preferred_unit(Dimension::Area, 5_000.0, metric, None), Ok("ha"));
    }

    #[test]
    fn test_system_of_and_options() {
        assert_eq!(system_of("ac"), Ok(MeasurementSystem::Imperial));
        assert_eq!(system_of("kg/m2"), Ok(MeasurementSystem::Metric));
        assert!(system_of("acre").is_err());

        let option = unit_option("m2").unwrap();
        assert_eq!(option.value, "m2");
        assert_eq!(option.label, "m²");
    }

    #[test]
    fn test_per_area_unit() {
        assert_eq!(per_area_unit(Dimension::WeightRate), Ok("kg/m2"));
        assert_eq!(per_area_unit(Dimension::VolumeRate), Ok("l/m2"));
        assert!(per_area_unit(Dimension::Area).is_err());
    }

    #[test]
    fn test_dimension_parsing() {
        assert_eq!("application_rate_weight".parse::<Dimension>(), Ok(Dimension::WeightRate));
    }
}
