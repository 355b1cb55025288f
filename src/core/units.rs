//! Units of farm task quantities
//!
//! - `registry`: dimensions, unit table, canonical units, default-unit breakpoints
//! - `convert`: conversions through the canonical unit, `Quantity`
//! - `parsing`: quantities typed as free text
//! - `format`: rounding and display formatting

pub mod registry;
pub mod convert;
pub mod parsing;
pub mod format;

pub use convert::{convert, from_canonical, to_canonical, Quantity};
pub use registry::{
    canonical_unit, default_unit, units_for, Dimension, MeasurementSystem, UnitOption,
};
