//! Typed failures of the unit registry, conversions and reconciler
//!
//! Registry and conversion errors are programming errors for validated input;
//! they are surfaced as typed values rather than coerced to zero.
//! `DegenerateDivision` is an expected runtime condition that the reconciler
//! handles by skipping a recompute.
//! All variants are serializable for IPC communication.

use serde::Serialize;
use thiserror::Error;

use crate::core::units::registry::Dimension;

/// Unit and reconciliation errors
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum ConversionError {
    /// Dimension name not present in the registry
    #[error("Unknown dimension: {0}")]
    UnknownDimension(String),

    /// Unit symbol not present in the registry
    #[error("Unknown unit: {0}")]
    UnknownUnit(String),

    /// Units do not both belong to the requested dimension
    #[error("Cannot convert from {from} to {to} as {dimension}")]
    IncompatibleUnits {
        from: String,
        to: String,
        dimension: Dimension,
    },

    /// Non-finite or negative physical quantity
    #[error("Invalid value: {0} (quantities must be finite and non-negative)")]
    InvalidValue(f64),

    /// Division by a zero or undefined area/percentage
    #[error("Degenerate division: {0}")]
    DegenerateDivision(String),

    /// Text did not contain a recognizable number/unit pair
    #[error("Could not parse quantity from text: {0}")]
    UnparseableQuantity(String),

    /// Form field received a value of the wrong kind (number vs unit)
    #[error("Invalid value for field {0}")]
    InvalidFieldValue(String),
}

impl ConversionError {
    /// Whether the failure is the expected "area not known yet" condition
    pub fn is_degenerate(&self) -> bool {
        matches!(self, ConversionError::DegenerateDivision(_))
    }
}

pub type ConversionResult<T> = Result<T, ConversionError>;

/// Reject non-finite and negative values for physical quantities
pub fn ensure_physical(value: f64) -> ConversionResult<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConversionError::InvalidValue(value))
    }
}
