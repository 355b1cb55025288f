use serde::Serialize;

use super::fields::{Field, FormStore};
use crate::core::units::registry::{canonical_unit, lookup, Dimension, MeasurementSystem};
use crate::shared::errors::{ensure_physical, ConversionError, ConversionResult};

/// Share of the location treated when the form has no percentage yet
pub const DEFAULT_PERCENT_OF_LOCATION: f64 = 100.0;

/// Read-only inputs supplied by the enclosing task, farm settings and product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskContext {
    /// Location area in the canonical area unit (m2)
    total_area: Option<f64>,
    /// Unit the user picked when the location area was entered
    total_area_unit: &'static str,
    system: MeasurementSystem,
    is_weight: bool,
}

impl TaskContext {
    pub fn new(
        total_area: Option<f64>,
        total_area_unit: &str,
        system: MeasurementSystem,
        is_weight: bool,
    ) -> ConversionResult<Self> {
        if let Some(area) = total_area {
            ensure_physical(area)?;
        }

        let def = lookup(total_area_unit)?;
        if def.dimension != Dimension::Area {
            return Err(ConversionError::IncompatibleUnits {
                from: total_area_unit.to_string(),
                to: canonical_unit(Dimension::Area).to_string(),
                dimension: Dimension::Area,
            });
        }

        Ok(Self {
            total_area,
            total_area_unit: def.symbol,
            system,
            is_weight,
        })
    }

    pub fn total_area(&self) -> Option<f64> {
        self.total_area
    }

    pub fn total_area_unit(&self) -> &'static str {
        self.total_area_unit
    }

    pub fn system(&self) -> MeasurementSystem {
        self.system
    }

    pub fn is_weight(&self) -> bool {
        self.is_weight
    }

    pub(crate) fn set_is_weight(&mut self, is_weight: bool) {
        self.is_weight = is_weight;
    }

    /// `percent_of_location`, defaulted when absent
    pub fn effective_percent(&self, store: &dyn FormStore) -> f64 {
        store
            .number(Field::PercentOfLocation)
            .unwrap_or(DEFAULT_PERCENT_OF_LOCATION)
    }

    pub fn quantity_dimension(&self) -> Dimension {
        if self.is_weight {
            Dimension::Weight
        } else {
            Dimension::Volume
        }
    }

    pub fn rate_dimension(&self) -> Dimension {
        if self.is_weight {
            Dimension::WeightRate
        } else {
            Dimension::VolumeRate
        }
    }

    pub fn quantity_field(&self) -> Field {
        if self.is_weight {
            Field::Weight
        } else {
            Field::Volume
        }
    }

    pub fn quantity_unit_field(&self) -> Field {
        if self.is_weight {
            Field::WeightUnit
        } else {
            Field::VolumeUnit
        }
    }

    pub fn rate_field(&self) -> Field {
        if self.is_weight {
            Field::ApplicationRateWeight
        } else {
            Field::ApplicationRateVolume
        }
    }

    pub fn rate_unit_field(&self) -> Field {
        if self.is_weight {
            Field::ApplicationRateWeightUnit
        } else {
            Field::ApplicationRateVolumeUnit
        }
    }
}
