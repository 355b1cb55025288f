//! Form fields watched by the reconciler and the store seam they live in

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use ts_rs::TS;

use crate::core::units::registry::{Dimension, UnitOption};
use crate::shared::errors::{ConversionError, ConversionResult};

/// Task-product form fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings.ts")]
pub enum Field {
    PercentOfLocation,
    ApplicationArea,
    ApplicationAreaUnit,
    Weight,
    WeightUnit,
    Volume,
    VolumeUnit,
    ApplicationRateWeight,
    ApplicationRateWeightUnit,
    ApplicationRateVolume,
    ApplicationRateVolumeUnit,
}

impl Field {
    pub const ALL: [Field; 11] = [
        Field::PercentOfLocation,
        Field::ApplicationArea,
        Field::ApplicationAreaUnit,
        Field::Weight,
        Field::WeightUnit,
        Field::Volume,
        Field::VolumeUnit,
        Field::ApplicationRateWeight,
        Field::ApplicationRateWeightUnit,
        Field::ApplicationRateVolume,
        Field::ApplicationRateVolumeUnit,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Field::PercentOfLocation => "percent_of_location",
            Field::ApplicationArea => "application_area",
            Field::ApplicationAreaUnit => "application_area_unit",
            Field::Weight => "weight",
            Field::WeightUnit => "weight_unit",
            Field::Volume => "volume",
            Field::VolumeUnit => "volume_unit",
            Field::ApplicationRateWeight => "application_rate_weight",
            Field::ApplicationRateWeightUnit => "application_rate_weight_unit",
            Field::ApplicationRateVolume => "application_rate_volume",
            Field::ApplicationRateVolumeUnit => "application_rate_volume_unit",
        }
    }

    /// Dimension of the amount held (or unit selected) by this field
    ///
    /// `percent_of_location` is a plain ratio and has none.
    pub fn dimension(&self) -> Option<Dimension> {
        match self {
            Field::PercentOfLocation => None,
            Field::ApplicationArea | Field::ApplicationAreaUnit => Some(Dimension::Area),
            Field::Weight | Field::WeightUnit => Some(Dimension::Weight),
            Field::Volume | Field::VolumeUnit => Some(Dimension::Volume),
            Field::ApplicationRateWeight | Field::ApplicationRateWeightUnit => Some(Dimension::WeightRate),
            Field::ApplicationRateVolume | Field::ApplicationRateVolumeUnit => Some(Dimension::VolumeRate),
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(
            self,
            Field::ApplicationAreaUnit
                | Field::WeightUnit
                | Field::VolumeUnit
                | Field::ApplicationRateWeightUnit
                | Field::ApplicationRateVolumeUnit
        )
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value of a form field
///
/// Amounts are held in the canonical (database) unit of their dimension;
/// unit fields only carry the display choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(untagged)]
#[ts(export, export_to = "bindings.ts")]
pub enum FieldValue {
    Number(f64),
    Unit(UnitOption),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) => Some(*value),
            FieldValue::Unit(_) => None,
        }
    }

    pub fn as_unit(&self) -> Option<&UnitOption> {
        match self {
            FieldValue::Unit(option) => Some(option),
            FieldValue::Number(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Ask the store to re-run validation on the written field
    pub should_validate: bool,
}

/// A full-replace write produced by a derived rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings.ts")]
pub struct FieldWrite {
    pub field: Field,
    pub value: FieldValue,
    pub should_validate: bool,
}

impl FieldWrite {
    /// Numeric write; refuses to produce NaN or infinite values
    pub fn number(field: Field, value: f64) -> ConversionResult<Self> {
        if !value.is_finite() {
            return Err(ConversionError::DegenerateDivision(format!(
                "{} would be {}",
                field, value
            )));
        }
        Ok(Self {
            field,
            value: FieldValue::Number(value),
            should_validate: false,
        })
    }

    pub fn unit(field: Field, option: UnitOption) -> Self {
        Self {
            field,
            value: FieldValue::Unit(option),
            should_validate: false,
        }
    }

    pub fn validated(mut self) -> Self {
        self.should_validate = true;
        self
    }

    pub fn options(&self) -> SetOptions {
        SetOptions {
            should_validate: self.should_validate,
        }
    }
}

/// External form-state store the reconciler reads from and writes to
pub trait FormStore {
    fn get(&self, field: Field) -> Option<&FieldValue>;

    fn set(&mut self, field: Field, value: FieldValue, options: SetOptions);

    fn clear(&mut self, field: Field);

    /// Finite numeric value of a field, `None` when empty
    fn number(&self, field: Field) -> Option<f64> {
        self.get(field)
            .and_then(FieldValue::as_number)
            .filter(|value| value.is_finite())
    }

    fn unit(&self, field: Field) -> Option<&UnitOption> {
        self.get(field).and_then(FieldValue::as_unit)
    }
}

/// In-memory form field set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSet {
    values: BTreeMap<Field, FieldValue>,
    #[serde(skip)]
    pending_validation: BTreeSet<Field>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder used to pre-populate a form (e.g. when editing a saved task)
    pub fn with(mut self, field: Field, value: FieldValue) -> Self {
        self.values.insert(field, value);
        self
    }

    pub fn values(&self) -> &BTreeMap<Field, FieldValue> {
        &self.values
    }

    pub fn needs_validation(&self, field: Field) -> bool {
        self.pending_validation.contains(&field)
    }

    /// Fields flagged for validation since the last call
    pub fn take_pending_validation(&mut self) -> Vec<Field> {
        std::mem::take(&mut self.pending_validation).into_iter().collect()
    }
}

impl FormStore for FieldSet {
    fn get(&self, field: Field) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    fn set(&mut self, field: Field, value: FieldValue, options: SetOptions) {
        if options.should_validate {
            self.pending_validation.insert(field);
        }
        self.values.insert(field, value);
    }

    fn clear(&mut self, field: Field) {
        self.values.remove(&field);
        self.pending_validation.remove(&field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kg() -> UnitOption {
        UnitOption {
            value: "kg".to_string(),
            label: "kg".to_string(),
        }
    }

    #[test]
    fn test_field_metadata() {
        assert_eq!(Field::ApplicationRateWeight.name(), "application_rate_weight");
        assert_eq!(Field::VolumeUnit.dimension(), Some(Dimension::Volume));
        assert_eq!(Field::PercentOfLocation.dimension(), None);
        assert!(Field::ApplicationAreaUnit.is_unit());
        assert!(!Field::ApplicationArea.is_unit());
    }

    #[test]
    fn test_store_readers() {
        let mut store = FieldSet::new()
            .with(Field::Weight, FieldValue::Number(100.0))
            .with(Field::WeightUnit, FieldValue::Unit(kg()))
            .with(Field::Volume, FieldValue::Number(f64::NAN));

        assert_eq!(store.number(Field::Weight), Some(100.0));
        assert_eq!(store.number(Field::WeightUnit), None);
        assert_eq!(store.unit(Field::WeightUnit), Some(&kg()));
        // non-finite values read as empty
        assert_eq!(store.number(Field::Volume), None);

        store.clear(Field::Weight);
        assert_eq!(store.get(Field::Weight), None);
    }

    #[test]
    fn test_validation_flags() {
        let mut store = FieldSet::new();
        store.set(
            Field::ApplicationArea,
            FieldValue::Number(5.0),
            SetOptions { should_validate: true },
        );
        store.set(Field::Weight, FieldValue::Number(1.0), SetOptions::default());

        assert!(store.needs_validation(Field::ApplicationArea));
        assert!(!store.needs_validation(Field::Weight));
        assert_eq!(store.take_pending_validation(), vec![Field::ApplicationArea]);
        assert!(!store.needs_validation(Field::ApplicationArea));
    }

    #[test]
    fn test_write_refuses_non_finite() {
        assert!(FieldWrite::number(Field::ApplicationArea, f64::INFINITY).is_err());
        assert!(FieldWrite::number(Field::ApplicationArea, f64::NAN).is_err());
        let write = FieldWrite::unit(Field::WeightUnit, kg()).validated();
        assert!(write.options().should_validate);
    }

    #[test]
    fn test_field_value_json_shape() {
        let json = serde_json::to_string(&FieldValue::Number(2.5)).unwrap();
        assert_eq!(json, "2.5");
        let json = serde_json::to_value(FieldValue::Unit(kg())).unwrap();
        assert_eq!(json["value"], "kg");
        let parsed: FieldValue = serde_json::from_str(r#"{"value":"ha","label":"ha"}"#).unwrap();
        assert!(parsed.as_unit().is_some());
    }
}
