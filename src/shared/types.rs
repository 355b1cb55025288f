use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;
use uuid::Uuid;

use crate::core::reconciler::fields::{Field, FieldValue};
use crate::core::reconciler::preview::PreviewString;
use crate::core::units::registry::{Dimension, MeasurementSystem};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings.ts")]
pub struct ConvertUnitsRequest {
    pub amount: f64,
    pub dimension: Dimension,
    pub from_unit: String,
    pub to_unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings.ts")]
pub struct ConvertUnitsResponse {
    pub result: f64,
    pub formatted_result: String,
    pub from_unit: String,
    pub to_unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings.ts")]
pub struct GetUnitsResponse {
    pub units: Vec<UnitDTO>,
}

// Unit Data Transfer Object for unit selectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings.ts")]
pub struct UnitDTO {
    pub id: String,        // Unit symbol (e.g., "ha", "kg/ha")
    pub label: String,     // Display label (e.g., "m²", "fl oz")
    pub name: String,      // Full name (e.g., "Hectares")
    pub dimension: Dimension,
    pub system: MeasurementSystem,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings.ts")]
pub struct DefaultUnitRequest {
    pub dimension: Dimension,
    /// Amount in the canonical unit of the dimension
    pub value: f64,
    pub system: MeasurementSystem,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings.ts")]
pub struct ParseQuantityResponse {
    pub amount: f64,
    pub unit: String,
    pub dimension: Dimension,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings.ts")]
pub struct OpenFormRequest {
    /// Location area in m2, absent when the location has no area
    pub total_area: Option<f64>,
    pub total_area_unit: String,
    /// Falls back to the saved farm setting
    pub system: Option<MeasurementSystem>,
    pub is_weight: bool,
    /// Saved values when editing an existing task
    #[serde(default)]
    pub values: BTreeMap<Field, FieldValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings.ts")]
pub struct UpdateFieldRequest {
    pub session_id: Uuid,
    pub field: Field,
    pub value: FieldValue,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings.ts")]
pub struct SetDiscriminantRequest {
    pub session_id: Uuid,
    pub is_weight: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings.ts")]
pub struct FormSnapshot {
    pub id: Uuid,
    pub is_weight: bool,
    pub system: MeasurementSystem,
    pub values: BTreeMap<Field, FieldValue>,
    pub preview: Option<PreviewString>,
}

/// Values persisted for a task product when the form is submitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings.ts")]
pub struct TaskProductValues {
    pub percent_of_location: f64,
    pub application_area: Option<f64>,
    pub application_area_unit: Option<String>,
    pub is_weight: bool,
    /// Weight (kg) or volume (l), following `is_weight`
    pub quantity: Option<f64>,
    pub quantity_unit: Option<String>,
    /// Rate (kg/ha or l/ha), following `is_weight`
    pub rate: Option<f64>,
    pub rate_unit: Option<String>,
}
