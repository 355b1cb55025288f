//! Location-area preview shown next to the percentage input

use serde::{Deserialize, Serialize};
use tracing::debug;
use ts_rs::TS;

use super::context::TaskContext;
use super::fields::{Field, FormStore};
use crate::core::units::convert::from_canonical;
use crate::core::units::format::{format_number, format_number_with, round_to_two_decimal};
use crate::core::units::registry::{preferred_unit, system_units, unit_option, Dimension};
use crate::shared::errors::ConversionResult;

/// Total location area in a display unit, `unit` holds the unit label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings.ts")]
pub struct PreviewString {
    #[serde(rename = "previewStringValue")]
    pub value: Option<f64>,
    #[serde(rename = "previewStringUnit")]
    pub unit: Option<String>,
}

impl PreviewString {
    /// e.g. "12,500 m²", empty parts are left out
    pub fn label(&self) -> String {
        self.label_parts(self.value.map(format_number))
    }

    pub fn label_with(&self, decimals: u32) -> String {
        self.label_parts(self.value.map(|value| format_number_with(value, decimals)))
    }

    fn label_parts(&self, value: Option<String>) -> String {
        match (value, self.unit.as_deref()) {
            (Some(value), Some(unit)) => format!("{} {}", value, unit),
            (Some(value), None) => value,
            (None, Some(unit)) => unit.to_string(),
            (None, None) => String::new(),
        }
    }
}

/// Holds the preview once computed; never recomputed afterwards
#[derive(Debug, Clone, Default)]
pub struct PreviewMemo {
    computed: Option<PreviewString>,
}

impl PreviewMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&PreviewString> {
        self.computed.as_ref()
    }

    /// Compute the preview the first time `application_area_unit` is present
    ///
    /// Returns true when this call computed it.
    pub fn observe(&mut self, ctx: &TaskContext, store: &dyn FormStore) -> ConversionResult<bool> {
        if self.computed.is_some() {
            return Ok(false);
        }
        let Some(area_unit) = store.unit(Field::ApplicationAreaUnit) else {
            return Ok(false);
        };

        // A stored unit from the other measurement system is stale
        let symbol = if system_units(Dimension::Area, ctx.system()).contains(&ctx.total_area_unit()) {
            ctx.total_area_unit()
        } else {
            preferred_unit(
                Dimension::Area,
                ctx.total_area().unwrap_or(0.0),
                ctx.system(),
                Some(&area_unit.value),
            )?
        };
        let unit = unit_option(symbol)?;

        let value = match ctx.total_area() {
            Some(total) => Some(round_to_two_decimal(from_canonical(total, Dimension::Area, symbol)?)),
            None => None,
        };

        debug!(?value, unit = %unit.label, "location area preview computed");
        self.computed = Some(PreviewString {
            value,
            unit: Some(unit.label),
        });
        Ok(true)
    }
}
