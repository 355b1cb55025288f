//! Derived-field rules with enum dispatch
//!
//! Each rule declares the fields it depends on and the fields it writes. The
//! reconciler subscribes rules to their triggers; a rule's own writes never
//! appear in its trigger set.
//!
//! The quantity/rate pair is asymmetric: `RateFromQuantity` only writes the
//! rate and `QuantityFromRate` only writes the quantity, each outside its own
//! trigger set.

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::context::TaskContext;
use super::fields::{Field, FieldWrite, FormStore};
use crate::core::units::convert::convert;
use crate::core::units::registry::{
    canonical_unit, default_unit, per_area_unit, unit_option, Dimension,
};
use crate::shared::errors::{ConversionError, ConversionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings.ts")]
pub enum RuleId {
    AreaFromPercent,
    RateFromQuantity,
    QuantityFromRate,
}

/// Reciprocal rules; at most one rule of a group fires per update cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleGroup {
    QuantityRate,
}

#[enum_dispatch]
pub trait DerivedRule {
    fn id(&self) -> RuleId;

    /// Fields whose change re-runs this rule
    fn triggers(&self, ctx: &TaskContext) -> Vec<Field>;

    /// Fields this rule may write
    fn writes(&self, ctx: &TaskContext) -> Vec<Field>;

    fn group(&self) -> Option<RuleGroup> {
        None
    }

    /// Whether switching the weight/volume discriminant re-runs this rule
    fn reacts_to_discriminant(&self) -> bool {
        false
    }

    /// Derived writes, empty when there is nothing to derive yet
    ///
    /// `DegenerateDivision` means the inputs cannot produce a finite value;
    /// the reconciler skips the rule and keeps prior values.
    fn compute(&self, ctx: &TaskContext, store: &dyn FormStore) -> ConversionResult<Vec<FieldWrite>>;
}

#[enum_dispatch(DerivedRule)]
#[derive(Debug, Clone)]
pub enum Rule {
    AreaFromPercent(AreaFromPercent),
    RateFromQuantity(RateFromQuantity),
    QuantityFromRate(QuantityFromRate),
}

impl Rule {
    pub fn defaults() -> Vec<Self> {
        vec![
            Rule::AreaFromPercent(AreaFromPercent),
            Rule::RateFromQuantity(RateFromQuantity),
            Rule::QuantityFromRate(QuantityFromRate),
        ]
    }
}

fn application_area(store: &dyn FormStore) -> ConversionResult<f64> {
    store
        .number(Field::ApplicationArea)
        .ok_or_else(|| ConversionError::DegenerateDivision("application_area is not set".to_string()))
}

// ============================================================================
// application_area <- total_area * percent_of_location
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct AreaFromPercent;

impl DerivedRule for AreaFromPercent {
    fn id(&self) -> RuleId {
        RuleId::AreaFromPercent
    }

    fn triggers(&self, _ctx: &TaskContext) -> Vec<Field> {
        vec![Field::PercentOfLocation]
    }

    fn writes(&self, _ctx: &TaskContext) -> Vec<Field> {
        vec![Field::ApplicationArea, Field::ApplicationAreaUnit]
    }

    fn compute(&self, ctx: &TaskContext, store: &dyn FormStore) -> ConversionResult<Vec<FieldWrite>> {
        let total_area = ctx
            .total_area()
            .ok_or_else(|| ConversionError::DegenerateDivision("total_area is not set".to_string()))?;

        let percent = ctx.effective_percent(store);
        if !(0.0..=100.0).contains(&percent) {
            return Err(ConversionError::InvalidValue(percent));
        }

        let area = total_area * percent / 100.0;
        let unit = default_unit(Dimension::Area, area, ctx.system())?;

        Ok(vec![
            FieldWrite::number(Field::ApplicationArea, area)?,
            FieldWrite::unit(Field::ApplicationAreaUnit, unit_option(unit)?).validated(),
        ])
    }
}

// ============================================================================
// rate <- quantity / application_area
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct RateFromQuantity;

impl DerivedRule for RateFromQuantity {
    fn id(&self) -> RuleId {
        RuleId::RateFromQuantity
    }

    fn triggers(&self, ctx: &TaskContext) -> Vec<Field> {
        vec![ctx.quantity_field(), ctx.quantity_unit_field(), Field::ApplicationArea]
    }

    fn writes(&self, ctx: &TaskContext) -> Vec<Field> {
        vec![ctx.rate_field()]
    }

    fn group(&self) -> Option<RuleGroup> {
        Some(RuleGroup::QuantityRate)
    }

    fn reacts_to_discriminant(&self) -> bool {
        true
    }

    fn compute(&self, ctx: &TaskContext, store: &dyn FormStore) -> ConversionResult<Vec<FieldWrite>> {
        let quantity = store.number(ctx.quantity_field());
        let quantity_unit = store.unit(ctx.quantity_unit_field());
        let Some(quantity) = quantity.filter(|_| quantity_unit.is_some()) else {
            return Ok(Vec::new());
        };

        let area = application_area(store)?;
        if area == 0.0 {
            return Err(ConversionError::DegenerateDivision("application_area is zero".to_string()));
        }

        // database quantity unit / database area unit -> database rate unit
        let rate_dimension = ctx.rate_dimension();
        let rate = convert(
            quantity / area,
            rate_dimension,
            per_area_unit(rate_dimension)?,
            canonical_unit(rate_dimension),
        )?;

        Ok(vec![FieldWrite::number(ctx.rate_field(), rate)?])
    }
}

// ============================================================================
// quantity <- rate * application_area
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct QuantityFromRate;

impl DerivedRule for QuantityFromRate {
    fn id(&self) -> RuleId {
        RuleId::QuantityFromRate
    }

    fn triggers(&self, ctx: &TaskContext) -> Vec<Field> {
        vec![ctx.rate_field(), ctx.rate_unit_field()]
    }

    fn writes(&self, ctx: &TaskContext) -> Vec<Field> {
        vec![ctx.quantity_field()]
    }

    fn group(&self) -> Option<RuleGroup> {
        Some(RuleGroup::QuantityRate)
    }

    fn reacts_to_discriminant(&self) -> bool {
        true
    }

    fn compute(&self, ctx: &TaskContext, store: &dyn FormStore) -> ConversionResult<Vec<FieldWrite>> {
        let rate = store.number(ctx.rate_field());
        let rate_unit = store.unit(ctx.rate_unit_field());
        let Some(rate) = rate.filter(|_| rate_unit.is_some()) else {
            return Ok(Vec::new());
        };

        let area = application_area(store)?;

        let rate_dimension = ctx.rate_dimension();
        let per_area = convert(
            rate,
            rate_dimension,
            canonical_unit(rate_dimension),
            per_area_unit(rate_dimension)?,
        )?;

        // Volume products write volume, never weight
        Ok(vec![FieldWrite::number(ctx.quantity_field(), per_area * area)?])
    }
}
