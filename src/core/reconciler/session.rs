//! Lifecycle of one task-product form
//!
//! A session is created when the form mounts and consumed when it unmounts or
//! commits, so no recompute can ever run against a destroyed field set.

use std::collections::BTreeMap;
use tracing::{debug, info};
use uuid::Uuid;

use super::context::TaskContext;
use super::fields::{Field, FieldSet, FieldValue, FormStore, SetOptions};
use super::preview::{PreviewMemo, PreviewString};
use super::{CycleReport, Reconciler};
use crate::core::units::registry::{canonical_unit, lookup, unit_option};
use crate::shared::errors::{ensure_physical, ConversionError, ConversionResult};
use crate::shared::types::{FormSnapshot, TaskProductValues};

pub struct FormSession<S: FormStore = FieldSet> {
    id: Uuid,
    context: TaskContext,
    store: S,
    reconciler: Reconciler,
    preview: PreviewMemo,
}

impl<S: FormStore> FormSession<S> {
    /// Mount the form: subscribe, seed the application area, check the preview
    pub fn mount(context: TaskContext, store: S) -> ConversionResult<Self> {
        let mut reconciler = Reconciler::new();
        reconciler.subscribe(&context);

        let mut session = Self {
            id: Uuid::new_v4(),
            context,
            store,
            reconciler,
            preview: PreviewMemo::new(),
        };
        if session.seed()?.is_none() {
            session.preview.observe(&session.context, &session.store)?;
        }

        info!(id = %session.id, is_weight = session.context.is_weight(), "task product form mounted");
        Ok(session)
    }

    /// One-time seeding of an empty (or zero) application area from the location area
    fn seed(&mut self) -> ConversionResult<Option<CycleReport>> {
        if self.store.number(Field::ApplicationArea).is_some_and(|area| area != 0.0) {
            return Ok(None);
        }
        let Some(total_area) = self.context.total_area() else {
            return Ok(None);
        };

        let unit = unit_option(self.context.total_area_unit())?;
        debug!(total_area, unit = %unit.value, "seeding application area");
        self.store
            .set(Field::ApplicationArea, FieldValue::Number(total_area), SetOptions::default());
        self.store
            .set(Field::ApplicationAreaUnit, FieldValue::Unit(unit), SetOptions::default());

        let report = self.reconcile(&[Field::ApplicationArea, Field::ApplicationAreaUnit], false)?;
        Ok(Some(report))
    }

    /// Run the update cycle, then check whether the preview can be computed
    fn reconcile(&mut self, changed: &[Field], discriminant_changed: bool) -> ConversionResult<CycleReport> {
        let report = self
            .reconciler
            .run_cycle(&self.context, &mut self.store, changed, discriminant_changed)?;
        self.preview.observe(&self.context, &self.store)?;
        Ok(report)
    }

    /// Store a user edit and recompute its dependents
    ///
    /// Numbers are expected in the canonical unit of the field's dimension.
    pub fn update_field(&mut self, field: Field, value: FieldValue) -> ConversionResult<CycleReport> {
        let value = self.normalize(field, value)?;
        self.store.set(field, value, SetOptions::default());
        self.reconcile(&[field], false)
    }

    /// Reset a field to empty and recompute its dependents
    pub fn clear_field(&mut self, field: Field) -> ConversionResult<CycleReport> {
        self.store.clear(field);
        self.reconcile(&[field], false)
    }

    /// Switch between weight and volume products
    ///
    /// The previously active quantity and rate fields keep their values.
    pub fn set_is_weight(&mut self, is_weight: bool) -> ConversionResult<CycleReport> {
        if self.context.is_weight() == is_weight {
            return Ok(CycleReport::default());
        }

        self.context.set_is_weight(is_weight);
        self.reconciler.subscribe(&self.context);
        self.reconcile(&[], true)
    }

    fn normalize(&self, field: Field, value: FieldValue) -> ConversionResult<FieldValue> {
        match (field.is_unit(), value) {
            (true, FieldValue::Unit(option)) => {
                let def = lookup(&option.value)?;
                match field.dimension() {
                    Some(dimension) if dimension == def.dimension => {
                        Ok(FieldValue::Unit(unit_option(def.symbol)?))
                    }
                    Some(dimension) => Err(ConversionError::IncompatibleUnits {
                        from: def.symbol.to_string(),
                        to: canonical_unit(dimension).to_string(),
                        dimension,
                    }),
                    None => Err(ConversionError::InvalidFieldValue(field.to_string())),
                }
            }
            (false, FieldValue::Number(number)) => {
                let number = ensure_physical(number)?;
                if field == Field::PercentOfLocation && number > 100.0 {
                    return Err(ConversionError::InvalidValue(number));
                }
                Ok(FieldValue::Number(number))
            }
            _ => Err(ConversionError::InvalidFieldValue(field.to_string())),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn context(&self) -> &TaskContext {
        &self.context
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn preview(&self) -> Option<&PreviewString> {
        self.preview.get()
    }

    pub fn snapshot(&self) -> FormSnapshot {
        let values: BTreeMap<Field, FieldValue> = Field::ALL
            .iter()
            .filter_map(|field| self.store.get(*field).map(|value| (*field, value.clone())))
            .collect();

        FormSnapshot {
            id: self.id,
            is_weight: self.context.is_weight(),
            system: self.context.system(),
            values,
            preview: self.preview.get().cloned(),
        }
    }

    /// Finish the form and hand back the values to persist
    pub fn commit(mut self) -> TaskProductValues {
        self.reconciler.release();
        let ctx = &self.context;
        let unit_of = |field: Field| self.store.unit(field).map(|option| option.value.clone());

        let values = TaskProductValues {
            percent_of_location: ctx.effective_percent(&self.store),
            application_area: self.store.number(Field::ApplicationArea),
            application_area_unit: unit_of(Field::ApplicationAreaUnit),
            is_weight: ctx.is_weight(),
            quantity: self.store.number(ctx.quantity_field()),
            quantity_unit: unit_of(ctx.quantity_unit_field()),
            rate: self.store.number(ctx.rate_field()),
            rate_unit: unit_of(ctx.rate_unit_field()),
        };
        info!(id = %self.id, "task product form committed");
        values
    }

    /// Tear the form down, returning its field store
    pub fn unmount(mut self) -> S {
        self.reconciler.release();
        debug!(id = %self.id, "task product form unmounted");
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::units::registry::MeasurementSystem;
    use approx::assert_relative_eq;

    fn option(symbol: &str) -> FieldValue {
        FieldValue::Unit(unit_option(symbol).unwrap())
    }

    fn weight_ctx(total_area: Option<f64>) -> TaskContext {
        TaskContext::new(total_area, "m2", MeasurementSystem::Metric, true).unwrap()
    }

    #[test]
    fn test_mount_seeds_application_area() {
        let ctx = TaskContext::new(Some(20_000.0), "ha", MeasurementSystem::Metric, true).unwrap();
        let session = FormSession::mount(ctx, FieldSet::new()).unwrap();

        assert_eq!(session.store().number(Field::ApplicationArea), Some(20_000.0));
        assert_eq!(session.store().unit(Field::ApplicationAreaUnit).unwrap().value, "ha");
        assert_eq!(session.preview().unwrap().value, Some(2.0));
    }

    #[test]
    fn test_mount_keeps_saved_area() {
        let store = FieldSet::new()
            .with(Field::ApplicationArea, FieldValue::Number(500.0))
            .with(Field::ApplicationAreaUnit, option("m2"));
        let session = FormSession::mount(weight_ctx(Some(20_000.0)), store).unwrap();
        assert_eq!(session.store().number(Field::ApplicationArea), Some(500.0));
    }

    #[test]
    fn test_mount_reseeds_zero_area() {
        let store = FieldSet::new().with(Field::ApplicationArea, FieldValue::Number(0.0));
        let session = FormSession::mount(weight_ctx(Some(20_000.0)), store).unwrap();
        assert_eq!(session.store().number(Field::ApplicationArea), Some(20_000.0));
    }

    #[test]
    fn test_mount_in_other_system_previews_system_unit() {
        let ctx = TaskContext::new(Some(20_000.0), "ha", MeasurementSystem::Imperial, true).unwrap();
        let session = FormSession::mount(ctx, FieldSet::new()).unwrap();

        let preview = session.preview().unwrap();
        assert_eq!(preview.unit.as_deref(), Some("ac"));
        assert_eq!(preview.value, Some(4.94));
    }

    #[test]
    fn test_preview_when_clear_brings_area_unit() {
        let store = FieldSet::new().with(Field::ApplicationArea, FieldValue::Number(500.0));
        let mut session = FormSession::mount(weight_ctx(Some(20_000.0)), store).unwrap();
        assert!(session.preview().is_none());

        session.clear_field(Field::PercentOfLocation).unwrap();

        assert_eq!(session.store().unit(Field::ApplicationAreaUnit).unwrap().value, "ha");
        let preview = session.preview().unwrap();
        assert_eq!(preview.value, Some(20_000.0));
        assert_eq!(preview.unit.as_deref(), Some("m²"));
    }

    #[test]
    fn test_mount_without_location_area() {
        let session = FormSession::mount(weight_ctx(None), FieldSet::new()).unwrap();
        assert_eq!(session.store().get(Field::ApplicationArea), None);
        assert!(session.preview().is_none());
    }

    #[test]
    fn test_percent_of_location() {
        let mut session = FormSession::mount(weight_ctx(Some(10.0)), FieldSet::new()).unwrap();
        session
            .update_field(Field::PercentOfLocation, FieldValue::Number(50.0))
            .unwrap();

        assert_eq!(session.store().number(Field::ApplicationArea), Some(5.0));
        assert_eq!(session.store().unit(Field::ApplicationAreaUnit).unwrap().value, "m2");
    }

    #[test]
    fn test_weight_sets_rate() {
        let mut session = FormSession::mount(weight_ctx(Some(20_000.0)), FieldSet::new()).unwrap();
        session.update_field(Field::WeightUnit, option("kg")).unwrap();
        let report = session.update_field(Field::Weight, FieldValue::Number(100.0)).unwrap();

        assert!(report.wrote(Field::ApplicationRateWeight));
        assert!(!report.wrote(Field::Weight));
        assert_relative_eq!(
            session.store().number(Field::ApplicationRateWeight).unwrap(),
            50.0,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_rate_sets_weight_without_retrigger() {
        let mut session = FormSession::mount(weight_ctx(Some(20_000.0)), FieldSet::new()).unwrap();
        session.update_field(Field::WeightUnit, option("kg")).unwrap();
        session
            .update_field(Field::ApplicationRateWeightUnit, option("kg/ha"))
            .unwrap();
        let report = session
            .update_field(Field::ApplicationRateWeight, FieldValue::Number(50.0))
            .unwrap();

        assert!(!report.wrote(Field::ApplicationRateWeight));
        assert_eq!(session.store().number(Field::ApplicationRateWeight), Some(50.0));
        assert_relative_eq!(session.store().number(Field::Weight).unwrap(), 100.0, max_relative = 1e-12);
    }

    #[test]
    fn test_no_nan_on_zero_percent() {
        let mut session = FormSession::mount(weight_ctx(Some(20_000.0)), FieldSet::new()).unwrap();
        session.update_field(Field::WeightUnit, option("kg")).unwrap();
        session.update_field(Field::Weight, FieldValue::Number(100.0)).unwrap();
        let rate_before = session.store().number(Field::ApplicationRateWeight);

        session
            .update_field(Field::PercentOfLocation, FieldValue::Number(0.0))
            .unwrap();

        assert_eq!(session.store().number(Field::ApplicationArea), Some(0.0));
        assert_eq!(session.store().number(Field::ApplicationRateWeight), rate_before);
        for field in Field::ALL {
            if let Some(FieldValue::Number(value)) = session.store().get(field) {
                assert!(value.is_finite(), "{} is {}", field, value);
            }
        }
    }

    #[test]
    fn test_no_nan_without_location_area() {
        let mut session = FormSession::mount(weight_ctx(None), FieldSet::new()).unwrap();
        let report = session
            .update_field(Field::PercentOfLocation, FieldValue::Number(50.0))
            .unwrap();

        assert!(report.fired.is_empty());
        assert_eq!(session.store().get(Field::ApplicationArea), None);
    }

    #[test]
    fn test_switch_to_volume_leaves_weight_rate() {
        let mut session = FormSession::mount(weight_ctx(Some(20_000.0)), FieldSet::new()).unwrap();
        session.update_field(Field::WeightUnit, option("kg")).unwrap();
        session.update_field(Field::Weight, FieldValue::Number(100.0)).unwrap();
        let weight_rate = session.store().number(Field::ApplicationRateWeight);

        session.update_field(Field::VolumeUnit, option("l")).unwrap();
        session.update_field(Field::Volume, FieldValue::Number(40.0)).unwrap();
        let report = session.set_is_weight(false).unwrap();

        assert!(!report.wrote(Field::ApplicationRateWeight));
        assert_eq!(session.store().number(Field::ApplicationRateWeight), weight_rate);
        assert_relative_eq!(
            session.store().number(Field::ApplicationRateVolume).unwrap(),
            20.0,
            max_relative = 1e-12
        );
        assert_eq!(session.set_is_weight(false).unwrap(), CycleReport::default());
    }

    #[test]
    fn test_preview_computed_once() {
        let mut session = FormSession::mount(weight_ctx(Some(20_000.0)), FieldSet::new()).unwrap();
        let first = session.preview().cloned();
        assert!(first.is_some());

        session.update_field(Field::ApplicationAreaUnit, option("ha")).unwrap();
        session
            .update_field(Field::PercentOfLocation, FieldValue::Number(10.0))
            .unwrap();
        assert_eq!(session.preview().cloned(), first);
    }

    #[test]
    fn test_update_validation() {
        let mut session = FormSession::mount(weight_ctx(Some(20_000.0)), FieldSet::new()).unwrap();

        let err = session
            .update_field(Field::PercentOfLocation, FieldValue::Number(120.0))
            .unwrap_err();
        assert_eq!(err, ConversionError::InvalidValue(120.0));

        assert!(session.update_field(Field::Weight, FieldValue::Number(-1.0)).is_err());
        assert!(matches!(
            session.update_field(Field::WeightUnit, option("ha")),
            Err(ConversionError::IncompatibleUnits { .. })
        ));
        assert!(matches!(
            session.update_field(Field::Weight, option("kg")),
            Err(ConversionError::InvalidFieldValue(_))
        ));
    }

    #[test]
    fn test_clear_percent_restores_full_area() {
        let mut session = FormSession::mount(weight_ctx(Some(20_000.0)), FieldSet::new()).unwrap();
        session
            .update_field(Field::PercentOfLocation, FieldValue::Number(25.0))
            .unwrap();
        assert_eq!(session.store().number(Field::ApplicationArea), Some(5_000.0));

        session.clear_field(Field::PercentOfLocation).unwrap();
        assert_eq!(session.store().number(Field::ApplicationArea), Some(20_000.0));
        assert_eq!(session.store().unit(Field::ApplicationAreaUnit).unwrap().value, "ha");
    }

    #[test]
    fn test_commit_returns_active_values() {
        let mut session = FormSession::mount(weight_ctx(Some(20_000.0)), FieldSet::new()).unwrap();
        session.update_field(Field::WeightUnit, option("kg")).unwrap();
        session.update_field(Field::Weight, FieldValue::Number(100.0)).unwrap();

        let values = session.commit();
        assert_eq!(values.percent_of_location, 100.0);
        assert_eq!(values.application_area, Some(20_000.0));
        assert_eq!(values.quantity, Some(100.0));
        assert_eq!(values.quantity_unit.as_deref(), Some("kg"));
        assert!(values.rate.is_some());
        assert!(values.is_weight);
    }

    #[test]
    fn test_unmount_returns_store() {
        let session = FormSession::mount(weight_ctx(Some(20_000.0)), FieldSet::new()).unwrap();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.values.len(), 2);

        let store = session.unmount();
        assert_eq!(store.number(Field::ApplicationArea), Some(20_000.0));
    }
}
