//! Field reconciler for the task-product form
//!
//! Keeps derived form fields consistent when their inputs change:
//! the application area follows the percentage of the location, and the
//! quantity and application rate of the product follow each other through
//! the application area.
//!
//! ## Architecture
//!
//! - `fields`: watched fields, values and the `FormStore` seam
//! - `context`: read-only task inputs (location area, measurement system, discriminant)
//! - `rules`: derived-field rules declaring triggers and writes
//! - `preview`: one-shot location-area preview string
//! - `session`: mount/update/unmount lifecycle around one form field set
//!
//! Rules never subscribe to fields they write. Within one update cycle each
//! rule fires at most once, a rule whose output is already dirty is skipped,
//! and only one rule of a reciprocal group may fire. A user edit of the rate
//! therefore recomputes the quantity without the quantity writing back to the
//! rate.

pub mod fields;
pub mod context;
pub mod rules;
pub mod preview;
pub mod session;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::{debug, trace, warn};
use ts_rs::TS;

use crate::shared::errors::ConversionResult;
use fields::{Field, FieldWrite, FormStore};
use rules::{DerivedRule, Rule, RuleGroup, RuleId};

pub use context::{TaskContext, DEFAULT_PERCENT_OF_LOCATION};
pub use fields::{FieldSet, FieldValue};
pub use preview::PreviewString;
pub use session::FormSession;

/// Outcome of one update cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings.ts")]
pub struct CycleReport {
    /// Rules that produced writes, in firing order
    pub fired: Vec<RuleId>,
    /// Rules that were triggered but did not run
    pub skipped: Vec<RuleId>,
    pub writes: Vec<FieldWrite>,
}

impl CycleReport {
    pub fn wrote(&self, field: Field) -> bool {
        self.writes.iter().any(|w| w.field == field)
    }
}

/// Dependency-driven recompute engine
#[derive(Debug, Clone)]
pub struct Reconciler {
    rules: Vec<Rule>,
    subscriptions: HashMap<Field, Vec<usize>>,
    discriminant_subscribers: Vec<usize>,
    active: bool,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::with_rules(Rule::defaults())
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            subscriptions: HashMap::new(),
            discriminant_subscribers: Vec::new(),
            active: false,
        }
    }

    /// Build the subscription table for the given discriminant
    ///
    /// Called on mount and again after every discriminant switch, since the
    /// active quantity and rate fields depend on it.
    pub fn subscribe(&mut self, ctx: &TaskContext) {
        self.subscriptions.clear();
        self.discriminant_subscribers.clear();

        for (index, rule) in self.rules.iter().enumerate() {
            let writes = rule.writes(ctx);
            for field in rule.triggers(ctx) {
                if writes.contains(&field) {
                    continue;
                }
                self.subscriptions.entry(field).or_default().push(index);
            }
            if rule.reacts_to_discriminant() {
                self.discriminant_subscribers.push(index);
            }
        }

        self.active = true;
        trace!(
            fields = self.subscriptions.len(),
            is_weight = ctx.is_weight(),
            "reconciler subscribed"
        );
    }

    /// Drop all subscriptions; later cycles are no-ops
    pub fn release(&mut self) {
        self.subscriptions.clear();
        self.discriminant_subscribers.clear();
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Rules recomputed when `field` changes
    pub fn subscribers(&self, field: Field) -> Vec<RuleId> {
        self.subscriptions
            .get(&field)
            .map(|indices| indices.iter().map(|&i| self.rules[i].id()).collect())
            .unwrap_or_default()
    }

    /// Run one update cycle for the fields changed by the caller
    pub fn run_cycle(
        &self,
        ctx: &TaskContext,
        store: &mut dyn FormStore,
        changed: &[Field],
        discriminant_changed: bool,
    ) -> ConversionResult<CycleReport> {
        let mut report = CycleReport::default();
        if !self.active {
            warn!(?changed, "update cycle on a released reconciler ignored");
            return Ok(report);
        }

        let mut dirty: BTreeSet<Field> = changed.iter().copied().collect();
        let mut visited: HashSet<usize> = HashSet::new();
        let mut groups_fired: HashSet<RuleGroup> = HashSet::new();
        let mut queue: VecDeque<usize> = VecDeque::new();

        for field in changed {
            self.enqueue(*field, &mut queue);
        }
        if discriminant_changed {
            queue.extend(self.discriminant_subscribers.iter().copied());
        }

        while let Some(index) = queue.pop_front() {
            if !visited.insert(index) {
                continue;
            }
            let rule = &self.rules[index];

            if rule.writes(ctx).iter().any(|field| dirty.contains(field)) {
                trace!(rule = ?rule.id(), "output already changed this cycle, skipping");
                report.skipped.push(rule.id());
                continue;
            }
            if let Some(group) = rule.group() {
                if groups_fired.contains(&group) {
                    trace!(rule = ?rule.id(), "reciprocal rule already fired, skipping");
                    report.skipped.push(rule.id());
                    continue;
                }
            }

            let writes = match rule.compute(ctx, store) {
                Ok(writes) => writes,
                Err(e) if e.is_degenerate() => {
                    debug!(rule = ?rule.id(), reason = %e, "recompute skipped");
                    report.skipped.push(rule.id());
                    continue;
                }
                Err(e) => return Err(e),
            };
            if writes.is_empty() {
                continue;
            }

            if let Some(group) = rule.group() {
                groups_fired.insert(group);
            }
            report.fired.push(rule.id());

            for write in writes {
                store.set(write.field, write.value.clone(), write.options());
                dirty.insert(write.field);
                self.enqueue(write.field, &mut queue);
                report.writes.push(write);
            }
        }

        debug!(
            fired = report.fired.len(),
            skipped = report.skipped.len(),
            writes = report.writes.len(),
            "update cycle complete"
        );
        Ok(report)
    }

    fn enqueue(&self, field: Field, queue: &mut VecDeque<usize>) {
        if let Some(indices) = self.subscriptions.get(&field) {
            queue.extend(indices.iter().copied());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::units::registry::{unit_option, MeasurementSystem};
    use approx::assert_relative_eq;

    fn option(symbol: &str) -> FieldValue {
        FieldValue::Unit(unit_option(symbol).unwrap())
    }

    fn weight_ctx() -> TaskContext {
        TaskContext::new(Some(20_000.0), "ha", MeasurementSystem::Metric, true).unwrap()
    }

    fn subscribed(ctx: &TaskContext) -> Reconciler {
        let mut reconciler = Reconciler::new();
        reconciler.subscribe(ctx);
        reconciler
    }

    #[test]
    fn test_subscription_table() {
        let ctx = weight_ctx();
        let reconciler = subscribed(&ctx);

        assert_eq!(reconciler.subscribers(Field::PercentOfLocation), vec![RuleId::AreaFromPercent]);
        assert_eq!(reconciler.subscribers(Field::ApplicationArea), vec![RuleId::RateFromQuantity]);
        assert_eq!(reconciler.subscribers(Field::ApplicationRateWeight), vec![RuleId::QuantityFromRate]);
        // inactive discriminant side has no subscribers
        assert!(reconciler.subscribers(Field::Volume).is_empty());
        assert!(reconciler.subscribers(Field::ApplicationAreaUnit).is_empty());
    }

    #[test]
    fn test_percent_propagates_to_rate() {
        let ctx = weight_ctx();
        let reconciler = subscribed(&ctx);
        let mut store = FieldSet::new()
            .with(Field::PercentOfLocation, FieldValue::Number(50.0))
            .with(Field::Weight, FieldValue::Number(100.0))
            .with(Field::WeightUnit, option("kg"));

        let report = reconciler
            .run_cycle(&ctx, &mut store, &[Field::PercentOfLocation], false)
            .unwrap();

        assert_eq!(report.fired, vec![RuleId::AreaFromPercent, RuleId::RateFromQuantity]);
        assert_eq!(store.number(Field::ApplicationArea), Some(10_000.0));
        // 100 kg over 1 ha
        assert_relative_eq!(
            store.number(Field::ApplicationRateWeight).unwrap(),
            100.0,
            max_relative = 1e-12
        );
        assert!(store.needs_validation(Field::ApplicationAreaUnit));
    }

    #[test]
    fn test_rate_edit_does_not_loop_back() {
        let ctx = weight_ctx();
        let reconciler = subscribed(&ctx);
        let mut store = FieldSet::new()
            .with(Field::ApplicationArea, FieldValue::Number(20_000.0))
            .with(Field::WeightUnit, option("kg"))
            .with(Field::ApplicationRateWeight, FieldValue::Number(50.0))
            .with(Field::ApplicationRateWeightUnit, option("kg/ha"));

        let report = reconciler
            .run_cycle(&ctx, &mut store, &[Field::ApplicationRateWeight], false)
            .unwrap();

        assert_eq!(report.fired, vec![RuleId::QuantityFromRate]);
        assert_eq!(report.skipped, vec![RuleId::RateFromQuantity]);
        assert!(!report.wrote(Field::ApplicationRateWeight));
        assert_eq!(store.number(Field::ApplicationRateWeight), Some(50.0));
        assert_relative_eq!(store.number(Field::Weight).unwrap(), 100.0, max_relative = 1e-12);
    }

    #[test]
    fn test_degenerate_area_keeps_prior_values() {
        let ctx = weight_ctx();
        let reconciler = subscribed(&ctx);
        let mut store = FieldSet::new()
            .with(Field::ApplicationArea, FieldValue::Number(0.0))
            .with(Field::Weight, FieldValue::Number(100.0))
            .with(Field::WeightUnit, option("kg"))
            .with(Field::ApplicationRateWeight, FieldValue::Number(7.0));

        let report = reconciler
            .run_cycle(&ctx, &mut store, &[Field::Weight], false)
            .unwrap();

        assert!(report.fired.is_empty());
        assert_eq!(report.skipped, vec![RuleId::RateFromQuantity]);
        assert_eq!(store.number(Field::ApplicationRateWeight), Some(7.0));
    }

    #[test]
    fn test_discriminant_cycle_fires_one_reciprocal_rule() {
        let ctx = TaskContext::new(Some(20_000.0), "ha", MeasurementSystem::Metric, false).unwrap();
        let reconciler = subscribed(&ctx);
        let mut store = FieldSet::new()
            .with(Field::ApplicationArea, FieldValue::Number(20_000.0))
            .with(Field::Volume, FieldValue::Number(40.0))
            .with(Field::VolumeUnit, option("l"))
            .with(Field::ApplicationRateVolume, FieldValue::Number(5.0))
            .with(Field::ApplicationRateVolumeUnit, option("l/ha"))
            .with(Field::ApplicationRateWeight, FieldValue::Number(3.0));

        let report = reconciler.run_cycle(&ctx, &mut store, &[], true).unwrap();

        assert_eq!(report.fired, vec![RuleId::RateFromQuantity]);
        assert_eq!(report.skipped, vec![RuleId::QuantityFromRate]);
        assert_relative_eq!(
            store.number(Field::ApplicationRateVolume).unwrap(),
            20.0,
            max_relative = 1e-12
        );
        assert_eq!(store.number(Field::Volume), Some(40.0));
        assert_eq!(store.number(Field::ApplicationRateWeight), Some(3.0));
    }

    #[test]
    fn test_released_reconciler_is_inert() {
        let ctx = weight_ctx();
        let mut reconciler = subscribed(&ctx);
        reconciler.release();
        assert!(!reconciler.is_active());

        let mut store = FieldSet::new().with(Field::PercentOfLocation, FieldValue::Number(50.0));
        let report = reconciler
            .run_cycle(&ctx, &mut store, &[Field::PercentOfLocation], false)
            .unwrap();
        assert_eq!(report, CycleReport::default());
        assert_eq!(store.get(Field::ApplicationArea), None);
    }
}
