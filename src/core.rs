//! Domain core: units and the task-product form reconciler

pub mod units;
pub mod reconciler;
