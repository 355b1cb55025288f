//! Unit conversion and field reconciliation for farm task-product forms
//!
//! - `core::units`: unit registry, conversions, parsing and formatting
//! - `core::reconciler`: keeps application area, quantity and rate consistent
//! - `shared`: errors, settings and IPC types
//! - `api`: command surface used by the UI

pub mod api;
pub mod core;
pub mod shared;

pub use crate::core::reconciler::{FormSession, Reconciler, TaskContext};
pub use crate::core::units::{convert, default_unit, units_for, Dimension, MeasurementSystem};
pub use crate::shared::error::{AppError, AppResult};
pub use crate::shared::errors::{ConversionError, ConversionResult};
