//! Command modules
//!
//! This module organizes commands into feature-specific submodules following
//! Modern Rust idioms (no mod.rs pattern).
//!
//! ## Architecture
//!
//! - `units`: conversions, unit lists, default units, quantity parsing
//! - `form`: task-product form sessions
//! - `settings`: farm settings persistence

pub mod units;
pub mod form;
pub mod settings;
