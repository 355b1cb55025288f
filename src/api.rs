//! Command surface for the task forms UI
//!
//! Every command returns `AppResult`, whose error serializes as
//! `{ type, message }` for the frontend.

pub mod commands;
