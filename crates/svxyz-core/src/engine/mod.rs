//! # Engine Module
//!
//! The filtering logic shared by every workflow.
//!
//! - [`config`] - the JSON filter configuration, its defaults and validation
//! - [`resolver`] - loads the configuration or writes an editable default in its place
//! - [`quantity`] - the per-frame observables a filter can bound
//! - [`pipeline`] - the pure, AND-combined range predicates applied to each frame
//! - [`progress`] - callback-based progress reporting for long trajectories

pub mod config;
pub mod pipeline;
pub mod progress;
pub mod quantity;
pub mod resolver;
