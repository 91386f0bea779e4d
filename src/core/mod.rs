//! Core domain models for the lead pipeline
//!
//! This module defines the stage list, the per-stage state machine, the
//! typed entity records and the run configuration.

pub mod config;
pub mod context;
pub mod entity;
pub mod pipeline;
pub mod state;
pub mod step;

pub use context::*;
pub use entity::*;
pub use pipeline::*;
pub use state::*;
pub use step::*;
