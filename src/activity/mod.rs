//! Activity execution and lifecycle
//!
//! This module handles:
//! - Running an activity's steps in order with delays and failure policy
//! - Stopping runs in flight
//! - Maintaining steps and device associations

mod engine;
mod lifecycle;
mod runs;

pub use engine::ActivityEngine;
pub use lifecycle::LifecycleManager;
pub use runs::{ActiveRun, RunGuard, RunRegistry};
