//! Home-theater hub
//!
//! Runs multi-device activities (ordered command sequences with delays)
//! and manages their structure.

pub mod activity;
pub mod config;
pub mod error;
pub mod gateway;
pub mod notify;
pub mod seed;
pub mod store;

pub use activity::{ActivityEngine, LifecycleManager};
pub use error::HubError;
