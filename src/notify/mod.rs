//! Activity progress notification
//!
//! This module handles:
//! - The notifier seam the engine reports through
//! - Logging and broadcast notifiers
//! - Streaming progress to monitors over TCP

mod broadcast;
mod log;
mod server;
mod traits;

pub use broadcast::{BroadcastNotifier, FanoutNotifier};
pub use log::LogNotifier;
pub use server::ProgressServer;
pub use traits::ProgressNotifier;
