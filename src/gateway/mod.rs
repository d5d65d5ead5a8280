//! Device command delivery
//!
//! The engine only sees "send named command to device, get success/failure".
//! Backends:
//! - Bridge: framed TCP requests to a device bridge process
//! - DryRun: log-only delivery for development

mod bridge;
mod dry_run;
mod traits;

pub use bridge::BridgeGateway;
pub use dry_run::DryRunGateway;
pub use traits::DeviceCommandGateway;
