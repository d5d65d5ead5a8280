//! Hub error types

use crate::store::StoreError;
use theater_shared::ValidationError;
use thiserror::Error;

/// Errors surfaced by lifecycle operations
///
/// Missing activities, devices and commands are not errors; those operations
/// return `None` or `false` instead.
#[derive(Error, Debug)]
pub enum HubError {
    #[error("Invalid activity: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
