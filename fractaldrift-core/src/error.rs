//! Error types.

use thiserror::Error;

/// Surface allocation failures. Rendering cannot continue without both
/// surfaces, so these propagate to the host.
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Invalid surface dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Failed to allocate {width}x{height} surface: {reason}")]
    AllocationFailed {
        width: u32,
        height: u32,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}
