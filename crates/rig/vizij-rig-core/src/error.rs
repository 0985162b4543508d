//! Error type for the few fallible entry points (configuration).
//!
//! Blending itself never fails: stale providers, unknown removals and bad
//! durations are all recovered from locally.

/// Rig result type
pub type Result<T> = core::result::Result<T, RigError>;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum RigError {
    /// Configuration value out of range
    #[error("Invalid rig configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Configuration could not be parsed
    #[error("Failed to parse rig configuration: {0}")]
    Json(#[from] serde_json::Error),
}
