//! Errors surfaced by the node API.

use lumen_core::AnimationError;
use lumen_sync::SyncError;
use thiserror::Error;

/// Errors returned by node operations and driver setup.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The channel to the render worker failed
    #[error(transparent)]
    Transport(#[from] SyncError),

    /// Invalid animation parameters
    #[error(transparent)]
    Animation(#[from] AnimationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors loading renderer configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown render driver: {0}")]
    InvalidDriver(String),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),
}
