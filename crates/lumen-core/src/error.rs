//! Error types raised by the render authority.

use thiserror::Error;

/// A texture or shader could not be made ready.
///
/// Reported to the requesting node as a `failed` event, never as a panic.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResourceError {
    #[error("image source is empty")]
    EmptySource,

    #[error("failed to read image {src}: {reason}")]
    Image { src: String, reason: String },

    #[error("sub-texture region {x},{y} {width}x{height} exceeds parent {parent_width}x{parent_height}")]
    RegionOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        parent_width: u32,
        parent_height: u32,
    },

    #[error("texture dimensions must be non-zero")]
    ZeroSize,

    #[error("unknown shader type: {0}")]
    UnknownShader(String),

    #[error("shader {shader} requires numeric property {prop}")]
    MissingShaderProp { shader: String, prop: String },
}

/// Invalid animation parameters. Raised at the point of the call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnimationError {
    #[error("invalid animation settings: {0}")]
    InvalidSettings(String),

    #[error("animation has no target properties")]
    NoTargets,

    #[error("frame range {start}..={end} out of bounds for {len} frames")]
    FrameOutOfBounds { start: usize, end: usize, len: usize },
}
