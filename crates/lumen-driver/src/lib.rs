//! Lumen Driver - Node API over Interchangeable Render Drivers
//!
//! Application code builds scenes from [`Node`]s and never needs to know
//! where the authoritative scene lives:
//! - **Direct**: the authority is a [`lumen_core::Stage`] on the calling thread
//! - **Shared**: the authority runs on a render worker, reached through a
//!   command channel and per-node shared property buffers
//!
//! The driver is picked once per [`Renderer`] from its [`RendererConfig`].

mod config;
mod controller;
mod direct;
mod driver;
mod error;
mod node;
mod renderer;
mod shared;
mod sprite;

pub use config::{RendererConfig, DRIVER_ENV};
pub use controller::{
    AnimationController, AnimationHandle, DirectAnimationController, SharedAnimationController,
};
pub use direct::{DirectDriver, DirectNode};
pub use driver::{select_driver, select_driver_with_images, DriverKind, RenderDriver};
pub use error::{ConfigError, RenderError};
pub use node::{Node, NodeProxy};
pub use renderer::{NodeSettings, Renderer};
pub use shared::{SharedDriver, SharedNode};
pub use sprite::{Facing, FrameSequence};
