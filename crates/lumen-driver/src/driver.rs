//! Render driver selection.

use crate::config::RendererConfig;
use crate::direct::DirectDriver;
use crate::error::{ConfigError, RenderError};
use crate::node::Node;
use crate::shared::SharedDriver;
use lumen_core::{FsImageResolver, ImageResolver, NodeProps};
use lumen_sync::WorkerConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Where a renderer's authority lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Same thread as the application
    Direct,
    /// A dedicated render worker thread
    Shared,
}

impl DriverKind {
    pub fn name(&self) -> &'static str {
        match self {
            DriverKind::Direct => "direct",
            DriverKind::Shared => "shared",
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for DriverKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "direct" => Ok(DriverKind::Direct),
            "shared" => Ok(DriverKind::Shared),
            _ => Err(ConfigError::InvalidDriver(s.to_string())),
        }
    }
}

/// A source of nodes backed by one render authority.
pub trait RenderDriver {
    fn kind(&self) -> DriverKind;

    fn create_node(&self, props: NodeProps) -> Result<Node, RenderError>;

    /// Advance the authority (direct) or collect its outcomes (shared), and
    /// deliver them to nodes.
    fn tick(&self, dt: Duration) -> Result<(), RenderError>;

    /// Number of nodes still held by the application.
    fn node_count(&self) -> usize;
}

/// Build the driver named by `config`, loading images from disk.
pub fn select_driver(config: &RendererConfig) -> Result<Box<dyn RenderDriver>, RenderError> {
    select_driver_with_images(config, Box::new(FsImageResolver))
}

pub fn select_driver_with_images(
    config: &RendererConfig,
    images: Box<dyn ImageResolver + Send>,
) -> Result<Box<dyn RenderDriver>, RenderError> {
    Ok(match config.driver {
        DriverKind::Direct => Box::new(DirectDriver::new(images)),
        DriverKind::Shared => Box::new(SharedDriver::spawn(
            WorkerConfig {
                frame_interval: config.frame_interval(),
            },
            images,
        )?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_driver_kind() {
        assert_eq!("direct".parse::<DriverKind>().unwrap(), DriverKind::Direct);
        assert_eq!("SHARED".parse::<DriverKind>().unwrap(), DriverKind::Shared);
        assert!("threaded".parse::<DriverKind>().is_err());
        assert_eq!(DriverKind::Shared.to_string(), "shared");
    }

    #[test]
    fn test_select_each_driver() {
        for kind in [DriverKind::Direct, DriverKind::Shared] {
            let config = RendererConfig {
                driver: kind,
                ..RendererConfig::default()
            };
            let driver = select_driver(&config).unwrap();
            assert_eq!(driver.kind(), kind);

            let node = driver.create_node(NodeProps::new()).unwrap();
            node.set_x(3.0);
            assert_eq!(node.x(), 3.0);
            assert_eq!(driver.node_count(), 1);
        }
    }
}
