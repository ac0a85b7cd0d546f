//! Renderer entry point.

use crate::config::RendererConfig;
use crate::driver::{select_driver, DriverKind, RenderDriver};
use crate::error::RenderError;
use crate::node::Node;
use lumen_core::{NodeProps, Prop, ShaderDesc, ShaderProps, TextureDesc, TextureKind, TextureOptions};
use std::time::Duration;
use tracing::info;

/// Initial state for a new node.
#[derive(Debug, Clone, Default)]
pub struct NodeSettings {
    pub props: NodeProps,
    pub parent: Option<Node>,
    pub texture: Option<TextureDesc>,
    pub shader: Option<ShaderDesc>,
    pub src: Option<String>,
}

impl NodeSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prop(mut self, prop: Prop, value: f64) -> Self {
        self.props.set(prop, value);
        self
    }

    pub fn parent(mut self, parent: &Node) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    pub fn texture(mut self, texture: TextureDesc) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn shader(mut self, shader: ShaderDesc) -> Self {
        self.shader = Some(shader);
        self
    }

    pub fn src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }
}

/// Owns a render driver and the root node of its scene.
pub struct Renderer {
    root: Node,
    driver: Box<dyn RenderDriver>,
    config: RendererConfig,
}

impl Renderer {
    /// Select a driver from `config` and create the root node.
    pub fn new(config: RendererConfig) -> Result<Self, RenderError> {
        let driver = select_driver(&config)?;
        Self::with_driver(config, driver)
    }

    pub fn with_driver(
        config: RendererConfig,
        driver: Box<dyn RenderDriver>,
    ) -> Result<Self, RenderError> {
        let root = driver.create_node(
            NodeProps::new()
                .with(Prop::Width, f64::from(config.width))
                .with(Prop::Height, f64::from(config.height)),
        )?;
        info!(
            "Renderer ready: {} driver, {}x{}",
            driver.kind(),
            config.width,
            config.height
        );
        Ok(Self {
            root,
            driver,
            config,
        })
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn driver_kind(&self) -> DriverKind {
        self.driver.kind()
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Create a node, then apply parent, shader, texture and src in that
    /// order.
    pub fn create_node(&self, settings: NodeSettings) -> Result<Node, RenderError> {
        let node = self.driver.create_node(settings.props)?;
        if let Some(parent) = &settings.parent {
            node.set_parent(Some(parent));
        }
        if settings.shader.is_some() {
            node.set_shader(settings.shader)?;
        }
        if settings.texture.is_some() {
            node.set_texture(settings.texture)?;
        }
        if let Some(src) = &settings.src {
            node.set_src(src)?;
        }
        Ok(node)
    }

    pub fn make_texture(&self, kind: TextureKind, options: TextureOptions) -> TextureDesc {
        TextureDesc::new(kind, options)
    }

    pub fn make_shader(&self, shader_type: &str, props: ShaderProps) -> ShaderDesc {
        ShaderDesc::new(shader_type, props)
    }

    pub fn tick(&self, dt: Duration) -> Result<(), RenderError> {
        self.driver.tick(dt)
    }

    /// Nodes still referenced by the application, root included.
    pub fn node_count(&self) -> usize {
        self.driver.node_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direct::DirectDriver;
    use crate::shared::SharedDriver;
    use lumen_core::{AnimatableProps, AnimationSettings, Dimensions, ImageResolver, ResourceError};
    use lumen_sync::{ChannelMessage, NodeCommand, SyncChannel};
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingImages(Rc<Cell<usize>>);

    impl ImageResolver for CountingImages {
        fn resolve(&self, _src: &str) -> Result<Dimensions, ResourceError> {
            self.0.set(self.0.get() + 1);
            Ok(Dimensions::new(16, 16))
        }
    }

    fn direct(resolves: Rc<Cell<usize>>) -> Renderer {
        let config = RendererConfig {
            driver: DriverKind::Direct,
            width: 800,
            height: 600,
            ..RendererConfig::default()
        };
        let driver = DirectDriver::new(Box::new(CountingImages(resolves)));
        Renderer::with_driver(config, Box::new(driver)).unwrap()
    }

    #[test]
    fn test_root_sized_to_app() {
        let renderer = direct(Rc::default());
        assert_eq!(renderer.root().width(), 800.0);
        assert_eq!(renderer.root().height(), 600.0);
        assert_eq!(renderer.driver_kind(), DriverKind::Direct);
    }

    #[test]
    fn test_parent_attach_and_detach() {
        let renderer = direct(Rc::default());
        let a = renderer.create_node(NodeSettings::new()).unwrap();
        let b = renderer
            .create_node(NodeSettings::new().parent(&a))
            .unwrap();
        assert_eq!(a.children(), vec![b.clone()]);
        assert_eq!(b.parent(), Some(a.clone()));

        b.set_parent(None);
        assert!(a.children().is_empty());
        assert_eq!(b.parent(), None);
    }

    #[test]
    fn test_same_src_resolves_once() {
        let resolves = Rc::new(Cell::new(0));
        let renderer = direct(resolves.clone());
        let node = renderer
            .create_node(NodeSettings::new().src("img://1"))
            .unwrap();
        node.set_src("img://1").unwrap();
        renderer.tick(Duration::from_millis(16)).unwrap();
        assert_eq!(resolves.get(), 1);
    }

    #[test]
    fn test_same_texture_descriptor_is_noop() {
        let resolves = Rc::new(Cell::new(0));
        let renderer = direct(resolves.clone());
        let texture = renderer.make_texture(
            TextureKind::Color { color: 0xffffffff },
            TextureOptions::default(),
        );
        let node = renderer
            .create_node(NodeSettings::new().texture(texture.clone()))
            .unwrap();
        node.set_texture(Some(texture)).unwrap();

        // A lookalike descriptor is a different texture.
        let lookalike = renderer.make_texture(
            TextureKind::Color { color: 0xffffffff },
            TextureOptions::default(),
        );
        node.set_texture(Some(lookalike.clone())).unwrap();
        assert!(node.texture().unwrap().same(&lookalike));
    }

    #[test]
    fn test_two_animations_each_destroyed_once() {
        let (channel, endpoint) = SyncChannel::pair();
        let renderer = Renderer::with_driver(
            RendererConfig::default(),
            Box::new(SharedDriver::with_channel(channel)),
        )
        .unwrap();
        let node = renderer.create_node(NodeSettings::new()).unwrap();

        let first = node
            .animate(
                AnimatableProps::new().with(Prop::X, 100.0),
                AnimationSettings::with_duration(500.0),
            )
            .unwrap();
        let second = node
            .animate(
                AnimatableProps::new().with(Prop::X, 100.0),
                AnimationSettings::with_duration(500.0),
            )
            .unwrap();
        drop(second);
        drop(first);

        let mut created = Vec::new();
        let mut destroyed = Vec::new();
        for message in endpoint.commands.try_iter() {
            match message {
                ChannelMessage::Node {
                    command: NodeCommand::CreateAnimation { id, .. },
                    ..
                } => created.push(id.0),
                ChannelMessage::Node {
                    command: NodeCommand::DestroyAnimation { id },
                    ..
                } => destroyed.push(id.0),
                _ => {}
            }
        }
        destroyed.sort_unstable();
        assert_eq!(created, vec![1, 2]);
        assert_eq!(destroyed, vec![1, 2]);
    }
}
