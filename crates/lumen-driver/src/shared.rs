//! Shared driver: nodes mirror an authority on the render worker.
//!
//! Numeric writes go to the node's local mirror and its
//! [`SharedPropertyBuffer`], which the worker folds in once per frame.
//! Everything else travels as an ordered [`NodeCommand`]. Reads come from
//! the mirror, so a value written here is visible here immediately even
//! though the worker may not have applied it yet.

use crate::controller::{AnimationHandle, SharedAnimationController};
use crate::driver::{DriverKind, RenderDriver};
use crate::error::RenderError;
use crate::node::{Node, NodeProxy, NodeRegistry};
use lumen_core::{
    AnimatableProps, AnimationId, AnimationSettings, AnimationState, ImageResolver, NodeId,
    NodeProps, Prop, ShaderDesc, TextureDesc,
};
use lumen_sync::{
    AuthorityEvent, CommandSender, NodeCommand, RenderWorker, SharedPropertyBuffer, SyncChannel,
    WorkerConfig,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Proxy for a node whose authority lives on the render worker.
pub struct SharedNode {
    id: NodeId,
    mirror: RefCell<NodeProps>,
    buffer: Arc<SharedPropertyBuffer>,
    sender: CommandSender,
    next_animation: Cell<AnimationId>,
    controllers: RefCell<HashMap<AnimationId, Weak<Cell<AnimationState>>>>,
}

impl SharedNode {
    fn create(sender: CommandSender, props: NodeProps) -> Result<Self, RenderError> {
        let id = NodeId::next();
        let buffer = Arc::new(SharedPropertyBuffer::new(&props));
        sender.send(
            id,
            NodeCommand::Create {
                buffer: buffer.clone(),
                props: props.clone(),
            },
        )?;
        Ok(Self {
            id,
            mirror: RefCell::new(props),
            buffer,
            sender,
            next_animation: Cell::new(AnimationId::FIRST),
            controllers: RefCell::new(HashMap::new()),
        })
    }
}

impl NodeProxy for SharedNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn get(&self, prop: Prop) -> f64 {
        self.mirror.borrow().get(prop)
    }

    fn set(&self, prop: Prop, value: f64) {
        self.mirror.borrow_mut().set(prop, value);
        self.buffer.write(prop, value);
    }

    fn set_parent_id(&self, parent: Option<NodeId>) {
        self.buffer.write_parent(parent);
    }

    fn load_texture(&self, texture: &TextureDesc) -> Result<(), RenderError> {
        self.sender.send(
            self.id,
            NodeCommand::LoadTexture {
                texture: texture.clone(),
            },
        )?;
        Ok(())
    }

    fn unload_texture(&self) -> Result<(), RenderError> {
        self.sender.send(self.id, NodeCommand::UnloadTexture)?;
        Ok(())
    }

    fn load_shader(&self, shader: &ShaderDesc) -> Result<(), RenderError> {
        self.sender.send(
            self.id,
            NodeCommand::LoadShader {
                shader: shader.clone(),
            },
        )?;
        Ok(())
    }

    fn animate(
        &self,
        props: AnimatableProps,
        settings: AnimationSettings,
    ) -> Result<AnimationHandle, RenderError> {
        let id = self.next_animation.get();
        self.next_animation.set(id.succ());
        self.sender
            .send(self.id, NodeCommand::CreateAnimation { id, props, settings })?;

        let state = Rc::new(Cell::new(AnimationState::Stopped));
        let mut controllers = self.controllers.borrow_mut();
        controllers.retain(|_, s| s.strong_count() > 0);
        controllers.insert(id, Rc::downgrade(&state));
        Ok(AnimationHandle::new(SharedAnimationController::new(
            self.id,
            id,
            self.sender.clone(),
            state,
        )))
    }

    fn animation_finished(&self, id: AnimationId, values: &[(Prop, f64)]) {
        let mut mirror = self.mirror.borrow_mut();
        for &(prop, value) in values {
            mirror.set(prop, value);
        }
        if let Some(state) = self.controllers.borrow().get(&id).and_then(Weak::upgrade) {
            state.set(AnimationState::Finished);
        }
    }

    fn release(&self) {
        if let Err(e) = self.sender.send(self.id, NodeCommand::Destroy) {
            debug!("{} released after worker exit: {}", self.id, e);
        }
    }
}

enum Link {
    Worker(RenderWorker),
    Channel(SyncChannel),
}

impl Link {
    fn channel(&self) -> &SyncChannel {
        match self {
            Link::Worker(worker) => worker.channel(),
            Link::Channel(channel) => channel,
        }
    }
}

/// Driver whose render authority runs on a worker thread.
pub struct SharedDriver {
    link: Link,
    registry: NodeRegistry,
}

impl SharedDriver {
    /// Start a render worker and connect to it.
    pub fn spawn(
        config: WorkerConfig,
        images: Box<dyn ImageResolver + Send>,
    ) -> Result<Self, RenderError> {
        info!(
            "Using shared render driver, frame interval {:?}",
            config.frame_interval
        );
        let worker = RenderWorker::spawn(config, images)?;
        Ok(Self {
            link: Link::Worker(worker),
            registry: NodeRegistry::default(),
        })
    }

    /// Drive an existing channel. The caller owns the worker side.
    pub fn with_channel(channel: SyncChannel) -> Self {
        Self {
            link: Link::Channel(channel),
            registry: NodeRegistry::default(),
        }
    }
}

impl RenderDriver for SharedDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Shared
    }

    fn create_node(&self, props: NodeProps) -> Result<Node, RenderError> {
        let proxy = SharedNode::create(self.link.channel().sender(), props)?;
        let node = Node::new(Box::new(proxy));
        self.registry.insert(&node);
        Ok(node)
    }

    /// Deliver outcomes the worker reported since the last tick. The worker
    /// keeps its own frame clock, so `dt` is unused here.
    fn tick(&self, _dt: Duration) -> Result<(), RenderError> {
        for event in self.link.channel().try_events() {
            match event {
                AuthorityEvent::Stage(event) => self.registry.dispatch(&event),
                AuthorityEvent::CommandFailed {
                    node,
                    command,
                    error,
                } => error!("{} {} failed on render worker: {}", node, command, error),
            }
        }
        self.registry.prune();
        Ok(())
    }

    fn node_count(&self) -> usize {
        self.registry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::{Dimensions, NodeEvent, ResourceError, StageEvent};
    use lumen_sync::{ChannelMessage, WorkerEndpoint};

    fn driver() -> (SharedDriver, WorkerEndpoint) {
        let (channel, endpoint) = SyncChannel::pair();
        (SharedDriver::with_channel(channel), endpoint)
    }

    fn sent(endpoint: &WorkerEndpoint) -> Vec<String> {
        endpoint
            .commands
            .try_iter()
            .filter_map(|m| match m {
                ChannelMessage::Node { command, .. } => Some(command.to_string()),
                ChannelMessage::Shutdown => None,
            })
            .collect()
    }

    #[test]
    fn test_property_writes_skip_the_channel() {
        let (driver, endpoint) = driver();
        let node = driver.create_node(NodeProps::new()).unwrap();
        assert_eq!(sent(&endpoint), vec!["create"]);

        node.set_x(10.0);
        node.set_color(Prop::ColorTop, 0x11223344);
        assert_eq!(node.x(), 10.0);
        assert_eq!(node.color(Prop::ColorTr), 0x11223344);
        assert!(sent(&endpoint).is_empty());
    }

    #[test]
    fn test_scenario_textures_and_destroy_animation() {
        let (driver, endpoint) = driver();
        let node = driver.create_node(NodeProps::new()).unwrap();
        let _ = sent(&endpoint);

        node.set_src("img://1").unwrap();
        node.set_src("img://1").unwrap();
        let anim = node
            .animate(
                AnimatableProps::new().with(Prop::X, 100.0),
                AnimationSettings::with_duration(100.0),
            )
            .unwrap();
        anim.start().unwrap();
        drop(anim);

        assert_eq!(
            sent(&endpoint),
            vec![
                "loadTexture",
                "createAnimation{id: 1}",
                "startAnimation{id: 1}",
                "destroyAnimation{id: 1}",
            ]
        );
    }

    #[test]
    fn test_two_animations_are_each_destroyed_once() {
        let (driver, endpoint) = driver();
        let node = driver.create_node(NodeProps::new()).unwrap();
        let _ = sent(&endpoint);

        let animate = || {
            node.animate(
                AnimatableProps::new().with(Prop::X, 100.0),
                AnimationSettings::with_duration(500.0),
            )
            .unwrap()
        };
        let first = animate();
        let second = animate();
        let second_clone = second.clone();
        assert_eq!(
            sent(&endpoint),
            vec!["createAnimation{id: 1}", "createAnimation{id: 2}"]
        );

        drop(second);
        assert!(sent(&endpoint).is_empty());
        drop(first);
        drop(second_clone);

        let mut destroyed = sent(&endpoint);
        destroyed.sort();
        assert_eq!(
            destroyed,
            vec!["destroyAnimation{id: 1}", "destroyAnimation{id: 2}"]
        );
    }

    #[test]
    fn test_parent_change_goes_through_buffer() {
        let (driver, endpoint) = driver();
        let a = driver.create_node(NodeProps::new()).unwrap();
        let b = driver.create_node(NodeProps::new()).unwrap();
        let buffer = match endpoint.commands.try_iter().nth(1) {
            Some(ChannelMessage::Node {
                command: NodeCommand::Create { buffer, .. },
                ..
            }) => buffer,
            other => panic!("expected create, got {:?}", other),
        };

        b.set_parent(Some(&a));
        assert_eq!(buffer.parent(), Some(a.id()));
        assert!(sent(&endpoint).is_empty());
    }

    #[test]
    fn test_finished_event_refreshes_mirror_and_state() {
        let (driver, endpoint) = driver();
        let node = driver.create_node(NodeProps::new()).unwrap();
        let anim = node
            .animate(
                AnimatableProps::new().with(Prop::Y, 40.0),
                AnimationSettings::with_duration(10.0),
            )
            .unwrap();
        anim.start().unwrap();

        endpoint
            .events
            .send(AuthorityEvent::Stage(StageEvent::AnimationFinished {
                node: node.id(),
                animation: anim.id(),
                values: vec![(Prop::Y, 40.0)],
            }))
            .unwrap();
        driver.tick(Duration::ZERO).unwrap();

        assert_eq!(node.y(), 40.0);
        assert_eq!(anim.state(), AnimationState::Finished);
    }

    #[test]
    fn test_resource_outcomes_become_node_events() {
        let (driver, endpoint) = driver();
        let node = driver.create_node(NodeProps::new()).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        node.on(move |e| s.borrow_mut().push(e.clone()));

        let failure = ResourceError::Image {
            src: "img://2".to_string(),
            reason: "missing".to_string(),
        };
        for event in [
            StageEvent::TextureLoaded {
                node: node.id(),
                dimensions: Dimensions::new(3, 4),
            },
            StageEvent::ResourceFailed {
                node: node.id(),
                error: failure.clone(),
            },
        ] {
            endpoint.events.send(AuthorityEvent::Stage(event)).unwrap();
        }
        driver.tick(Duration::ZERO).unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![
                NodeEvent::Loaded(Dimensions::new(3, 4)),
                NodeEvent::Failed(failure)
            ]
        );
    }

    #[test]
    fn test_dropped_node_sends_destroy() {
        let (driver, endpoint) = driver();
        let node = driver.create_node(NodeProps::new()).unwrap();
        drop(node);
        assert_eq!(sent(&endpoint), vec!["create", "destroy"]);
        assert_eq!(driver.node_count(), 0);
    }

    #[test]
    fn test_disconnected_worker_is_transport_error() {
        let (driver, endpoint) = driver();
        let node = driver.create_node(NodeProps::new()).unwrap();
        drop(endpoint);
        let err = node.set_src("img://3").unwrap_err();
        assert!(matches!(err, RenderError::Transport(_)));
        assert!(node.texture().is_none());
        assert_eq!(node.src(), "");

        // A failed send leaves nothing bound, so retrying still reaches the channel
        assert!(matches!(node.set_src("img://3"), Err(RenderError::Transport(_))));
        let texture = TextureDesc::image("img://4");
        for _ in 0..2 {
            let err = node.set_texture(Some(texture.clone())).unwrap_err();
            assert!(matches!(err, RenderError::Transport(_)));
        }
        assert!(node.texture().is_none());

        let shader = ShaderDesc::new("RoundedRectangle", Default::default());
        assert!(node.set_shader(Some(shader.clone())).is_err());
        assert!(node.set_shader(Some(shader)).is_err());
        assert!(node.shader().is_none());
    }

    #[test]
    fn test_spawned_worker_round_trip() {
        struct Fixed;
        impl ImageResolver for Fixed {
            fn resolve(&self, _src: &str) -> Result<Dimensions, ResourceError> {
                Ok(Dimensions::new(64, 32))
            }
        }

        let driver = SharedDriver::spawn(
            WorkerConfig {
                frame_interval: Duration::from_millis(2),
            },
            Box::new(Fixed),
        )
        .unwrap();
        let node = driver.create_node(NodeProps::new()).unwrap();
        let loaded = Rc::new(Cell::new(None));
        let l = loaded.clone();
        node.on(move |e| {
            if let NodeEvent::Loaded(d) = e {
                l.set(Some(*d));
            }
        });
        node.set_src("img://hero").unwrap();

        for _ in 0..200 {
            driver.tick(Duration::ZERO).unwrap();
            if loaded.get().is_some() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(loaded.get(), Some(Dimensions::new(64, 32)));
    }
}
