//! Direct driver: nodes talk to an in-process stage.

use crate::controller::{AnimationHandle, DirectAnimationController};
use crate::driver::{DriverKind, RenderDriver};
use crate::error::RenderError;
use crate::node::{Node, NodeProxy, NodeRegistry};
use lumen_core::{
    AnimatableProps, AnimationId, AnimationSettings, ImageResolver, NodeId, NodeProps, Prop,
    ShaderDesc, Stage, TextureDesc,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info};

/// Proxy that reads and writes the authority's own node state.
pub struct DirectNode {
    id: NodeId,
    stage: Rc<RefCell<Stage>>,
    next_animation: Cell<AnimationId>,
}

impl DirectNode {
    fn new(stage: Rc<RefCell<Stage>>, props: NodeProps) -> Self {
        let id = NodeId::next();
        stage.borrow_mut().create_node(id, props);
        Self {
            id,
            stage,
            next_animation: Cell::new(AnimationId::FIRST),
        }
    }
}

impl NodeProxy for DirectNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn get(&self, prop: Prop) -> f64 {
        self.stage
            .borrow()
            .props(self.id)
            .map_or(0.0, |props| props.get(prop))
    }

    fn set(&self, prop: Prop, value: f64) {
        self.stage.borrow_mut().set_prop(self.id, prop, value);
    }

    fn set_parent_id(&self, parent: Option<NodeId>) {
        self.stage.borrow_mut().set_parent(self.id, parent);
    }

    fn load_texture(&self, texture: &TextureDesc) -> Result<(), RenderError> {
        self.stage.borrow_mut().load_texture(self.id, texture.clone());
        Ok(())
    }

    fn unload_texture(&self) -> Result<(), RenderError> {
        self.stage.borrow_mut().unload_texture(self.id);
        Ok(())
    }

    fn load_shader(&self, shader: &ShaderDesc) -> Result<(), RenderError> {
        self.stage.borrow_mut().load_shader(self.id, shader.clone());
        Ok(())
    }

    fn animate(
        &self,
        props: AnimatableProps,
        settings: AnimationSettings,
    ) -> Result<AnimationHandle, RenderError> {
        let id = self.next_animation.get();
        self.next_animation.set(id.succ());
        self.stage
            .borrow_mut()
            .create_animation(self.id, id, props, settings)?;
        Ok(AnimationHandle::new(DirectAnimationController::new(
            self.stage.clone(),
            self.id,
            id,
        )))
    }

    fn release(&self) {
        match self.stage.try_borrow_mut() {
            Ok(mut stage) => {
                stage.remove_node(self.id);
            }
            Err(_) => debug!("Stage busy, {} left in place", self.id),
        }
    }
}

/// Driver whose render authority lives on the calling thread.
pub struct DirectDriver {
    stage: Rc<RefCell<Stage>>,
    registry: NodeRegistry,
}

impl DirectDriver {
    pub fn new(images: Box<dyn ImageResolver>) -> Self {
        info!("Using direct render driver");
        Self::with_stage(Stage::new(images))
    }

    pub fn with_stage(stage: Stage) -> Self {
        Self {
            stage: Rc::new(RefCell::new(stage)),
            registry: NodeRegistry::default(),
        }
    }

    /// The in-process authority.
    pub fn stage(&self) -> &Rc<RefCell<Stage>> {
        &self.stage
    }
}

impl RenderDriver for DirectDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Direct
    }

    fn create_node(&self, props: NodeProps) -> Result<Node, RenderError> {
        let node = Node::new(Box::new(DirectNode::new(self.stage.clone(), props)));
        self.registry.insert(&node);
        Ok(node)
    }

    fn tick(&self, dt: Duration) -> Result<(), RenderError> {
        let events = self.stage.borrow_mut().update(dt);
        for event in &events {
            self.registry.dispatch(event);
        }
        self.registry.prune();
        Ok(())
    }

    fn node_count(&self) -> usize {
        self.registry.len()
    }
}
