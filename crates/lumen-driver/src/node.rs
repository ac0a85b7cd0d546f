//! The application-facing node handle.
//!
//! A [`Node`] looks the same whichever driver created it. Tree membership,
//! `src` and the current texture/shader descriptors are tracked here so
//! tree queries and no-op detection never cross to the authority; every
//! other operation goes through the node's [`NodeProxy`].

use crate::controller::AnimationHandle;
use crate::error::RenderError;
use lumen_core::{
    AnimatableProps, AnimationId, AnimationSettings, CoreAnimation, EventEmitter, ListenerId,
    NodeEvent, NodeId, Prop, ShaderDesc, StageEvent, TextureDesc,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::trace;

/// Per-driver access to a node's render authority.
pub trait NodeProxy {
    fn id(&self) -> NodeId;

    fn get(&self, prop: Prop) -> f64;

    fn set(&self, prop: Prop, value: f64);

    /// Tell the authority about a new parent.
    fn set_parent_id(&self, parent: Option<NodeId>);

    fn load_texture(&self, texture: &TextureDesc) -> Result<(), RenderError>;

    fn unload_texture(&self) -> Result<(), RenderError>;

    fn load_shader(&self, shader: &ShaderDesc) -> Result<(), RenderError>;

    /// Create an animation. Settings have already been validated.
    fn animate(
        &self,
        props: AnimatableProps,
        settings: AnimationSettings,
    ) -> Result<AnimationHandle, RenderError>;

    /// The authority finished animation `id`, leaving `values` applied.
    fn animation_finished(&self, _id: AnimationId, _values: &[(Prop, f64)]) {}

    /// The last handle to the node is gone.
    fn release(&self);
}

struct NodeInner {
    proxy: Box<dyn NodeProxy>,
    parent: RefCell<Weak<NodeInner>>,
    children: RefCell<Vec<Node>>,
    src: RefCell<String>,
    texture: RefCell<Option<TextureDesc>>,
    shader: RefCell<Option<ShaderDesc>>,
    events: EventEmitter<NodeEvent>,
}

impl Drop for NodeInner {
    fn drop(&mut self) {
        for child in self.children.get_mut().drain(..) {
            *child.inner.parent.borrow_mut() = Weak::new();
            child.inner.proxy.set_parent_id(None);
        }
        trace!("Releasing {}", self.proxy.id());
        self.proxy.release();
    }
}

/// A visual node in the scene graph. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Node {
    inner: Rc<NodeInner>,
}

macro_rules! numeric_props {
    ($($get:ident / $set:ident => $prop:ident),* $(,)?) => {
        $(
            pub fn $get(&self) -> f64 {
                self.get(Prop::$prop)
            }

            pub fn $set(&self, value: f64) {
                self.set(Prop::$prop, value);
            }
        )*
    };
}

impl Node {
    pub(crate) fn new(proxy: Box<dyn NodeProxy>) -> Self {
        Self {
            inner: Rc::new(NodeInner {
                proxy,
                parent: RefCell::new(Weak::new()),
                children: RefCell::new(Vec::new()),
                src: RefCell::new(String::new()),
                texture: RefCell::new(None),
                shader: RefCell::new(None),
                events: EventEmitter::new(),
            }),
        }
    }

    pub fn id(&self) -> NodeId {
        self.inner.proxy.id()
    }

    // ===== Properties =====

    pub fn get(&self, prop: Prop) -> f64 {
        self.inner.proxy.get(prop)
    }

    pub fn set(&self, prop: Prop, value: f64) {
        self.inner.proxy.set(prop, value);
    }

    numeric_props! {
        x / set_x => X,
        y / set_y => Y,
        width / set_width => Width,
        height / set_height => Height,
        alpha / set_alpha => Alpha,
        scale / set_scale => Scale,
        rotation / set_rotation => Rotation,
        mount / set_mount => Mount,
        pivot / set_pivot => Pivot,
    }

    /// Read a color property as packed `0xRRGGBBAA`.
    pub fn color(&self, prop: Prop) -> u32 {
        self.get(prop) as u32
    }

    pub fn set_color(&self, prop: Prop, rgba: u32) {
        self.set(prop, f64::from(rgba));
    }

    pub fn z_index(&self) -> i32 {
        self.get(Prop::ZIndex) as i32
    }

    pub fn set_z_index(&self, z: i32) {
        self.set(Prop::ZIndex, f64::from(z));
    }

    // ===== Parent/Child =====

    pub fn parent(&self) -> Option<Node> {
        self.inner.parent.borrow().upgrade().map(|inner| Node { inner })
    }

    pub fn children(&self) -> Vec<Node> {
        self.inner.children.borrow().clone()
    }

    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    /// Move this node under `new_parent`, or detach it with `None`.
    ///
    /// # Panics
    ///
    /// If the node is missing from its current parent's child list, or if
    /// `new_parent` is this node or one of its descendants. Both mean the
    /// tree is already corrupt.
    pub fn set_parent(&self, new_parent: Option<&Node>) {
        let old_parent = self.inner.parent.borrow().upgrade();
        if old_parent.is_none() && new_parent.is_none() {
            return;
        }
        if let Some(p) = new_parent {
            assert!(
                !p.is_self_or_descendant_of(self),
                "Node.parent: {} cannot be parented under its own subtree",
                self.id()
            );
        }

        *self.inner.parent.borrow_mut() = new_parent.map_or_else(Weak::new, |p| Rc::downgrade(&p.inner));
        self.inner.proxy.set_parent_id(new_parent.map(Node::id));

        if let Some(old) = old_parent {
            let mut siblings = old.children.borrow_mut();
            let index = siblings.iter().position(|c| Rc::ptr_eq(&c.inner, &self.inner));
            assert!(
                index.is_some(),
                "Node.parent: {} not found in old parent's children!",
                self.id()
            );
            if let Some(i) = index {
                siblings.remove(i);
            }
        }
        if let Some(p) = new_parent {
            p.inner.children.borrow_mut().push(self.clone());
        }
    }

    fn is_self_or_descendant_of(&self, ancestor: &Node) -> bool {
        let mut cur = Some(self.clone());
        while let Some(node) = cur {
            if node == *ancestor {
                return true;
            }
            cur = node.parent();
        }
        false
    }

    // ===== Resources =====

    pub fn src(&self) -> String {
        self.inner.src.borrow().clone()
    }

    /// Point the node at an image. Re-setting the current value does
    /// nothing; an empty string clears the texture.
    pub fn set_src(&self, src: &str) -> Result<(), RenderError> {
        if *self.inner.src.borrow() == src {
            return Ok(());
        }
        if src.is_empty() {
            self.set_texture(None)?;
        } else {
            self.set_texture(Some(TextureDesc::image(src)))?;
        }
        *self.inner.src.borrow_mut() = src.to_string();
        Ok(())
    }

    pub fn texture(&self) -> Option<TextureDesc> {
        self.inner.texture.borrow().clone()
    }

    /// Bind a texture, or unload with `None`. Assigning the descriptor
    /// already bound does nothing. The local descriptor only changes once
    /// the proxy accepted the request.
    pub fn set_texture(&self, texture: Option<TextureDesc>) -> Result<(), RenderError> {
        if *self.inner.texture.borrow() == texture {
            return Ok(());
        }
        match &texture {
            Some(t) => self.inner.proxy.load_texture(t)?,
            None => self.inner.proxy.unload_texture()?,
        }
        *self.inner.texture.borrow_mut() = texture;
        Ok(())
    }

    pub fn shader(&self) -> Option<ShaderDesc> {
        self.inner.shader.borrow().clone()
    }

    /// Bind a shader. Assigning the descriptor already bound does nothing;
    /// `None` only forgets the local descriptor.
    pub fn set_shader(&self, shader: Option<ShaderDesc>) -> Result<(), RenderError> {
        if *self.inner.shader.borrow() == shader {
            return Ok(());
        }
        if let Some(s) = &shader {
            self.inner.proxy.load_shader(s)?;
        }
        *self.inner.shader.borrow_mut() = shader;
        Ok(())
    }

    /// Animate properties towards `props`.
    ///
    /// Invalid settings or an empty target list fail here, before anything
    /// reaches the authority.
    pub fn animate(
        &self,
        props: AnimatableProps,
        settings: AnimationSettings,
    ) -> Result<AnimationHandle, RenderError> {
        CoreAnimation::new(props.clone(), settings.clone())?;
        self.inner.proxy.animate(props, settings)
    }

    /// Detach the node and drop its listeners.
    pub fn destroy(&self) {
        self.inner.events.emit(&NodeEvent::BeforeDestroy);
        self.set_parent(None);
        self.inner.events.emit(&NodeEvent::AfterDestroy);
        self.inner.events.remove_all_listeners();
    }

    // ===== Events =====

    pub fn on(&self, handler: impl Fn(&NodeEvent) + 'static) -> ListenerId {
        self.inner.events.on(handler)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.events.off(id)
    }

    /// Route an authority outcome to this node.
    pub(crate) fn handle_authority_event(&self, event: &StageEvent) {
        match event {
            StageEvent::TextureLoaded { dimensions, .. } => {
                self.inner.events.emit(&NodeEvent::Loaded(*dimensions));
            }
            StageEvent::ResourceFailed { error, .. } => {
                self.inner.events.emit(&NodeEvent::Failed(error.clone()));
            }
            StageEvent::AnimationFinished {
                animation, values, ..
            } => self.inner.proxy.animation_finished(*animation, values),
        }
    }

    fn downgrade(&self) -> Weak<NodeInner> {
        Rc::downgrade(&self.inner)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id())
            .field("parent", &self.parent().map(|p| p.id()))
            .field("children", &self.child_count())
            .finish()
    }
}

/// Live nodes of one driver, for routing authority outcomes.
#[derive(Default)]
pub(crate) struct NodeRegistry {
    nodes: RefCell<HashMap<NodeId, Weak<NodeInner>>>,
}

impl NodeRegistry {
    pub(crate) fn insert(&self, node: &Node) {
        self.nodes.borrow_mut().insert(node.id(), node.downgrade());
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<Node> {
        let inner = self.nodes.borrow().get(&id)?.upgrade()?;
        Some(Node { inner })
    }

    /// Deliver `event` to its node, if that node is still alive.
    pub(crate) fn dispatch(&self, event: &StageEvent) {
        match self.get(event.node()) {
            Some(node) => node.handle_authority_event(event),
            None => trace!("Dropping outcome for released {}", event.node()),
        }
    }

    /// Forget nodes whose last handle is gone.
    pub(crate) fn prune(&self) {
        self.nodes.borrow_mut().retain(|_, n| n.strong_count() > 0);
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.borrow().values().filter(|n| n.strong_count() > 0).count()
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry").field("live", &self.len()).finish()
    }
}
