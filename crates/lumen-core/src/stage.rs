//! The render authority.
//!
//! A [`Stage`] owns the ground-truth state of every node it renders: the
//! property store, tree links, bound texture and shader, and the animations
//! running against it. Slow work (texture resolution) is queued and only
//! performed on [`Stage::update`], which returns the outcomes as events.

use crate::animation::{AnimatableProps, AnimationSettings, AnimationState, CoreAnimation};
use crate::error::{AnimationError, ResourceError};
use crate::id::{AnimationId, NodeId};
use crate::props::{NodeProps, Prop};
use crate::shader::{ShaderDesc, ShaderRegistry};
use crate::texture::{resolve_dimensions, Dimensions, ImageResolver, TextureDesc};
use glam::{Affine2, Vec2};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Outcome raised by the authority for a specific node.
#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    /// Texture finished loading
    TextureLoaded { node: NodeId, dimensions: Dimensions },
    /// Texture or shader could not be made ready
    ResourceFailed { node: NodeId, error: ResourceError },
    /// Animation played to completion; `values` are the final target values
    AnimationFinished {
        node: NodeId,
        animation: AnimationId,
        values: Vec<(Prop, f64)>,
    },
}

impl StageEvent {
    pub fn node(&self) -> NodeId {
        match self {
            Self::TextureLoaded { node, .. }
            | Self::ResourceFailed { node, .. }
            | Self::AnimationFinished { node, .. } => *node,
        }
    }
}

/// Authority-side state of one node.
#[derive(Debug, Clone)]
pub struct CoreNode {
    props: NodeProps,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    texture: Option<TextureDesc>,
    texture_dimensions: Option<Dimensions>,
    shader: Option<ShaderDesc>,
    world: Affine2,
    world_alpha: f32,
}

impl CoreNode {
    fn new(props: NodeProps) -> Self {
        Self {
            props,
            parent: None,
            children: Vec::new(),
            texture: None,
            texture_dimensions: None,
            shader: None,
            world: Affine2::IDENTITY,
            world_alpha: 1.0,
        }
    }

    pub fn props(&self) -> &NodeProps {
        &self.props
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn texture(&self) -> Option<&TextureDesc> {
        self.texture.as_ref()
    }

    /// Dimensions of the bound texture once it has loaded.
    pub fn texture_dimensions(&self) -> Option<Dimensions> {
        self.texture_dimensions
    }

    pub fn shader(&self) -> Option<&ShaderDesc> {
        self.shader.as_ref()
    }

    /// World transform as of the last update.
    pub fn world_transform(&self) -> Affine2 {
        self.world
    }

    pub fn world_alpha(&self) -> f32 {
        self.world_alpha
    }

    fn local_transform(&self) -> Affine2 {
        let p = &self.props;
        let size = Vec2::new(p.get(Prop::Width) as f32, p.get(Prop::Height) as f32);
        let mount = Vec2::new(p.get(Prop::MountX) as f32, p.get(Prop::MountY) as f32);
        let pivot = Vec2::new(p.get(Prop::PivotX) as f32, p.get(Prop::PivotY) as f32) * size;
        let scale = Vec2::new(p.get(Prop::ScaleX) as f32, p.get(Prop::ScaleY) as f32);
        let position = Vec2::new(p.get(Prop::X) as f32, p.get(Prop::Y) as f32) - mount * size;

        Affine2::from_translation(position + pivot)
            * Affine2::from_angle(p.get(Prop::Rotation) as f32)
            * Affine2::from_scale(scale)
            * Affine2::from_translation(-pivot)
    }
}

/// One entry of the paint-ordered render list.
#[derive(Debug, Clone)]
pub struct RenderItem {
    pub node: NodeId,
    pub transform: Affine2,
    pub alpha: f32,
    pub width: f32,
    pub height: f32,
    /// Corner colors: top-left, top-right, bottom-right, bottom-left
    pub colors: [u32; 4],
    pub texture: Option<TextureDesc>,
    pub shader: Option<ShaderDesc>,
}

#[derive(Debug)]
struct AnimationEntry {
    animation: CoreAnimation,
    /// No controller references this animation any more
    released: bool,
}

/// Owns every node of a scene and the work performed against them.
pub struct Stage {
    nodes: HashMap<NodeId, CoreNode>,
    pending_textures: VecDeque<(NodeId, TextureDesc)>,
    animations: BTreeMap<(NodeId, AnimationId), AnimationEntry>,
    images: Box<dyn ImageResolver>,
    shaders: ShaderRegistry,
    events: Vec<StageEvent>,
    draw_order: Vec<NodeId>,
}

impl Stage {
    /// Create a stage that resolves images with `images`.
    pub fn new(images: Box<dyn ImageResolver>) -> Self {
        Self::with_shaders(images, ShaderRegistry::default())
    }

    pub fn with_shaders(images: Box<dyn ImageResolver>, shaders: ShaderRegistry) -> Self {
        Self {
            nodes: HashMap::new(),
            pending_textures: VecDeque::new(),
            animations: BTreeMap::new(),
            images,
            shaders,
            events: Vec::new(),
            draw_order: Vec::new(),
        }
    }

    // ===== Nodes =====

    pub fn create_node(&mut self, id: NodeId, props: NodeProps) {
        if self.nodes.insert(id, CoreNode::new(props)).is_some() {
            warn!("{} created twice, previous state discarded", id);
        }
        trace!("Created {}", id);
    }

    /// Remove a node. Its children become roots and its animations end.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        if !self.nodes.contains_key(&id) {
            return false;
        }
        self.set_parent(id, None);
        if let Some(node) = self.nodes.remove(&id) {
            for child in node.children {
                if let Some(c) = self.nodes.get_mut(&child) {
                    c.parent = None;
                }
            }
        }
        self.animations.retain(|(owner, _), _| *owner != id);
        trace!("Removed {}", id);
        true
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&CoreNode> {
        self.nodes.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn props(&self, id: NodeId) -> Option<&NodeProps> {
        self.nodes.get(&id).map(|n| &n.props)
    }

    pub fn set_prop(&mut self, id: NodeId, prop: Prop, value: f64) {
        match self.nodes.get_mut(&id) {
            Some(node) => node.props.set(prop, value),
            None => warn!("set {} on unknown {}", prop, id),
        }
    }

    /// Write a single already-expanded property slot.
    pub fn set_slot(&mut self, id: NodeId, slot: usize, value: f64) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.props.set_slot(slot, value);
        }
    }

    /// Re-link `child` under `parent`, or make it a root.
    ///
    /// Unknown parents and links that would form a cycle leave the child a
    /// root.
    pub fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) {
        let Some(old) = self.nodes.get(&child).map(|n| n.parent) else {
            warn!("set_parent on unknown {}", child);
            return;
        };
        if old == parent {
            return;
        }

        if let Some(old_parent) = old.and_then(|p| self.nodes.get_mut(&p)) {
            old_parent.children.retain(|c| *c != child);
        }

        let parent = match parent {
            Some(p) if !self.nodes.contains_key(&p) => {
                warn!("{} parented to unknown {}, left as root", child, p);
                None
            }
            Some(p) if self.is_ancestor_or_self(child, p) => {
                warn!("{} cannot be parented under its own subtree {}", child, p);
                None
            }
            other => other,
        };

        if let Some(parent_node) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent_node.children.push(child);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = parent;
        }
    }

    /// Whether `child` could be linked under `parent` right now.
    pub fn can_parent(&self, child: NodeId, parent: NodeId) -> bool {
        self.nodes.contains_key(&child)
            && self.nodes.contains_key(&parent)
            && !self.is_ancestor_or_self(child, parent)
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, mut id: NodeId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.nodes.get(&id).and_then(|n| n.parent) {
                Some(p) => id = p,
                None => return false,
            }
        }
    }

    // ===== Resources =====

    /// Queue a texture load. The outcome is reported by a later `update`.
    pub fn load_texture(&mut self, id: NodeId, texture: TextureDesc) {
        let Some(node) = self.nodes.get_mut(&id) else {
            warn!("loadTexture on unknown {}", id);
            return;
        };
        node.texture = Some(texture.clone());
        node.texture_dimensions = None;
        self.pending_textures.push_back((id, texture));
    }

    pub fn unload_texture(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.texture = None;
            node.texture_dimensions = None;
        }
    }

    /// Bind a shader program. Failures are reported by the next `update`.
    pub fn load_shader(&mut self, id: NodeId, shader: ShaderDesc) {
        let Some(node) = self.nodes.get_mut(&id) else {
            warn!("loadShader on unknown {}", id);
            return;
        };
        match self.shaders.validate(&shader) {
            Ok(()) => node.shader = Some(shader),
            Err(error) => {
                debug!("{} shader {} rejected: {}", id, shader.shader_type(), error);
                node.shader = None;
                self.events.push(StageEvent::ResourceFailed { node: id, error });
            }
        }
    }

    pub fn pending_texture_loads(&self) -> usize {
        self.pending_textures.len()
    }

    fn process_texture_loads(&mut self) {
        while let Some((id, texture)) = self.pending_textures.pop_front() {
            let current = self
                .nodes
                .get(&id)
                .and_then(|n| n.texture.as_ref())
                .is_some_and(|t| t.same(&texture));
            if !current {
                trace!("Skipping stale texture load for {}", id);
                continue;
            }

            match resolve_dimensions(&texture, self.images.as_ref()) {
                Ok(dimensions) => {
                    if let Some(node) = self.nodes.get_mut(&id) {
                        node.texture_dimensions = Some(dimensions);
                    }
                    self.events.push(StageEvent::TextureLoaded { node: id, dimensions });
                }
                Err(error) => {
                    debug!("{} texture failed: {}", id, error);
                    self.events.push(StageEvent::ResourceFailed { node: id, error });
                }
            }
        }
    }

    // ===== Animations =====

    pub fn create_animation(
        &mut self,
        node: NodeId,
        id: AnimationId,
        targets: AnimatableProps,
        settings: AnimationSettings,
    ) -> Result<(), AnimationError> {
        let animation = CoreAnimation::new(targets, settings)?;
        self.animations.insert(
            (node, id),
            AnimationEntry {
                animation,
                released: false,
            },
        );
        Ok(())
    }

    pub fn start_animation(&mut self, node: NodeId, id: AnimationId) -> bool {
        let Some(props) = self.nodes.get(&node).map(|n| &n.props) else {
            return false;
        };
        match self.animations.get_mut(&(node, id)) {
            Some(entry) => {
                entry.animation.start(props);
                true
            }
            None => false,
        }
    }

    pub fn pause_animation(&mut self, node: NodeId, id: AnimationId) -> bool {
        match self.animations.get_mut(&(node, id)) {
            Some(entry) => {
                entry.animation.pause();
                true
            }
            None => false,
        }
    }

    pub fn stop_animation(&mut self, node: NodeId, id: AnimationId) -> bool {
        let (Some(entry), Some(core)) = (self.animations.get_mut(&(node, id)), self.nodes.get_mut(&node))
        else {
            return false;
        };
        entry.animation.stop(&mut core.props);
        true
    }

    /// Drop the bookkeeping for an animation whose controller is gone.
    ///
    /// A running animation plays on and is removed when it finishes.
    pub fn release_animation(&mut self, node: NodeId, id: AnimationId) {
        let key = (node, id);
        let running = match self.animations.get_mut(&key) {
            Some(entry) if entry.animation.state() == AnimationState::Running => {
                entry.released = true;
                true
            }
            Some(_) => false,
            None => return,
        };
        if !running {
            self.animations.remove(&key);
        }
    }

    pub fn animation_state(&self, node: NodeId, id: AnimationId) -> Option<AnimationState> {
        self.animations.get(&(node, id)).map(|e| e.animation.state())
    }

    pub fn animation_count(&self) -> usize {
        self.animations.len()
    }

    fn tick_animations(&mut self, dt_ms: f64) {
        let mut finished_released = Vec::new();
        for (&(node_id, anim_id), entry) in self.animations.iter_mut() {
            let Some(node) = self.nodes.get_mut(&node_id) else {
                continue;
            };
            if entry.animation.tick(dt_ms, &mut node.props) {
                let values = entry.animation.targets().iter().copied().collect();
                self.events.push(StageEvent::AnimationFinished {
                    node: node_id,
                    animation: anim_id,
                    values,
                });
                if entry.released {
                    finished_released.push((node_id, anim_id));
                }
            }
        }
        for key in finished_released {
            self.animations.remove(&key);
        }
    }

    /// Run one frame: resolve queued textures, advance animations, recompute
    /// world transforms. Returns the outcomes raised since the last update.
    pub fn update(&mut self, dt: Duration) -> Vec<StageEvent> {
        self.process_texture_loads();
        self.tick_animations(dt.as_secs_f64() * 1000.0);
        self.update_world();
        std::mem::take(&mut self.events)
    }

    fn update_world(&mut self) {
        let mut roots: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.parent.is_none())
            .map(|(id, _)| *id)
            .collect();
        roots.sort();

        self.draw_order.clear();
        let mut stack: Vec<(NodeId, Affine2, f32)> = roots
            .into_iter()
            .rev()
            .map(|id| (id, Affine2::IDENTITY, 1.0))
            .collect();

        while let Some((id, parent_world, parent_alpha)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            node.world = parent_world * node.local_transform();
            node.world_alpha = parent_alpha * node.props.get(Prop::Alpha) as f32;
            self.draw_order.push(id);

            let (world, alpha) = (node.world, node.world_alpha);
            let mut children: Vec<(usize, NodeId)> = node.children.iter().copied().enumerate().collect();
            children.sort_by_key(|(i, c)| {
                let z = self.nodes.get(c).map_or(0, |n| n.props.z_index());
                (z, *i)
            });
            for (_, child) in children.into_iter().rev() {
                stack.push((child, world, alpha));
            }
        }
    }

    /// Visible nodes in paint order as of the last update.
    pub fn render_list(&self) -> Vec<RenderItem> {
        self.draw_order
            .iter()
            .filter_map(|id| {
                let node = self.nodes.get(id)?;
                if node.world_alpha <= 0.0 {
                    return None;
                }
                let p = &node.props;
                Some(RenderItem {
                    node: *id,
                    transform: node.world,
                    alpha: node.world_alpha,
                    width: p.get(Prop::Width) as f32,
                    height: p.get(Prop::Height) as f32,
                    colors: [
                        p.color(Prop::ColorTl),
                        p.color(Prop::ColorTr),
                        p.color(Prop::ColorBr),
                        p.color(Prop::ColorBl),
                    ],
                    texture: node.texture.clone(),
                    shader: node.shader.clone(),
                })
            })
            .collect()
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("nodes", &self.nodes.len())
            .field("pending_textures", &self.pending_textures.len())
            .field("animations", &self.animations.len())
            .finish()
    }
}
