//! Lumen Core - Render Authority
//!
//! Ground-truth scene state for the Lumen renderer:
//! - Node property store and identifiers
//! - Texture and shader descriptors compared by identity
//! - Property animations
//! - The `Stage` that owns nodes, resolves resources and ticks animations

mod animation;
mod error;
mod event;
mod id;
mod props;
mod shader;
mod stage;
mod texture;

pub use animation::{AnimatableProps, AnimationSettings, AnimationState, CoreAnimation, Easing};
pub use error::{AnimationError, ResourceError};
pub use event::{EventEmitter, ListenerId, NodeEvent};
pub use id::{AnimationId, NodeId};
pub use props::{unpack_rgba, NodeProps, Prop};
pub use shader::{ShaderDesc, ShaderProps, ShaderRegistry, ShaderValue};
pub use stage::{CoreNode, RenderItem, Stage, StageEvent};
pub use texture::{
    resolve_dimensions, Dimensions, FsImageResolver, ImageResolver, TextureDesc, TextureKind,
    TextureOptions,
};
