//! Message types exchanged between node proxies and the render worker.

use crate::buffer::SharedPropertyBuffer;
use lumen_core::{
    AnimatableProps, AnimationId, AnimationSettings, NodeId, NodeProps, ShaderDesc, StageEvent,
    TextureDesc,
};
use std::fmt;
use std::sync::Arc;

/// Work a proxy asks the render authority to perform for one node.
///
/// Anything the command depends on travels in its payload; the shared
/// buffer may lag behind or run ahead of the command stream.
#[derive(Debug, Clone)]
pub enum NodeCommand {
    /// Register a node with its shared buffer and initial properties
    Create {
        buffer: Arc<SharedPropertyBuffer>,
        props: NodeProps,
    },
    /// Load and bind a texture
    LoadTexture { texture: TextureDesc },
    /// Release the bound texture
    UnloadTexture,
    /// Bind a shader program
    LoadShader { shader: ShaderDesc },
    /// Instantiate an animation under a node-scoped id
    CreateAnimation {
        id: AnimationId,
        props: AnimatableProps,
        settings: AnimationSettings,
    },
    /// Start or resume an animation
    StartAnimation { id: AnimationId },
    /// Pause a running animation
    PauseAnimation { id: AnimationId },
    /// Stop an animation and restore its start values
    StopAnimation { id: AnimationId },
    /// The controller for an animation is gone
    DestroyAnimation { id: AnimationId },
    /// Drop the node
    Destroy,
}

impl NodeCommand {
    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::LoadTexture { .. } => "loadTexture",
            Self::UnloadTexture => "unloadTexture",
            Self::LoadShader { .. } => "loadShader",
            Self::CreateAnimation { .. } => "createAnimation",
            Self::StartAnimation { .. } => "startAnimation",
            Self::PauseAnimation { .. } => "pauseAnimation",
            Self::StopAnimation { .. } => "stopAnimation",
            Self::DestroyAnimation { .. } => "destroyAnimation",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Display for NodeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateAnimation { id, .. }
            | Self::StartAnimation { id }
            | Self::PauseAnimation { id }
            | Self::StopAnimation { id }
            | Self::DestroyAnimation { id } => write!(f, "{}{{id: {}}}", self.name(), id.0),
            _ => f.write_str(self.name()),
        }
    }
}

/// Messages sent from the calling thread to the render worker.
#[derive(Debug, Clone)]
pub enum ChannelMessage {
    /// A command addressed to one node
    Node { node: NodeId, command: NodeCommand },
    /// Graceful shutdown request
    Shutdown,
}

/// Messages sent from the render worker back to the calling thread.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthorityEvent {
    /// Outcome raised by the authority's stage
    Stage(StageEvent),
    /// A command panicked or was rejected while being applied
    CommandFailed {
        node: NodeId,
        command: &'static str,
        error: String,
    },
}

impl AuthorityEvent {
    pub fn node(&self) -> NodeId {
        match self {
            Self::Stage(event) => event.node(),
            Self::CommandFailed { node, .. } => *node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_names() {
        assert_eq!(NodeCommand::UnloadTexture.name(), "unloadTexture");
        assert_eq!(
            NodeCommand::DestroyAnimation { id: AnimationId(3) }.to_string(),
            "destroyAnimation{id: 3}"
        );
        assert_eq!(
            NodeCommand::LoadTexture {
                texture: TextureDesc::image("img://1")
            }
            .to_string(),
            "loadTexture"
        );
    }
}
