//! Animation controllers.
//!
//! A controller is the application's handle on one animation. Both driver
//! variants hand out an [`AnimationHandle`]; when its last clone is dropped
//! the authority is told, exactly once, that the animation's bookkeeping
//! may go. A running animation still plays to the end.

use crate::error::RenderError;
use lumen_core::{AnimationId, AnimationState, NodeId, Stage};
use lumen_sync::{CommandSender, NodeCommand};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Playback control for one animation.
pub trait AnimationController {
    fn id(&self) -> AnimationId;

    fn start(&self) -> Result<(), RenderError>;

    fn pause(&self) -> Result<(), RenderError>;

    /// Stop and restore the values the animation started from.
    fn stop(&self) -> Result<(), RenderError>;

    fn state(&self) -> AnimationState;
}

/// Shared handle to an animation controller.
#[derive(Clone)]
pub struct AnimationHandle(Rc<dyn AnimationController>);

impl AnimationHandle {
    pub(crate) fn new(controller: impl AnimationController + 'static) -> Self {
        Self(Rc::new(controller))
    }

    pub fn id(&self) -> AnimationId {
        self.0.id()
    }

    /// Start, or resume after a pause. Chainable.
    pub fn start(&self) -> Result<&Self, RenderError> {
        self.0.start()?;
        Ok(self)
    }

    pub fn pause(&self) -> Result<&Self, RenderError> {
        self.0.pause()?;
        Ok(self)
    }

    pub fn stop(&self) -> Result<&Self, RenderError> {
        self.0.stop()?;
        Ok(self)
    }

    pub fn state(&self) -> AnimationState {
        self.0.state()
    }

    /// Give up this handle now rather than at end of scope.
    pub fn release(self) {
        drop(self);
    }
}

impl fmt::Debug for AnimationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationHandle")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

/// Controller driving an animation on the in-process stage.
pub struct DirectAnimationController {
    stage: Rc<RefCell<Stage>>,
    node: NodeId,
    id: AnimationId,
}

impl DirectAnimationController {
    pub(crate) fn new(stage: Rc<RefCell<Stage>>, node: NodeId, id: AnimationId) -> Self {
        Self { stage, node, id }
    }
}

impl AnimationController for DirectAnimationController {
    fn id(&self) -> AnimationId {
        self.id
    }

    fn start(&self) -> Result<(), RenderError> {
        self.stage.borrow_mut().start_animation(self.node, self.id);
        Ok(())
    }

    fn pause(&self) -> Result<(), RenderError> {
        self.stage.borrow_mut().pause_animation(self.node, self.id);
        Ok(())
    }

    fn stop(&self) -> Result<(), RenderError> {
        self.stage.borrow_mut().stop_animation(self.node, self.id);
        Ok(())
    }

    fn state(&self) -> AnimationState {
        self.stage
            .borrow()
            .animation_state(self.node, self.id)
            .unwrap_or(AnimationState::Finished)
    }
}

impl Drop for DirectAnimationController {
    fn drop(&mut self) {
        match self.stage.try_borrow_mut() {
            Ok(mut stage) => stage.release_animation(self.node, self.id),
            Err(_) => debug!("Stage busy, leaving {} {} to the node", self.node, self.id),
        }
    }
}

/// Controller forwarding playback commands to the render worker.
///
/// State is tracked locally: commands update it optimistically and a
/// finished outcome from the worker marks it [`AnimationState::Finished`].
pub struct SharedAnimationController {
    node: NodeId,
    id: AnimationId,
    sender: CommandSender,
    state: Rc<Cell<AnimationState>>,
}

impl SharedAnimationController {
    pub(crate) fn new(
        node: NodeId,
        id: AnimationId,
        sender: CommandSender,
        state: Rc<Cell<AnimationState>>,
    ) -> Self {
        Self {
            node,
            id,
            sender,
            state,
        }
    }

    fn send(&self, command: NodeCommand, next: AnimationState) -> Result<(), RenderError> {
        self.sender.send(self.node, command)?;
        self.state.set(next);
        Ok(())
    }
}

impl AnimationController for SharedAnimationController {
    fn id(&self) -> AnimationId {
        self.id
    }

    fn start(&self) -> Result<(), RenderError> {
        self.send(NodeCommand::StartAnimation { id: self.id }, AnimationState::Running)
    }

    fn pause(&self) -> Result<(), RenderError> {
        self.send(NodeCommand::PauseAnimation { id: self.id }, AnimationState::Paused)
    }

    fn stop(&self) -> Result<(), RenderError> {
        self.send(NodeCommand::StopAnimation { id: self.id }, AnimationState::Stopped)
    }

    fn state(&self) -> AnimationState {
        self.state.get()
    }
}

impl Drop for SharedAnimationController {
    fn drop(&mut self) {
        if let Err(e) = self
            .sender
            .send(self.node, NodeCommand::DestroyAnimation { id: self.id })
        {
            debug!("{} {} released after worker exit: {}", self.node, self.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_sync::{ChannelMessage, SyncChannel};

    fn commands(endpoint: &lumen_sync::WorkerEndpoint) -> Vec<String> {
        endpoint
            .commands
            .try_iter()
            .filter_map(|m| match m {
                ChannelMessage::Node { command, .. } => Some(command.to_string()),
                ChannelMessage::Shutdown => None,
            })
            .collect()
    }

    fn shared(channel: &SyncChannel, id: u32) -> AnimationHandle {
        AnimationHandle::new(SharedAnimationController::new(
            NodeId::new(7),
            AnimationId(id),
            channel.sender(),
            Rc::new(Cell::new(AnimationState::Stopped)),
        ))
    }

    #[test]
    fn test_last_clone_sends_destroy_once() {
        let (channel, endpoint) = SyncChannel::pair();
        let handle = shared(&channel, 3);
        let clone = handle.clone();

        drop(handle);
        assert!(commands(&endpoint).is_empty());

        drop(clone);
        assert_eq!(commands(&endpoint), vec!["destroyAnimation{id: 3}"]);
    }

    #[test]
    fn test_scoped_release() {
        let (channel, endpoint) = SyncChannel::pair();
        let handle = shared(&channel, 1);
        handle.start().unwrap().pause().unwrap();
        assert_eq!(handle.state(), AnimationState::Paused);
        handle.release();

        assert_eq!(
            commands(&endpoint),
            vec![
                "startAnimation{id: 1}",
                "pauseAnimation{id: 1}",
                "destroyAnimation{id: 1}"
            ]
        );
    }

    #[test]
    fn test_release_after_worker_gone_is_quiet() {
        let (channel, endpoint) = SyncChannel::pair();
        let handle = shared(&channel, 2);
        drop(endpoint);
        assert!(handle.start().is_err());
        assert_eq!(handle.state(), AnimationState::Stopped);
        drop(handle);
    }
}
