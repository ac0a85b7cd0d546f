//! Render worker thread with panic isolation.
//!
//! The worker owns the authoritative [`Stage`]. It applies node commands in
//! the order they were sent and, once per frame, folds in the property
//! writes proxies made through their shared buffers before running the
//! stage and forwarding its outcomes.
//!
//! A node's buffered writes are also folded in right before any command for
//! that node, so commands such as `startAnimation` see the values the proxy
//! wrote before sending them. Parent changes are collected and linked as a
//! batch at frame time, since they only make sense together.

use crate::buffer::SharedPropertyBuffer;
use crate::channel::{SyncChannel, WorkerEndpoint};
use crate::error::SyncError;
use crate::message::{AuthorityEvent, ChannelMessage, NodeCommand};
use crossbeam_channel::{RecvTimeoutError, Sender};
use lumen_core::{ImageResolver, NodeId, Stage};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Configuration for the render worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Time between frames
    pub frame_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
        }
    }
}

/// A running render worker and the channel that reaches it.
///
/// Dropping the worker asks it to shut down and waits for it.
#[derive(Debug)]
pub struct RenderWorker {
    channel: SyncChannel,
    handle: Option<thread::JoinHandle<()>>,
}

impl RenderWorker {
    /// Spawn the worker thread.
    pub fn spawn(
        config: WorkerConfig,
        images: Box<dyn ImageResolver + Send>,
    ) -> Result<Self, SyncError> {
        let (channel, endpoint) = SyncChannel::pair();
        let handle = thread::Builder::new()
            .name("render-worker".to_string())
            .spawn(move || {
                info!("Render worker started");
                run_worker_loop(config, endpoint, images);
                info!("Render worker stopped");
            })?;
        Ok(Self {
            channel,
            handle: Some(handle),
        })
    }

    pub fn channel(&self) -> &SyncChannel {
        &self.channel
    }

    /// Stop the worker and wait for it to exit.
    pub fn shutdown(&mut self) {
        self.channel.shutdown();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Render worker exited with a panic");
            }
        }
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct WorkerState {
    stage: Stage,
    buffers: HashMap<NodeId, Arc<SharedPropertyBuffer>>,
    /// Parent changes read from buffers, linked on the next frame
    pending_parents: HashMap<NodeId, Option<NodeId>>,
    events: Sender<AuthorityEvent>,
}

/// Main worker loop.
fn run_worker_loop(
    config: WorkerConfig,
    endpoint: WorkerEndpoint,
    images: Box<dyn ImageResolver + Send>,
) {
    let mut state = WorkerState::new(images, endpoint.events);
    let mut last_frame = Instant::now();

    loop {
        let deadline = last_frame + config.frame_interval;
        match endpoint.commands.recv_deadline(deadline) {
            Ok(ChannelMessage::Shutdown) => {
                debug!("Render worker received shutdown");
                break;
            }
            Ok(ChannelMessage::Node { node, command }) => state.dispatch(node, command),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Render worker channel closed, shutting down");
                break;
            }
        }

        let now = Instant::now();
        if now >= deadline {
            state.frame(now - last_frame);
            last_frame = now;
        }
    }
}

impl WorkerState {
    fn new(images: Box<dyn ImageResolver + Send>, events: Sender<AuthorityEvent>) -> Self {
        Self {
            stage: Stage::new(images),
            buffers: HashMap::new(),
            pending_parents: HashMap::new(),
            events,
        }
    }

    /// Apply one command inside a panic isolation boundary.
    fn dispatch(&mut self, node: NodeId, command: NodeCommand) {
        let name = command.name();
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.apply(node, command)));

        let error = match result {
            Ok(Ok(())) => return,
            Ok(Err(e)) => {
                warn!("{} error applying {}: {}", node, name, e);
                e
            }
            Err(panic_info) => {
                let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                error!("{} panicked applying {}: {}", node, name, msg);
                msg
            }
        };
        let _ = self.events.send(AuthorityEvent::CommandFailed {
            node,
            command: name,
            error,
        });
    }

    fn apply(&mut self, node: NodeId, command: NodeCommand) -> Result<(), String> {
        if let Some(buffer) = self.buffers.get(&node) {
            fold_changes(&mut self.stage, &mut self.pending_parents, node, buffer);
        }
        match command {
            NodeCommand::Create { buffer, props } => {
                self.stage.create_node(node, props);
                self.buffers.insert(node, buffer);
            }
            NodeCommand::LoadTexture { texture } => self.stage.load_texture(node, texture),
            NodeCommand::UnloadTexture => self.stage.unload_texture(node),
            NodeCommand::LoadShader { shader } => self.stage.load_shader(node, shader),
            NodeCommand::CreateAnimation {
                id,
                props,
                settings,
            } => {
                self.stage
                    .create_animation(node, id, props, settings)
                    .map_err(|e| e.to_string())?;
            }
            NodeCommand::StartAnimation { id } => {
                if !self.stage.start_animation(node, id) {
                    debug!("{} has no animation {} to start", node, id);
                }
            }
            NodeCommand::PauseAnimation { id } => {
                self.stage.pause_animation(node, id);
            }
            NodeCommand::StopAnimation { id } => {
                self.stage.stop_animation(node, id);
            }
            NodeCommand::DestroyAnimation { id } => self.stage.release_animation(node, id),
            NodeCommand::Destroy => {
                self.stage.remove_node(node);
                self.buffers.remove(&node);
                self.pending_parents.remove(&node);
            }
        }
        Ok(())
    }

    /// Fold in buffered property writes, run the stage, report outcomes.
    fn frame(&mut self, dt: Duration) {
        for (id, buffer) in &self.buffers {
            fold_changes(&mut self.stage, &mut self.pending_parents, *id, buffer);
        }
        self.link_pending_parents();

        for event in self.stage.update(dt) {
            if self.events.send(AuthorityEvent::Stage(event)).is_err() {
                debug!("Event receiver gone, dropping outcome");
                break;
            }
        }
    }

    /// Link every collected parent change.
    ///
    /// Each change was valid in the proxy's tree, but linked one at a time
    /// in arbitrary order an intermediate state can look like a cycle.
    /// Detaches go first, then links are retried while any makes progress.
    /// If none can, the blocked children are detached and linked again,
    /// which always succeeds for an acyclic target tree.
    fn link_pending_parents(&mut self) {
        if self.pending_parents.is_empty() {
            return;
        }
        let mut links: Vec<(NodeId, NodeId)> = Vec::new();
        let mut changes: Vec<_> = self.pending_parents.drain().collect();
        changes.sort_unstable_by_key(|(child, _)| *child);
        for (child, parent) in changes {
            match parent {
                Some(parent) => links.push((child, parent)),
                None => self.stage.set_parent(child, None),
            }
        }

        let mut detached = false;
        while !links.is_empty() {
            let before = links.len();
            links.retain(|&(child, parent)| {
                if self.stage.can_parent(child, parent) {
                    self.stage.set_parent(child, Some(parent));
                    false
                } else {
                    true
                }
            });
            if links.len() < before {
                continue;
            }
            if detached {
                break;
            }
            for &(child, _) in &links {
                self.stage.set_parent(child, None);
            }
            detached = true;
        }
        for (child, parent) in links {
            warn!("{} could not be linked under {}, left as root", child, parent);
        }
    }
}

/// Apply a buffer's property writes now and queue its parent change.
fn fold_changes(
    stage: &mut Stage,
    pending_parents: &mut HashMap<NodeId, Option<NodeId>>,
    id: NodeId,
    buffer: &SharedPropertyBuffer,
) {
    let changes = buffer.take_changes();
    for (slot, value) in changes.props {
        stage.set_slot(id, slot, value);
    }
    if let Some(parent) = changes.parent {
        pending_parents.insert(id, parent);
    }
}
