//! Synchronization channel endpoints.

use crate::error::SyncError;
use crate::message::{AuthorityEvent, ChannelMessage, NodeCommand};
use crossbeam_channel::{unbounded, Receiver, Sender};
use lumen_core::NodeId;
use std::time::Duration;
use tracing::debug;

/// Cloneable handle for sending node commands to the worker.
///
/// Commands sent through any clone reach the worker in send order.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: Sender<ChannelMessage>,
}

impl CommandSender {
    /// Send `command` addressed to `node`.
    pub fn send(&self, node: NodeId, command: NodeCommand) -> Result<(), SyncError> {
        debug!("{} -> {}", node, command);
        let name = command.name();
        self.tx
            .send(ChannelMessage::Node { node, command })
            .map_err(|_| SyncError::Disconnected { command: name })
    }

    /// Ask the worker to stop. Ignored if it already has.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ChannelMessage::Shutdown);
    }
}

/// Calling-thread side of the channel.
#[derive(Debug)]
pub struct SyncChannel {
    commands: CommandSender,
    events: Receiver<AuthorityEvent>,
}

/// Worker side of the channel.
#[derive(Debug)]
pub struct WorkerEndpoint {
    /// Commands from node proxies, in send order
    pub commands: Receiver<ChannelMessage>,
    /// Outcomes for node proxies
    pub events: Sender<AuthorityEvent>,
}

impl SyncChannel {
    /// Create a connected pair of endpoints.
    pub fn pair() -> (SyncChannel, WorkerEndpoint) {
        let (cmd_tx, cmd_rx) = unbounded();
        let (evt_tx, evt_rx) = unbounded();
        (
            SyncChannel {
                commands: CommandSender { tx: cmd_tx },
                events: evt_rx,
            },
            WorkerEndpoint {
                commands: cmd_rx,
                events: evt_tx,
            },
        )
    }

    pub fn sender(&self) -> CommandSender {
        self.commands.clone()
    }

    pub fn send(&self, node: NodeId, command: NodeCommand) -> Result<(), SyncError> {
        self.commands.send(node, command)
    }

    /// Drain every event the worker has reported so far (non-blocking).
    pub fn try_events(&self) -> Vec<AuthorityEvent> {
        self.events.try_iter().collect()
    }

    /// Wait up to `timeout` for the next event.
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<AuthorityEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    pub fn shutdown(&self) {
        self.commands.shutdown();
    }
}
