//! Lumen Sync - Cross-Thread Scene Synchronization
//!
//! Connects node proxies on the calling thread to a render authority living
//! on a worker thread:
//! - Ordered command messages for resource and animation work
//! - A lock-free shared property buffer per node for plain property writes
//! - The render worker that applies both and reports outcomes back

mod buffer;
mod channel;
mod error;
mod message;
mod worker;

pub use buffer::{BufferChanges, SharedPropertyBuffer};
pub use channel::{CommandSender, SyncChannel, WorkerEndpoint};
pub use error::SyncError;
pub use message::{AuthorityEvent, ChannelMessage, NodeCommand};
pub use worker::{RenderWorker, WorkerConfig};
