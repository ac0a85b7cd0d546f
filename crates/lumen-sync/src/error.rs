//! Transport-level errors.

use thiserror::Error;

/// Failures of the synchronization channel itself.
///
/// Kept apart from resource failures, which arrive as node events.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("render worker disconnected while sending {command}")]
    Disconnected { command: &'static str },

    #[error("failed to spawn render worker: {0}")]
    Spawn(#[from] std::io::Error),
}
