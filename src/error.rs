//! Error type shared by every reader, writer and background task.

use std::io;

use crate::write::priority::{MAX_PRIORITY, MIN_PRIORITY};

/// Unified error type for all nonblock operations.
///
/// Configuration errors are returned synchronously from constructors.
/// Runtime I/O errors raised inside a background task are stored in the
/// task's status instead of crossing the thread boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A task or profile was constructed with an invalid setting.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A priority level outside the fixed table was requested.
    #[error("invalid priority {0}: expected a value in {MIN_PRIORITY}..={MAX_PRIORITY}")]
    InvalidPriority(u32),

    /// The stream lacks a capability the operation needs.
    #[error("stream does not support {0}")]
    Unsupported(&'static str),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A text-mode stream produced bytes that are not valid UTF-8.
    #[error("text-mode stream produced invalid UTF-8")]
    InvalidText,

    /// The task was cancelled through its status handle.
    #[error("task was cancelled")]
    Cancelled,

    /// The task ran past its configured deadline.
    #[error("task deadline exceeded")]
    DeadlineExceeded,

    /// The write task this one was chained after terminated with an error.
    #[error("chained predecessor failed before finishing")]
    PredecessorFailed,

    /// The worker thread panicked; the payload message is kept when it is a string.
    #[error("background task panicked: {0}")]
    Panicked(String),

    /// The operating system refused to start the worker thread.
    #[error("failed to spawn background thread: {0}")]
    Spawn(io::Error),
}

impl Error {
    /// Whether this is a configuration error reported at construction time.
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::InvalidConfig(_) | Self::InvalidPriority(_))
    }
}

/// Result alias for nonblock operations.
pub type Result<T> = std::result::Result<T, Error>;
