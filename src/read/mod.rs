//! Reads that never block the caller.
//!
//! - [`nonblock_read`]: drain what a stream has ready right now
//! - [`background_read`]: keep draining on a worker thread until the
//!   stream closes, collecting chunks the caller can inspect at any time

mod background;
mod nonblock;

pub use background::{
    background_read, ReadOptions, ReadTask, DEFAULT_BLOCK_SIZE_LIMIT, DEFAULT_POLL_INTERVAL,
};
pub use nonblock::{nonblock_read, ReadOutcome, READ_POLL_TIMEOUT};
