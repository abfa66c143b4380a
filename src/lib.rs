//! # nonblock
//!
//! Non-blocking and background I/O on ordinary streams.
//!
//! Reads return whatever is ready without ever waiting on the peer, and
//! writes run on worker threads with a tunable trade-off between throughput
//! and the responsiveness of the calling thread.
//!
//! ## Core Concepts
//!
//! - **Non-blocking read**: [`nonblock_read`] drains what a stream has ready
//!   and distinguishes "nothing yet" from "peer closed"
//! - **Background read**: [`background_read`] keeps draining on a thread and
//!   collects chunks the caller inspects at leisure
//! - **Background write**: [`background_write`] splits data into chunks and
//!   writes them on a thread, resting between chunks per its
//!   [`IoPriorityProfile`]
//! - **Chaining**: a write can wait for another to finish, keeping their
//!   output in order on a shared destination
//!
//! ## Example
//!
//! ```rust,no_run
//! use nonblock::{background_write, nonblock_read, FdReader, MemoryStream, WriteOptions};
//!
//! # fn main() -> nonblock::Result<()> {
//! let mut stdin = FdReader::new(std::io::stdin());
//! if let Some(data) = nonblock_read(&mut stdin, None, None)?.into_data() {
//!     println!("got {} bytes", data.len());
//! }
//!
//! let sink = MemoryStream::new();
//! let task = background_write(sink.clone(), "hello", WriteOptions::default())?;
//! task.wait();
//! assert_eq!(sink.contents(), b"hello");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod read;
pub mod stream;
pub mod task;
pub mod terminal;
pub mod write;

// Re-exports for convenience
pub use error::{Error, Result};
pub use read::{background_read, nonblock_read, ReadOptions, ReadOutcome, ReadTask};
pub use stream::{
    detect_stream_mode, Capabilities, Data, FdReader, FdWriter, MemoryStream, SharedStream,
    Stream, StreamMode,
};
pub use task::{TaskKind, TaskState, TaskStatus};
pub use terminal::RawModeGuard;
pub use write::{
    background_write, background_write_chunked, chunk_data, IoPriorityProfile, Priority,
    WriteData, WriteOptions, WriteProgress, WriteTask,
};
