//! Stream handles: capabilities, mode detection and adapters.
//!
//! Everything the readers and writers touch goes through the [`Stream`]
//! trait. A stream advertises what it can do as a [`Capabilities`] set
//! (read, recv, write, flush, close, available-byte count, unread) which
//! callers resolve once instead of probing on every iteration.
//!
//! - [`FdReader`] / [`FdWriter`]: files, pipes, terminals and sockets
//! - [`SharedStream`]: one destination shared by chained write tasks
//! - [`MemoryStream`]: in-process pipe, also handy as a test sink

mod caps;
mod data;
mod fd;
mod memory;
mod mode;
pub mod poll;
mod shared;

pub use caps::{Capabilities, Stream};
pub use data::Data;
pub use fd::{FdReader, FdWriter};
pub use memory::MemoryStream;
pub use mode::{detect_stream_mode, StreamMode};
pub use shared::SharedStream;
