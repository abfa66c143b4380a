//! Background writes: chunked, throttled and optionally chained.
//!
//! Each write runs on its own thread and owns its queue of chunks. The
//! caller watches the task through flags and counters, never by joining.
//!
//! # Architecture
//!
//! ```text
//!   caller ──▶ WriteTask::spawn ──▶ ┌───────────────────────────────┐
//!                                   │ write thread                  │
//!   predecessor.finished? ◀──poll── │ 1. wait for chain             │
//!                                   │ 2. pop chunk, write, flush    │
//!                                   │ 3. Throttle::record → rest    │
//!                                   │ 4. close (optional), finished │
//!                                   └───────────────────────────────┘
//! ```
//!
//! How much a task rests is set by its [`IoPriorityProfile`], picked from
//! [`PRIORITY_TABLE`] (1 = full speed, 10 = most interactive) or supplied
//! directly.

mod background;
mod chunk;
pub(crate) mod priority;
mod throttle;

pub use background::{
    background_write, background_write_chunked, WriteData, WriteOptions, WriteProgress, WriteTask,
    WRITE_POLL_TIMEOUT,
};
pub use chunk::{chunk_bytes, chunk_data, chunk_text};
pub use priority::{
    IoPriorityProfile, Priority, DEFAULT_PRIORITY, MAX_PRIORITY, MIN_PRIORITY, PRIORITY_TABLE,
};
pub use throttle::Throttle;
