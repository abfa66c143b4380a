//! Background write task: throttled, optionally chained writes on a worker thread.

use super::chunk::chunk_data;
use super::priority::{IoPriorityProfile, Priority};
use super::throttle::Throttle;
use crate::error::{Error, Result};
use crate::stream::{Capabilities, Data, Stream};
use crate::task::{TaskControl, TaskKind, TaskStatus};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long one writability check may block before re-checking cancellation.
pub const WRITE_POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// Data handed to a write task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteData {
    /// One block, split at the profile's default chunk size.
    Block(Data),
    /// Pre-chunked blocks, each written and flushed as given.
    Chunks(Vec<Data>),
}

impl From<Data> for WriteData {
    fn from(data: Data) -> Self {
        Self::Block(data)
    }
}

impl From<Vec<u8>> for WriteData {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Block(Data::Binary(bytes))
    }
}

impl From<&[u8]> for WriteData {
    fn from(bytes: &[u8]) -> Self {
        Self::Block(Data::from(bytes))
    }
}

impl From<String> for WriteData {
    fn from(text: String) -> Self {
        Self::Block(Data::Text(text))
    }
}

impl From<&str> for WriteData {
    fn from(text: &str) -> Self {
        Self::Block(Data::from(text))
    }
}

impl From<Vec<Data>> for WriteData {
    fn from(chunks: Vec<Data>) -> Self {
        Self::Chunks(chunks)
    }
}

/// Configuration for a background write.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Close the destination once every chunk is written.
    pub close_on_finish: bool,
    /// Hold all writing until this write task has finished.
    pub chain_after: Option<TaskStatus>,
    /// Table priority or custom profile.
    pub priority: Priority,
    /// Give up (with [`Error::DeadlineExceeded`]) after this long.
    pub deadline: Option<Duration>,
}

impl WriteOptions {
    /// Set whether to close the destination when done.
    #[must_use]
    pub fn with_close_on_finish(mut self, close: bool) -> Self {
        self.close_on_finish = close;
        self
    }

    /// Chain after another write task.
    #[must_use]
    pub fn with_chain_after(mut self, predecessor: &TaskStatus) -> Self {
        self.chain_after = Some(predecessor.clone());
        self
    }

    /// Use a priority level from the table (1 through 10).
    #[must_use]
    pub fn with_priority(mut self, level: u32) -> Self {
        self.priority = Priority::Level(level);
        self
    }

    /// Use a custom profile instead of the table.
    #[must_use]
    pub fn with_profile(mut self, profile: IoPriorityProfile) -> Self {
        self.priority = Priority::Custom(profile);
        self
    }

    /// Set a deadline relative to task creation.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

#[derive(Debug, Default)]
struct Progress {
    chunks_total: u64,
    bytes_written: AtomicU64,
    chunks_written: AtomicU64,
    active_nanos: AtomicU64,
    slept_nanos: AtomicU64,
}

fn nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

impl Progress {
    fn record_chunk(&self, bytes: usize, active: Duration) {
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
        self.active_nanos.fetch_add(nanos(active), Ordering::Relaxed);
        self.chunks_written.fetch_add(1, Ordering::Release);
    }

    fn record_sleep(&self, slept: Duration) {
        self.slept_nanos.fetch_add(nanos(slept), Ordering::Relaxed);
    }

    fn snapshot(&self) -> WriteProgress {
        let chunks_written = self.chunks_written.load(Ordering::Acquire);
        WriteProgress {
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            chunks_written,
            chunks_remaining: self.chunks_total.saturating_sub(chunks_written),
            active: Duration::from_nanos(self.active_nanos.load(Ordering::Relaxed)),
            slept: Duration::from_nanos(self.slept_nanos.load(Ordering::Relaxed)),
        }
    }
}

/// Point-in-time counters for a write task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteProgress {
    /// Bytes handed to the destination so far.
    pub bytes_written: u64,
    /// Chunks written and flushed so far.
    pub chunks_written: u64,
    /// Chunks still queued.
    pub chunks_remaining: u64,
    /// Time spent writing and flushing.
    pub active: Duration,
    /// Time spent in throttling rests.
    pub slept: Duration,
}

/// Handle to a running background write.
///
/// Dropping the handle does not stop the task.
#[derive(Debug)]
pub struct WriteTask {
    status: TaskStatus,
    progress: Arc<Progress>,
    profile: IoPriorityProfile,
}

impl WriteTask {
    /// Validate the request and start the worker thread.
    pub fn spawn<S>(destination: S, data: impl Into<WriteData>, options: WriteOptions) -> Result<Self>
    where
        S: Stream + 'static,
    {
        let profile = options.priority.resolve()?;

        if let Some(predecessor) = &options.chain_after {
            if predecessor.kind() != TaskKind::Write {
                return Err(Error::InvalidConfig(
                    "chain_after must refer to a background write task".into(),
                ));
            }
        }

        let caps = destination.capabilities();
        if !caps.contains(Capabilities::WRITE) {
            return Err(Error::Unsupported("write"));
        }

        let chunks = match data.into() {
            WriteData::Block(block) => chunk_data(&block, profile.default_chunk_size)?,
            WriteData::Chunks(chunks) => chunks,
        };

        let progress = Arc::new(Progress {
            chunks_total: chunks.len() as u64,
            ..Progress::default()
        });

        let writer = Writer {
            destination,
            caps,
            pending: chunks.into(),
            profile,
            close_on_finish: options.close_on_finish,
            predecessor: options.chain_after,
            progress: Arc::clone(&progress),
        };

        let (control, status) = TaskControl::new(TaskKind::Write, options.deadline);
        control.spawn("nonblock-write", move |control| writer.run(control))?;

        Ok(Self {
            status,
            progress,
            profile,
        })
    }

    /// Shared status handle, usable as another task's `chain_after`.
    pub const fn status(&self) -> &TaskStatus {
        &self.status
    }

    /// The resolved priority profile.
    pub const fn profile(&self) -> &IoPriorityProfile {
        &self.profile
    }

    /// Whether writing has begun (any predecessor has finished).
    pub fn has_started_writing(&self) -> bool {
        self.status.has_started()
    }

    /// Whether every chunk was written (and the destination closed, if asked).
    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    /// The error that stopped the task, if any.
    pub fn error(&self) -> Option<&Error> {
        self.status.error()
    }

    /// Current counters.
    pub fn progress(&self) -> WriteProgress {
        self.progress.snapshot()
    }

    /// Ask the task to stop before its next chunk.
    pub fn cancel(&self) {
        self.status.cancel();
    }

    /// Block until the worker thread has exited.
    pub fn wait(&self) {
        self.status.wait();
    }

    /// Block up to `timeout` for the worker thread to exit.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.status.wait_timeout(timeout)
    }
}

/// Worker-side state, owned by the write thread.
struct Writer<S> {
    destination: S,
    caps: Capabilities,
    pending: VecDeque<Data>,
    profile: IoPriorityProfile,
    close_on_finish: bool,
    predecessor: Option<TaskStatus>,
    progress: Arc<Progress>,
}

impl<S: Stream> Writer<S> {
    fn run(mut self, control: &TaskControl) -> Result<()> {
        self.wait_for_predecessor(control)?;

        control.mark_started();
        log::debug!(
            "write task started: {} chunks at {}% bandwidth",
            self.pending.len(),
            self.profile.bandwidth_percent
        );

        let mut throttle = Throttle::new(&self.profile);
        while let Some(chunk) = self.pending.pop_front() {
            control.checkpoint()?;
            self.wait_writable(control)?;

            let started = Instant::now();
            self.destination.write_all(chunk.as_bytes())?;
            if self.caps.contains(Capabilities::FLUSH) {
                self.destination.flush()?;
            }
            let active = started.elapsed();
            self.progress.record_chunk(chunk.len(), active);

            let rest = throttle.record(chunk.len(), active);
            if !rest.is_zero() && !self.pending.is_empty() {
                control.sleep(rest)?;
                self.progress.record_sleep(rest);
            }
        }

        if self.close_on_finish {
            if self.caps.contains(Capabilities::CLOSE) {
                self.destination.close()?;
            } else {
                log::debug!("destination cannot be closed, leaving it open");
            }
        }

        control.mark_finished();
        let progress = self.progress.snapshot();
        log::debug!(
            "write task finished: {} bytes, {:?} writing, {:?} resting",
            progress.bytes_written,
            progress.active,
            progress.slept
        );
        Ok(())
    }

    fn wait_for_predecessor(&self, control: &TaskControl) -> Result<()> {
        let Some(predecessor) = &self.predecessor else {
            return Ok(());
        };
        while !predecessor.is_finished() {
            if predecessor.is_failed() {
                return Err(Error::PredecessorFailed);
            }
            control.sleep(self.profile.chain_poll_interval)?;
        }
        log::debug!("chained write released by predecessor");
        Ok(())
    }

    fn wait_writable(&self, control: &TaskControl) -> Result<()> {
        while !self.destination.poll_writable(WRITE_POLL_TIMEOUT)? {
            control.checkpoint()?;
        }
        Ok(())
    }
}

/// Start a background write of `data` to `destination`.
///
/// A single block is split at the profile's default chunk size; a list of
/// chunks is written as given. See [`WriteOptions`] for chaining, closing
/// and priority.
pub fn background_write<S>(
    destination: S,
    data: impl Into<WriteData>,
    options: WriteOptions,
) -> Result<WriteTask>
where
    S: Stream + 'static,
{
    WriteTask::spawn(destination, data, options)
}

/// Start a background write of `data` split into `chunk_size` pieces.
///
/// Smaller chunks reach the reader sooner and keep the caller responsive,
/// at some cost in throughput.
pub fn background_write_chunked<S>(
    destination: S,
    data: impl Into<Data>,
    chunk_size: usize,
    options: WriteOptions,
) -> Result<WriteTask>
where
    S: Stream + 'static,
{
    let chunks = chunk_data(&data.into(), chunk_size)?;
    WriteTask::spawn(destination, WriteData::Chunks(chunks), options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::{background_read, ReadOptions};
    use crate::stream::{MemoryStream, SharedStream};
    use std::io;
    use std::sync::Mutex;
    use std::thread;

    const WAIT: Duration = Duration::from_secs(10);

    /// Sink that takes a fixed time per write and logs the order of writes.
    #[derive(Clone)]
    struct SlowSink {
        delay: Duration,
        log: Arc<Mutex<Vec<u8>>>,
        fail_after: Option<usize>,
    }

    impl SlowSink {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                log: Arc::default(),
                fail_after: None,
            }
        }

        fn contents(&self) -> Vec<u8> {
            self.log.lock().unwrap().clone()
        }
    }

    impl Stream for SlowSink {
        fn capabilities(&self) -> Capabilities {
            Capabilities::WRITE
        }

        fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
            thread::sleep(self.delay);
            let mut log = self.log.lock().unwrap();
            if self.fail_after.is_some_and(|limit| log.len() + buf.len() > limit) {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "sink full"));
            }
            log.extend_from_slice(buf);
            Ok(())
        }
    }

    #[test]
    fn test_chunked_write_end_to_end() {
        let sink = MemoryStream::new();
        let task = background_write_chunked(
            sink.clone(),
            "123456789",
            2,
            WriteOptions::default().with_priority(1),
        )
        .unwrap();

        assert!(task.wait_timeout(WAIT));
        assert!(task.is_finished());
        assert!(task.error().is_none());
        assert_eq!(sink.contents(), b"123456789");

        let progress = task.progress();
        assert_eq!(progress.chunks_written, 5);
        assert_eq!(progress.chunks_remaining, 0);
        assert_eq!(progress.bytes_written, 9);
    }

    #[test]
    fn test_block_split_at_default_chunk_size() {
        let sink = MemoryStream::new();
        let profile = IoPriorityProfile {
            default_chunk_size: 4,
            bandwidth_percent: 100.0,
            ..IoPriorityProfile::default()
        };
        let task = background_write(
            sink.clone(),
            b"0123456789".to_vec(),
            WriteOptions::default().with_profile(profile),
        )
        .unwrap();
        task.wait();
        assert_eq!(task.progress().chunks_written, 3);
        assert_eq!(sink.contents(), b"0123456789");
    }

    #[test]
    fn test_close_on_finish() {
        let sink = MemoryStream::new();
        let task = background_write(
            sink.clone(),
            vec![Data::from("a"), Data::from("b")],
            WriteOptions::default().with_close_on_finish(true),
        )
        .unwrap();
        task.wait();
        assert!(task.is_finished());
        assert!(sink.is_closed());
        assert_eq!(sink.contents(), b"ab");
    }

    #[test]
    fn test_chained_writes_keep_order() {
        let shared = SharedStream::new(SlowSink::new(Duration::from_millis(2)));
        let sink = shared.lock().clone();

        let first = background_write_chunked(
            shared.clone(),
            vec![b'a'; 64],
            8,
            WriteOptions::default().with_priority(1),
        )
        .unwrap();
        let second = background_write_chunked(
            shared.clone(),
            vec![b'b'; 64],
            8,
            WriteOptions::default()
                .with_priority(1)
                .with_chain_after(first.status()),
        )
        .unwrap();

        // The successor writes nothing while the predecessor is unfinished.
        loop {
            let written = second.progress().bytes_written;
            let first_done = first.is_finished();
            assert!(written == 0 || first_done);
            if first_done {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }

        assert!(second.wait_timeout(WAIT));
        assert!(second.is_finished());
        let mut expected = vec![b'a'; 64];
        expected.extend(vec![b'b'; 64]);
        assert_eq!(sink.contents(), expected);
    }

    #[test]
    fn test_unthrottled_never_sleeps() {
        let sink = SlowSink::new(Duration::from_millis(1));
        let task = background_write_chunked(
            sink,
            vec![0u8; 40],
            4,
            WriteOptions::default().with_priority(1),
        )
        .unwrap();
        task.wait();
        assert!(task.is_finished());
        assert_eq!(task.progress().slept, Duration::ZERO);
    }

    #[test]
    fn test_lowest_priority_rests_in_proportion() {
        let sink = SlowSink::new(Duration::from_millis(5));
        let task = background_write_chunked(
            sink,
            vec![0u8; 40],
            4,
            WriteOptions::default().with_priority(10),
        )
        .unwrap();
        assert!(task.wait_timeout(WAIT));
        assert!(task.is_finished());

        let progress = task.progress();
        assert!(progress.slept > Duration::ZERO);
        // 20% bandwidth rests about 0.8x the active time (minus the last chunk).
        let ratio = progress.slept.as_secs_f64() / progress.active.as_secs_f64();
        assert!(ratio > 0.2 && ratio < 3.0, "rest ratio {ratio}");
    }

    #[test]
    fn test_invalid_priority_rejected() {
        for level in [0, 11] {
            let err = background_write(
                MemoryStream::new(),
                "x",
                WriteOptions::default().with_priority(level),
            )
            .unwrap_err();
            assert!(matches!(err, Error::InvalidPriority(l) if l == level));
        }
    }

    #[test]
    fn test_chain_after_read_task_rejected() {
        let source = MemoryStream::new();
        let reader = background_read(source.clone(), ReadOptions::default()).unwrap();
        let err = background_write(
            MemoryStream::new(),
            "x",
            WriteOptions::default().with_chain_after(reader.status()),
        )
        .unwrap_err();
        assert!(err.is_config());
        reader.cancel();
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let err = background_write_chunked(MemoryStream::new(), "abc", 0, WriteOptions::default())
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_unwritable_destination_rejected() {
        let (_a, b) = std::os::unix::net::UnixStream::pair().unwrap();
        let err = background_write(crate::stream::FdReader::new(b), "x", WriteOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported("write")));
    }

    #[test]
    fn test_write_error_captured() {
        let mut sink = SlowSink::new(Duration::ZERO);
        sink.fail_after = Some(6);
        let task = background_write_chunked(
            sink.clone(),
            "123456789",
            3,
            WriteOptions::default().with_priority(1),
        )
        .unwrap();
        task.wait();
        assert!(!task.is_finished());
        assert!(matches!(task.error(), Some(Error::Io(_))));
        assert_eq!(sink.contents(), b"123456");
    }

    #[test]
    fn test_failed_predecessor_fails_successor() {
        let mut sink = SlowSink::new(Duration::ZERO);
        sink.fail_after = Some(0);
        let first = background_write(sink, "x", WriteOptions::default()).unwrap();
        let second = background_write(
            MemoryStream::new(),
            "y",
            WriteOptions::default().with_chain_after(first.status()),
        )
        .unwrap();
        assert!(second.wait_timeout(WAIT));
        assert!(matches!(second.error(), Some(Error::PredecessorFailed)));
        assert!(!second.has_started_writing());
    }

    #[test]
    fn test_cancel_stops_chained_wait() {
        let blocker = SlowSink::new(Duration::from_millis(200));
        let first = background_write_chunked(
            blocker,
            vec![0u8; 8],
            1,
            WriteOptions::default().with_priority(1),
        )
        .unwrap();
        let sink = MemoryStream::new();
        let second = background_write(
            sink.clone(),
            "never",
            WriteOptions::default().with_chain_after(first.status()),
        )
        .unwrap();

        second.cancel();
        assert!(second.wait_timeout(WAIT));
        assert!(matches!(second.error(), Some(Error::Cancelled)));
        assert!(sink.contents().is_empty());
        first.cancel();
    }

    #[test]
    fn test_deadline_exceeded() {
        let task = background_write_chunked(
            SlowSink::new(Duration::from_millis(20)),
            vec![0u8; 100],
            1,
            WriteOptions::default()
                .with_priority(1)
                .with_deadline(Duration::from_millis(50)),
        )
        .unwrap();
        assert!(task.wait_timeout(WAIT));
        assert!(matches!(task.error(), Some(Error::DeadlineExceeded)));
        assert!(task.progress().chunks_remaining > 0);
    }
}
