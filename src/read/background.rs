//! Background read task: polls a stream on a worker thread until it closes.

use super::nonblock::{nonblock_read, ReadOutcome};
use crate::error::{Error, Result};
use crate::stream::{detect_stream_mode, Capabilities, Data, Stream, StreamMode};
use crate::task::{TaskControl, TaskKind, TaskStatus};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Default cap on bytes collected per poll.
pub const DEFAULT_BLOCK_SIZE_LIMIT: usize = 65535;

/// Default pause between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(30);

/// Configuration for a background read.
///
/// `block_size_limit / poll_interval` bounds the throughput: the defaults
/// allow roughly 2 MiB/s while leaving the caller most of the CPU.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Bytes collected per poll at most. `None` drains everything ready.
    pub block_size_limit: Option<usize>,
    /// Pause after each poll.
    pub poll_interval: Duration,
    /// Close the stream once the peer has closed.
    pub close_on_finish: bool,
    /// Force a mode instead of detecting it.
    pub mode: Option<StreamMode>,
    /// Give up (with [`Error::DeadlineExceeded`]) after this long.
    pub deadline: Option<Duration>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            block_size_limit: Some(DEFAULT_BLOCK_SIZE_LIMIT),
            poll_interval: DEFAULT_POLL_INTERVAL,
            close_on_finish: true,
            mode: None,
            deadline: None,
        }
    }
}

impl ReadOptions {
    /// Set the per-poll byte cap.
    #[must_use]
    pub const fn with_block_size_limit(mut self, limit: Option<usize>) -> Self {
        self.block_size_limit = limit;
        self
    }

    /// Set the pause between polls.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set whether to close the stream at end of stream.
    #[must_use]
    pub const fn with_close_on_finish(mut self, close: bool) -> Self {
        self.close_on_finish = close;
        self
    }

    /// Force the stream mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: StreamMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Set a deadline relative to task creation.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Check the options.
    pub fn validate(&self) -> Result<()> {
        if self.block_size_limit == Some(0) {
            return Err(Error::InvalidConfig(
                "block size limit must be positive, or None for no limit".into(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidConfig("poll interval must be positive".into()));
        }
        Ok(())
    }
}

/// Handle to a running background read.
///
/// Dropping the handle does not stop the task.
#[derive(Debug)]
pub struct ReadTask {
    status: TaskStatus,
    chunks: Arc<Mutex<Vec<Data>>>,
    mode: StreamMode,
}

impl ReadTask {
    /// Validate the request and start the worker thread.
    pub fn spawn<S>(mut stream: S, options: ReadOptions) -> Result<Self>
    where
        S: Stream + 'static,
    {
        options.validate()?;

        let caps = stream.capabilities();
        if !caps.can_read() {
            return Err(Error::Unsupported("read or recv"));
        }
        let mode = options.mode.unwrap_or_else(|| detect_stream_mode(&mut stream));
        if mode == StreamMode::Text && !caps.contains(Capabilities::UNREAD) {
            return Err(Error::Unsupported("unread"));
        }

        let chunks = Arc::new(Mutex::new(Vec::new()));
        let reader = Reader {
            stream,
            caps,
            mode,
            options: options.clone(),
            chunks: Arc::clone(&chunks),
        };

        let (control, status) = TaskControl::new(TaskKind::Read, options.deadline);
        control.spawn("nonblock-read", move |control| reader.run(control))?;

        Ok(Self {
            status,
            chunks,
            mode,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Data>> {
        self.chunks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Shared status handle.
    pub const fn status(&self) -> &TaskStatus {
        &self.status
    }

    /// Mode the stream was read in.
    pub const fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Snapshot of the non-empty chunks read so far, in order.
    pub fn chunks(&self) -> Vec<Data> {
        self.lock().clone()
    }

    /// Number of chunks read so far.
    pub fn chunk_count(&self) -> usize {
        self.lock().len()
    }

    /// Everything read so far, joined.
    pub fn data(&self) -> Data {
        Data::concat(self.mode, &self.lock())
    }

    /// Whether the peer closed and everything was read.
    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    /// The error that stopped the task, if any.
    pub fn error(&self) -> Option<&Error> {
        self.status.error()
    }

    /// Ask the task to stop at its next poll.
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

/// Worker-side state, owned by the read thread.
struct Reader<S> {
    stream: S,
    caps: Capabilities,
    mode: StreamMode,
    options: ReadOptions,
    chunks: Arc<Mutex<Vec<Data>>>,
}

impl<S: Stream> Reader<S> {
    fn run(mut self, control: &TaskControl) -> Result<()> {
        control.mark_started();
        log::debug!("read task started in {} mode", self.mode);

        loop {
            control.checkpoint()?;
            match nonblock_read(&mut self.stream, self.options.block_size_limit, Some(self.mode))? {
                ReadOutcome::Closed => break,
                ReadOutcome::Data(data) if !data.is_empty() => {
                    self.chunks
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(data);
                }
                ReadOutcome::Data(_) => {}
            }
            control.sleep(self.options.poll_interval)?;
        }

        if self.options.close_on_finish && self.caps.contains(Capabilities::CLOSE) {
            self.stream.close()?;
        }
        control.mark_finished();
        log::debug!("read task finished");
        Ok(())
    }
}

/// Start reading `stream` in the background until it closes.
///
/// The returned task collects non-empty chunks as they arrive; check
/// [`ReadTask::is_finished`] and [`ReadTask::error`] to tell a clean end
/// from a failure.
pub fn background_read<S>(stream: S, options: ReadOptions) -> Result<ReadTask>
where
    S: Stream + 'static,
{
    ReadTask::spawn(stream, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{FdReader, MemoryStream, SharedStream};
    use std::io::{self, Write};
    use std::os::unix::net::UnixStream;
    use std::thread;

    const WAIT: Duration = Duration::from_secs(10);

    fn fast() -> ReadOptions {
        ReadOptions::default().with_poll_interval(Duration::from_millis(1))
    }

    struct Failing;

    impl Stream for Failing {
        fn capabilities(&self) -> Capabilities {
            Capabilities::READ
        }

        fn probe_mode(&mut self) -> io::Result<StreamMode> {
            Ok(StreamMode::Binary)
        }

        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        }
    }

    #[test]
    fn test_reads_until_closed() {
        let producer = MemoryStream::new();
        let task = background_read(producer.clone(), fast()).unwrap();

        producer.push(b"hello ").unwrap();
        thread::sleep(Duration::from_millis(20));
        producer.push(b"world").unwrap();
        let mut closer = producer.clone();
        closer.close().unwrap();

        assert!(task.wait_timeout(WAIT));
        assert!(task.is_finished());
        assert!(task.error().is_none());
        assert_eq!(task.data(), Data::Binary(b"hello world".to_vec()));
        assert!(task.chunks().iter().all(|c| !c.is_empty()));
    }

    #[test]
    fn test_block_size_limit_splits_chunks() {
        let mut stream = MemoryStream::with_contents(b"abcdefghij");
        stream.close().unwrap();
        let task = background_read(stream, fast().with_block_size_limit(Some(4))).unwrap();
        task.wait();
        let chunks: Vec<Vec<u8>> = task.chunks().into_iter().map(Data::into_bytes).collect();
        assert_eq!(chunks, [b"abcd".to_vec(), b"efgh".to_vec(), b"ij".to_vec()]);
        assert_eq!(task.chunk_count(), 3);
    }

    #[test]
    fn test_text_mode_joins_text() {
        let mut stream = MemoryStream::text();
        stream.push("grüße".as_bytes()).unwrap();
        stream.close().unwrap();
        let task = background_read(stream, fast()).unwrap();
        task.wait();
        assert_eq!(task.mode(), StreamMode::Text);
        assert_eq!(task.data().as_text(), Some("grüße"));
    }

    #[test]
    fn test_text_character_split_across_pushes() {
        let producer = MemoryStream::text();
        let task = background_read(producer.clone(), fast()).unwrap();

        producer.push(&[b'h', 0xc3]).unwrap();
        thread::sleep(Duration::from_millis(100));
        assert!(task.error().is_none());
        producer.push(&[0xa9]).unwrap();
        let mut closer = producer.clone();
        closer.close().unwrap();

        assert!(task.wait_timeout(WAIT));
        assert!(task.error().is_none());
        assert!(task.is_finished());
        assert_eq!(task.data().as_text(), Some("hé"));
    }

    #[test]
    fn test_text_mode_without_unread_rejected() {
        let err = background_read(Failing, fast().with_mode(StreamMode::Text)).unwrap_err();
        assert!(matches!(err, Error::Unsupported("unread")));
    }

    #[test]
    fn test_error_captured_without_finishing() {
        let task = background_read(Failing, fast()).unwrap();
        assert!(task.wait_timeout(WAIT));
        assert!(!task.is_finished());
        assert!(matches!(task.error(), Some(Error::Io(e)) if e.kind() == io::ErrorKind::ConnectionReset));
    }

    #[test]
    fn test_socket_closed_on_finish() {
        let (mut a, b) = UnixStream::pair().unwrap();
        let task = background_read(FdReader::socket(b), fast()).unwrap();
        a.write_all(b"bye").unwrap();
        drop(a);
        assert!(task.wait_timeout(WAIT));
        assert!(task.is_finished());
        assert_eq!(task.data().into_bytes(), b"bye");
    }

    #[test]
    fn test_close_on_finish_drops_descriptor() {
        let (mut a, b) = UnixStream::pair().unwrap();
        let shared = SharedStream::new(FdReader::socket(b));
        let task = background_read(shared.clone(), fast()).unwrap();
        a.write_all(b"done").unwrap();
        drop(a);

        assert!(task.wait_timeout(WAIT));
        assert!(task.is_finished());
        assert!(shared.lock().get_ref().is_none());
        assert!(shared.poll_readable(Duration::ZERO).is_err());
    }

    #[test]
    fn test_close_on_finish_disabled_keeps_descriptor() {
        let (mut a, b) = UnixStream::pair().unwrap();
        let shared = SharedStream::new(FdReader::socket(b));
        let task =
            background_read(shared.clone(), fast().with_close_on_finish(false)).unwrap();
        a.write_all(b"done").unwrap();
        drop(a);

        assert!(task.wait_timeout(WAIT));
        assert!(task.is_finished());
        assert_eq!(task.data().into_bytes(), b"done");
        assert!(shared.lock().get_ref().is_some());
        // Still open: the hang-up remains observable.
        assert!(shared.poll_readable(Duration::ZERO).unwrap());
    }

    #[test]
    fn test_cancel_stops_open_stream() {
        let stream = MemoryStream::new();
        let task = background_read(stream, ReadOptions::default()).unwrap();
        task.cancel();
        assert!(task.wait_timeout(WAIT));
        assert!(matches!(task.error(), Some(Error::Cancelled)));
        assert!(!task.is_finished());
    }

    #[test]
    fn test_deadline_on_silent_stream() {
        let task = background_read(
            MemoryStream::new(),
            fast().with_deadline(Duration::from_millis(30)),
        )
        .unwrap();
        assert!(task.wait_timeout(WAIT));
        assert!(matches!(task.error(), Some(Error::DeadlineExceeded)));
    }

    #[test]
    fn test_invalid_options_rejected() {
        let zero_limit = fast().with_block_size_limit(Some(0));
        assert!(background_read(MemoryStream::new(), zero_limit).unwrap_err().is_config());

        let zero_poll = ReadOptions::default().with_poll_interval(Duration::ZERO);
        assert!(background_read(MemoryStream::new(), zero_poll).unwrap_err().is_config());
    }

    #[test]
    fn test_unlimited_block_size() {
        let mut stream = MemoryStream::with_contents(&[7u8; 200_000]);
        stream.close().unwrap();
        let task = background_read(stream, fast().with_block_size_limit(None)).unwrap();
        task.wait();
        assert_eq!(task.chunk_count(), 1);
        assert_eq!(task.data().len(), 200_000);
    }
}
