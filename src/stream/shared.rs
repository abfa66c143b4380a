//! `SharedStream`: one stream handle used by several tasks in turn.

use super::caps::{Capabilities, Stream};
use super::mode::StreamMode;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Longest stretch a readiness poll holds the lock.
const POLL_SLICE: Duration = Duration::from_millis(1);

/// A cloneable handle to a stream owned jointly by several tasks.
///
/// Each operation locks the stream for its duration only. Readiness polls
/// are cut into [`POLL_SLICE`] waits with the lock released in between, so
/// a long poll never starves the other handles. Sharing a
/// destination between write tasks without chaining them leaves the
/// interleaving of their chunks unspecified.
#[derive(Debug)]
pub struct SharedStream<S> {
    inner: Arc<Mutex<S>>,
    caps: Capabilities,
}

impl<S> Clone for SharedStream<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            caps: self.caps,
        }
    }
}

impl<S: Stream> SharedStream<S> {
    /// Share `stream`. Its capabilities are captured once here.
    pub fn new(stream: S) -> Self {
        let caps = stream.capabilities();
        Self {
            inner: Arc::new(Mutex::new(stream)),
            caps,
        }
    }

    /// Lock the underlying stream.
    pub fn lock(&self) -> MutexGuard<'_, S> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `poll` in slices until it reports ready or `timeout` runs out.
    fn poll_sliced<F>(&self, timeout: Duration, poll: F) -> io::Result<bool>
    where
        F: Fn(&S, Duration) -> io::Result<bool>,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let slice = remaining.min(POLL_SLICE);
            if poll(&self.lock(), slice)? {
                return Ok(true);
            }
            if remaining <= slice {
                return Ok(false);
            }
            thread::yield_now();
        }
    }
}

impl<S: Stream> Stream for SharedStream<S> {
    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn probe_mode(&mut self) -> io::Result<StreamMode> {
        let mut stream = self.lock();
        if let Some(mode) = stream.mode_descriptor().and_then(StreamMode::from_descriptor) {
            return Ok(mode);
        }
        stream.probe_mode()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.lock().read(buf)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.lock().recv(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.lock().write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock().flush()
    }

    fn close(&mut self) -> io::Result<()> {
        self.lock().close()
    }

    fn available(&self) -> io::Result<usize> {
        self.lock().available()
    }

    fn unread(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.lock().unread(bytes)
    }

    fn poll_readable(&self, timeout: Duration) -> io::Result<bool> {
        self.poll_sliced(timeout, |stream, slice| stream.poll_readable(slice))
    }

    fn poll_writable(&self, timeout: Duration) -> io::Result<bool> {
        self.poll_sliced(timeout, |stream, slice| stream.poll_writable(slice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::fd::FdWriter;
    use crate::stream::memory::MemoryStream;
    use std::fs::File;
    use std::io::Read;
    use tempdir::TempDir;

    #[test]
    fn test_clones_write_to_one_file() {
        let dir = TempDir::new("nonblock-shared").unwrap();
        let path = dir.path().join("out.bin");
        let shared = SharedStream::new(FdWriter::new(File::create(&path).unwrap()).with_mode("wb"));

        let mut first = shared.clone();
        let mut second = shared.clone();
        first.write_all(b"one ").unwrap();
        second.write_all(b"two").unwrap();
        assert!(second.capabilities().contains(Capabilities::FLUSH));
        second.close().unwrap();
        assert!(first.write_all(b"late").is_err());

        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "one two");
    }

    #[test]
    fn test_long_poll_does_not_block_other_handles() {
        let shared = SharedStream::new(MemoryStream::new());
        let poller = shared.clone();
        let waiting = thread::spawn(move || poller.poll_readable(Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(10));

        let mut writer = shared.clone();
        let started = Instant::now();
        writer.write_all(b"x").unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(waiting.join().unwrap().unwrap());
    }

    #[test]
    fn test_sliced_poll_times_out() {
        let shared = SharedStream::new(MemoryStream::new());
        let started = Instant::now();
        assert!(!shared.poll_readable(Duration::from_millis(20)).unwrap());
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert!(!shared.poll_readable(Duration::ZERO).unwrap());
    }

    #[test]
    fn test_mode_descriptor_seen_through_handle() {
        let dir = TempDir::new("nonblock-shared").unwrap();
        let file = File::create(dir.path().join("t.txt")).unwrap();
        let mut shared = SharedStream::new(FdWriter::new(file).with_mode("wt"));
        assert_eq!(shared.probe_mode().unwrap(), StreamMode::Text);
    }
}
