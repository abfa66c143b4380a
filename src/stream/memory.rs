//! `MemoryStream`: an in-process pipe that is also a [`Stream`].

use super::caps::{Capabilities, Stream};
use super::mode::StreamMode;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct Pipe {
    buffer: VecDeque<u8>,
    closed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    pipe: Mutex<Pipe>,
    ready: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Pipe> {
        self.pipe.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A cloneable in-memory byte pipe.
///
/// Every clone refers to the same buffer: bytes written through one clone are
/// read (and consumed) through any other. Closing marks the write side done;
/// readers drain what is left and then observe end of stream.
#[derive(Debug, Clone, Default)]
pub struct MemoryStream {
    shared: Arc<Shared>,
    mode: StreamMode,
}

impl MemoryStream {
    /// Create an empty binary-mode stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty text-mode stream.
    pub fn text() -> Self {
        Self {
            shared: Arc::default(),
            mode: StreamMode::Text,
        }
    }

    /// Create a stream pre-filled with `bytes`.
    pub fn with_contents(bytes: &[u8]) -> Self {
        let stream = Self::new();
        stream.shared.lock().buffer.extend(bytes);
        stream
    }

    /// The mode reported by the zero-length probe.
    pub const fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Append bytes as a producer would.
    pub fn push(&self, bytes: &[u8]) -> io::Result<()> {
        let mut pipe = self.shared.lock();
        if pipe.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "memory stream is closed"));
        }
        pipe.buffer.extend(bytes);
        drop(pipe);
        self.shared.ready.notify_all();
        Ok(())
    }

    /// Copy of the bytes not yet read.
    pub fn contents(&self) -> Vec<u8> {
        self.shared.lock().buffer.iter().copied().collect()
    }

    /// Whether the write side has been closed.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }
}

impl Stream for MemoryStream {
    fn capabilities(&self) -> Capabilities {
        Capabilities::READ
            | Capabilities::WRITE
            | Capabilities::FLUSH
            | Capabilities::CLOSE
            | Capabilities::AVAILABLE
            | Capabilities::UNREAD
    }

    fn probe_mode(&mut self) -> io::Result<StreamMode> {
        Ok(self.mode)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut pipe = self.shared.lock();
        let n = buf.len().min(pipe.buffer.len());
        for (slot, byte) in buf.iter_mut().zip(pipe.buffer.drain(..n)) {
            *slot = byte;
        }
        if n == 0 && !buf.is_empty() && !pipe.closed {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        Ok(n)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.push(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.shared.lock().closed = true;
        self.shared.ready.notify_all();
        Ok(())
    }

    fn available(&self) -> io::Result<usize> {
        Ok(self.shared.lock().buffer.len())
    }

    fn unread(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut pipe = self.shared.lock();
        for &byte in bytes.iter().rev() {
            pipe.buffer.push_front(byte);
        }
        drop(pipe);
        self.shared.ready.notify_all();
        Ok(())
    }

    fn poll_readable(&self, timeout: Duration) -> io::Result<bool> {
        let pipe = self.shared.lock();
        let (pipe, _) = self
            .shared
            .ready
            .wait_timeout_while(pipe, timeout, |p| p.buffer.is_empty() && !p.closed)
            .unwrap_or_else(PoisonError::into_inner);
        Ok(!pipe.buffer.is_empty() || pipe.closed)
    }

    fn poll_writable(&self, _timeout: Duration) -> io::Result<bool> {
        Ok(true)
    }
}
