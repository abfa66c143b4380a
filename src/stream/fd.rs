//! Adapters exposing descriptor-backed std types as [`Stream`]s.

use super::caps::{Capabilities, Stream};
use super::mode::StreamMode;
use super::poll::{bytes_available, poll_fd, recv_fd, Interest};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::time::Duration;

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "stream is closed")
}

/// How an [`FdReader`] pulls bytes off its descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadKind {
    /// `Read::read`, as for files, pipes and terminals.
    File,
    /// `recv(2)`, as for sockets.
    Socket,
}

/// A readable descriptor: file, pipe, terminal, child stdout or socket.
///
/// Bytes handed back through [`Stream::unread`] are kept in front of the
/// descriptor and served first. Closing drops the inner value, which closes
/// the descriptor.
#[derive(Debug)]
pub struct FdReader<T> {
    inner: Option<T>,
    kind: ReadKind,
    mode: Option<String>,
    pushback: Vec<u8>,
}

impl<T: Read + AsRawFd + Send> FdReader<T> {
    /// Wrap a file-like reader.
    pub const fn new(inner: T) -> Self {
        Self {
            inner: Some(inner),
            kind: ReadKind::File,
            mode: None,
            pushback: Vec::new(),
        }
    }

    /// Wrap a socket, read through `recv(2)`.
    pub const fn socket(inner: T) -> Self {
        Self {
            inner: Some(inner),
            kind: ReadKind::Socket,
            mode: None,
            pushback: Vec::new(),
        }
    }

    /// Attach a mode descriptor such as `"rb"` or `"rt"`.
    #[must_use]
    pub fn with_mode(mut self, descriptor: impl Into<String>) -> Self {
        self.mode = Some(descriptor.into());
        self
    }

    /// Borrow the inner value, or `None` once closed.
    pub const fn get_ref(&self) -> Option<&T> {
        self.inner.as_ref()
    }

    /// Unwrap the inner value, or `None` once closed.
    pub fn into_inner(self) -> Option<T> {
        self.inner
    }

    fn inner_mut(&mut self) -> io::Result<&mut T> {
        self.inner.as_mut().ok_or_else(closed)
    }

    fn fd(&self) -> io::Result<std::os::unix::io::RawFd> {
        self.inner.as_ref().map(AsRawFd::as_raw_fd).ok_or_else(closed)
    }

    /// Serve a read from the pushback buffer, if it holds anything.
    fn take_pushback(&mut self, buf: &mut [u8]) -> Option<usize> {
        if self.pushback.is_empty() || buf.is_empty() {
            return None;
        }
        let n = buf.len().min(self.pushback.len());
        buf[..n].copy_from_slice(&self.pushback[..n]);
        self.pushback.drain(..n);
        Some(n)
    }
}

impl<T: Read + AsRawFd + Send> Stream for FdReader<T> {
    fn capabilities(&self) -> Capabilities {
        let read = match self.kind {
            ReadKind::File => Capabilities::READ,
            ReadKind::Socket => Capabilities::RECV,
        };
        read | Capabilities::CLOSE | Capabilities::AVAILABLE | Capabilities::UNREAD
    }

    fn mode_descriptor(&self) -> Option<&str> {
        self.mode.as_deref()
    }

    fn probe_mode(&mut self) -> io::Result<StreamMode> {
        self.fd()?;
        Ok(StreamMode::Binary)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.fd()?;
        match self.take_pushback(buf) {
            Some(n) => Ok(n),
            None => self.inner_mut()?.read(buf),
        }
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let fd = self.fd()?;
        match self.take_pushback(buf) {
            Some(n) => Ok(n),
            None => recv_fd(fd, buf),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        self.inner.take();
        self.pushback.clear();
        Ok(())
    }

    fn available(&self) -> io::Result<usize> {
        Ok(self.pushback.len() + bytes_available(self.fd()?)?)
    }

    fn unread(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.fd()?;
        self.pushback.splice(0..0, bytes.iter().copied());
        Ok(())
    }

    fn poll_readable(&self, timeout: Duration) -> io::Result<bool> {
        let fd = self.fd()?;
        if !self.pushback.is_empty() {
            return Ok(true);
        }
        poll_fd(fd, Interest::Readable, timeout)
    }

    fn poll_writable(&self, _timeout: Duration) -> io::Result<bool> {
        Ok(false)
    }
}

/// A writable descriptor: file, pipe, terminal, child stdin or socket.
#[derive(Debug)]
pub struct FdWriter<T> {
    inner: Option<T>,
    mode: Option<String>,
}

impl<T: Write + AsRawFd + Send> FdWriter<T> {
    /// Wrap a writer.
    pub const fn new(inner: T) -> Self {
        Self {
            inner: Some(inner),
            mode: None,
        }
    }

    /// Attach a mode descriptor such as `"wb"` or `"wt"`.
    #[must_use]
    pub fn with_mode(mut self, descriptor: impl Into<String>) -> Self {
        self.mode = Some(descriptor.into());
        self
    }

    /// Borrow the inner value, or `None` once closed.
    pub const fn get_ref(&self) -> Option<&T> {
        self.inner.as_ref()
    }

    /// Unwrap the inner value, or `None` once closed.
    pub fn into_inner(self) -> Option<T> {
        self.inner
    }

    fn inner_mut(&mut self) -> io::Result<&mut T> {
        self.inner.as_mut().ok_or_else(closed)
    }
}

impl<T: Write + AsRawFd + Send> Stream for FdWriter<T> {
    fn capabilities(&self) -> Capabilities {
        Capabilities::WRITE | Capabilities::FLUSH | Capabilities::CLOSE
    }

    fn mode_descriptor(&self) -> Option<&str> {
        self.mode.as_deref()
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner_mut()?.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner_mut()?.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        if let Some(mut inner) = self.inner.take() {
            inner.flush()?;
        }
        Ok(())
    }

    fn poll_readable(&self, _timeout: Duration) -> io::Result<bool> {
        Ok(false)
    }

    fn poll_writable(&self, timeout: Duration) -> io::Result<bool> {
        let fd = self.inner.as_ref().map(AsRawFd::as_raw_fd).ok_or_else(closed)?;
        poll_fd(fd, Interest::Writable, timeout)
    }
}
