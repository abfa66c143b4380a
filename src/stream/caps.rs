//! The `Stream` capability interface.

use super::mode::StreamMode;
use bitflags::bitflags;
use std::io;
use std::time::Duration;

bitflags! {
    /// Optional operations a stream supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u8 {
        /// File-like `read`.
        const READ = 0b0000_0001;
        /// Socket-like `recv`.
        const RECV = 0b0000_0010;
        /// `write_all`.
        const WRITE = 0b0000_0100;
        /// Explicit `flush`.
        const FLUSH = 0b0000_1000;
        /// Explicit `close`.
        const CLOSE = 0b0001_0000;
        /// Buffered available-byte count.
        const AVAILABLE = 0b0010_0000;
        /// Push bytes back to be read again.
        const UNREAD = 0b0100_0000;
    }
}

impl Capabilities {
    /// Whether the stream can produce data through `read` or `recv`.
    pub const fn can_read(self) -> bool {
        self.intersects(Self::READ.union(Self::RECV))
    }
}

pub(crate) fn unsupported(op: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, format!("stream does not support {op}"))
}

/// A byte-oriented stream handle.
///
/// Implementors advertise what they can do through [`Stream::capabilities`];
/// every optional operation defaults to an `Unsupported` error. Callers
/// resolve the capability set once and dispatch on it rather than probing
/// each iteration.
pub trait Stream: Send {
    /// The operations this stream supports.
    fn capabilities(&self) -> Capabilities;

    /// Explicit mode descriptor (for example `"rb"` or `"wt"`), if known.
    fn mode_descriptor(&self) -> Option<&str> {
        None
    }

    /// Perform a zero-length read and report which kind of value it yields.
    ///
    /// Must not consume data. Raw descriptors yield bytes.
    fn probe_mode(&mut self) -> io::Result<StreamMode> {
        let caps = self.capabilities();
        if caps.contains(Capabilities::READ) {
            self.read(&mut [])?;
        } else if caps.contains(Capabilities::RECV) {
            self.recv(&mut [])?;
        } else {
            return Err(unsupported("read"));
        }
        Ok(StreamMode::Binary)
    }

    /// File-like read. `Ok(0)` on a non-empty buffer means end of stream.
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(unsupported("read"))
    }

    /// Socket-like receive. `Ok(0)` on a non-empty buffer means the peer closed.
    fn recv(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(unsupported("recv"))
    }

    /// Write the whole buffer.
    fn write_all(&mut self, _buf: &[u8]) -> io::Result<()> {
        Err(unsupported("write"))
    }

    /// Flush buffered output.
    fn flush(&mut self) -> io::Result<()> {
        Err(unsupported("flush"))
    }

    /// Close the stream. Later operations fail.
    fn close(&mut self) -> io::Result<()> {
        Err(unsupported("close"))
    }

    /// Number of bytes that can be read right now without blocking.
    fn available(&self) -> io::Result<usize> {
        Err(unsupported("available"))
    }

    /// Return `bytes` to the front of the stream; the next read yields them
    /// first. Text-mode reads use this to hold back a character whose
    /// remaining bytes have not arrived yet.
    fn unread(&mut self, _bytes: &[u8]) -> io::Result<()> {
        Err(unsupported("unread"))
    }

    /// Wait up to `timeout` for the stream to become readable.
    ///
    /// A stream whose peer has closed counts as readable.
    fn poll_readable(&self, _timeout: Duration) -> io::Result<bool> {
        Ok(true)
    }

    /// Wait up to `timeout` for the stream to accept a write.
    fn poll_writable(&self, _timeout: Duration) -> io::Result<bool> {
        Ok(true)
    }
}

impl<S: Stream + ?Sized> Stream for Box<S> {
    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }

    fn mode_descriptor(&self) -> Option<&str> {
        (**self).mode_descriptor()
    }

    fn probe_mode(&mut self) -> io::Result<StreamMode> {
        (**self).probe_mode()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).recv(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }

    fn available(&self) -> io::Result<usize> {
        (**self).available()
    }

    fn unread(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).unread(bytes)
    }

    fn poll_readable(&self, timeout: Duration) -> io::Result<bool> {
        (**self).poll_readable(timeout)
    }

    fn poll_writable(&self, timeout: Duration) -> io::Result<bool> {
        (**self).poll_writable(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct WriteOnly;

    impl Stream for WriteOnly {
        fn capabilities(&self) -> Capabilities {
            Capabilities::WRITE
        }

        fn write_all(&mut self, _buf: &[u8]) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_can_read() {
        assert!(Capabilities::READ.can_read());
        assert!(Capabilities::RECV.can_read());
        assert!(!(Capabilities::WRITE | Capabilities::FLUSH).can_read());
    }

    #[test]
    fn test_defaults_are_unsupported() {
        let mut stream = WriteOnly;
        let err = stream.read(&mut [0u8; 1]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        assert_eq!(stream.flush().unwrap_err().kind(), io::ErrorKind::Unsupported);
        assert_eq!(stream.unread(b"x").unwrap_err().kind(), io::ErrorKind::Unsupported);
        assert!(stream.probe_mode().is_err());
        assert!(stream.write_all(b"x").is_ok());
    }

    #[test]
    fn test_boxed_stream_delegates() {
        let boxed: Box<dyn Stream> = Box::new(WriteOnly);
        assert_eq!(boxed.capabilities(), Capabilities::WRITE);
    }
}
