//! Readiness checks on raw file descriptors.

use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

/// Which readiness to wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    /// Data (or end of stream) can be read.
    Readable,
    /// A write will not block.
    Writable,
}

impl Interest {
    const fn events(self) -> libc::c_short {
        match self {
            Self::Readable => libc::POLLIN,
            Self::Writable => libc::POLLOUT,
        }
    }
}

/// Convert a timeout to whole milliseconds for `poll(2)`.
///
/// Sub-millisecond timeouts become an immediate check; anything else rounds
/// up so a short positive timeout never turns into a busy spin.
fn timeout_millis(timeout: Duration) -> libc::c_int {
    if timeout < Duration::from_millis(1) {
        return 0;
    }
    let millis = timeout.as_nanos().div_ceil(1_000_000);
    libc::c_int::try_from(millis).unwrap_or(libc::c_int::MAX)
}

/// Wait up to `timeout` for `fd` to become ready.
///
/// Hang-up and error conditions report ready so the following read or write
/// observes them.
#[allow(unsafe_code)]
pub fn poll_fd(fd: RawFd, interest: Interest, timeout: Duration) -> io::Result<bool> {
    let mut pollfd = libc::pollfd {
        fd,
        events: interest.events(),
        revents: 0,
    };
    let millis = timeout_millis(timeout);

    loop {
        // SAFETY: `pollfd` is a valid, initialised array of length 1.
        let ret = unsafe { libc::poll(&mut pollfd, 1, millis) };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        if ret == 0 {
            return Ok(false);
        }
        if pollfd.revents & libc::POLLNVAL != 0 {
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        }
        let ready = interest.events() | libc::POLLHUP | libc::POLLERR;
        return Ok(pollfd.revents & ready != 0);
    }
}

/// Number of bytes queued for reading on `fd`.
#[allow(unsafe_code)]
pub fn bytes_available(fd: RawFd) -> io::Result<usize> {
    let mut count: libc::c_int = 0;
    // SAFETY: FIONREAD writes a single c_int through the provided pointer.
    let ret = unsafe { libc::ioctl(fd, libc::FIONREAD as _, std::ptr::addr_of_mut!(count)) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(usize::try_from(count).unwrap_or(0))
}

/// Receive from a socket descriptor.
#[allow(unsafe_code)]
pub fn recv_fd(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
    let ret = unsafe { libc::recv(fd, buf.as_mut_ptr().cast::<libc::c_void>(), buf.len(), 0) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(ret.unsigned_abs())
}
