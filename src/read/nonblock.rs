//! Non-blocking reads: drain whatever a stream has ready, then return.

use crate::error::{Error, Result};
use crate::stream::{detect_stream_mode, Capabilities, Data, Stream, StreamMode};
use std::io;
use std::time::Duration;

/// Readiness timeout for each poll inside [`nonblock_read`].
pub const READ_POLL_TIMEOUT: Duration = Duration::from_micros(1);

/// Result of one non-blocking read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Whatever was available, possibly empty.
    Data(Data),
    /// The peer closed and nothing was left to read.
    Closed,
}

impl ReadOutcome {
    /// Whether this is the end-of-stream marker.
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// The data, or `None` at end of stream.
    pub fn into_data(self) -> Option<Data> {
        match self {
            Self::Data(data) => Some(data),
            Self::Closed => None,
        }
    }
}

/// Which primitive pulls bytes off the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Read,
    Recv,
}

impl Source {
    fn resolve(caps: Capabilities) -> Result<Self> {
        if caps.contains(Capabilities::READ) {
            Ok(Self::Read)
        } else if caps.contains(Capabilities::RECV) {
            Ok(Self::Recv)
        } else {
            Err(Error::Unsupported("read or recv"))
        }
    }
}

/// What one read attempt produced.
enum Step {
    Read,
    WouldBlock,
    Eof,
}

/// Append up to `n` bytes from `stream` onto `acc`.
fn read_into<S: Stream + ?Sized>(
    stream: &mut S,
    source: Source,
    acc: &mut Vec<u8>,
    n: usize,
) -> Result<Step> {
    let start = acc.len();
    acc.resize(start + n, 0);
    loop {
        let buf = &mut acc[start..];
        let result = match source {
            Source::Read => stream.read(buf),
            Source::Recv => stream.recv(buf),
        };
        match result {
            Ok(0) => {
                acc.truncate(start);
                return Ok(Step::Eof);
            }
            Ok(read) => {
                acc.truncate(start + read);
                return Ok(Step::Read);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                acc.truncate(start);
                return Ok(Step::WouldBlock);
            }
            Err(e) => {
                acc.truncate(start);
                return Err(e.into());
            }
        }
    }
}

/// Length of the longest prefix of `bytes` made of whole characters.
///
/// A trailing character cut short is left out; malformed UTF-8 is an error.
fn whole_chars_len(bytes: &[u8]) -> Result<usize> {
    match std::str::from_utf8(bytes) {
        Ok(_) => Ok(bytes.len()),
        Err(e) if e.error_len().is_some() => Err(Error::InvalidText),
        Err(e) => Ok(e.valid_up_to()),
    }
}

/// Pick up continuation bytes of a trailing split character that are
/// already waiting. Returns `true` if the stream hit end of stream.
fn complete_text<S: Stream + ?Sized>(
    stream: &mut S,
    source: Source,
    acc: &mut Vec<u8>,
) -> Result<bool> {
    while whole_chars_len(acc)? < acc.len() {
        if !stream.poll_readable(READ_POLL_TIMEOUT)? {
            break;
        }
        match read_into(stream, source, acc, 1)? {
            Step::Read => {}
            Step::WouldBlock => break,
            Step::Eof => return Ok(true),
        }
    }
    Ok(false)
}

/// Read whatever `stream` has available without blocking.
///
/// Polls for readiness with a [`READ_POLL_TIMEOUT`] timeout and reads until
/// the stream is not ready, `limit` bytes have been collected (`None` or `0`
/// means no limit), or the peer closes. Streams that report
/// [`Capabilities::AVAILABLE`] are read in bulk; others a byte at a time.
///
/// Returns [`ReadOutcome::Closed`] only when the peer has closed and this
/// call collected nothing; data read before a close is returned first and
/// the next call reports the close.
///
/// The mode is `forced_mode` if given, otherwise [`detect_stream_mode`].
/// Text mode needs [`Capabilities::UNREAD`]: a trailing character whose
/// remaining bytes are not there yet is pushed back onto the stream and
/// returned by a later call once complete. Continuation bytes that are
/// already waiting are read even past `limit`, so a text result may run a
/// few bytes over.
pub fn nonblock_read<S: Stream + ?Sized>(
    stream: &mut S,
    limit: Option<usize>,
    forced_mode: Option<StreamMode>,
) -> Result<ReadOutcome> {
    let caps = stream.capabilities();
    let source = Source::resolve(caps)?;
    let mode = forced_mode.unwrap_or_else(|| detect_stream_mode(stream));
    if mode == StreamMode::Text && !caps.contains(Capabilities::UNREAD) {
        return Err(Error::Unsupported("unread"));
    }
    let limit = limit.filter(|&l| l > 0);
    let bulk = caps.contains(Capabilities::AVAILABLE);

    let mut acc = Vec::new();
    let mut closed = false;
    loop {
        let wanted = limit.map_or(usize::MAX, |l| l - acc.len());
        if wanted == 0 {
            break;
        }
        if !stream.poll_readable(READ_POLL_TIMEOUT)? {
            break;
        }
        let n = if bulk {
            stream.available().unwrap_or(0).clamp(1, wanted)
        } else {
            1
        };
        match read_into(stream, source, &mut acc, n)? {
            Step::Read => {}
            Step::WouldBlock => break,
            Step::Eof => {
                closed = true;
                break;
            }
        }
    }

    if closed && acc.is_empty() {
        return Ok(ReadOutcome::Closed);
    }

    log::trace!("nonblock_read collected {} bytes", acc.len());
    let data = match mode {
        StreamMode::Binary => Data::Binary(acc),
        StreamMode::Text => {
            if !closed {
                closed = complete_text(stream, source, &mut acc)?;
            }
            let whole = whole_chars_len(&acc)?;
            if whole < acc.len() {
                // Cut short by end of stream with nothing before it.
                if closed && whole == 0 {
                    return Err(Error::InvalidText);
                }
                stream.unread(&acc[whole..])?;
                acc.truncate(whole);
            }
            Data::Text(String::from_utf8(acc).map_err(|_| Error::InvalidText)?)
        }
    };
    Ok(ReadOutcome::Data(data))
}
