//! Stream mode detection: does a stream carry text or raw bytes?

use super::caps::Stream;
use super::data::Data;
use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// Whether a stream transports text or raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamMode {
    /// Raw bytes.
    #[default]
    Binary,
    /// UTF-8 text.
    Text,
}

impl StreamMode {
    /// Parse a mode descriptor such as `"rb"`, `"w+t"`, `"b"` or `"t"`.
    ///
    /// Returns `None` when the descriptor carries neither marker.
    pub fn from_descriptor(descriptor: &str) -> Option<Self> {
        if descriptor.contains('b') {
            Some(Self::Binary)
        } else if descriptor.contains('t') {
            Some(Self::Text)
        } else {
            None
        }
    }

    /// The empty sentinel for this mode.
    pub const fn empty(self) -> Data {
        Data::empty(self)
    }
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary => f.write_str("binary"),
            Self::Text => f.write_str("text"),
        }
    }
}

impl FromStr for StreamMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binary" => Ok(Self::Binary),
            "text" => Ok(Self::Text),
            other => Self::from_descriptor(other).ok_or_else(|| {
                Error::InvalidConfig(format!("unrecognised stream mode {other:?}"))
            }),
        }
    }
}

/// Determine whether `stream` carries text or bytes.
///
/// Checks the explicit mode descriptor first, then a zero-length probe read,
/// and falls back to [`StreamMode::Binary`].
pub fn detect_stream_mode<S: Stream + ?Sized>(stream: &mut S) -> StreamMode {
    if let Some(mode) = stream.mode_descriptor().and_then(StreamMode::from_descriptor) {
        return mode;
    }

    if stream.capabilities().can_read() {
        if let Ok(mode) = stream.probe_mode() {
            return mode;
        }
    }

    StreamMode::Binary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::caps::Capabilities;
    use std::io;

    struct Probe {
        descriptor: Option<&'static str>,
        probed: StreamMode,
        caps: Capabilities,
        probes: usize,
    }

    impl Probe {
        fn new(descriptor: Option<&'static str>, probed: StreamMode, caps: Capabilities) -> Self {
            Self {
                descriptor,
                probed,
                caps,
                probes: 0,
            }
        }
    }

    impl Stream for Probe {
        fn capabilities(&self) -> Capabilities {
            self.caps
        }

        fn mode_descriptor(&self) -> Option<&str> {
            self.descriptor
        }

        fn probe_mode(&mut self) -> io::Result<StreamMode> {
            self.probes += 1;
            Ok(self.probed)
        }
    }

    #[test]
    fn test_from_descriptor() {
        assert_eq!(StreamMode::from_descriptor("rb"), Some(StreamMode::Binary));
        assert_eq!(StreamMode::from_descriptor("wt"), Some(StreamMode::Text));
        assert_eq!(StreamMode::from_descriptor("r+"), None);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("t".parse::<StreamMode>().unwrap(), StreamMode::Text);
        assert_eq!("binary".parse::<StreamMode>().unwrap(), StreamMode::Binary);
        assert!("x".parse::<StreamMode>().unwrap_err().is_config());
    }

    #[test]
    fn test_descriptor_wins_over_stream_report() {
        let mut stream = Probe::new(Some("rt"), StreamMode::Binary, Capabilities::READ);
        assert_eq!(detect_stream_mode(&mut stream), StreamMode::Text);
        assert_eq!(stream.probes, 0);
    }

    #[test]
    fn test_stream_report_used_without_descriptor() {
        let mut stream = Probe::new(Some("r"), StreamMode::Text, Capabilities::RECV);
        assert_eq!(detect_stream_mode(&mut stream), StreamMode::Text);
        assert_eq!(stream.probes, 1);
    }

    #[test]
    fn test_default_binary_when_unreadable() {
        let mut stream = Probe::new(None, StreamMode::Text, Capabilities::WRITE);
        assert_eq!(detect_stream_mode(&mut stream), StreamMode::Binary);
        assert_eq!(stream.probes, 0);
    }
}
