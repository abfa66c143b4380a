//! `Data`: a block of bytes or text moving through a stream.

use super::mode::StreamMode;

/// A block of data read from or written to a stream.
///
/// The variant mirrors the stream's [`StreamMode`]: binary streams carry raw
/// bytes and text streams carry UTF-8 strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Data {
    /// Raw bytes.
    Binary(Vec<u8>),
    /// UTF-8 text.
    Text(String),
}

impl Data {
    /// The empty value for the given mode.
    pub const fn empty(mode: StreamMode) -> Self {
        match mode {
            StreamMode::Binary => Self::Binary(Vec::new()),
            StreamMode::Text => Self::Text(String::new()),
        }
    }

    /// Mode this data belongs to.
    pub const fn mode(&self) -> StreamMode {
        match self {
            Self::Binary(_) => StreamMode::Binary,
            Self::Text(_) => StreamMode::Text,
        }
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether this is the empty value.
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Borrow the underlying bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Binary(bytes) => bytes,
            Self::Text(text) => text.as_bytes(),
        }
    }

    /// Borrow as text, if this is text data.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Binary(_) => None,
            Self::Text(text) => Some(text),
        }
    }

    /// Consume into raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Binary(bytes) => bytes,
            Self::Text(text) => text.into_bytes(),
        }
    }

    /// Join blocks into a single value of the given mode.
    ///
    /// Text blocks joined in binary mode contribute their UTF-8 bytes; binary
    /// blocks joined in text mode are decoded lossily.
    pub fn concat(mode: StreamMode, blocks: &[Self]) -> Self {
        match mode {
            StreamMode::Binary => {
                let total = blocks.iter().map(Self::len).sum();
                let mut out = Vec::with_capacity(total);
                for block in blocks {
                    out.extend_from_slice(block.as_bytes());
                }
                Self::Binary(out)
            }
            StreamMode::Text => {
                let mut out = String::new();
                for block in blocks {
                    match block {
                        Self::Text(text) => out.push_str(text),
                        Self::Binary(bytes) => out.push_str(&String::from_utf8_lossy(bytes)),
                    }
                }
                Self::Text(out)
            }
        }
    }
}

impl From<Vec<u8>> for Data {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

impl From<&[u8]> for Data {
    fn from(bytes: &[u8]) -> Self {
        Self::Binary(bytes.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Data {
    fn from(bytes: &[u8; N]) -> Self {
        Self::Binary(bytes.to_vec())
    }
}

impl From<String> for Data {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Data {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}
