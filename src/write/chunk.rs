//! Splitting a block into ordered chunks.

use crate::error::{Error, Result};
use crate::stream::Data;

fn check_size(chunk_size: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(Error::InvalidConfig("chunk size must be positive".into()));
    }
    Ok(())
}

/// Split bytes into blocks of at most `chunk_size` bytes, in order.
///
/// `chunk_size` must be non-zero.
pub fn chunk_bytes(data: &[u8], chunk_size: usize) -> Vec<Vec<u8>> {
    data.chunks(chunk_size.max(1)).map(<[u8]>::to_vec).collect()
}

/// Split text into blocks of at most `chunk_size` characters, in order.
///
/// Never splits inside a character. `chunk_size` must be non-zero.
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::with_capacity(text.len() / chunk_size + 1);
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == chunk_size {
            chunks.push(text[start..idx].to_owned());
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(text[start..].to_owned());
    }
    chunks
}

/// Split `data` into chunks of at most `chunk_size` units.
///
/// Units are bytes for binary data and characters for text. Concatenating
/// the result gives back `data`; only the last chunk may be shorter.
pub fn chunk_data(data: &Data, chunk_size: usize) -> Result<Vec<Data>> {
    check_size(chunk_size)?;
    Ok(match data {
        Data::Binary(bytes) => chunk_bytes(bytes, chunk_size)
            .into_iter()
            .map(Data::Binary)
            .collect(),
        Data::Text(text) => chunk_text(text, chunk_size)
            .into_iter()
            .map(Data::Text)
            .collect(),
    })
}
