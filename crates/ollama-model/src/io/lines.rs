use max_model::ErrorKind;

use super::Chunks;
use crate::Error;

/// Longest line accepted before the stream is considered broken.
pub const MAX_LINE_LEN: usize = 4 * 1024 * 1024;

/// Reads newline-delimited records from a chunk stream.
///
/// Bytes are buffered until a full line is available, so multi-byte
/// characters split across chunks are decoded correctly. Blank lines are
/// skipped. A final line without a terminating newline is still returned
/// once the stream ends. A line longer than [`MAX_LINE_LEN`] is an error.
pub struct Lines {
    buf: Vec<u8>,
    chunks: Chunks,
    eof: bool,
}

impl Lines {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: Vec::new(),
            chunks,
            eof: false,
        }
    }

    pub async fn next_line(&mut self) -> Result<Option<String>, Error> {
        loop {
            if let Some(line) = self.take_line()? {
                return Ok(Some(line));
            }
            if self.eof {
                return Ok(None);
            }
            match self.chunks.next_chunk().await? {
                Some(bytes) => self.buf.extend_from_slice(&bytes),
                None => self.eof = true,
            }
        }
    }

    fn take_line(&mut self) -> Result<Option<String>, Error> {
        loop {
            let end = match self.buf.iter().position(|b| *b == b'\n') {
                Some(idx) => idx + 1,
                None if self.eof && !self.buf.is_empty() => self.buf.len(),
                None if self.buf.len() > MAX_LINE_LEN => {
                    return Err(Error::new(
                        format!("response line exceeds {MAX_LINE_LEN} bytes"),
                        ErrorKind::Other,
                    ));
                }
                None => return Ok(None),
            };
            let raw: Vec<u8> = self.buf.drain(..end).collect();
            let line = String::from_utf8(raw).map_err(|_| {
                Error::new("response is not valid UTF-8", ErrorKind::Other)
            })?;
            let line = line.trim();
            if !line.is_empty() {
                return Ok(Some(line.to_owned()));
            }
        }
    }
}
