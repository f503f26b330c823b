use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// A type for reading lines from a chunk stream.
///
/// Chunk boundaries are arbitrary, a line (or even a UTF-8 character) may
/// be split across chunks.
pub struct Lines {
    buf: Vec<u8>,
    chunks: Chunks,
    exhausted: bool,
}

impl Lines {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: Vec::new(),
            chunks,
            exhausted: false,
        }
    }

    /// Returns the next line without its line ending, or `None` when the
    /// stream is exhausted. A trailing line without a line feed is still
    /// returned.
    pub async fn next_line(&mut self) -> Result<Option<String>, Error> {
        loop {
            if let Some(line) = self.try_take_line()? {
                return Ok(Some(line));
            }
            if self.exhausted {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let rest = std::mem::take(&mut self.buf);
                return decode_line(rest).map(Some);
            }

            match self.chunks.next_chunk().await.map_err(Error::ChunksError)? {
                Some(bytes) => self.buf.extend_from_slice(&bytes),
                None => self.exhausted = true,
            }
        }
    }

    fn try_take_line(&mut self) -> Result<Option<String>, Error> {
        // For `end-of-line`, we handle `lf` and `cr lf`.
        let Some(eol_idx) = self.buf.iter().position(|b| *b == b'\n') else {
            return Ok(None);
        };
        let mut line: Vec<u8> = self.buf.drain(..=eol_idx).collect();
        line.pop();
        decode_line(line).map(Some)
    }
}

fn decode_line(mut line: Vec<u8>) -> Result<String, Error> {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    String::from_utf8(line).map_err(|_| Error::InvalidPayload)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[tokio::test]
    async fn test_normal_lines() {
        let chunks = Chunks::from_vec_deque(
            vec![
                Bytes::from_static(b"data: hello\n\n"),
                Bytes::from_static(b"data: bye\r\n"),
            ]
            .into(),
        );
        let mut lines = Lines::new(chunks);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "data: hello");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "data: bye");
        assert_eq!(lines.next_line().await.unwrap(), None);
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_quirk_streaming() {
        let chunks = Chunks::from_vec_deque(
            vec![
                Bytes::from_static(b"data:"),
                Bytes::from_static(b" hel"),
                Bytes::from_static(b"lo\n"),
                Bytes::from_static(b"tail"),
            ]
            .into(),
        );
        let mut lines = Lines::new(chunks);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "data: hello");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "tail");
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_split_utf8() {
        let bytes = "é\n".as_bytes();
        let chunks = Chunks::from_vec_deque(
            vec![
                Bytes::copy_from_slice(&bytes[..1]),
                Bytes::copy_from_slice(&bytes[1..]),
            ]
            .into(),
        );
        let mut lines = Lines::new(chunks);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "é");
    }

    #[tokio::test]
    async fn test_invalid_data() {
        let chunks = Chunks::from_vec_deque(
            vec![Bytes::from_static(b"\xff\xfe\n")].into(),
        );
        let mut lines = Lines::new(chunks);
        assert_eq!(lines.next_line().await.unwrap_err(), Error::InvalidPayload);
    }
}
