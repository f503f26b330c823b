use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt, stream};

type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes, String>> + Send>>;

/// The transport failed while reading the body.
#[derive(Debug, PartialEq, Eq)]
pub struct Error(pub String);

/// An adapter for streaming byte chunks.
pub struct Chunks {
    inner: ChunkStream,
}

impl Chunks {
    /// Wraps a stream of byte chunks, e.g. a response body stream.
    pub fn from_stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Display,
    {
        let inner = stream.map(|chunk| chunk.map_err(|err| format!("{err}")));
        Self {
            inner: Box::pin(inner),
        }
    }

    /// Creates chunks from an in-memory buffer.
    pub fn from_vec_deque(chunks: VecDeque<Bytes>) -> Self {
        Self {
            inner: Box::pin(stream::iter(chunks.into_iter().map(Ok))),
        }
    }

    /// Creates chunks from a static string, split at the given sizes.
    ///
    /// Useful for feeding canned transcripts with arbitrary chunk
    /// boundaries.
    pub fn from_static_split(body: &'static str, sizes: &[usize]) -> Self {
        let mut rest = body.as_bytes();
        let mut chunks = VecDeque::new();
        for &size in sizes {
            if rest.is_empty() {
                break;
            }
            let size = size.min(rest.len());
            chunks.push_back(Bytes::from_static(&rest[..size]));
            rest = &rest[size..];
        }
        if !rest.is_empty() {
            chunks.push_back(Bytes::from_static(rest));
        }
        Self::from_vec_deque(chunks)
    }

    #[inline]
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        match self.inner.next().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(err)) => Err(Error(err)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_split() {
        let mut chunks = Chunks::from_static_split("abcdef", &[1, 2]);
        assert_eq!(chunks.next_chunk().await.unwrap().unwrap(), "a");
        assert_eq!(chunks.next_chunk().await.unwrap().unwrap(), "bc");
        assert_eq!(chunks.next_chunk().await.unwrap().unwrap(), "def");
        assert_eq!(chunks.next_chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_transport_error() {
        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"data")),
            Err("connection reset"),
        ]);
        let mut chunks = Chunks::from_stream(body);
        assert!(chunks.next_chunk().await.unwrap().is_some());
        assert_eq!(
            chunks.next_chunk().await.unwrap_err(),
            Error("connection reset".to_owned())
        );
    }
}
