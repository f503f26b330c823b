/// Describes how JSON chunks are framed on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Framing {
    prefix: Option<&'static str>,
    sentinel: Option<&'static str>,
}

/// What a single line means under some [`Framing`].
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Frame<'a> {
    /// Blank lines and comments.
    Skip,
    /// A JSON chunk.
    Data(&'a str),
    /// The end-of-stream marker.
    Sentinel,
    /// The line lacks the expected prefix.
    Invalid,
}

impl Framing {
    /// Server-sent events: `data: <json>` lines, terminated by
    /// `data: [DONE]`.
    #[inline]
    pub const fn sse() -> Self {
        Self {
            prefix: Some("data:"),
            sentinel: Some("[DONE]"),
        }
    }

    /// Newline-delimited JSON without prefixes. The stream ends with the
    /// transport.
    #[inline]
    pub const fn ndjson() -> Self {
        Self {
            prefix: None,
            sentinel: None,
        }
    }

    /// A custom framing.
    #[inline]
    pub const fn new(
        prefix: Option<&'static str>,
        sentinel: Option<&'static str>,
    ) -> Self {
        Self { prefix, sentinel }
    }

    /// Returns `true` if streams under this framing end with a sentinel line.
    #[inline]
    pub const fn has_sentinel(&self) -> bool {
        self.sentinel.is_some()
    }

    pub(crate) fn classify<'a>(&self, line: &'a str) -> Frame<'a> {
        if line.trim().is_empty() {
            return Frame::Skip;
        }

        let data = match self.prefix {
            Some(prefix) => {
                // SSE comments, mostly keep-alives.
                if line.starts_with(':') {
                    return Frame::Skip;
                }
                let Some(rest) = line.strip_prefix(prefix) else {
                    return Frame::Invalid;
                };
                rest.strip_prefix(' ').unwrap_or(rest)
            }
            None => line,
        };

        if self.sentinel.is_some_and(|s| data.trim() == s) {
            return Frame::Sentinel;
        }
        Frame::Data(data)
    }
}
