use bellhop_model::{Error, Metadata, Role};

/// One decoded chunk of a streamed response, normalized across backends.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Chunk {
    /// Set when the chunk carries the final token accounting.
    pub usage: Option<Metadata>,
    /// Per-candidate deltas.
    pub candidates: Vec<CandidateDelta>,
}

/// The delta of one candidate in a [`Chunk`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CandidateDelta {
    pub index: u32,
    /// Backends usually send the role in the first chunk only.
    pub role: Option<Role>,
    pub content: Option<String>,
    pub finish_reason: Option<String>,
    pub tool_calls: Vec<ToolFragment>,
}

impl CandidateDelta {
    /// Returns `true` if this delta carries text or tool call fragments.
    #[inline]
    pub fn has_content(&self) -> bool {
        self.content.is_some() || !self.tool_calls.is_empty()
    }
}

/// A fragment of a streamed tool call.
///
/// The first fragment of a call carries `id` and `name`, the following ones
/// carry `arguments` only.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolFragment {
    pub index: u32,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
}

/// Turns one framed line of a backend stream into a [`Chunk`].
///
/// This is the only part of stream reconstruction that differs between
/// adapters.
pub trait ChunkDecoder: Send + 'static {
    /// Decodes a single chunk.
    fn decode(&mut self, data: &str) -> Result<Chunk, Error>;
}

impl<F> ChunkDecoder for F
where
    F: FnMut(&str) -> Result<Chunk, Error> + Send + 'static,
{
    #[inline]
    fn decode(&mut self, data: &str) -> Result<Chunk, Error> {
        self(data)
    }
}
