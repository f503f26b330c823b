//! Re-emission of normalized stream events as server-sent events.
//!
//! Frames produced here use the same shape [`crate::spawn`] consumes with
//! [`crate::Framing::sse`], so a gateway re-emitting events can itself be
//! consumed with [`Decoder`].

use bellhop_model::{Error, StreamResponse};

use crate::chunk::{CandidateDelta, Chunk, ChunkDecoder, ToolFragment};

/// The frame that terminates a re-emitted stream.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Encodes one event as a `data: <json>\n\n` frame.
pub fn encode(event: &StreamResponse) -> Result<String, serde_json::Error> {
    Ok(format!("data: {}\n\n", serde_json::to_string(event)?))
}

/// Encodes a whole event sequence, ending with [`DONE_FRAME`].
///
/// The terminal `Eof` event is not written, the done frame stands for it.
pub fn encode_all<'a, I>(events: I) -> Result<String, serde_json::Error>
where
    I: IntoIterator<Item = &'a StreamResponse>,
{
    let mut out = String::new();
    for event in events {
        if event.is_eof() {
            break;
        }
        out.push_str(&encode(event)?);
    }
    out.push_str(DONE_FRAME);
    Ok(out)
}

/// Decodes re-emitted events back into chunks.
#[derive(Clone, Copy, Debug, Default)]
pub struct Decoder;

impl ChunkDecoder for Decoder {
    fn decode(&mut self, data: &str) -> Result<Chunk, Error> {
        let event: StreamResponse = serde_json::from_str(data)
            .map_err(|err| Error::protocol(format!("bad event: {err}")))?;
        match event {
            StreamResponse::Delta(delta) => {
                let tool_calls = delta
                    .tool_call
                    .map(|call| ToolFragment {
                        index: delta.index,
                        id: Some(call.id),
                        name: Some(call.name),
                        arguments: Some(call.argument),
                    })
                    .into_iter()
                    .collect();
                Ok(Chunk {
                    usage: None,
                    candidates: vec![CandidateDelta {
                        index: delta.index,
                        role: Some(delta.role),
                        content: delta.content,
                        finish_reason: None,
                        tool_calls,
                    }],
                })
            }
            StreamResponse::Metadata(metadata) => Ok(Chunk {
                usage: Some(metadata),
                candidates: vec![],
            }),
            StreamResponse::Error { message } => Err(Error::protocol(message)),
            StreamResponse::Eof => Ok(Chunk::default()),
        }
    }
}
