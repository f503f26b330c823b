use std::collections::HashMap;

use bellhop_model::{
    Role, StreamReceiver, StreamResponse, ToolCallFragment,
};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::chunk::{Chunk, ChunkDecoder};
use crate::framing::{Frame, Framing};
use crate::io::{Chunks, Lines, LinesError};

/// The state of one stream reconstruction.
///
/// Turns normalized chunks into ordered delta and metadata events. The
/// state must not be shared between streams.
#[derive(Debug)]
pub struct Reconstructor {
    last_role: Role,
    // Remembered (id, name) per fragment index.
    calls: HashMap<u32, (String, String)>,
    metadata_sent: bool,
}

impl Default for Reconstructor {
    fn default() -> Self {
        Self {
            last_role: Role::Assistant,
            calls: HashMap::new(),
            metadata_sent: false,
        }
    }
}

impl Reconstructor {
    /// Feeds a chunk, pushing the resulting events into `events`.
    ///
    /// On error, the events pushed before the offending fragment are kept,
    /// and the stream should stop.
    pub fn feed(
        &mut self,
        chunk: Chunk,
        events: &mut Vec<StreamResponse>,
    ) -> Result<(), String> {
        if let Some(usage) = chunk.usage {
            if !self.metadata_sent {
                self.metadata_sent = true;
                events.push(StreamResponse::Metadata(usage));
            }
            return Ok(());
        }

        for candidate in chunk.candidates {
            let role = candidate.role.unwrap_or(self.last_role);
            self.last_role = role;

            if !candidate.has_content() {
                // Completion signals and role-only deltas.
                if let Some(reason) = &candidate.finish_reason {
                    debug!("candidate {} finished: {reason}", candidate.index);
                }
                continue;
            }
            if self.metadata_sent {
                return Err("received content after usage metadata".to_owned());
            }

            if let Some(content) = candidate.content {
                events.push(StreamResponse::text(role, candidate.index, content));
            }

            for fragment in candidate.tool_calls {
                let fresh = match (fragment.id, fragment.name) {
                    (Some(id), Some(name))
                        if !id.is_empty() && !name.is_empty() =>
                    {
                        Some((id, name))
                    }
                    _ => None,
                };
                let (id, name) = match fresh {
                    Some(pair) => {
                        self.calls.insert(fragment.index, pair.clone());
                        pair
                    }
                    None => match self.calls.get(&fragment.index) {
                        Some(pair) => pair.clone(),
                        None => {
                            return Err(format!(
                                "tool call fragment at index {} has no name \
                                 and id",
                                fragment.index
                            ));
                        }
                    },
                };
                events.push(StreamResponse::tool_call(
                    role,
                    fragment.index,
                    ToolCallFragment {
                        id,
                        name,
                        argument: fragment.arguments.unwrap_or_default(),
                    },
                ));
            }
        }
        Ok(())
    }
}

/// Sends the terminal event when the worker exits, whatever the reason.
struct EofGuard(UnboundedSender<StreamResponse>);

impl Drop for EofGuard {
    fn drop(&mut self) {
        self.0.send(StreamResponse::Eof).ok();
    }
}

/// Spawns a worker that reconstructs the framed chunk stream into response
/// events.
///
/// The worker is the only writer of the returned channel. Every exit path
/// (sentinel, end of body, framing/decoding/transport error, cancellation)
/// ends the channel with exactly one [`StreamResponse::Eof`]; failures are
/// reported by a single [`StreamResponse::Error`] right before it. A body
/// that ends without the sentinel of a framing that has one is a failure.
///
/// Must be called within a tokio runtime.
pub fn spawn<D: ChunkDecoder>(
    chunks: Chunks,
    framing: Framing,
    decoder: D,
    cancel: CancellationToken,
) -> StreamReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(
        run(EofGuard(tx), chunks, framing, decoder, cancel)
            .instrument(debug_span!("stream worker")),
    );
    rx
}

async fn run<D: ChunkDecoder>(
    guard: EofGuard,
    chunks: Chunks,
    framing: Framing,
    mut decoder: D,
    cancel: CancellationToken,
) {
    let tx = &guard.0;
    let mut lines = Lines::new(chunks);
    let mut state = Reconstructor::default();
    let mut events = Vec::new();

    loop {
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("stream cancelled");
                tx.send(StreamResponse::error("request cancelled")).ok();
                return;
            }
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) if framing.has_sentinel() => {
                warn!("stream body ended before the end marker");
                tx.send(StreamResponse::error(
                    "stream ended before the end marker",
                ))
                .ok();
                return;
            }
            Ok(None) => {
                trace!("stream body exhausted");
                return;
            }
            Err(LinesError::ChunksError(err)) => {
                error!("transport error while streaming: {}", err.0);
                tx.send(StreamResponse::error(err.0)).ok();
                return;
            }
            Err(LinesError::InvalidPayload) => {
                warn!("stream body is not valid UTF-8");
                tx.send(StreamResponse::error("invalid UTF-8 in stream"))
                    .ok();
                return;
            }
        };
        trace!("got line: {line}");

        let data = match framing.classify(&line) {
            Frame::Skip => continue,
            Frame::Sentinel => return,
            Frame::Data(data) => data,
            Frame::Invalid => {
                warn!("unexpected line in stream: {line}");
                tx.send(StreamResponse::error(format!(
                    "unexpected line in stream: {line}"
                )))
                .ok();
                return;
            }
        };

        let chunk = match decoder.decode(data) {
            Ok(chunk) => chunk,
            Err(err) => {
                warn!("undecodable chunk: {err}");
                tx.send(StreamResponse::error(err.message())).ok();
                return;
            }
        };

        let result = state.feed(chunk, &mut events);
        for event in events.drain(..) {
            if tx.send(event).is_err() {
                debug!("stream receiver dropped");
                return;
            }
        }
        if let Err(message) = result {
            warn!("{message}");
            tx.send(StreamResponse::error(message)).ok();
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use bellhop_model::{Delta, Metadata};

    use super::*;
    use crate::chunk::{CandidateDelta, ToolFragment};

    fn fragment(
        index: u32,
        id: Option<&str>,
        name: Option<&str>,
        arguments: &str,
    ) -> Chunk {
        Chunk {
            usage: None,
            candidates: vec![CandidateDelta {
                tool_calls: vec![ToolFragment {
                    index,
                    id: id.map(str::to_owned),
                    name: name.map(str::to_owned),
                    arguments: Some(arguments.to_owned()),
                }],
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_role_is_carried_forward() {
        let mut state = Reconstructor::default();
        let mut events = vec![];
        let first = Chunk {
            usage: None,
            candidates: vec![CandidateDelta {
                role: Some(Role::Assistant),
                content: Some(String::new()),
                ..Default::default()
            }],
        };
        let second = Chunk {
            usage: None,
            candidates: vec![CandidateDelta {
                content: Some("Hi".to_owned()),
                ..Default::default()
            }],
        };
        state.feed(first, &mut events).unwrap();
        state.feed(second, &mut events).unwrap();
        assert_eq!(
            events,
            vec![
                StreamResponse::text(Role::Assistant, 0, ""),
                StreamResponse::text(Role::Assistant, 0, "Hi"),
            ]
        );
    }

    #[test]
    fn test_completion_only_candidates_are_skipped() {
        let mut state = Reconstructor::default();
        let mut events = vec![];
        let chunk = Chunk {
            usage: None,
            candidates: vec![CandidateDelta {
                finish_reason: Some("stop".to_owned()),
                ..Default::default()
            }],
        };
        state.feed(chunk, &mut events).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_fragments_reuse_remembered_call() {
        let mut state = Reconstructor::default();
        let mut events = vec![];
        state
            .feed(fragment(0, Some("1"), Some("f"), ""), &mut events)
            .unwrap();
        state
            .feed(fragment(0, None, None, r#"{"a":"#), &mut events)
            .unwrap();
        state.feed(fragment(0, None, None, "1}"), &mut events).unwrap();

        let mut arguments = String::new();
        for event in &events {
            let StreamResponse::Delta(Delta {
                tool_call: Some(call),
                ..
            }) = event
            else {
                panic!("unexpected event: {event:?}");
            };
            assert_eq!((call.id.as_str(), call.name.as_str()), ("1", "f"));
            arguments.push_str(&call.argument);
        }
        assert_eq!(arguments, r#"{"a":1}"#);
    }

    #[test]
    fn test_fragment_without_call_is_an_error() {
        let mut state = Reconstructor::default();
        let mut events = vec![];
        state
            .feed(fragment(0, Some("1"), Some("f"), ""), &mut events)
            .unwrap();
        let err = state
            .feed(fragment(1, None, None, "{}"), &mut events)
            .unwrap_err();
        assert!(err.contains("index 1"));
    }

    #[test]
    fn test_metadata_is_emitted_once() {
        let mut state = Reconstructor::default();
        let mut events = vec![];
        let usage = Chunk {
            usage: Some(Metadata {
                total_tokens: 3,
                ..Default::default()
            }),
            candidates: vec![],
        };
        state.feed(usage.clone(), &mut events).unwrap();
        state.feed(usage, &mut events).unwrap();
        assert_eq!(events.len(), 1);

        let late = Chunk {
            usage: None,
            candidates: vec![CandidateDelta {
                content: Some("late".to_owned()),
                ..Default::default()
            }],
        };
        assert!(state.feed(late, &mut events).is_err());
    }
}
