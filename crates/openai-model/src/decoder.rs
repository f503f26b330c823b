use std::collections::HashSet;

use bellhop_model::{Error, RESULT_TOOL_NAME};
use bellhop_stream::{CandidateDelta, Chunk, ChunkDecoder, ToolFragment};

use crate::proto::{self, ChatCompletionChunk};

/// Decodes `chat.completion.chunk` objects.
///
/// When the output schema is carried by the implicit result tool, the
/// argument fragments of that tool are turned back into text deltas.
#[derive(Debug, Default)]
pub(crate) struct StreamDecoder {
    schema_as_tool: bool,
    result_indexes: HashSet<u32>,
}

impl StreamDecoder {
    #[inline]
    pub fn new(schema_as_tool: bool) -> Self {
        Self {
            schema_as_tool,
            result_indexes: HashSet::new(),
        }
    }

    fn is_result_fragment(&mut self, fragment: &ToolFragment) -> bool {
        if !self.schema_as_tool {
            return false;
        }
        if fragment.name.as_deref() == Some(RESULT_TOOL_NAME) {
            self.result_indexes.insert(fragment.index);
            return true;
        }
        fragment.name.is_none() && self.result_indexes.contains(&fragment.index)
    }
}

impl ChunkDecoder for StreamDecoder {
    fn decode(&mut self, data: &str) -> Result<Chunk, Error> {
        trace!("got chunk: {data}");
        let chunk: ChatCompletionChunk = serde_json::from_str(data)
            .map_err(|err| Error::protocol(format!("bad chunk: {err}")))?;

        let mut candidates = Vec::with_capacity(chunk.choices.len());
        for choice in chunk.choices {
            let mut content = choice.delta.content;
            let sent_content = content.is_some();
            let mut tool_calls = vec![];
            for (i, tool_call) in
                choice.delta.tool_calls.into_iter().flatten().enumerate()
            {
                let (name, arguments) = match tool_call.function {
                    Some(function) => (function.name, function.arguments),
                    None => (None, None),
                };
                let fragment = ToolFragment {
                    index: tool_call.index.unwrap_or(i as u32),
                    id: tool_call.id,
                    name,
                    arguments,
                };
                if self.is_result_fragment(&fragment) {
                    if let Some(arguments) = fragment.arguments {
                        content.get_or_insert_default().push_str(&arguments);
                    }
                    continue;
                }
                tool_calls.push(fragment);
            }
            candidates.push(CandidateDelta {
                index: choice.index,
                role: choice.delta.role.as_deref().and_then(proto::parse_role),
                // Empty text from the backend is kept, empty result
                // fragments are not.
                content: content.filter(|c| sent_content || !c.is_empty()),
                finish_reason: choice.finish_reason,
                tool_calls,
            });
        }

        let has_content = candidates.iter().any(CandidateDelta::has_content);
        let usage = match chunk.usage {
            Some(_) if has_content => {
                debug!("usage sent along with content, ignoring");
                None
            }
            usage => usage.map(|u| u.into_metadata(chunk.model)),
        };
        Ok(Chunk { usage, candidates })
    }
}

#[cfg(test)]
mod tests {
    use bellhop_model::Role;

    use super::*;

    #[test]
    fn test_text_chunk() {
        let chunk = StreamDecoder::new(false)
            .decode(
                r#"{"id":"1","model":"gpt","choices":[{"index":0,
                "delta":{"role":"assistant","content":"Hi"},
                "finish_reason":null}]}"#,
            )
            .unwrap();
        assert_eq!(chunk.usage, None);
        assert_eq!(chunk.candidates[0].role, Some(Role::Assistant));
        assert_eq!(chunk.candidates[0].content.as_deref(), Some("Hi"));
    }

    #[test]
    fn test_empty_opening_content_is_kept() {
        let chunk = StreamDecoder::new(false)
            .decode(
                r#"{"choices":[{"index":0,
                "delta":{"role":"assistant","content":""}}]}"#,
            )
            .unwrap();
        assert_eq!(chunk.candidates[0].content.as_deref(), Some(""));
        assert!(chunk.candidates[0].has_content());
    }

    #[test]
    fn test_usage_chunk() {
        let chunk = StreamDecoder::new(false)
            .decode(
                r#"{"model":"gpt","choices":[],"usage":{"prompt_tokens":3,
                "completion_tokens":4,"total_tokens":7,
                "completion_tokens_details":{"reasoning_tokens":2}}}"#,
            )
            .unwrap();
        let usage = chunk.usage.unwrap();
        assert_eq!(usage.model, "gpt");
        assert_eq!(usage.total_tokens, 7);
        assert_eq!(usage.thinking_tokens, 2);
    }

    #[test]
    fn test_result_tool_becomes_text() {
        let mut decoder = StreamDecoder::new(true);
        let first = decoder
            .decode(
                r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,
                "id":"c1","type":"function","function":{"name":"result",
                "arguments":""}}]}}]}"#,
            )
            .unwrap();
        assert!(!first.candidates[0].has_content());

        let second = decoder
            .decode(
                r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,
                "function":{"arguments":"{\"a\":1}"}}]}}]}"#,
            )
            .unwrap();
        assert_eq!(second.candidates[0].content.as_deref(), Some(r#"{"a":1}"#));
        assert!(second.candidates[0].tool_calls.is_empty());
    }

    #[test]
    fn test_malformed_chunk() {
        let err = StreamDecoder::new(false).decode("{not json").unwrap_err();
        assert_eq!(err.kind(), bellhop_model::ErrorKind::Protocol);
    }
}
