use std::ops::{Add, AddAssign};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::request::Role;
use crate::tool::Call;

/// Token accounting of one or more responses.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Metadata {
    /// The model that produced the response.
    #[serde(default)]
    pub model: String,
    /// Tokens in the prompt.
    #[serde(default)]
    pub input_tokens: u32,
    /// Tokens in the output.
    #[serde(default)]
    pub output_tokens: u32,
    /// Tokens spent on thinking.
    #[serde(default)]
    pub thinking_tokens: u32,
    /// Total tokens billed.
    #[serde(default)]
    pub total_tokens: u32,
}

impl AddAssign<&Metadata> for Metadata {
    fn add_assign(&mut self, rhs: &Metadata) {
        if self.model.is_empty() {
            self.model.clone_from(&rhs.model);
        }
        self.input_tokens = self.input_tokens.saturating_add(rhs.input_tokens);
        self.output_tokens =
            self.output_tokens.saturating_add(rhs.output_tokens);
        self.thinking_tokens =
            self.thinking_tokens.saturating_add(rhs.thinking_tokens);
        self.total_tokens = self.total_tokens.saturating_add(rhs.total_tokens);
    }
}

impl Add<&Metadata> for Metadata {
    type Output = Metadata;

    #[inline]
    fn add(mut self, rhs: &Metadata) -> Self::Output {
        self += rhs;
        self
    }
}

/// A complete, non-streamed response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// The generated texts, at most one entry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub texts: Vec<String>,
    /// Tool calls requested by the model.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Call>,
    /// Token accounting.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Response {
    /// Returns `true` if the response is a plain text answer.
    ///
    /// A response carrying tool calls is never a text response, even if the
    /// model emitted some text alongside.
    #[inline]
    pub fn is_text(&self) -> bool {
        !self.texts.is_empty() && self.tools.is_empty()
    }

    /// Returns `true` if the model requested tool calls.
    #[inline]
    pub fn is_tools(&self) -> bool {
        !self.tools.is_empty()
    }

    /// Returns the text of the response.
    pub fn as_text(&self) -> Result<&str, Error> {
        self.texts
            .first()
            .map(String::as_str)
            .ok_or_else(|| Error::protocol("response has no text"))
    }

    /// Returns the tool calls of the response.
    pub fn as_tools(&self) -> Result<&[Call], Error> {
        if !self.is_tools() {
            return Err(Error::protocol("response has no tool calls"));
        }
        Ok(&self.tools)
    }

    /// Decodes the text of the response as JSON.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let text = self.as_text()?;
        serde_json::from_str(text)
            .map_err(|err| Error::protocol(format!("undecodable text: {err}")))
    }
}

/// A fragment of a tool call in a streamed response.
///
/// The first fragment of a call carries the name and the id, the following
/// ones carry argument bytes only. Stream reconstruction repeats the
/// remembered name and id on every fragment, so consumers can accumulate
/// arguments keyed by `id`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallFragment {
    /// The call identifier.
    pub id: String,
    /// The called tool.
    pub name: String,
    /// A piece of the JSON-encoded arguments.
    #[serde(default)]
    pub argument: String,
}

/// An incremental content fragment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Delta {
    /// The role of the producer.
    pub role: Role,
    /// The candidate or tool call slot this fragment belongs to.
    pub index: u32,
    /// A piece of text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// A piece of a tool call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallFragment>,
}

/// An event of a streamed response.
///
/// A stream is a sequence of `Delta` events, at most one `Metadata` event
/// after all deltas, optionally one `Error` event, and always exactly one
/// `Eof` event that closes it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamResponse {
    /// Received a content fragment.
    Delta(Delta),
    /// Received the final token accounting.
    Metadata(Metadata),
    /// The stream failed.
    Error {
        /// Describes the failure.
        message: String,
    },
    /// The stream has ended.
    Eof,
}

impl StreamResponse {
    /// Creates a text delta.
    #[inline]
    pub fn text<S: Into<String>>(role: Role, index: u32, content: S) -> Self {
        Self::Delta(Delta {
            role,
            index,
            content: Some(content.into()),
            tool_call: None,
        })
    }

    /// Creates a tool call delta.
    #[inline]
    pub fn tool_call(role: Role, index: u32, fragment: ToolCallFragment) -> Self {
        Self::Delta(Delta {
            role,
            index,
            content: None,
            tool_call: Some(fragment),
        })
    }

    /// Creates an error event.
    #[inline]
    pub fn error<S: Into<String>>(message: S) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Returns `true` for the terminal event.
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_text_and_tools_are_exclusive() {
        let text = Response {
            texts: vec!["hi".to_owned()],
            ..Default::default()
        };
        assert!(text.is_text() && !text.is_tools());
        assert_eq!(text.as_text().unwrap(), "hi");
        assert!(text.as_tools().is_err());

        let tools = Response {
            texts: vec!["let me check".to_owned()],
            tools: vec![Call::new("1", "f", "{}")],
            ..Default::default()
        };
        assert!(!tools.is_text() && tools.is_tools());
        assert_eq!(tools.as_tools().unwrap().len(), 1);
        assert!(tools.as_text().is_ok());

        let empty = Response::default();
        assert!(!empty.is_text() && !empty.is_tools());
        assert!(empty.as_text().is_err());
        assert!(empty.as_tools().is_err());
    }

    #[test]
    fn test_metadata_sum() {
        let a = Metadata {
            model: "m".to_owned(),
            input_tokens: 10,
            output_tokens: 5,
            thinking_tokens: 0,
            total_tokens: 15,
        };
        let b = Metadata {
            model: "m".to_owned(),
            input_tokens: 20,
            output_tokens: 2,
            thinking_tokens: 3,
            total_tokens: 25,
        };
        let sum = Metadata::default() + &a + &b;
        assert_eq!(sum.model, "m");
        assert_eq!(sum.input_tokens, 30);
        assert_eq!(sum.output_tokens, 7);
        assert_eq!(sum.thinking_tokens, 3);
        assert_eq!(sum.total_tokens, 40);
    }

    #[test]
    fn test_metadata_sum_saturates() {
        let mut total = Metadata {
            total_tokens: u32::MAX - 1,
            ..Default::default()
        };
        total += &Metadata {
            input_tokens: 4,
            total_tokens: 10,
            ..Default::default()
        };
        assert_eq!(total.total_tokens, u32::MAX);
        assert_eq!(total.input_tokens, 4);
    }

    #[test]
    fn test_stream_response_wire_shape() {
        let event = StreamResponse::text(Role::Assistant, 0, "He");
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "DELTA",
                "role": "assistant",
                "index": 0,
                "content": "He"
            })
        );
        assert_eq!(
            serde_json::to_value(StreamResponse::Eof).unwrap(),
            json!({"type": "EOF"})
        );
    }
}
