use bellhop_model::{
    Call, Metadata, Request, Response, Role, StreamResponse, ToolCallFragment,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool call in a preset turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetCall {
    /// The call id.
    pub id: String,
    /// The tool name.
    pub name: String,
    /// The arguments.
    pub arguments: Value,
}

/// The events in a preset turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "message_delta")]
    MessageDelta(String),
    #[serde(rename = "tool_call")]
    ToolCall(PresetCall),
}

/// The preset answer to one request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetTurn {
    /// Events in this turn.
    pub events: Vec<PresetEvent>,
    /// Token accounting reported for this turn.
    #[serde(default)]
    pub metadata: Metadata,
    /// If set, the request will fail in the first `failures` attempts.
    /// `Some(0)` means the request will fail infinitely.
    #[serde(default)]
    pub failures: Option<u64>,
}

impl PresetTurn {
    /// Creates a `PresetTurn` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            ..Default::default()
        }
    }

    /// Creates a plain text turn.
    #[inline]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::with_events([PresetEvent::MessageDelta(text.into())])
    }

    /// Creates a turn with a single tool call.
    #[inline]
    pub fn call<S1, S2>(id: S1, name: S2, arguments: Value) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self::default().with_call(id, name, arguments)
    }

    /// Appends a tool call.
    #[inline]
    pub fn with_call<S1, S2>(mut self, id: S1, name: S2, arguments: Value) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        self.events.push(PresetEvent::ToolCall(PresetCall {
            id: id.into(),
            name: name.into(),
            arguments,
        }));
        self
    }

    /// Sets the reported token accounting.
    #[inline]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets failure times before a successful response. `0` means the
    /// turn will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }

    fn text_deltas(&self) -> impl Iterator<Item = &str> {
        self.events.iter().filter_map(|e| match e {
            PresetEvent::MessageDelta(text) => Some(text.as_str()),
            PresetEvent::ToolCall(_) => None,
        })
    }

    fn calls(&self) -> impl Iterator<Item = &PresetCall> {
        self.events.iter().filter_map(|e| match e {
            PresetEvent::ToolCall(call) => Some(call),
            PresetEvent::MessageDelta(_) => None,
        })
    }

    fn metadata_for(&self, request: &Request) -> Metadata {
        let mut metadata = self.metadata.clone();
        if metadata.model.is_empty() {
            metadata.model.clone_from(&request.model);
        }
        metadata
    }

    /// Builds the complete response, with calls bound to the request tools.
    pub(crate) fn to_response(&self, request: &Request) -> Response {
        let text: String = self.text_deltas().collect();
        let calls = self
            .calls()
            .map(|c| Call::new(&c.id, &c.name, c.arguments.to_string()))
            .collect();
        Response {
            texts: if text.is_empty() { vec![] } else { vec![text] },
            tools: request.bind_calls(calls),
            metadata: self.metadata_for(request),
        }
    }

    /// Builds the stream events, without the final `Eof`.
    ///
    /// Arguments of every call are split in two fragments.
    pub(crate) fn to_stream_events(
        &self,
        request: &Request,
    ) -> Vec<StreamResponse> {
        let mut events = vec![];
        for text in self.text_deltas() {
            events.push(StreamResponse::text(Role::Assistant, 0, text));
        }
        for call in self.calls() {
            let arguments = call.arguments.to_string();
            let mut mid = arguments.len() / 2;
            while !arguments.is_char_boundary(mid) {
                mid -= 1;
            }
            for piece in [&arguments[..mid], &arguments[mid..]] {
                let fragment = ToolCallFragment {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    argument: piece.to_owned(),
                };
                events.push(StreamResponse::tool_call(
                    Role::Assistant,
                    0,
                    fragment,
                ));
            }
        }
        events.push(StreamResponse::Metadata(self.metadata_for(request)));
        events
    }
}
