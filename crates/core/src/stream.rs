use std::collections::BTreeMap;

use bellhop_model::{
    Call, Error, Metadata, Request, Response, StreamReceiver, StreamResponse,
};

/// Drains a stream into a complete response.
///
/// Text deltas are concatenated per candidate index in arrival order, and
/// only the first candidate is kept. Tool call fragments are accumulated per
/// call id. Calls are bound to the tools of `request`.
/// An error event fails the whole response.
pub async fn collect_stream(
    request: &Request,
    mut rx: StreamReceiver,
) -> Result<Response, Error> {
    let mut texts: BTreeMap<u32, String> = BTreeMap::new();
    let mut calls: Vec<Call> = vec![];
    let mut metadata = Metadata::default();

    while let Some(event) = rx.recv().await {
        match event {
            StreamResponse::Delta(delta) => {
                if let Some(content) = delta.content {
                    texts.entry(delta.index).or_default().push_str(&content);
                }
                let Some(fragment) = delta.tool_call else {
                    continue;
                };
                match calls.iter_mut().find(|c| c.id == fragment.id) {
                    Some(call) => call.argument.push_str(&fragment.argument),
                    None => calls.push(Call::new(
                        fragment.id,
                        fragment.name,
                        fragment.argument,
                    )),
                }
            }
            StreamResponse::Metadata(m) => metadata = m,
            StreamResponse::Error { message } => {
                return Err(Error::protocol(message));
            }
            StreamResponse::Eof => {
                return Ok(Response {
                    texts: texts
                        .into_values()
                        .filter(|t| !t.is_empty())
                        .take(1)
                        .collect(),
                    tools: request.bind_calls(calls),
                    metadata,
                });
            }
        }
    }
    Err(Error::protocol("stream closed without an end event"))
}

#[cfg(test)]
mod tests {
    use bellhop_model::{ErrorKind, Prompt, Role, Tool};
    use bellhop_test_model::{PresetTurn, TestPrompter};
    use serde_json::json;
    use tokio::sync::mpsc::unbounded_channel;

    use super::*;
    use crate::Generator;

    #[tokio::test]
    async fn test_collect_generated_stream() {
        let prompter = TestPrompter::default();
        prompter.push_turn(
            PresetTurn::text("Let me check")
                .with_call("c1", "lookup", json!({"city": "Paris"}))
                .with_call("c2", "ghost", json!({})),
        );
        let generator = Generator::new(prompter.clone())
            .model("m")
            .set_tools([Tool::new("lookup", "Looks up a city")]);
        let rx = generator.stream(&[Prompt::user("weather?")]).await.unwrap();
        let resp = collect_stream(generator.request(), rx).await.unwrap();

        assert!(prompter.requests()[0].stream);
        assert_eq!(resp.texts, ["Let me check"]);
        assert_eq!(resp.tools.len(), 2);
        assert_eq!(resp.tools[0].argument, r#"{"city":"Paris"}"#);
        assert!(resp.tools[0].tool.is_some());
        assert!(resp.tools[1].tool.is_none());
        assert_eq!(resp.metadata.model, "m");
    }

    #[tokio::test]
    async fn test_error_event() {
        let (tx, rx) = unbounded_channel();
        tx.send(StreamResponse::text(Role::Assistant, 0, "partial"))
            .unwrap();
        tx.send(StreamResponse::error("connection reset")).unwrap();
        tx.send(StreamResponse::Eof).unwrap();
        let err = collect_stream(&Request::default(), rx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.message(), "connection reset");
    }

    #[tokio::test]
    async fn test_missing_eof() {
        let (tx, rx) = unbounded_channel();
        tx.send(StreamResponse::text(Role::Assistant, 0, "partial"))
            .unwrap();
        drop(tx);
        assert!(collect_stream(&Request::default(), rx).await.is_err());
    }
}
