use bellhop_model::{
    ErrorKind, Prompt, Prompter, Request, StreamResponse, Tool,
};
use bellhop_openai_model::{OpenAIConfigBuilder, OpenAIProvider};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SSE_BODY: &str = "\
data: {\"id\":\"1\",\"model\":\"gpt\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"Let me \"}}]}\n\n\
data: {\"id\":\"1\",\"model\":\"gpt\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"check.\"}}]}\n\n\
data: {\"id\":\"1\",\"model\":\"gpt\",\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",\"type\":\"function\",\"function\":{\"name\":\"lookup\",\"arguments\":\"\"}}]}}]}\n\n\
data: {\"id\":\"1\",\"model\":\"gpt\",\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"city\\\":\"}}]}}]}\n\n\
data: {\"id\":\"1\",\"model\":\"gpt\",\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"\\\"Oslo\\\"}\"}}]}}]}\n\n\
data: {\"id\":\"1\",\"model\":\"gpt\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n\
data: {\"id\":\"1\",\"model\":\"gpt\",\"choices\":[],\"usage\":{\"prompt_tokens\":9,\"completion_tokens\":5,\"total_tokens\":14}}\n\n\
data: [DONE]\n\n";

async fn setup(template: ResponseTemplate) -> (MockServer, OpenAIProvider) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(template)
        .mount(&server)
        .await;
    let config = OpenAIConfigBuilder::with_api_key("test-key")
        .with_base_url(format!("{}/v1", server.uri()))
        .build();
    (server, OpenAIProvider::new(config))
}

fn request() -> Request {
    Request {
        model: "gpt".to_owned(),
        tools: vec![Tool::new("lookup", "Looks up a city")],
        ..Default::default()
    }
}

fn completion(message: Value) -> Value {
    json!({
        "id": "1",
        "model": "gpt",
        "choices": [{"index": 0, "message": message, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
    })
}

#[tokio::test]
async fn test_text_completion() {
    let body = completion(json!({"role": "assistant", "content": "Hello!"}));
    let (_server, provider) =
        setup(ResponseTemplate::new(200).set_body_json(body)).await;

    let resp = provider
        .prompt(&request(), &[Prompt::user("Hi")])
        .await
        .unwrap();
    assert_eq!(resp.as_text().unwrap(), "Hello!");
    assert_eq!(resp.metadata.total_tokens, 7);
    assert_eq!(resp.metadata.model, "gpt");
}

#[tokio::test]
async fn test_tool_call_completion() {
    let body = completion(json!({
        "role": "assistant",
        "content": null,
        "tool_calls": [
            {"id": "c1", "type": "function",
             "function": {"name": "lookup", "arguments": "{\"city\":\"Oslo\"}"}},
            {"id": "c2", "type": "function",
             "function": {"name": "unknown", "arguments": "{}"}}
        ]
    }));
    let (_server, provider) =
        setup(ResponseTemplate::new(200).set_body_json(body)).await;

    let resp = provider
        .prompt(&request(), &[Prompt::user("Weather?")])
        .await
        .unwrap();
    assert!(resp.is_tools());
    assert!(!resp.is_text());
    assert_eq!(resp.tools[0].argument, r#"{"city":"Oslo"}"#);
    assert!(resp.tools[0].tool.is_some());
    assert!(resp.tools[1].tool.is_none());
}

#[tokio::test]
async fn test_schema_only_request_uses_result_tool() {
    let server = MockServer::start().await;
    let body = completion(json!({
        "role": "assistant",
        "tool_calls": [{"id": "c1", "type": "function",
            "function": {"name": "result", "arguments": "{\"answer\":42}"}}]
    }));
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "tool_choice": {"type": "function", "function": {"name": "result"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    let provider = OpenAIProvider::new(
        OpenAIConfigBuilder::with_api_key("k")
            .with_base_url(server.uri())
            .build(),
    );

    let request = Request {
        model: "gpt".to_owned(),
        output_schema: Some(json!({"type": "object"})),
        ..Default::default()
    };
    let resp = provider
        .prompt(&request, &[Prompt::user("Answer?")])
        .await
        .unwrap();
    assert!(resp.is_text());
    let value: Value = resp.decode().unwrap();
    assert_eq!(value["answer"], 42);
}

#[tokio::test]
async fn test_rate_limit() {
    let (_server, provider) = setup(ResponseTemplate::new(429)).await;
    let err = provider
        .prompt(&request(), &[Prompt::user("Hi")])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
}

#[tokio::test]
async fn test_server_error() {
    let (_server, provider) =
        setup(ResponseTemplate::new(500).set_body_string("overloaded")).await;
    let err = provider
        .prompt(&request(), &[Prompt::user("Hi")])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.message().contains("overloaded"));
}

#[tokio::test]
async fn test_cancelled_before_sending() {
    let (_server, provider) = setup(ResponseTemplate::new(200)).await;
    let cancel = CancellationToken::new();
    cancel.cancel();
    let request = Request {
        cancel,
        ..request()
    };
    let err = provider
        .prompt(&request, &[Prompt::user("Hi")])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[tokio::test]
async fn test_stream() {
    let (_server, provider) = setup(
        ResponseTemplate::new(200)
            .set_body_raw(SSE_BODY.as_bytes().to_vec(), "text/event-stream"),
    )
    .await;

    let mut rx = provider
        .stream(&request(), &[Prompt::user("Weather?")])
        .await
        .unwrap();
    let mut text = String::new();
    let mut arguments = String::new();
    let mut events = vec![];
    while let Some(event) = rx.recv().await {
        if let StreamResponse::Delta(delta) = &event {
            text.push_str(delta.content.as_deref().unwrap_or_default());
            if let Some(call) = &delta.tool_call {
                assert_eq!(call.id, "call_1");
                assert_eq!(call.name, "lookup");
                arguments.push_str(&call.argument);
            }
        }
        events.push(event);
    }

    assert_eq!(text, "Let me check.");
    assert_eq!(arguments, r#"{"city":"Oslo"}"#);
    let metadata = events.iter().find_map(|e| match e {
        StreamResponse::Metadata(m) => Some(m),
        _ => None,
    });
    assert_eq!(metadata.unwrap().total_tokens, 14);
    assert!(events.last().unwrap().is_eof());
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, StreamResponse::Error { .. }))
    );
}

#[tokio::test]
async fn test_stream_with_wrong_content_type() {
    let (_server, provider) = setup(
        ResponseTemplate::new(200).set_body_json(json!({"choices": []})),
    )
    .await;
    let err = provider
        .stream(&request(), &[Prompt::user("Hi")])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
}
