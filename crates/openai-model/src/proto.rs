use bellhop_model::{
    Call, Metadata, Payload, Prompt, ReasoningEffort, Request, Role,
    ToolPlan, ToolSelectionPolicy,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionToolCall>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct CompletionTokensDetails {
    #[serde(default)]
    pub reasoning_tokens: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
    #[serde(default)]
    pub completion_tokens_details: Option<CompletionTokensDetails>,
}

impl Usage {
    pub fn into_metadata(self, model: String) -> Metadata {
        Metadata {
            model,
            input_tokens: self.prompt_tokens,
            output_tokens: self.completion_tokens,
            thinking_tokens: self
                .completion_tokens_details
                .map(|d| d.reasoning_tokens)
                .unwrap_or_default(),
            total_tokens: self.total_tokens,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct CompletionChoice {
    #[serde(default)]
    pub index: u32,
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: Delta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
struct FunctionTool {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    strict: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
struct Tool {
    r#type: &'static str,
    function: FunctionTool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct NamedFunction {
    name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
enum ToolChoice {
    Mode(&'static str),
    Function {
        r#type: &'static str,
        function: NamedFunction,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum Message {
    System {
        content: String,
    },
    User {
        content: Content,
    },
    Assistant {
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<ReasoningEffort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
    stream: bool,
}

// -----------
// Conversions
// -----------

pub fn create_request(
    req: &Request,
    prompts: &[Prompt],
    plan: &ToolPlan,
    stream: bool,
) -> ChatCompletionRequest {
    if req.top_k.is_some() || req.thinking_budget.is_some() {
        debug!("top_k and thinking_budget are not supported, ignoring");
    }

    let system = (!req.system_prompt.is_empty()).then(|| Message::System {
        content: req.system_prompt.clone(),
    });
    let messages = system
        .into_iter()
        .chain(prompts.iter().map(create_message))
        .collect();

    ChatCompletionRequest {
        model: req.model.clone(),
        messages,
        tools: plan
            .tools
            .iter()
            .map(|t| create_tool(t, req.strict_output))
            .collect(),
        tool_choice: plan.policy.as_ref().map(create_tool_choice),
        stop: req.stop_sequences.clone(),
        temperature: req.temperature,
        top_p: req.top_p,
        max_completion_tokens: req.max_tokens,
        frequency_penalty: req.frequency_penalty,
        presence_penalty: req.presence_penalty,
        reasoning_effort: req.reasoning_effort,
        stream_options: stream.then_some(StreamOptions {
            include_usage: true,
        }),
        stream,
    }
}

fn create_message(prompt: &Prompt) -> Message {
    match prompt.role {
        Role::System => Message::System {
            content: prompt.text.clone(),
        },
        Role::User => Message::User {
            content: match &prompt.payload {
                Some(payload) => Content::Parts(vec![
                    ContentPart::Text {
                        text: prompt.text.clone(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: payload_url(payload),
                        },
                    },
                ]),
                None => Content::Text(prompt.text.clone()),
            },
        },
        Role::Assistant => Message::Assistant {
            content: Some(prompt.text.clone()),
            tool_calls: None,
        },
        Role::ToolCall => {
            let tool_calls = prompt.tool_call.as_ref().map(|entry| {
                vec![ToolCall {
                    index: None,
                    id: Some(entry.id.clone()),
                    r#type: Some("function".to_owned()),
                    function: Some(FunctionToolCall {
                        name: Some(entry.name.clone()),
                        arguments: Some(entry.arguments.clone()),
                    }),
                }]
            });
            Message::Assistant {
                content: None,
                tool_calls,
            }
        }
        Role::ToolResponse => {
            let (tool_call_id, content) = match &prompt.tool_response {
                Some(entry) => (entry.id.clone(), entry.response.clone()),
                None => (String::new(), prompt.text.clone()),
            };
            Message::Tool {
                tool_call_id,
                content,
            }
        }
    }
}

fn payload_url(payload: &Payload) -> String {
    match (&payload.uri, &payload.data) {
        (Some(uri), _) => uri.clone(),
        (None, Some(data)) => format!("data:{};base64,{data}", payload.mime),
        (None, None) => String::new(),
    }
}

fn create_tool(tool: &bellhop_model::Tool, strict: bool) -> Tool {
    Tool {
        r#type: "function",
        function: FunctionTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.argument_schema.clone(),
            strict,
        },
    }
}

fn create_tool_choice(policy: &ToolSelectionPolicy) -> ToolChoice {
    match policy {
        ToolSelectionPolicy::None => ToolChoice::Mode("none"),
        ToolSelectionPolicy::Auto => ToolChoice::Mode("auto"),
        ToolSelectionPolicy::Required => ToolChoice::Mode("required"),
        ToolSelectionPolicy::Specific(name) => ToolChoice::Function {
            r#type: "function",
            function: NamedFunction { name: name.clone() },
        },
    }
}

/// Converts a tool call of a complete response.
pub fn create_call(tool_call: ToolCall) -> Call {
    let (name, arguments) = match tool_call.function {
        Some(function) => (
            function.name.unwrap_or_default(),
            function.arguments.unwrap_or_default(),
        ),
        None => Default::default(),
    };
    Call::new(tool_call.id.unwrap_or_default(), name, arguments)
}

/// Maps a streamed role name.
pub fn parse_role(role: &str) -> Option<Role> {
    match role {
        "assistant" => Some(Role::Assistant),
        "user" => Some(Role::User),
        "system" | "developer" => Some(Role::System),
        "tool" => Some(Role::ToolResponse),
        _ => None,
    }
}
