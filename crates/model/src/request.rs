use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::tool::{Call, Tool, ToolSelectionPolicy};

/// The name of the implicit tool that carries structured output when a
/// request has an output schema but no tools.
pub const RESULT_TOOL_NAME: &str = "result";

/// A request to be sent to the model provider.
///
/// Everything except `cancel` is plain data; cloning a request deep-copies
/// tools, schemas and stop sequences. The cancellation token is shared by
/// all clones.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Request {
    /// The model identifier.
    pub model: String,
    /// The system instructions.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub system_prompt: String,
    /// Sequences where the model stops generating.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling probability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Top-k sampling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    /// The maximum number of tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Frequency penalty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    /// Presence penalty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    /// A JSON schema the output must conform to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    /// Tools that are available to the model.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    /// How the model may select tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_config: Option<ToolSelectionPolicy>,
    /// Asks the backend to enforce schemas strictly, where supported.
    #[serde(default)]
    pub strict_output: bool,
    /// Reasoning effort hint for models that support it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Token budget for thinking, for models that support it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,
    /// Whether the response is streamed.
    #[serde(default)]
    pub stream: bool,
    /// Cancels every outbound request made with this configuration.
    #[serde(skip)]
    pub cancel: CancellationToken,
}

impl Request {
    /// Returns the registered tool with the given name.
    #[inline]
    pub fn tool(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Binds calls returned by the backend to the registered tools.
    #[inline]
    pub fn bind_calls(&self, calls: Vec<Call>) -> Vec<Call> {
        calls.into_iter().map(|c| c.bind(&self.tools)).collect()
    }

    /// Computes the tools and the selection policy that should be sent to
    /// the backend.
    ///
    /// Tools take precedence over the output schema. An output schema alone
    /// is sent as a single [`RESULT_TOOL_NAME`] tool that the model is forced
    /// to call; adapters should turn that call back into text with
    /// [`ToolPlan::take_result`].
    pub fn tool_plan(&self) -> ToolPlan {
        if !self.tools.is_empty() {
            return ToolPlan {
                tools: self.tools.clone(),
                policy: self.tool_config.clone(),
                schema_as_tool: false,
            };
        }
        match &self.output_schema {
            Some(schema) => ToolPlan {
                tools: vec![
                    Tool::new(
                        RESULT_TOOL_NAME,
                        "Returns the final result in the required format.",
                    )
                    .with_argument_schema(schema.clone()),
                ],
                policy: Some(ToolSelectionPolicy::Specific(
                    RESULT_TOOL_NAME.to_owned(),
                )),
                schema_as_tool: true,
            },
            None => ToolPlan {
                tools: vec![],
                policy: self.tool_config.clone(),
                schema_as_tool: false,
            },
        }
    }
}

/// The tools an adapter should send, see [`Request::tool_plan`].
#[derive(Clone, Debug, PartialEq)]
pub struct ToolPlan {
    /// Tool definitions to send.
    pub tools: Vec<Tool>,
    /// The selection policy to send.
    pub policy: Option<ToolSelectionPolicy>,
    /// Whether the output schema is carried by the implicit result tool.
    pub schema_as_tool: bool,
}

impl ToolPlan {
    /// Extracts the argument of the implicit result call, if this plan
    /// uses one and the model called it.
    pub fn take_result(&self, calls: &mut Vec<Call>) -> Option<String> {
        if !self.schema_as_tool {
            return None;
        }
        let idx = calls.iter().position(|c| c.name == RESULT_TOOL_NAME)?;
        Some(calls.remove(idx).argument)
    }
}

/// How much the model should reason before answering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    /// Minimal reasoning.
    Low,
    /// Balanced reasoning.
    Medium,
    /// Extensive reasoning.
    High,
}

/// The role of a conversation turn.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// An input from the user.
    #[default]
    User,
    /// An output from the model.
    Assistant,
    /// System instructions.
    System,
    /// A tool call made by the model.
    ToolCall,
    /// The result of a tool call.
    ToolResponse,
}

/// Binary content attached to a prompt.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Payload {
    /// The MIME type of the content.
    pub mime: String,
    /// Base64-encoded data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// A URI pointing at the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// A tool call recorded in the conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallEntry {
    /// The call identifier.
    pub id: String,
    /// The called tool.
    pub name: String,
    /// The JSON-encoded arguments.
    pub arguments: String,
}

/// A tool result recorded in the conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolResponseEntry {
    /// The identifier of the call this answers.
    pub id: String,
    /// The called tool.
    pub name: String,
    /// The textual result.
    pub response: String,
}

/// A single conversation turn.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Prompt {
    /// Who produced this turn.
    pub role: Role,
    /// The text of this turn.
    #[serde(default)]
    pub text: String,
    /// Optional binary content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    /// Set when `role` is [`Role::ToolCall`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallEntry>,
    /// Set when `role` is [`Role::ToolResponse`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_response: Option<ToolResponseEntry>,
}

impl Prompt {
    #[inline]
    fn text_with_role<S: Into<String>>(role: Role, text: S) -> Self {
        Self {
            role,
            text: text.into(),
            ..Default::default()
        }
    }

    /// Creates a user turn.
    #[inline]
    pub fn user<S: Into<String>>(text: S) -> Self {
        Self::text_with_role(Role::User, text)
    }

    /// Creates an assistant turn.
    #[inline]
    pub fn assistant<S: Into<String>>(text: S) -> Self {
        Self::text_with_role(Role::Assistant, text)
    }

    /// Creates a system turn.
    #[inline]
    pub fn system<S: Into<String>>(text: S) -> Self {
        Self::text_with_role(Role::System, text)
    }

    /// Creates a user turn that carries binary content.
    #[inline]
    pub fn user_with_payload<S: Into<String>>(text: S, payload: Payload) -> Self {
        Self {
            payload: Some(payload),
            ..Self::user(text)
        }
    }

    /// Records a tool call made by the model.
    pub fn tool_call(call: &Call) -> Self {
        Self {
            role: Role::ToolCall,
            tool_call: Some(ToolCallEntry {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments: call.argument.clone(),
            }),
            ..Default::default()
        }
    }

    /// Records the result of a tool call.
    pub fn tool_response<S: Into<String>>(call: &Call, response: S) -> Self {
        Self {
            role: Role::ToolResponse,
            tool_response: Some(ToolResponseEntry {
                id: call.id.clone(),
                name: call.name.clone(),
                response: response.into(),
            }),
            ..Default::default()
        }
    }
}
