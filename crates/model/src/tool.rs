use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// The result of calling a tool.
pub type ToolResult = Result<String, ToolError>;

/// A type-erased tool callback.
///
/// The callback receives the cancellation token of the request that produced
/// the call, and the call itself. The returned future must be independent of
/// any borrowed state.
pub type ToolFunction = Arc<
    dyn Fn(
            CancellationToken,
            Call,
        ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>>
        + Send
        + Sync,
>;

/// Describes a tool that can be used by the model.
///
/// Tools are keyed by their name, which should be unique within a request.
/// The callback is local to this process and is never sent to the backend.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Tool {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Arguments definition of the tool.
    ///
    /// This is an opaque [JSON schema](https://json-schema.org/) value, and
    /// it's forwarded to the backend unexamined.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub argument_schema: Option<Value>,
    /// The local callback that handles calls to this tool.
    #[serde(skip)]
    pub function: Option<ToolFunction>,
}

impl Tool {
    /// Creates a tool without a schema and a callback.
    #[inline]
    pub fn new<S1: Into<String>, S2: Into<String>>(
        name: S1,
        description: S2,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            argument_schema: None,
            function: None,
        }
    }

    /// Sets the argument schema.
    #[inline]
    pub fn with_argument_schema(mut self, schema: Value) -> Self {
        self.argument_schema = Some(schema);
        self
    }

    /// Attaches a callback to the tool.
    pub fn with_function<F, Fut>(mut self, function: F) -> Self
    where
        F: Fn(CancellationToken, Call) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        self.function = Some(Arc::new(move |ctx, call| {
            Box::pin(function(ctx, call))
        }));
        self
    }
}

impl Debug for Tool {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("argument_schema", &self.argument_schema)
            .field(
                "function",
                &self.function.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl PartialEq for Tool {
    fn eq(&self, other: &Self) -> bool {
        let same_function = match (&self.function, &other.function) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        self.name == other.name
            && self.description == other.description
            && self.argument_schema == other.argument_schema
            && same_function
    }
}

/// How the backend is allowed to select tools.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSelectionPolicy {
    /// The model must not call any tool.
    None,
    /// The model decides whether to call tools.
    Auto,
    /// The model must call at least one tool.
    Required,
    /// The model must call the tool with this name.
    Specific(String),
}

/// A tool call requested by the model.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Call {
    /// The identifier of this call, used to correlate the response and the
    /// streamed fragments.
    pub id: String,
    /// The name of the tool to call.
    pub name: String,
    /// The JSON-encoded arguments.
    pub argument: String,
    /// The locally registered tool this call refers to, `None` if the model
    /// asked for a tool we don't know.
    #[serde(skip)]
    pub tool: Option<Tool>,
}

impl Call {
    /// Creates an unbound call.
    #[inline]
    pub fn new<S1, S2, S3>(id: S1, name: S2, argument: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            argument: argument.into(),
            tool: None,
        }
    }

    /// Binds the call to the tool of the same name in `tools`, if any.
    pub fn bind(mut self, tools: &[Tool]) -> Self {
        self.tool = tools.iter().find(|t| t.name == self.name).cloned();
        self
    }

    /// Decodes the arguments into `T`.
    ///
    /// Empty arguments are treated as an empty object.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let argument = self.argument.trim();
        if argument.is_empty() {
            return serde_json::from_str("{}");
        }
        serde_json::from_str(argument)
    }
}

/// The kind of tool error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolErrorKind {
    /// The called tool is not registered locally.
    NotFound,
    /// The tool is registered, but has no callback.
    NoCallback,
    /// The input provided to the tool was invalid.
    InvalidInput,
    /// Error occurred while executing the tool.
    Execution,
}

impl Display for ToolErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ToolErrorKind::NotFound => write!(f, "not found in local setup"),
            ToolErrorKind::NoCallback => {
                write!(f, "no callback function attached")
            }
            ToolErrorKind::InvalidInput => write!(f, "invalid input"),
            ToolErrorKind::Execution => write!(f, "execution error"),
        }
    }
}

/// Describes a tool call error.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ToolError {
    kind: ToolErrorKind,
    reason: Option<String>,
}

impl ToolError {
    #[inline]
    fn with_kind(kind: ToolErrorKind) -> Self {
        Self { kind, reason: None }
    }

    /// Creates a new error with the `NotFound` kind.
    #[inline]
    pub fn not_found() -> Self {
        Self::with_kind(ToolErrorKind::NotFound)
    }

    /// Creates a new error with the `NoCallback` kind.
    #[inline]
    pub fn no_callback() -> Self {
        Self::with_kind(ToolErrorKind::NoCallback)
    }

    /// Creates a new error with the `InvalidInput` kind.
    #[inline]
    pub fn invalid_input() -> Self {
        Self::with_kind(ToolErrorKind::InvalidInput)
    }

    /// Creates a new error with the `Execution` kind.
    #[inline]
    pub fn execution_error() -> Self {
        Self::with_kind(ToolErrorKind::Execution)
    }

    /// Attaches a reason to the error.
    #[inline]
    pub fn with_reason<S: Into<String>>(self, reason: S) -> Self {
        Self {
            kind: self.kind,
            reason: Some(reason.into()),
        }
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ToolErrorKind {
        self.kind
    }

    /// Returns the reason for the error.
    #[inline]
    pub fn reason(&self) -> Cow<'_, str> {
        match self.reason.as_deref() {
            Some(reason) => Cow::Borrowed(reason),
            None => Cow::Owned(format!("{}", self.kind)),
        }
    }
}

impl Display for ToolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {reason}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl StdError for ToolError {}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Args {
        a: u32,
    }

    #[test]
    fn test_bind_by_name() {
        let tools = vec![Tool::new("f", "F"), Tool::new("g", "G")];
        let call = Call::new("1", "g", "{}").bind(&tools);
        assert_eq!(call.tool.unwrap().description, "G");

        let call = Call::new("2", "h", "{}").bind(&tools);
        assert!(call.tool.is_none());
    }

    #[test]
    fn test_decode() {
        let call = Call::new("1", "f", r#"{"a":1}"#);
        assert_eq!(call.decode::<Args>().unwrap(), Args { a: 1 });

        let call = Call::new("1", "f", "  ");
        let value: Value = call.decode().unwrap();
        assert_eq!(value, serde_json::json!({}));

        let call = Call::new("1", "f", r#"{"a":"#);
        assert!(call.decode::<Args>().is_err());
    }

    #[test]
    fn test_callback_is_not_serialized() {
        let tool = Tool::new("f", "F")
            .with_function(|_, _| async { Ok("ok".to_owned()) });
        let value = serde_json::to_value(&tool).unwrap();
        assert_eq!(value, serde_json::json!({"name": "f", "description": "F"}));
        assert!(format!("{tool:?}").contains("<callback>"));
    }

    #[test]
    fn test_error_reason() {
        let err = ToolError::not_found();
        assert_eq!(err.reason(), "not found in local setup");
        let err = ToolError::execution_error().with_reason("boom");
        assert_eq!(err.reason(), "boom");
        assert_eq!(err.to_string(), "execution error: boom");
    }
}
