use std::borrow::Cow;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use bellhop_model::{
    Error, Prompt, Prompter, ReasoningEffort, Request, Response,
    StreamReceiver, Tool, ToolSelectionPolicy,
};
use schemars::{JsonSchema, schema_for};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// An immutable generation configuration bound to a prompter.
///
/// Every configuration method returns a new generator and leaves `self`
/// untouched, so a generator can be shared freely and used as the base of
/// divergent variants:
///
/// ```ignore
/// let base = Generator::new(prompter).model("gpt-4o-mini");
/// let precise = base.temperature(0.0);
/// let creative = base.temperature(1.2).stop_at(["\n\n"]);
/// ```
///
/// Derivations deep-copy the request (tools, schemas, stop sequences...).
/// Only the prompter and the cancellation token are shared.
#[derive(Clone, Default)]
pub struct Generator {
    prompter: Option<Arc<dyn Prompter>>,
    request: Request,
}

impl Generator {
    /// Creates a generator bound to `prompter`.
    #[inline]
    pub fn new<P: Prompter + 'static>(prompter: P) -> Self {
        Self::with_prompter(Arc::new(prompter))
    }

    /// Creates a generator bound to a shared prompter.
    #[inline]
    pub fn with_prompter(prompter: Arc<dyn Prompter>) -> Self {
        Self {
            prompter: Some(prompter),
            request: Request::default(),
        }
    }

    /// Returns the current configuration.
    #[inline]
    pub fn request(&self) -> &Request {
        &self.request
    }

    #[inline]
    fn derive(&self, f: impl FnOnce(&mut Request)) -> Self {
        let mut derived = self.clone();
        f(&mut derived.request);
        derived
    }

    /// Sets the model.
    pub fn model<S: Into<String>>(&self, model: S) -> Self {
        let model = model.into();
        self.derive(|r| r.model = model)
    }

    /// Sets the system prompt.
    pub fn system<S: Into<String>>(&self, prompt: S) -> Self {
        let prompt = prompt.into();
        self.derive(|r| r.system_prompt = prompt)
    }

    /// Requires the output to conform to a JSON schema.
    pub fn output_schema(&self, schema: Value) -> Self {
        self.derive(|r| r.output_schema = Some(schema))
    }

    /// Requires the output to conform to the schema of `T`.
    pub fn output_schema_for<T: JsonSchema>(&self) -> Self {
        self.output_schema(schema_for!(T).to_value())
    }

    /// Removes the output schema.
    pub fn clear_output_schema(&self) -> Self {
        self.derive(|r| r.output_schema = None)
    }

    /// Replaces the available tools.
    pub fn set_tools<I: IntoIterator<Item = Tool>>(&self, tools: I) -> Self {
        let tools = tools.into_iter().collect();
        self.derive(|r| r.tools = tools)
    }

    /// Adds tools. A tool replaces an existing one with the same name.
    pub fn add_tools<I: IntoIterator<Item = Tool>>(&self, tools: I) -> Self {
        let tools: Vec<Tool> = tools.into_iter().collect();
        self.derive(|r| {
            for tool in tools {
                match r.tools.iter_mut().find(|t| t.name == tool.name) {
                    Some(existing) => *existing = tool,
                    None => r.tools.push(tool),
                }
            }
        })
    }

    /// Sets the tool selection policy.
    ///
    /// [`ToolSelectionPolicy::Specific`] also narrows the tools down to the
    /// named one. If no registered tool has that name, the request is left
    /// unchanged.
    pub fn set_tool_config(&self, policy: ToolSelectionPolicy) -> Self {
        if let ToolSelectionPolicy::Specific(name) = &policy {
            if !self.request.tools.iter().any(|t| &t.name == name) {
                warn!("tool {name} is not registered, keeping tool config");
                return self.clone();
            }
        }
        self.derive(|r| {
            if let ToolSelectionPolicy::Specific(name) = &policy {
                r.tools.retain(|t| &t.name == name);
            }
            r.tool_config = Some(policy);
        })
    }

    /// Makes `tool` the only tool and forces the model to call it.
    pub fn force_tool(&self, tool: Tool) -> Self {
        self.derive(|r| {
            r.tool_config = Some(ToolSelectionPolicy::Specific(tool.name.clone()));
            r.tools = vec![tool];
        })
    }

    /// Sets the stop sequences.
    pub fn stop_at<I, S>(&self, stops: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stops = stops.into_iter().map(Into::into).collect();
        self.derive(|r| r.stop_sequences = stops)
    }

    /// Sets the sampling temperature.
    pub fn temperature(&self, temperature: f64) -> Self {
        self.derive(|r| r.temperature = Some(temperature))
    }

    /// Sets the nucleus sampling probability.
    pub fn top_p(&self, top_p: f64) -> Self {
        self.derive(|r| r.top_p = Some(top_p))
    }

    /// Sets top-k sampling.
    pub fn top_k(&self, top_k: u32) -> Self {
        self.derive(|r| r.top_k = Some(top_k))
    }

    /// Sets the maximum number of generated tokens.
    pub fn max_tokens(&self, max_tokens: u32) -> Self {
        self.derive(|r| r.max_tokens = Some(max_tokens))
    }

    /// Sets the frequency penalty.
    pub fn frequency_penalty(&self, penalty: f64) -> Self {
        self.derive(|r| r.frequency_penalty = Some(penalty))
    }

    /// Sets the presence penalty.
    pub fn presence_penalty(&self, penalty: f64) -> Self {
        self.derive(|r| r.presence_penalty = Some(penalty))
    }

    /// Asks the backend to enforce schemas strictly.
    pub fn strict_output(&self, strict: bool) -> Self {
        self.derive(|r| r.strict_output = strict)
    }

    /// Sets the reasoning effort hint.
    pub fn reasoning_effort(&self, effort: ReasoningEffort) -> Self {
        self.derive(|r| r.reasoning_effort = Some(effort))
    }

    /// Sets the thinking token budget.
    pub fn thinking_budget(&self, tokens: u32) -> Self {
        self.derive(|r| r.thinking_budget = Some(tokens))
    }

    /// Uses `token` to cancel requests made by this generator and the ones
    /// derived from it.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        self.derive(|r| r.cancel = token)
    }

    /// Replaces the whole configuration.
    pub fn set_config(&self, request: Request) -> Self {
        self.derive(|r| *r = request)
    }

    fn checked_prompter(
        &self,
        prompts: &[Prompt],
    ) -> Result<&Arc<dyn Prompter>, Error> {
        let Some(prompter) = &self.prompter else {
            return Err(Error::configuration("no prompter is set"));
        };
        if self.request.model.is_empty() {
            return Err(Error::configuration("no model is set"));
        }
        if prompts.is_empty() {
            return Err(Error::configuration("no prompts to send"));
        }
        Ok(prompter)
    }

    /// Sends the prompts and waits for the complete response.
    pub async fn prompt(&self, prompts: &[Prompt]) -> Result<Response, Error> {
        let prompter = self.checked_prompter(prompts)?;
        let request = if self.request.stream {
            let mut request = self.request.clone();
            request.stream = false;
            Cow::Owned(request)
        } else {
            Cow::Borrowed(&self.request)
        };

        let call_id = Uuid::new_v4();
        let span = info_span!(
            "prompt",
            %call_id,
            model = %request.model,
            prompter = prompter.name()
        );
        async move {
            if request.cancel.is_cancelled() {
                return Err(Error::cancelled());
            }
            debug!("sending {} prompts", prompts.len());
            let result = prompter.prompt(&request, prompts).await;
            match &result {
                Ok(resp) => debug!(
                    "got {} texts and {} tool calls",
                    resp.texts.len(),
                    resp.tools.len()
                ),
                Err(err) => error!("prompt failed: {err}"),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Sends the prompts and returns the channel of response events.
    ///
    /// Fails without any I/O if the generator is not configured or there
    /// are no prompts.
    pub async fn stream(
        &self,
        prompts: &[Prompt],
    ) -> Result<StreamReceiver, Error> {
        let prompter = self.checked_prompter(prompts)?;
        let mut request = self.request.clone();
        request.stream = true;

        let call_id = Uuid::new_v4();
        let span = info_span!(
            "stream",
            %call_id,
            model = %request.model,
            prompter = prompter.name()
        );
        async move {
            if request.cancel.is_cancelled() {
                return Err(Error::cancelled());
            }
            debug!("streaming {} prompts", prompts.len());
            let result = prompter.stream(&request, prompts).await;
            if let Err(err) = &result {
                error!("stream failed to start: {err}");
            }
            result
        }
        .instrument(span)
        .await
    }
}

impl Debug for Generator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("prompter", &self.prompter.as_ref().map(|p| p.name()))
            .field("request", &self.request)
            .finish()
    }
}
