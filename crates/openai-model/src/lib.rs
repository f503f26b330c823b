//! A prompter for OpenAI-compatible chat completion APIs.
//!
//! Besides OpenAI itself, this works with any server speaking the same
//! protocol, like vLLM or Ollama.

#[macro_use]
extern crate tracing;

mod config;
mod decoder;
mod proto;

use std::sync::Arc;

use async_trait::async_trait;
use bellhop_model::{
    Error, ErrorKind, Prompt, Prompter, Request, Response, StreamReceiver,
};
use bellhop_stream::{Chunks, Framing};
use mime::Mime;
use reqwest::{Client, StatusCode, header};
use serde::Serialize;

pub use config::{OpenAIConfig, OpenAIConfigBuilder};
use decoder::StreamDecoder;
use proto::ChatCompletion;

/// OpenAI-compatible prompter.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    /// Sends the request body, and checks the status and the content type of
    /// the response.
    async fn send<B: Serialize>(
        &self,
        request: &Request,
        body: &B,
        expected: &Mime,
    ) -> Result<reqwest::Response, Error> {
        let mut builder = self
            .client
            .post(self.config.endpoint())
            .bearer_auth(&self.config.api_key)
            .header(header::ACCEPT, expected.as_ref())
            .json(body);
        if let Some(organization) = &self.config.organization {
            builder = builder.header("OpenAI-Organization", organization);
        }

        let resp = tokio::select! {
            biased;
            _ = request.cancel.cancelled() => return Err(Error::cancelled()),
            resp = builder.send() => resp,
        };
        let resp = resp.map_err(|err| {
            error!("request failed: {err}");
            Error::transport(format!("{err}"))
        })?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("rate limited by the server");
            return Err(Error::new(
                ErrorKind::RateLimitExceeded,
                format!("server responded with {status}"),
            ));
        }
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            error!("server responded with {status}: {detail}");
            return Err(Error::transport(format!(
                "server responded with {status}: {detail}"
            )));
        }

        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        let is_valid_content_type = content_type
            .and_then(|v| v.parse().ok())
            .map(|m: Mime| m.essence_str() == expected.essence_str())
            .unwrap_or(false);
        if !is_valid_content_type {
            return Err(Error::protocol(format!(
                "unexpected content type: {content_type:?}"
            )));
        }
        Ok(resp)
    }
}

#[async_trait]
impl Prompter for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn prompt(
        &self,
        request: &Request,
        prompts: &[Prompt],
    ) -> Result<Response, Error> {
        let plan = request.tool_plan();
        let body = proto::create_request(request, prompts, &plan, false);
        let resp = self
            .send(request, &body, &mime::APPLICATION_JSON)
            .await?;

        let completion = tokio::select! {
            biased;
            _ = request.cancel.cancelled() => return Err(Error::cancelled()),
            completion = resp.json::<ChatCompletion>() => completion,
        };
        let completion = completion
            .map_err(|err| Error::protocol(format!("bad completion: {err}")))?;
        trace!("got completion: {completion:?}");

        let ChatCompletion {
            model,
            choices,
            usage,
        } = completion;
        let Some(choice) = choices.into_iter().next() else {
            return Err(Error::protocol("completion has no choices"));
        };
        if let Some(reason) = &choice.finish_reason {
            debug!("finished with reason: {reason}");
        }

        let mut texts: Vec<String> = choice
            .message
            .content
            .into_iter()
            .filter(|c| !c.is_empty())
            .collect();
        let mut calls: Vec<_> = choice
            .message
            .tool_calls
            .into_iter()
            .flatten()
            .map(proto::create_call)
            .collect();
        if let Some(result) = plan.take_result(&mut calls) {
            texts = vec![result];
        }

        Ok(Response {
            texts,
            tools: request.bind_calls(calls),
            metadata: usage.unwrap_or_default().into_metadata(model),
        })
    }

    async fn stream(
        &self,
        request: &Request,
        prompts: &[Prompt],
    ) -> Result<StreamReceiver, Error> {
        let plan = request.tool_plan();
        let body = proto::create_request(request, prompts, &plan, true);
        let resp = self
            .send(request, &body, &mime::TEXT_EVENT_STREAM)
            .await?;

        let chunks = Chunks::from_stream(resp.bytes_stream());
        Ok(bellhop_stream::spawn(
            chunks,
            Framing::sse(),
            StreamDecoder::new(plan.schema_as_tool),
            request.cancel.clone(),
        ))
    }
}
