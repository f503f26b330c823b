use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::{Error, ErrorKind};
use crate::request::{Prompt, Request};
use crate::response::{Response, StreamResponse};

/// The receiving half of a streamed response.
pub type StreamReceiver = UnboundedReceiver<StreamResponse>;

/// A backend adapter that turns normalized requests into calls to one kind
/// of model API.
///
/// Once the prompter is created, it should behave like a stateless object.
/// The request configuration is handed over on every call, so one prompter
/// can be shared by any number of differently configured generators.
///
/// Implementations must honor `request.cancel`: a cancelled request fails
/// with [`ErrorKind::Cancelled`] from [`Prompter::prompt`], or produces an
/// error event followed by the end of stream from [`Prompter::stream`].
#[async_trait]
pub trait Prompter: Send + Sync {
    /// A short name of the backend, used in logs.
    fn name(&self) -> &str;

    /// Sends the prompts and waits for the complete response.
    ///
    /// Tool calls in the response should be bound to the tools of `request`
    /// (see [`Request::bind_calls`]).
    async fn prompt(
        &self,
        request: &Request,
        prompts: &[Prompt],
    ) -> Result<Response, Error>;

    /// Sends the prompts and returns a channel of response events.
    ///
    /// Errors returned from this method mean the stream never started. Once
    /// it has started, failures are delivered as
    /// [`StreamResponse::Error`] events, and the channel always ends with a
    /// [`StreamResponse::Eof`] event.
    async fn stream(
        &self,
        request: &Request,
        prompts: &[Prompt],
    ) -> Result<StreamReceiver, Error> {
        let _ = (request, prompts);
        Err(Error::new(
            ErrorKind::Unsupported,
            format!("{} does not support streaming", self.name()),
        ))
    }
}
