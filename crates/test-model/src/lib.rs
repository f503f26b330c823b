//! A local fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bellhop_model::{
    Error, Prompt, Prompter, Request, Response, StreamReceiver, StreamResponse,
};
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

pub use preset::*;

#[derive(Default)]
struct State {
    turns: VecDeque<PresetTurn>,
    last: Option<PresetTurn>,
    repeat_last: bool,
    failed: u64,
    delay: Option<Duration>,
    requests: Vec<Request>,
    transcripts: Vec<Vec<Prompt>>,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to push the turns the model should
/// answer with, one per request in order. If there are no more turns, an
/// error is returned, unless the last turn is set to repeat.
///
/// Every request and its prompts are recorded, and clones share the same
/// script and records.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestPrompter {
    state: Arc<Mutex<State>>,
}

impl TestPrompter {
    #[inline]
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a turn to the script.
    #[inline]
    pub fn push_turn(&self, turn: PresetTurn) {
        self.lock().turns.push_back(turn);
    }

    /// Keeps answering with the last turn once the script is exhausted.
    #[inline]
    pub fn set_repeat_last(&self, repeat: bool) {
        self.lock().repeat_last = repeat;
    }

    /// Waits before every answer, or every stream event.
    #[inline]
    pub fn set_delay(&self, duration: Duration) {
        self.lock().delay = Some(duration);
    }

    /// Returns the requests received so far.
    pub fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    /// Returns the prompts of every request received so far.
    pub fn transcripts(&self) -> Vec<Vec<Prompt>> {
        self.lock().transcripts.clone()
    }

    fn next_turn(
        &self,
        request: &Request,
        prompts: &[Prompt],
    ) -> Result<(PresetTurn, Option<Duration>), Error> {
        let mut state = self.lock();
        state.requests.push(request.clone());
        state.transcripts.push(prompts.to_vec());

        let Some(turn) = state.turns.front().cloned() else {
            // Repeated turns never fail, their failures are used up.
            return match &state.last {
                Some(last) if state.repeat_last => {
                    Ok((last.clone(), state.delay))
                }
                _ => Err(Error::protocol("no more preset turns")),
            };
        };
        if let Some(failures) = turn.failures {
            if failures == 0 || state.failed < failures {
                state.failed += 1;
                return Err(Error::transport("preset failure"));
            }
        }
        state.failed = 0;
        state.last = state.turns.pop_front();
        Ok((turn, state.delay))
    }
}

async fn wait(delay: Option<Duration>, cancel: &CancellationToken) -> bool {
    let Some(delay) = delay else {
        return !cancel.is_cancelled();
    };
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = sleep(delay) => true,
    }
}

async fn replay(
    events: Vec<StreamResponse>,
    delay: Option<Duration>,
    cancel: CancellationToken,
    tx: &UnboundedSender<StreamResponse>,
) {
    for event in events {
        if !wait(delay, &cancel).await {
            _ = tx.send(StreamResponse::error("request cancelled"));
            return;
        }
        if tx.send(event).is_err() {
            return;
        }
    }
}

#[async_trait]
impl Prompter for TestPrompter {
    fn name(&self) -> &str {
        "test"
    }

    async fn prompt(
        &self,
        request: &Request,
        prompts: &[Prompt],
    ) -> Result<Response, Error> {
        let (turn, delay) = self.next_turn(request, prompts)?;
        if !wait(delay, &request.cancel).await {
            return Err(Error::cancelled());
        }
        Ok(turn.to_response(request))
    }

    async fn stream(
        &self,
        request: &Request,
        prompts: &[Prompt],
    ) -> Result<StreamReceiver, Error> {
        let (turn, delay) = self.next_turn(request, prompts)?;
        let events = turn.to_stream_events(request);
        let cancel = request.cancel.clone();
        let (tx, rx) = unbounded_channel();
        tokio::spawn(async move {
            replay(events, delay, cancel, &tx).await;
            _ = tx.send(StreamResponse::Eof);
        });
        Ok(rx)
    }
}
