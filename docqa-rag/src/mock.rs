//! Scripted generation backend and recording sleeper for tests and demos.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::GenerationError;
use crate::generation::{GenerationBackend, GenerationRequest};
use crate::resilient::Sleeper;

/// One scripted backend outcome.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Return this raw body.
    Body(Value),
    /// Fail with this error.
    Error(GenerationError),
    /// Never answer; only a timeout ends the call.
    Hang,
}

impl ScriptedReply {
    /// A well-formed chat completion containing `text`.
    pub fn text(text: impl Into<String>) -> Self {
        ScriptedReply::Body(json!({
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": text.into() } }]
        }))
    }

    /// An HTTP 429 without a retry hint.
    pub fn rate_limited() -> Self {
        ScriptedReply::Error(GenerationError::RateLimited { retry_after: None })
    }
}

/// A [`GenerationBackend`] that replays scripted replies in order.
///
/// Once the script is exhausted every further call gets the fallback reply.
/// Calls and requests are recorded for assertions.
///
/// # Example
///
/// ```rust
/// use docqa_rag::mock::{ScriptedBackend, ScriptedReply};
///
/// let backend = ScriptedBackend::new([ScriptedReply::rate_limited(), ScriptedReply::text("ok")]);
/// assert_eq!(backend.calls(), 0);
/// ```
#[derive(Debug)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<ScriptedReply>>,
    fallback: ScriptedReply,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedBackend {
    /// Replay `script`, then answer with an empty completion.
    pub fn new(script: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: ScriptedReply::text(""),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with `reply`.
    pub fn always(reply: ScriptedReply) -> Self {
        Self::new([]).with_fallback(reply)
    }

    /// Answer every call with a completion containing `text`.
    pub fn answering(text: impl Into<String>) -> Self {
        Self::always(ScriptedReply::text(text))
    }

    /// Replace the reply used after the script runs out.
    pub fn with_fallback(mut self, reply: ScriptedReply) -> Self {
        self.fallback = reply;
        self
    }

    /// Number of calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &GenerationRequest) -> Result<Value, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).push(request.clone());

        let reply = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match reply {
            ScriptedReply::Body(body) => Ok(body),
            ScriptedReply::Error(error) => Err(error),
            ScriptedReply::Hang => {
                std::future::pending::<()>().await;
                Err(GenerationError::Transport("hung call resumed".to_string()))
            }
        }
    }
}

/// A [`Sleeper`] that records requested delays and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    /// Create a sleeper with an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delay requested so far, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap_or_else(|e| e.into_inner()).push(duration);
    }
}
