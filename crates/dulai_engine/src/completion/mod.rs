//! Chat completions with bounded retry, whole-response and streamed.
mod openai;
mod sse;
mod transport;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dulai_core::{ApiKey, ProgressMessage};
use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::StreamExt;
use serde::Serialize;

use crate::channel::ProgressChannel;
use crate::reassemble::reassemble_lines;
use crate::EngineError;

pub use openai::OpenAiTransport;
pub use transport::{CompletionTransport, FragmentStream, TransportError};

/// Hard upper bound for `max_tokens`, checked before any network call.
pub const MAX_TOKENS_CEILING: u32 = 8001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: None,
            temperature: 1.0,
            max_tokens: None,
            stream: false,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(10, Duration::from_millis(500))
    }
}

/// Attempt bookkeeping for one request; dropped when the call returns.
#[derive(Debug, Default)]
struct RetryState {
    attempt: u32,
    last_error: Option<TransportError>,
}

/// Completion client bound to one task's credential.
#[derive(Clone)]
pub struct RetryingCompletionClient {
    transport: Arc<dyn CompletionTransport>,
    api_key: ApiKey,
    policy: RetryPolicy,
}

impl RetryingCompletionClient {
    pub fn new(transport: Arc<dyn CompletionTransport>, api_key: ApiKey, policy: RetryPolicy) -> Self {
        Self {
            transport,
            api_key,
            policy,
        }
    }

    /// Same transport and credential with a different retry policy.
    pub fn with_policy(&self, policy: RetryPolicy) -> Self {
        Self {
            policy,
            ..self.clone()
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Runs a completion and returns the full text.
    ///
    /// With `request.stream` set, every complete line of output is sent to
    /// `channel` as a `ReportChunk` while it arrives. Only opening the stream is
    /// retried; a failure after lines were forwarded is returned as is.
    pub async fn complete(
        &self,
        request: &CompletionRequest,
        channel: Option<&ProgressChannel>,
    ) -> Result<String, EngineError> {
        let model = validate(request)?;
        let transport = &self.transport;
        let api_key = &self.api_key;

        if !request.stream {
            return self
                .with_retry(model, move || transport.complete(model, request, api_key))
                .await;
        }

        let channel = channel.ok_or_else(|| {
            EngineError::Validation("stream=true requires a bound progress channel".into())
        })?;
        let fragments = self
            .with_retry(model, move || transport.stream(model, request, api_key))
            .await?;
        forward_lines(fragments, channel).await
    }

    /// Opens a streamed completion and hands the raw fragments to the caller.
    pub async fn complete_streaming(
        &self,
        request: &CompletionRequest,
    ) -> Result<FragmentStream, EngineError> {
        let model = validate(request)?;
        let transport = &self.transport;
        let api_key = &self.api_key;
        self.with_retry(model, move || transport.stream(model, request, api_key))
            .await
    }

    async fn with_retry<T, F, Fut>(&self, model: &str, mut call: F) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut state = RetryState::default();
        while state.attempt < self.policy.max_attempts {
            state.attempt += 1;
            match call().await {
                Ok(value) => {
                    if state.attempt > 1 {
                        engine_info!(
                            "completion_recovered model={} attempt={}",
                            model,
                            state.attempt
                        );
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() => {
                    engine_warn!(
                        "completion_retry model={} attempt={}/{} error=\"{}\"",
                        model,
                        state.attempt,
                        self.policy.max_attempts,
                        err
                    );
                    state.last_error = Some(err);
                    if state.attempt < self.policy.max_attempts && !self.policy.backoff.is_zero() {
                        tokio::time::sleep(self.policy.backoff).await;
                    }
                }
                Err(err) => {
                    engine_warn!("completion_rejected model={} error=\"{}\"", model, err);
                    return Err(EngineError::UpstreamRejected(err));
                }
            }
        }

        match state.last_error {
            Some(last) => Err(EngineError::UpstreamExhausted {
                attempts: state.attempt,
                last,
            }),
            None => Err(EngineError::Configuration(
                "retry policy allows no attempts".into(),
            )),
        }
    }
}

/// Input checks that must fail before any I/O. Returns the model id.
fn validate(request: &CompletionRequest) -> Result<&str, EngineError> {
    let model = request
        .model
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| EngineError::Configuration("completion model is not set".into()))?;

    if let Some(max_tokens) = request.max_tokens {
        if max_tokens > MAX_TOKENS_CEILING {
            return Err(EngineError::Validation(format!(
                "max_tokens cannot be more than {MAX_TOKENS_CEILING}, got {max_tokens}"
            )));
        }
    }

    Ok(model)
}

async fn forward_lines(
    fragments: FragmentStream,
    channel: &ProgressChannel,
) -> Result<String, EngineError> {
    let mut lines = reassemble_lines(fragments);
    let mut response = String::new();
    let mut forwarded = 0usize;
    while let Some(line) = lines.next().await {
        let line = line?;
        response.push_str(&line);
        channel.send(ProgressMessage::ReportChunk(line)).await?;
        forwarded += 1;
    }
    engine_debug!(
        "completion_streamed task={} lines={} chars={}",
        channel.task_id(),
        forwarded,
        response.len()
    );
    Ok(response)
}
