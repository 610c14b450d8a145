use std::time::Duration;

use dulai_core::ApiKey;
use engine_logging::engine_debug;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::sse::content_fragments;
use super::{ChatMessage, CompletionRequest, CompletionTransport, FragmentStream, TransportError};
use crate::EngineError;

/// Chat-completions transport for OpenAI-compatible HTTP APIs.
#[derive(Debug, Clone)]
pub struct OpenAiTransport {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl OpenAiTransport {
    /// `request_timeout` bounds connecting and every idle gap while reading.
    /// Whole-response completions are additionally bounded by it end to end;
    /// streams may run for as long as data keeps arriving.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .read_timeout(request_timeout)
            .build()
            .map_err(|err| EngineError::Configuration(format!("http client: {err}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    async fn post(
        &self,
        body: &ChatBody<'_>,
        api_key: &ApiKey,
    ) -> Result<reqwest::Response, TransportError> {
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url));
        if !body.stream {
            builder = builder.timeout(self.request_timeout);
        }
        let payload = serde_json::to_vec(body)
            .map_err(|err| TransportError::BadRequest {
                status: 0,
                message: err.to_string(),
            })?;
        let response = builder
            .header(AUTHORIZATION, format!("Bearer {}", api_key.expose()))
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(classify_status(status, message))
    }
}

#[async_trait::async_trait]
impl CompletionTransport for OpenAiTransport {
    async fn complete(
        &self,
        model: &str,
        request: &CompletionRequest,
        api_key: &ApiKey,
    ) -> Result<String, TransportError> {
        let body = ChatBody::new(model, request, false);
        let response = self.post(&body, api_key).await?;
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        let parsed: ChatResponse = serde_json::from_slice(&bytes)
            .map_err(|err| TransportError::InvalidResponse(err.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| TransportError::InvalidResponse("response has no content".into()))?;
        engine_debug!("completion_done model={} chars={}", model, content.len());
        Ok(content)
    }

    async fn stream(
        &self,
        model: &str,
        request: &CompletionRequest,
        api_key: &ApiKey,
    ) -> Result<FragmentStream, TransportError> {
        let body = ChatBody::new(model, request, true);
        let response = self.post(&body, api_key).await?;
        engine_debug!("completion_stream_open model={}", model);
        Ok(content_fragments(Box::pin(response.bytes_stream())))
    }
}

pub(crate) fn classify_status(status: StatusCode, message: String) -> TransportError {
    match status.as_u16() {
        429 => TransportError::RateLimited(message),
        408 => TransportError::Timeout,
        401 | 403 => TransportError::Unauthorized(message),
        code if code >= 500 => TransportError::Server {
            status: code,
            message,
        },
        code => TransportError::BadRequest {
            status: code,
            message,
        },
    }
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout;
    }
    if err.is_decode() {
        return TransportError::InvalidResponse(err.to_string());
    }
    TransportError::Connection(err.to_string())
}

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

impl<'a> ChatBody<'a> {
    fn new(model: &'a str, request: &'a CompletionRequest, stream: bool) -> Self {
        Self {
            model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
