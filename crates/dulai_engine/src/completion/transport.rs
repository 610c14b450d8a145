use dulai_core::ApiKey;
use futures_util::stream::BoxStream;

use super::CompletionRequest;

/// Lazily produced model output, one arbitrarily sized fragment per item.
pub type FragmentStream = BoxStream<'static, Result<String, TransportError>>;

/// Failure of a single call to the completion provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("bad request {status}: {message}")]
    BadRequest { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    /// Whether repeating the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::RateLimited(_)
                | TransportError::Server { .. }
                | TransportError::Timeout
                | TransportError::Connection(_)
        )
    }
}

/// The completion provider. Requests reaching a transport are already validated.
#[async_trait::async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        request: &CompletionRequest,
        api_key: &ApiKey,
    ) -> Result<String, TransportError>;

    async fn stream(
        &self,
        model: &str,
        request: &CompletionRequest,
        api_key: &ApiKey,
    ) -> Result<FragmentStream, TransportError>;
}
