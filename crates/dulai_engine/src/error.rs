use std::time::Duration;

use dulai_core::{ErrorKind, TaskFailure, TaskId};

use crate::browser::BrowserError;
use crate::completion::TransportError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The one error type that crosses component boundaries inside the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("upstream temporarily unavailable: {0}")]
    TransientUpstream(#[source] TransportError),
    #[error("upstream rejected the request: {0}")]
    UpstreamRejected(#[source] TransportError),
    #[error("upstream still failing after {attempts} attempts: {last}")]
    UpstreamExhausted {
        attempts: u32,
        #[source]
        last: TransportError,
    },
    #[error("page did not show `{selector}` within {timeout:?}")]
    PageLoadTimeout { selector: String, timeout: Duration },
    #[error("scrape failed: {message}")]
    Scrape {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    #[error("task {task_id} already delivered its terminal message")]
    ChannelClosed { task_id: TaskId },
    #[error("client disconnected")]
    ClientDisconnected,
}

impl EngineError {
    pub fn scrape(message: impl Into<String>, source: Option<BoxError>) -> Self {
        EngineError::Scrape {
            message: message.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::Configuration(_) => ErrorKind::Configuration,
            EngineError::TransientUpstream(_) => ErrorKind::TransientUpstream,
            EngineError::UpstreamRejected(_) => ErrorKind::UpstreamRejected,
            EngineError::UpstreamExhausted { .. } => ErrorKind::UpstreamExhausted,
            EngineError::PageLoadTimeout { .. } => ErrorKind::PageLoadTimeout,
            EngineError::Scrape { .. } => ErrorKind::Scrape,
            EngineError::ChannelClosed { .. } => ErrorKind::ChannelClosed,
            EngineError::ClientDisconnected => ErrorKind::ClientDisconnected,
        }
    }

    /// True when the progress channel itself can no longer carry messages.
    pub fn is_delivery_failure(&self) -> bool {
        matches!(
            self,
            EngineError::ChannelClosed { .. } | EngineError::ClientDisconnected
        )
    }

    pub fn to_failure(&self) -> TaskFailure {
        TaskFailure::new(self.kind(), self.to_string())
    }
}

impl From<TransportError> for EngineError {
    fn from(err: TransportError) -> Self {
        if err.is_transient() {
            EngineError::TransientUpstream(err)
        } else {
            EngineError::UpstreamRejected(err)
        }
    }
}

impl From<BrowserError> for EngineError {
    fn from(err: BrowserError) -> Self {
        match err {
            BrowserError::Timeout { selector, timeout } => {
                EngineError::PageLoadTimeout { selector, timeout }
            }
            other => EngineError::Scrape {
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }
}
