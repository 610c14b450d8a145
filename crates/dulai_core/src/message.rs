use std::fmt;

use serde::{Deserialize, Serialize};

/// Failure classes a task can end with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Configuration,
    TransientUpstream,
    /// Non-transient upstream failure (auth, malformed request, bad response).
    UpstreamRejected,
    UpstreamExhausted,
    PageLoadTimeout,
    Scrape,
    ChannelClosed,
    ClientDisconnected,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Configuration => "configuration",
            ErrorKind::TransientUpstream => "transient_upstream",
            ErrorKind::UpstreamRejected => "upstream_rejected",
            ErrorKind::UpstreamExhausted => "upstream_exhausted",
            ErrorKind::PageLoadTimeout => "page_load_timeout",
            ErrorKind::Scrape => "scrape",
            ErrorKind::ChannelClosed => "channel_closed",
            ErrorKind::ClientDisconnected => "client_disconnected",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of the outbound protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressMessage {
    Log(String),
    ReportChunk(String),
    Success(String),
    Error { kind: ErrorKind, text: String },
}

impl ProgressMessage {
    pub fn error(kind: ErrorKind, text: impl Into<String>) -> Self {
        ProgressMessage::Error {
            kind,
            text: text.into(),
        }
    }

    /// Success and Error end a task's message sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressMessage::Success(_) | ProgressMessage::Error { .. })
    }

    pub fn to_frame(&self) -> OutboundFrame {
        let (kind, output) = match self {
            ProgressMessage::Log(text) => (FrameType::Logs, text),
            ProgressMessage::ReportChunk(text) => (FrameType::Report, text),
            ProgressMessage::Success(text) => (FrameType::Success, text),
            ProgressMessage::Error { text, .. } => (FrameType::Error, text),
        };
        OutboundFrame {
            kind,
            output: output.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameType {
    Logs,
    Report,
    Error,
    Success,
}

/// Wire shape: `{"type": "...", "output": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    #[serde(rename = "type")]
    pub kind: FrameType,
    pub output: String,
}

impl OutboundFrame {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
