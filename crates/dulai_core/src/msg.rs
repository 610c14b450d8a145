use crate::{AgentPersona, ErrorKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// The single inbound frame of the connection.
    FrameReceived(String),
    /// Outcome of the credential probe; `Err` carries the user-facing reason.
    CredentialChecked(Result<(), String>),
    /// Persona chosen for the task (auto-selected or fallback).
    AgentResolved(AgentPersona),
    /// The research run ended; `Ok` carries the assembled report.
    ResearchFinished(Result<String, TaskFailure>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl TaskFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
