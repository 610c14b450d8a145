//! Dulai core: task domain, wire protocol and the pure task state machine.
mod agent;
mod effect;
mod message;
mod msg;
mod protocol;
mod state;
mod task;
mod update;

pub use agent::{AgentPersona, AUTO_AGENT, DEFAULT_AGENT, DEFAULT_ROLE_PROMPT};
pub use effect::Effect;
pub use message::{ErrorKind, FrameType, OutboundFrame, ProgressMessage};
pub use msg::{Msg, TaskFailure};
pub use protocol::{parse_frame, FrameError, INVALID_REQUEST, NOT_ENOUGH_PARAMETERS, START_COMMAND};
pub use state::{TaskPhase, TaskState};
pub use task::{extract_source_urls, AgentChoice, ApiKey, ReportType, Task, TaskId, TaskRequest, ValidationFailure};
pub use update::{greeting, update};
