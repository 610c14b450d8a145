use crate::TaskRequest;

/// Literal tag every inbound frame must start with.
pub const START_COMMAND: &str = "start";
pub const INVALID_REQUEST: &str = "Invalid request.";
pub const NOT_ENOUGH_PARAMETERS: &str = "Error: not enough parameters provided.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    MissingCommand,
    MalformedPayload(String),
}

/// Parses `start {json}` into a request. Field presence is not checked here.
pub fn parse_frame(frame: &str) -> Result<TaskRequest, FrameError> {
    let payload = frame
        .strip_prefix(START_COMMAND)
        .ok_or(FrameError::MissingCommand)?
        .trim_start();
    serde_json::from_str(payload).map_err(|err| FrameError::MalformedPayload(err.to_string()))
}
