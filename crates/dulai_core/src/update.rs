use crate::{
    parse_frame, AgentChoice, AgentPersona, Effect, ErrorKind, Msg, ProgressMessage, TaskPhase,
    TaskState, INVALID_REQUEST,
};

/// Pure update function: applies a message to state and returns any effects.
///
/// Every path into `Succeeded` or `Failed` emits exactly one terminal
/// `Effect::Send`, and a finished state ignores all further messages.
pub fn update(mut state: TaskState, msg: Msg) -> (TaskState, Vec<Effect>) {
    if state.is_finished() {
        return (state, Vec::new());
    }

    let effects = match msg {
        Msg::FrameReceived(frame) => {
            if state.phase() != TaskPhase::Created {
                return (state, Vec::new());
            }
            let request = match parse_frame(&frame) {
                Ok(request) => request,
                Err(_) => return fail(state, ErrorKind::Validation, INVALID_REQUEST),
            };
            match request.into_task(state.id()) {
                Ok(task) => {
                    let api_key = task.api_key.clone();
                    state.begin_validation(Some(task));
                    vec![Effect::VerifyCredential { api_key }]
                }
                Err(failure) => {
                    state.begin_validation(None);
                    return fail(state, ErrorKind::Validation, failure.to_string());
                }
            }
        }
        Msg::CredentialChecked(result) => {
            if state.phase() != TaskPhase::Validating || state.credential_verified() {
                return (state, Vec::new());
            }
            if let Err(reason) = result {
                return fail(state, ErrorKind::Validation, reason);
            }
            state.mark_credential_verified();
            let Some(task) = state.task() else {
                return (state, Vec::new());
            };
            match task.agent.clone() {
                AgentChoice::Auto => vec![Effect::ResolveAgent {
                    query: task.query.clone(),
                    api_key: task.api_key.clone(),
                }],
                AgentChoice::Named(name) => start_running(&mut state, AgentPersona::named(name)),
            }
        }
        Msg::AgentResolved(persona) => {
            if state.phase() != TaskPhase::Validating || !state.credential_verified() {
                return (state, Vec::new());
            }
            start_running(&mut state, persona)
        }
        Msg::ResearchFinished(result) => {
            if state.phase() != TaskPhase::Running {
                return (state, Vec::new());
            }
            match result {
                Ok(report) => {
                    state.succeed();
                    vec![Effect::Send(ProgressMessage::Success(report))]
                }
                Err(failure) => {
                    let text = format!("Error: {}", failure.message);
                    return fail(state, failure.kind, text);
                }
            }
        }
    };

    (state, effects)
}

/// Log line sent when a task enters `Running`.
pub fn greeting(agent_name: &str) -> String {
    format!(
        "Dulai at your service!<br> Starting to work for you.<br>☕ Grab a coffee. Starting agent: {agent_name}"
    )
}

fn start_running(state: &mut TaskState, persona: AgentPersona) -> Vec<Effect> {
    let Some(task) = state.task().cloned() else {
        return Vec::new();
    };
    let log = ProgressMessage::Log(greeting(&persona.name));
    state.start_running(persona.clone());
    vec![Effect::Send(log), Effect::StartResearch { task, persona }]
}

fn fail(mut state: TaskState, kind: ErrorKind, text: impl Into<String>) -> (TaskState, Vec<Effect>) {
    state.fail();
    (
        state,
        vec![Effect::Send(ProgressMessage::error(kind, text))],
    )
}
