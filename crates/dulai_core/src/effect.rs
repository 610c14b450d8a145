use crate::{AgentPersona, ApiKey, ProgressMessage, Task};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Send(ProgressMessage),
    VerifyCredential { api_key: ApiKey },
    ResolveAgent { query: String, api_key: ApiKey },
    StartResearch { task: Task, persona: AgentPersona },
}
