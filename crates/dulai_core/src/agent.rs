use serde::Deserialize;

/// Agent name a client sends to request automatic persona selection.
pub const AUTO_AGENT: &str = "Auto Agent";
pub const DEFAULT_AGENT: &str = "Default Agent";
pub const DEFAULT_ROLE_PROMPT: &str = "You are an AI critical thinker research assistant. \
Your sole purpose is to write well written, critically acclaimed, objective and structured \
reports on given text.";

/// The persona the report writer adopts: a display name plus a system prompt.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgentPersona {
    #[serde(rename = "agent")]
    pub name: String,
    #[serde(rename = "agent_role_prompt")]
    pub role_prompt: String,
}

impl AgentPersona {
    pub fn default_persona() -> Self {
        Self {
            name: DEFAULT_AGENT.to_string(),
            role_prompt: DEFAULT_ROLE_PROMPT.to_string(),
        }
    }

    /// A client-chosen agent keeps its name and uses the default role prompt.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role_prompt: DEFAULT_ROLE_PROMPT.to_string(),
        }
    }

    /// Parses a model answer of the form `{"agent": .., "agent_role_prompt": ..}`.
    ///
    /// A surrounding markdown code fence is tolerated. Blank fields are rejected.
    pub fn parse(answer: &str) -> Option<Self> {
        let body = strip_code_fence(answer.trim());
        let persona: AgentPersona = serde_json::from_str(body).ok()?;
        if persona.name.trim().is_empty() || persona.role_prompt.trim().is_empty() {
            return None;
        }
        Some(persona)
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
