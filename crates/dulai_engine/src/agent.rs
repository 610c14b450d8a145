use dulai_core::AgentPersona;
use engine_logging::{engine_info, engine_warn};

use crate::completion::{ChatMessage, CompletionRequest, RetryingCompletionClient};

const AUTO_AGENT_INSTRUCTIONS: &str = r#"This task involves researching a given topic, regardless of its complexity or the availability of a definitive answer. The research is conducted by a specific agent, defined by its type and role, with each agent requiring distinct instructions.
Agent
The agent is determined by the field of the topic and the specific name of the agent that could be utilized to research the topic provided. Agents are categorized by their area of expertise, and each agent type is associated with a corresponding emoji.

examples:
task: "should I invest in apple stocks?"
response:
{
    "agent": "💰 Finance Agent",
    "agent_role_prompt": "You are a seasoned finance analyst AI assistant. Your primary goal is to compose comprehensive, astute, impartial, and methodically arranged financial reports based on provided data and trends."
}
task: "could reselling sneakers become profitable?"
response:
{
    "agent": "📈 Business Analyst Agent",
    "agent_role_prompt": "You are an experienced AI business analyst assistant. Your main objective is to produce comprehensive, insightful, impartial, and systematically structured business reports based on provided business data, market trends, and strategic analysis."
}
task: "what are the most interesting sites in Tel Aviv?"
response:
{
    "agent": "🌍 Travel Agent",
    "agent_role_prompt": "You are a world-travelled AI tour guide assistant. Your main purpose is to draft engaging, insightful, unbiased, and well-structured travel reports on given locations, including history, attractions, and cultural insights."
}
Respond with the JSON object only."#;

/// Picks a persona for `query`. Never fails: any completion error or
/// unparseable answer yields the default persona.
pub async fn resolve_agent(
    client: &RetryingCompletionClient,
    model: &str,
    query: &str,
) -> AgentPersona {
    let request = CompletionRequest::new(vec![
        ChatMessage::system(AUTO_AGENT_INSTRUCTIONS),
        ChatMessage::user(format!("task: {query}")),
    ])
    .with_model(model)
    .with_temperature(0.0);

    match client.complete(&request, None).await {
        Ok(answer) => match AgentPersona::parse(&answer) {
            Some(persona) => {
                engine_info!("agent_resolved agent=\"{}\"", persona.name);
                persona
            }
            None => {
                engine_warn!("agent_fallback reason=unparseable chars={}", answer.len());
                AgentPersona::default_persona()
            }
        },
        Err(err) => {
            engine_warn!("agent_fallback reason=completion error=\"{}\"", err);
            AgentPersona::default_persona()
        }
    }
}
