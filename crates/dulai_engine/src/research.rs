use dulai_core::{extract_source_urls, AgentPersona, ProgressMessage, Task};
use engine_logging::{engine_info, engine_warn};
use serde::Deserialize;

use crate::channel::ProgressChannel;
use crate::completion::{ChatMessage, CompletionRequest, RetryingCompletionClient};
use crate::config::EngineConfig;
use crate::prompts::{report_prompt, source_plan_prompt, DEFAULT_LANGUAGE};
use crate::summarize::ScrapeSummarizer;
use crate::EngineError;

/// Runs the `Running` phase of one task.
pub struct Researcher<'a> {
    config: &'a EngineConfig,
    client: RetryingCompletionClient,
    summarizer: ScrapeSummarizer,
}

impl<'a> Researcher<'a> {
    pub fn new(
        config: &'a EngineConfig,
        client: RetryingCompletionClient,
        summarizer: ScrapeSummarizer,
    ) -> Self {
        Self {
            config,
            client,
            summarizer,
        }
    }

    /// Returns the payload of the `Success` message.
    pub async fn run(
        &self,
        task: &Task,
        persona: &AgentPersona,
        channel: &ProgressChannel,
    ) -> Result<String, EngineError> {
        if task.report_type.is_direct_browse() {
            return self.browse(task, channel).await;
        }
        self.research(task, persona, channel).await
    }

    async fn browse(&self, task: &Task, channel: &ProgressChannel) -> Result<String, EngineError> {
        let Some(url) = task.source_urls().into_iter().next() else {
            return Err(EngineError::Validation(
                "web_browse needs a URL in the task".into(),
            ));
        };
        channel
            .send(ProgressMessage::Log(format!("🌐 Browsing {url}...")))
            .await?;
        let page = self.summarizer.summarize(&url, &task.query).await?;
        engine_info!(
            "browse_done task={} url={} links={}",
            task.id,
            page.url,
            page.links.len()
        );
        Ok(page.to_answer())
    }

    async fn research(
        &self,
        task: &Task,
        persona: &AgentPersona,
        channel: &ProgressChannel,
    ) -> Result<String, EngineError> {
        let sources = self.plan_sources(task).await?;
        if sources.is_empty() {
            return Err(EngineError::scrape("no sources found for the task", None));
        }

        let mut gathered = Vec::with_capacity(sources.len());
        for url in &sources {
            match self
                .summarizer
                .browse_with_progress(url, &task.query, channel)
                .await
            {
                Ok(info) => gathered.push(info),
                Err(err) if err.is_delivery_failure() => return Err(err),
                Err(err) => {
                    engine_warn!("source_skipped task={} url={} error=\"{}\"", task.id, url, err);
                    channel
                        .send(ProgressMessage::Log(format!("⚠️ Skipping {url}: {err}")))
                        .await?;
                }
            }
        }
        if gathered.is_empty() {
            return Err(EngineError::scrape(
                format!("none of the {} sources could be researched", sources.len()),
                None,
            ));
        }

        channel
            .send(ProgressMessage::Log(format!(
                "✍️ Writing {} for research task: {}...",
                task.report_type.as_str(),
                task.query
            )))
            .await?;
        let language = task.language.as_deref().unwrap_or(DEFAULT_LANGUAGE);
        let request = CompletionRequest::new(vec![
            ChatMessage::system(persona.role_prompt.clone()),
            ChatMessage::user(report_prompt(
                task.report_type,
                &task.query,
                &gathered.join("\n"),
                language,
            )),
        ])
        .with_model(self.config.smart_llm_model.clone())
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.smart_token_limit)
        .streaming();

        let report = self.client.complete(&request, Some(channel)).await?;
        engine_info!(
            "research_done task={} sources={}/{} chars={}",
            task.id,
            gathered.len(),
            sources.len(),
            report.len()
        );
        Ok(report)
    }

    /// URLs named in the task, or a list planned by the model.
    async fn plan_sources(&self, task: &Task) -> Result<Vec<String>, EngineError> {
        let max = self.config.max_sources.max(1);
        let mut named = task.source_urls();
        if !named.is_empty() {
            named.truncate(max);
            return Ok(named);
        }

        let request = CompletionRequest::new(vec![ChatMessage::user(source_plan_prompt(
            &task.query,
            max,
        ))])
        .with_model(self.config.smart_llm_model.clone())
        .with_temperature(0.0);
        let answer = self.client.complete(&request, None).await?;
        let mut planned = parse_source_plan(&answer);
        planned.truncate(max);
        engine_info!("sources_planned task={} count={}", task.id, planned.len());
        Ok(planned)
    }
}

#[derive(Deserialize)]
#[serde(transparent)]
struct SourcePlan(Vec<String>);

/// Accepts a JSON array of URLs; otherwise picks URLs out of the prose.
fn parse_source_plan(answer: &str) -> Vec<String> {
    let trimmed = answer.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);
    match serde_json::from_str::<SourcePlan>(body.trim()) {
        Ok(SourcePlan(urls)) => extract_source_urls(&urls.join(" ")),
        Err(_) => extract_source_urls(answer),
    }
}
