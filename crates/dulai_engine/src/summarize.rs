use std::sync::Arc;
use std::time::Duration;

use dulai_core::ProgressMessage;
use engine_logging::{engine_debug, engine_info, engine_warn};

use crate::browser::{Browser, BrowserError, BrowserLauncher, BrowserSession};
use crate::channel::ProgressChannel;
use crate::completion::{ChatMessage, CompletionRequest, RetryingCompletionClient};
use crate::config::{EngineConfig, PageHeader};
use crate::extract::{extract_visible_text, split_text};
use crate::links::{extract_hyperlinks, format_hyperlinks, select_top_links, Hyperlink, TOP_LINKS};
use crate::offload::BlockingOffloader;
use crate::EngineError;

pub const NO_TEXT_SUMMARY: &str = "Error: No text to summarize";

#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub wait_selector: String,
    pub page_load_timeout: Duration,
    pub page_header: Option<PageHeader>,
    pub chunk_max_length: usize,
    pub summary_model: String,
    pub summary_max_tokens: u32,
    pub temperature: f32,
    pub max_links: usize,
}

impl From<&EngineConfig> for ScrapeSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            wait_selector: config.wait_selector.clone(),
            page_load_timeout: config.page_load_timeout,
            page_header: config.page_header.clone(),
            chunk_max_length: config.browse_chunk_max_length,
            summary_model: config.fast_llm_model.clone(),
            summary_max_tokens: config.fast_token_limit,
            temperature: config.temperature,
            max_links: TOP_LINKS,
        }
    }
}

/// What one scrape produced. Consumed by the summariser, then dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeResult {
    pub url: String,
    pub text: String,
    pub hyperlinks: Vec<Hyperlink>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSummary {
    pub url: String,
    pub summary: String,
    pub links: Vec<Hyperlink>,
}

impl PageSummary {
    /// The direct-browse answer sent to the client.
    pub fn to_answer(&self) -> String {
        let links = format_hyperlinks(&self.links)
            .into_iter()
            .map(|link| format!("'{link}'"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Answer gathered from website: {} \n \n Links: [{}]",
            self.summary, links
        )
    }
}

impl PageHeader {
    fn script(&self) -> String {
        let html = format!(
            "<h1>{}</h1><h2>{}</h2>",
            escape_html(&self.title),
            escape_html(&self.subtitle)
        );
        format!(
            "document.body.insertAdjacentHTML('afterbegin', '{}');",
            escape_js(&html)
        )
    }

    pub fn inject(&self, browser: &mut dyn Browser) -> Result<(), BrowserError> {
        browser.execute_script(&self.script()).map(|_| ())
    }
}

/// Turns `(url, question)` into a summary, with the page scraped off the
/// async runtime.
#[derive(Clone)]
pub struct ScrapeSummarizer {
    launcher: Arc<dyn BrowserLauncher>,
    offloader: Arc<BlockingOffloader>,
    client: RetryingCompletionClient,
    settings: ScrapeSettings,
}

impl ScrapeSummarizer {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        offloader: Arc<BlockingOffloader>,
        client: RetryingCompletionClient,
        settings: ScrapeSettings,
    ) -> Self {
        Self {
            launcher,
            offloader,
            client,
            settings,
        }
    }

    /// Loads `url` in a fresh browser and extracts its visible text and links.
    pub async fn scrape(&self, url: &str) -> Result<ScrapeResult, EngineError> {
        let launcher = Arc::clone(&self.launcher);
        let settings = self.settings.clone();
        let url = url.to_string();
        self.offloader
            .run("scrape", move || scrape_blocking(launcher.as_ref(), &settings, url))
            .await
    }

    /// Direct-browse path: summary plus the top hyperlinks of the page.
    pub async fn summarize(&self, url: &str, question: &str) -> Result<PageSummary, EngineError> {
        let page = self.scrape(url).await?;
        let summary = self.summarize_text(&page.url, &page.text, question).await?;
        let links = select_top_links(&page.hyperlinks, self.settings.max_links);
        Ok(PageSummary {
            url: page.url,
            summary,
            links,
        })
    }

    /// Research path: reports progress on `channel` around the scrape.
    pub async fn browse_with_progress(
        &self,
        url: &str,
        question: &str,
        channel: &ProgressChannel,
    ) -> Result<String, EngineError> {
        channel
            .send(ProgressMessage::Log(format!(
                "🔎 Researching {url} for relevant information on: {question}..."
            )))
            .await?;
        let page = self.scrape(url).await?;
        let summary = self.summarize_text(&page.url, &page.text, question).await?;
        channel
            .send(ProgressMessage::Log(format!(
                "📝 Information gathered from {url}: {summary}"
            )))
            .await?;
        Ok(format!("Information gathered from url {url}: {summary}"))
    }

    /// Summarises `text` against `question`, chunk by chunk.
    pub async fn summarize_text(
        &self,
        url: &str,
        text: &str,
        question: &str,
    ) -> Result<String, EngineError> {
        if text.trim().is_empty() {
            return Ok(NO_TEXT_SUMMARY.to_string());
        }
        let chunks = split_text(text, self.settings.chunk_max_length);
        engine_info!(
            "summarize_start url={} chars={} chunks={}",
            url,
            text.len(),
            chunks.len()
        );

        let mut summaries = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.iter().enumerate() {
            engine_debug!("summarize_chunk url={} chunk={}/{}", url, index + 1, chunks.len());
            summaries.push(self.ask(chunk, question).await?);
        }
        if summaries.len() == 1 {
            return Ok(summaries.remove(0));
        }
        self.ask(&summaries.join("\n"), question).await
    }

    async fn ask(&self, text: &str, question: &str) -> Result<String, EngineError> {
        let request = CompletionRequest::new(vec![ChatMessage::user(summary_prompt(text, question))])
            .with_model(self.settings.summary_model.clone())
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.summary_max_tokens);
        self.client.complete(&request, None).await
    }
}

fn scrape_blocking(
    launcher: &dyn BrowserLauncher,
    settings: &ScrapeSettings,
    url: String,
) -> Result<ScrapeResult, EngineError> {
    let mut session = BrowserSession::launch(launcher)?;
    session.navigate(&url)?;
    session.wait_for_element(&settings.wait_selector, settings.page_load_timeout)?;
    let html = session.rendered_html()?;
    let text = extract_visible_text(&html);
    let hyperlinks = extract_hyperlinks(&html, Some(&url));

    if let Some(header) = &settings.page_header {
        match header.inject(&mut *session) {
            Ok(()) => {}
            Err(BrowserError::ScriptUnsupported(backend)) => {
                engine_debug!("page_header_skipped backend=\"{}\"", backend);
            }
            Err(err) => engine_warn!("page_header_failed url={} error=\"{}\"", url, err),
        }
    }
    if let Err(err) = session.close() {
        engine_warn!("browser_close_failed url={} error=\"{}\"", url, err);
    }

    engine_debug!(
        "scrape_done url={} chars={} links={}",
        url,
        text.len(),
        hyperlinks.len()
    );
    Ok(ScrapeResult {
        url,
        text,
        hyperlinks,
    })
}

fn summary_prompt(text: &str, question: &str) -> String {
    format!(
        "\"\"\"{text}\"\"\" Using the above text, answer the following question: \"{question}\" \
-- if the question cannot be answered using the text, summarize the text in detail. \
Include all factual information, numbers, stats etc if available."
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn escape_js(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}
