//! Dulai engine: completion, scraping, progress delivery and task execution.
mod agent;
mod browser;
mod channel;
mod completion;
mod config;
mod credential;
mod error;
mod extract;
mod links;
mod offload;
mod orchestrator;
mod prompts;
mod reassemble;
mod research;
mod summarize;

pub use agent::resolve_agent;
pub use browser::{
    decode_html, Browser, BrowserBackend, BrowserError, BrowserLauncher, BrowserSession,
    BrowserVendor, CharsetSource, DecodeError, DecodedHtml, HttpBrowser, HttpSettings,
    WebDriverBrowser, WebDriverSettings,
};
pub use channel::ProgressChannel;
pub use completion::{
    ChatMessage, CompletionRequest, CompletionTransport, FragmentStream, OpenAiTransport,
    RetryPolicy, RetryingCompletionClient, Role, TransportError, MAX_TOKENS_CEILING,
};
pub use config::{EngineConfig, PageHeader, DEFAULT_API_BASE, DEFAULT_USER_AGENT};
pub use credential::{CredentialError, CredentialVerifier, OpenAiCredentialProbe};
pub use error::{BoxError, EngineError};
pub use extract::{extract_visible_text, split_text};
pub use links::{extract_hyperlinks, format_hyperlinks, select_top_links, Hyperlink, TOP_LINKS};
pub use offload::{default_pool_size, BlockingOffloader};
pub use orchestrator::{RunOutcome, TaskOrchestrator};
pub use prompts::{report_prompt, DEFAULT_LANGUAGE};
pub use reassemble::{reassemble_lines, LineReassembler, ReassembledLines};
pub use research::Researcher;
pub use summarize::{PageSummary, ScrapeResult, ScrapeSettings, ScrapeSummarizer, NO_TEXT_SUMMARY};
