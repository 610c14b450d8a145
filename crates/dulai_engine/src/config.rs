use std::time::Duration;

use crate::browser::{BrowserBackend, HttpSettings};
use crate::completion::RetryPolicy;
use crate::offload::default_pool_size;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_4) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/83.0.4103.97 Safari/537.36";
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Cosmetic header written into the rendered page after extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHeader {
    pub title: String,
    pub subtitle: String,
}

/// Process-wide settings. Built once at start-up and shared read-only.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub fast_llm_model: String,
    pub smart_llm_model: String,
    pub fast_token_limit: u32,
    pub smart_token_limit: u32,
    pub browse_chunk_max_length: usize,
    pub temperature: f32,
    pub user_agent: String,
    pub browser: BrowserBackend,
    pub page_load_timeout: Duration,
    pub wait_selector: String,
    pub worker_pool_size: usize,
    pub completion_retry: RetryPolicy,
    pub agent_retry: RetryPolicy,
    pub api_base: String,
    pub request_timeout: Duration,
    pub page_header: Option<PageHeader>,
    pub max_sources: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fast_llm_model: "gpt-3.5-turbo-16k".to_string(),
            smart_llm_model: "gpt-4".to_string(),
            fast_token_limit: 4000,
            smart_token_limit: 8000,
            browse_chunk_max_length: 8192,
            temperature: 1.0,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            browser: BrowserBackend::Http(HttpSettings {
                user_agent: DEFAULT_USER_AGENT.to_string(),
                ..HttpSettings::default()
            }),
            page_load_timeout: Duration::from_secs(10),
            wait_selector: "body".to_string(),
            worker_pool_size: default_pool_size(),
            completion_retry: RetryPolicy::default(),
            agent_retry: RetryPolicy::new(3, Duration::from_millis(500)),
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: Duration::from_secs(60),
            page_header: None,
            max_sources: 5,
        }
    }
}
