//! Start-up configuration read from the process environment.
//!
//! Variable names follow the ones the research service has always used
//! (`FAST_LLM_MODEL`, `SMART_TOKEN_LIMIT`, ...). Empty values count as unset.
//! A value that fails to parse stops start-up with an error naming the
//! variable.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use dulai_engine::{
    BrowserBackend, BrowserVendor, EngineConfig, HttpSettings, PageHeader, RetryPolicy,
    WebDriverSettings, MAX_TOKENS_CEILING,
};
use log::LevelFilter;
use thiserror::Error;

pub const DEFAULT_BIND: &str = "0.0.0.0:8000";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything the server binary needs before it accepts connections.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub log_level: LevelFilter,
    pub engine: EngineConfig,
}

pub fn from_env() -> Result<AppConfig, ConfigError> {
    from_lookup(|name| std::env::var(name).ok())
}

/// Builds the configuration from an arbitrary variable source.
pub fn from_lookup<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let env = Env { lookup };
    let defaults = EngineConfig::default();

    let user_agent = env.string("USER_AGENT").unwrap_or(defaults.user_agent);
    let browser = browser_backend(&env, &user_agent)?;
    let backoff = env
        .parse::<u64>("RETRY_BACKOFF_MS")?
        .map(Duration::from_millis);
    let completion_retry = match backoff {
        Some(backoff) => RetryPolicy::new(defaults.completion_retry.max_attempts, backoff),
        None => defaults.completion_retry,
    };
    let agent_retry = match backoff {
        Some(backoff) => RetryPolicy::new(defaults.agent_retry.max_attempts, backoff),
        None => defaults.agent_retry,
    };
    let page_header = env.string("WEBSITE_HEADER_TITLE").map(|title| PageHeader {
        title,
        subtitle: env.string("WEBSITE_HEADER_SUBTITLE").unwrap_or_default(),
    });

    let engine = EngineConfig {
        fast_llm_model: env
            .string("FAST_LLM_MODEL")
            .unwrap_or(defaults.fast_llm_model),
        smart_llm_model: env
            .string("SMART_LLM_MODEL")
            .unwrap_or(defaults.smart_llm_model),
        fast_token_limit: env
            .token_limit("FAST_TOKEN_LIMIT")?
            .unwrap_or(defaults.fast_token_limit),
        smart_token_limit: env
            .token_limit("SMART_TOKEN_LIMIT")?
            .unwrap_or(defaults.smart_token_limit),
        browse_chunk_max_length: env
            .parse("BROWSE_CHUNK_MAX_LENGTH")?
            .unwrap_or(defaults.browse_chunk_max_length),
        temperature: env.parse("TEMPERATURE")?.unwrap_or(defaults.temperature),
        user_agent,
        browser,
        page_load_timeout: env
            .parse::<u64>("PAGE_LOAD_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.page_load_timeout),
        wait_selector: defaults.wait_selector,
        worker_pool_size: env
            .parse("SCRAPE_WORKERS")?
            .unwrap_or(defaults.worker_pool_size),
        completion_retry,
        agent_retry,
        api_base: env
            .string("OPENAI_API_BASE")
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base),
        request_timeout: defaults.request_timeout,
        page_header,
        max_sources: env.parse("MAX_SOURCES")?.unwrap_or(defaults.max_sources),
    };

    let bind = match env.parse("DULAI_BIND")? {
        Some(addr) => addr,
        None => parse_value("DULAI_BIND", DEFAULT_BIND)?,
    };
    let log_level = match env.string("DULAI_LOG") {
        Some(name) => engine_logging::parse_level(&name).ok_or(ConfigError::Invalid {
            var: "DULAI_LOG",
            value: name,
            reason: "expected error, warn, info, debug or trace".to_string(),
        })?,
        None => LevelFilter::Info,
    };

    Ok(AppConfig {
        bind,
        log_level,
        engine,
    })
}

fn browser_backend<F>(env: &Env<F>, user_agent: &str) -> Result<BrowserBackend, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let choice = env.string("USE_WEB_BROWSER");
    match choice.as_deref().map(str::trim) {
        None => Ok(http_backend(user_agent)),
        Some(name) if name.eq_ignore_ascii_case("http") => Ok(http_backend(user_agent)),
        Some(name) => {
            let vendor = parse_value::<BrowserVendor>("USE_WEB_BROWSER", name)?;
            let endpoint = env
                .string("WEBDRIVER_URL")
                .unwrap_or_else(|| DEFAULT_WEBDRIVER_URL.to_string());
            Ok(BrowserBackend::WebDriver(WebDriverSettings {
                user_agent: user_agent.to_string(),
                ..WebDriverSettings::new(endpoint, vendor)
            }))
        }
    }
}

fn http_backend(user_agent: &str) -> BrowserBackend {
    BrowserBackend::Http(HttpSettings {
        user_agent: user_agent.to_string(),
        ..HttpSettings::default()
    })
}

fn parse_value<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
        var,
        value: raw.to_string(),
        reason: err.to_string(),
    })
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, var: &str) -> Option<String> {
        (self.lookup)(var).filter(|value| !value.trim().is_empty())
    }

    fn parse<T>(&self, var: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.string(var)
            .map(|raw| parse_value(var, &raw))
            .transpose()
    }

    /// Token limits are sent as `max_tokens`, so they share its ceiling.
    fn token_limit(&self, var: &'static str) -> Result<Option<u32>, ConfigError> {
        match self.parse::<u32>(var)? {
            Some(limit) if limit > MAX_TOKENS_CEILING => Err(ConfigError::Invalid {
                var,
                value: limit.to_string(),
                reason: format!("must not exceed {MAX_TOKENS_CEILING}"),
            }),
            limit => Ok(limit),
        }
    }
}
