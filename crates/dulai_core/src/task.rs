use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use url::Url;

use crate::agent::AUTO_AGENT;

pub type TaskId = u64;

/// Credential supplied by the client. Never printed.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "ApiKey(<empty>)")
        } else {
            write!(f, "ApiKey(***)")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportType {
    Research,
    Resource,
    Outline,
    /// Summarise a single page and return its top hyperlinks.
    WebBrowse,
}

impl ReportType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportType::Research => "research_report",
            ReportType::Resource => "resource_report",
            ReportType::Outline => "outline_report",
            ReportType::WebBrowse => "web_browse",
        }
    }

    pub fn is_direct_browse(self) -> bool {
        matches!(self, ReportType::WebBrowse)
    }
}

impl FromStr for ReportType {
    type Err = ValidationFailure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "research_report" => Ok(ReportType::Research),
            "resource_report" => Ok(ReportType::Resource),
            "outline_report" => Ok(ReportType::Outline),
            "web_browse" => Ok(ReportType::WebBrowse),
            other => Err(ValidationFailure::UnsupportedReportType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentChoice {
    Auto,
    Named(String),
}

impl AgentChoice {
    fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == AUTO_AGENT {
            AgentChoice::Auto
        } else {
            AgentChoice::Named(raw.to_string())
        }
    }
}

/// One unit of research work, bound to a single connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub query: String,
    pub report_type: ReportType,
    pub agent: AgentChoice,
    pub language: Option<String>,
    pub api_key: ApiKey,
}

impl Task {
    pub fn source_urls(&self) -> Vec<String> {
        extract_source_urls(&self.query)
    }
}

/// Raw payload of the `start` frame. Every field is optional on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct TaskRequest {
    pub task: Option<String>,
    pub report_type: Option<String>,
    pub agent: Option<String>,
    pub language: Option<String>,
    pub openai_api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    MissingParameters,
    UnsupportedReportType(String),
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationFailure::MissingParameters => write!(f, "{}", crate::NOT_ENOUGH_PARAMETERS),
            ValidationFailure::UnsupportedReportType(value) => {
                write!(f, "Error: unsupported report type: {value}")
            }
        }
    }
}

impl TaskRequest {
    /// Checks required fields and builds the immutable `Task`.
    pub fn into_task(self, id: TaskId) -> Result<Task, ValidationFailure> {
        let query = non_empty(self.task);
        let report_type = non_empty(self.report_type);
        let agent = non_empty(self.agent);

        let (Some(query), Some(report_type), Some(agent)) = (query, report_type, agent) else {
            return Err(ValidationFailure::MissingParameters);
        };

        Ok(Task {
            id,
            query,
            report_type: report_type.parse()?,
            agent: AgentChoice::parse(&agent),
            language: non_empty(self.language),
            api_key: ApiKey::new(self.openai_api_key.unwrap_or_default()),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Absolute http(s) URLs mentioned in free text, in order, without duplicates.
pub fn extract_source_urls(text: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for word in text.split_whitespace() {
        let candidate = word.trim_matches(|c: char| {
            matches!(c, '"' | '\'' | '(' | ')' | '<' | '>' | '[' | ']' | ',' | ';')
        });
        let candidate = candidate.trim_end_matches(['.', ':', '!', '?']);
        let Ok(url) = Url::parse(candidate) else {
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            continue;
        }
        let url = url.to_string();
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}
