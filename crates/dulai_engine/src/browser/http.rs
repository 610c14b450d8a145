use std::io::Read;
use std::time::Duration;

use engine_logging::{engine_debug, engine_warn};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use scraper::{Html, Selector};

use super::{decode_html, Browser, BrowserError};

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub allowed_content_types: Vec<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: String::from("Mozilla/5.0 (compatible; dulai)"),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            allowed_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
                "text/plain".to_string(),
            ],
        }
    }
}

struct LoadedPage {
    url: String,
    html: String,
}

/// Fetches pages over plain HTTP. No JavaScript runs, so the document never
/// changes after load.
pub struct HttpBrowser {
    client: reqwest::blocking::Client,
    settings: HttpSettings,
    page: Option<LoadedPage>,
}

impl HttpBrowser {
    pub fn new(settings: HttpSettings) -> Result<Self, BrowserError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .build()
            .map_err(|err| BrowserError::Session(err.to_string()))?;
        Ok(Self {
            client,
            settings,
            page: None,
        })
    }

    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        let essence = content_type.split(';').next().unwrap_or(content_type).trim();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(essence))
    }

    fn page(&self) -> Result<&LoadedPage, BrowserError> {
        self.page.as_ref().ok_or(BrowserError::NoPage)
    }
}

impl Browser for HttpBrowser {
    fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        let nav_error = |message: String| BrowserError::Navigation {
            url: url.to_string(),
            message,
        };
        self.page = None;

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.settings.user_agent)
            .send()
            .map_err(|err| nav_error(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(nav_error(format!("http status {status}")));
        }
        if let Some(len) = response.content_length() {
            if len > self.settings.max_bytes {
                return Err(nav_error(format!(
                    "response of {len} bytes exceeds {} bytes",
                    self.settings.max_bytes
                )));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        if let Some(ct) = content_type.as_deref() {
            if !self.is_content_type_allowed(ct) {
                return Err(nav_error(format!("unsupported content type {ct}")));
            }
        }

        let mut bytes = Vec::new();
        response
            .take(self.settings.max_bytes + 1)
            .read_to_end(&mut bytes)
            .map_err(|err| nav_error(err.to_string()))?;
        if bytes.len() as u64 > self.settings.max_bytes {
            return Err(nav_error(format!(
                "response exceeds {} bytes",
                self.settings.max_bytes
            )));
        }

        let html = match decode_html(&bytes, content_type.as_deref()) {
            Ok(decoded) => decoded.html,
            Err(err) => {
                engine_warn!("page_decode_lossy url={} error=\"{}\"", final_url, err);
                String::from_utf8_lossy(&bytes).into_owned()
            }
        };
        engine_debug!("page_loaded url={} bytes={}", final_url, bytes.len());
        self.page = Some(LoadedPage {
            url: final_url,
            html,
        });
        Ok(())
    }

    fn wait_for_element(&mut self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        let parsed = Selector::parse(selector)
            .map_err(|err| BrowserError::Script(format!("invalid selector `{selector}`: {err}")))?;
        let page = self.page()?;
        let document = Html::parse_document(&page.html);
        if document.select(&parsed).next().is_some() {
            return Ok(());
        }
        engine_debug!("element_missing url={} selector={}", page.url, selector);
        Err(BrowserError::Timeout {
            selector: selector.to_string(),
            timeout,
        })
    }

    fn rendered_html(&mut self) -> Result<String, BrowserError> {
        Ok(self.page()?.html.clone())
    }

    fn execute_script(&mut self, _script: &str) -> Result<serde_json::Value, BrowserError> {
        Err(BrowserError::ScriptUnsupported("http browser"))
    }

    fn close(&mut self) -> Result<(), BrowserError> {
        self.page = None;
        Ok(())
    }
}
