use std::str::FromStr;
use std::time::{Duration, Instant};

use engine_logging::{engine_debug, engine_info};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Browser, BrowserError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserVendor {
    Chrome,
    Firefox,
    Safari,
}

impl BrowserVendor {
    pub fn as_str(self) -> &'static str {
        match self {
            BrowserVendor::Chrome => "chrome",
            BrowserVendor::Firefox => "firefox",
            BrowserVendor::Safari => "safari",
        }
    }

    /// `alwaysMatch` capabilities for a headless session.
    fn capabilities(self, user_agent: &str) -> Value {
        match self {
            BrowserVendor::Chrome => json!({
                "browserName": "chrome",
                "goog:chromeOptions": {
                    "args": [
                        "--headless=new",
                        "--no-sandbox",
                        "--disable-dev-shm-usage",
                        format!("--user-agent={user_agent}"),
                    ]
                }
            }),
            BrowserVendor::Firefox => json!({
                "browserName": "firefox",
                "moz:firefoxOptions": {
                    "args": ["-headless"],
                    "prefs": { "general.useragent.override": user_agent }
                }
            }),
            BrowserVendor::Safari => json!({ "browserName": "safari" }),
        }
    }
}

impl FromStr for BrowserVendor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chrome" => Ok(BrowserVendor::Chrome),
            "firefox" => Ok(BrowserVendor::Firefox),
            "safari" => Ok(BrowserVendor::Safari),
            other => Err(format!("unknown browser `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebDriverSettings {
    /// Base URL of the WebDriver server, e.g. `http://localhost:4444`.
    pub endpoint: String,
    pub vendor: BrowserVendor,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
}

impl WebDriverSettings {
    pub fn new(endpoint: impl Into<String>, vendor: BrowserVendor) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            vendor,
            user_agent: String::from("Mozilla/5.0 (compatible; dulai)"),
            request_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(250),
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    value: Value,
}

#[derive(Deserialize)]
struct NewSession {
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

/// A remote browser driven through the W3C WebDriver protocol.
pub struct WebDriverBrowser {
    client: reqwest::blocking::Client,
    settings: WebDriverSettings,
    session_id: Option<String>,
    navigated: bool,
}

impl WebDriverBrowser {
    /// Opens a new session on the WebDriver server.
    pub fn start(settings: WebDriverSettings) -> Result<Self, BrowserError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| BrowserError::Session(err.to_string()))?;
        let mut browser = Self {
            client,
            settings,
            session_id: None,
            navigated: false,
        };

        let body = json!({
            "capabilities": {
                "alwaysMatch": browser.settings.vendor.capabilities(&browser.settings.user_agent)
            }
        });
        let url = format!("{}/session", browser.settings.endpoint);
        let value = browser
            .request(reqwest::Method::POST, &url, Some(&body))?
            .map_err(|err| BrowserError::Session(format!("{}: {}", err.error, err.message)))?;
        let session: NewSession = serde_json::from_value(value)
            .map_err(|err| BrowserError::Session(format!("unexpected new-session reply: {err}")))?;
        engine_info!(
            "webdriver_session_open vendor={} session={}",
            browser.settings.vendor.as_str(),
            session.session_id
        );
        browser.session_id = Some(session.session_id);
        Ok(browser)
    }

    fn session_url(&self, suffix: &str) -> Result<String, BrowserError> {
        let id = self
            .session_id
            .as_deref()
            .ok_or_else(|| BrowserError::Session("session already closed".into()))?;
        Ok(format!("{}/session/{}{}", self.settings.endpoint, id, suffix))
    }

    /// Sends one command. The outer `Err` is a transport failure; the inner one
    /// is a WebDriver error reply.
    fn request(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Result<Value, WireError>, BrowserError> {
        let mut builder = self.client.request(method, url);
        if let Some(body) = body {
            let payload = serde_json::to_vec(body)
                .map_err(|err| BrowserError::Session(err.to_string()))?;
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(payload);
        }
        let response = builder
            .send()
            .map_err(|err| BrowserError::Session(err.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .map_err(|err| BrowserError::Session(err.to_string()))?;
        let envelope: Envelope = serde_json::from_slice(&bytes)
            .map_err(|err| BrowserError::Session(format!("malformed reply ({status}): {err}")))?;

        if status.is_success() {
            return Ok(Ok(envelope.value));
        }
        let wire: WireError = serde_json::from_value(envelope.value).unwrap_or(WireError {
            error: format!("http {status}"),
            message: String::new(),
        });
        Ok(Err(wire))
    }

    fn command(&self, method: reqwest::Method, suffix: &str, body: Option<&Value>) -> Result<Value, BrowserError> {
        let url = self.session_url(suffix)?;
        self.request(method, &url, body)?
            .map_err(|err| BrowserError::Session(format!("{}: {}", err.error, err.message)))
    }
}

impl Browser for WebDriverBrowser {
    fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        let target = self.session_url("/url")?;
        let reply = self.request(reqwest::Method::POST, &target, Some(&json!({ "url": url })))?;
        match reply {
            Ok(_) => {
                self.navigated = true;
                engine_debug!("webdriver_navigated url={}", url);
                Ok(())
            }
            Err(err) => Err(BrowserError::Navigation {
                url: url.to_string(),
                message: format!("{}: {}", err.error, err.message),
            }),
        }
    }

    fn wait_for_element(&mut self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        if !self.navigated {
            return Err(BrowserError::NoPage);
        }
        let target = self.session_url("/element")?;
        let body = json!({ "using": "css selector", "value": selector });
        let deadline = Instant::now() + timeout;
        loop {
            match self.request(reqwest::Method::POST, &target, Some(&body))? {
                Ok(_) => return Ok(()),
                Err(err) if err.error == "no such element" => {}
                Err(err) => {
                    return Err(BrowserError::Session(format!("{}: {}", err.error, err.message)))
                }
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(BrowserError::Timeout {
                    selector: selector.to_string(),
                    timeout,
                });
            }
            std::thread::sleep(self.settings.poll_interval.min(deadline - now));
        }
    }

    fn rendered_html(&mut self) -> Result<String, BrowserError> {
        if !self.navigated {
            return Err(BrowserError::NoPage);
        }
        match self.execute_script("return document.body.outerHTML;")? {
            Value::String(html) => Ok(html),
            other => Err(BrowserError::Script(format!(
                "expected page HTML, got {other}"
            ))),
        }
    }

    fn execute_script(&mut self, script: &str) -> Result<Value, BrowserError> {
        let target = self.session_url("/execute/sync")?;
        let body = json!({ "script": script, "args": [] });
        self.request(reqwest::Method::POST, &target, Some(&body))?
            .map_err(|err| BrowserError::Script(format!("{}: {}", err.error, err.message)))
    }

    fn close(&mut self) -> Result<(), BrowserError> {
        if self.session_id.is_none() {
            return Ok(());
        }
        let result = self.command(reqwest::Method::DELETE, "", None).map(|_| ());
        if let Some(id) = self.session_id.take() {
            engine_debug!("webdriver_session_closed session={}", id);
        }
        self.navigated = false;
        result
    }
}
