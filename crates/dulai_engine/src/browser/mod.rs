//! Blocking page drivers: a static HTTP fetcher and a W3C WebDriver client.
mod decode;
mod http;
mod webdriver;

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use engine_logging::engine_warn;

pub use decode::{decode_html, CharsetSource, DecodeError, DecodedHtml};
pub use http::{HttpBrowser, HttpSettings};
pub use webdriver::{BrowserVendor, WebDriverBrowser, WebDriverSettings};

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("element `{selector}` not present after {timeout:?}")]
    Timeout { selector: String, timeout: Duration },
    #[error("could not load {url}: {message}")]
    Navigation { url: String, message: String },
    #[error("no page loaded")]
    NoPage,
    #[error("script failed: {0}")]
    Script(String),
    #[error("{0} does not run scripts")]
    ScriptUnsupported(&'static str),
    #[error("browser session error: {0}")]
    Session(String),
}

/// A single browser instance. All calls block the current thread.
pub trait Browser: Send {
    fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Waits until an element matching the CSS `selector` is present.
    fn wait_for_element(&mut self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// The current document as HTML.
    fn rendered_html(&mut self) -> Result<String, BrowserError>;

    fn execute_script(&mut self, script: &str) -> Result<serde_json::Value, BrowserError>;

    fn close(&mut self) -> Result<(), BrowserError>;
}

/// Creates fresh browser instances; one per scrape.
pub trait BrowserLauncher: Send + Sync {
    fn launch(&self) -> Result<Box<dyn Browser>, BrowserError>;
}

/// Owns a launched browser and closes it when dropped.
pub struct BrowserSession {
    browser: Box<dyn Browser>,
    closed: bool,
}

impl BrowserSession {
    pub fn launch(launcher: &dyn BrowserLauncher) -> Result<Self, BrowserError> {
        Ok(Self {
            browser: launcher.launch()?,
            closed: false,
        })
    }

    /// Closes now and reports the result instead of logging it.
    pub fn close(mut self) -> Result<(), BrowserError> {
        self.closed = true;
        self.browser.close()
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.browser.close() {
            engine_warn!("browser_close_failed error=\"{}\"", err);
        }
    }
}

impl Deref for BrowserSession {
    type Target = dyn Browser;

    fn deref(&self) -> &Self::Target {
        self.browser.as_ref()
    }
}

impl DerefMut for BrowserSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.browser.as_mut()
    }
}

/// Which browser engine scrapes pages.
#[derive(Debug, Clone)]
pub enum BrowserBackend {
    Http(HttpSettings),
    WebDriver(WebDriverSettings),
}

impl BrowserLauncher for BrowserBackend {
    fn launch(&self) -> Result<Box<dyn Browser>, BrowserError> {
        match self {
            BrowserBackend::Http(settings) => Ok(Box::new(HttpBrowser::new(settings.clone())?)),
            BrowserBackend::WebDriver(settings) => {
                Ok(Box::new(WebDriverBrowser::start(settings.clone())?))
            }
        }
    }
}
