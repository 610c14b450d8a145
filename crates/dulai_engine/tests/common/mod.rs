#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use dulai_core::{ApiKey, ProgressMessage};
use dulai_engine::{
    Browser, BrowserError, BrowserLauncher, CompletionRequest, CompletionTransport,
    CredentialError, CredentialVerifier, FragmentStream, TransportError,
};
use futures_util::StreamExt;
use tokio::sync::mpsc;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

/// Completion transport that replays scripted replies in call order.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<String, TransportError>>>,
    streams: Mutex<VecDeque<Result<Vec<Result<String, TransportError>>, TransportError>>>,
    requests: Mutex<Vec<(String, CompletionRequest)>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, reply: Result<String, TransportError>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn replies(self, reply: Result<String, TransportError>, times: usize) -> Self {
        for _ in 0..times {
            self.replies.lock().unwrap().push_back(reply.clone());
        }
        self
    }

    /// A stream that opens and yields `fragments`.
    pub fn stream_of(self, fragments: &[&str]) -> Self {
        let items = fragments.iter().map(|f| Ok(f.to_string())).collect();
        self.streams.lock().unwrap().push_back(Ok(items));
        self
    }

    pub fn stream_items(self, items: Vec<Result<String, TransportError>>) -> Self {
        self.streams.lock().unwrap().push_back(Ok(items));
        self
    }

    pub fn stream_open_error(self, err: TransportError) -> Self {
        self.streams.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(String, CompletionRequest)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CompletionTransport for ScriptedTransport {
    async fn complete(
        &self,
        model: &str,
        request: &CompletionRequest,
        _api_key: &ApiKey,
    ) -> Result<String, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((model.to_string(), request.clone()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::InvalidResponse("no scripted reply".into())))
    }

    async fn stream(
        &self,
        model: &str,
        request: &CompletionRequest,
        _api_key: &ApiKey,
    ) -> Result<FragmentStream, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((model.to_string(), request.clone()));
        let items = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::InvalidResponse("no scripted stream".into())))?;
        Ok(futures_util::stream::iter(items).boxed())
    }
}

/// Verifier with a fixed answer.
pub struct StaticVerifier(pub Result<(), CredentialError>);

#[async_trait::async_trait]
impl CredentialVerifier for StaticVerifier {
    async fn verify(&self, _api_key: &ApiKey) -> Result<(), CredentialError> {
        self.0.clone()
    }
}

/// Serves canned HTML per URL; unknown URLs fail navigation.
#[derive(Default)]
pub struct FakeWeb {
    pages: HashMap<String, String>,
    slow_pages: HashMap<String, Duration>,
    pub launched: AtomicUsize,
    pub closed: Arc<AtomicUsize>,
    pub scripts: Arc<Mutex<Vec<String>>>,
}

impl FakeWeb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    /// The page loads only after `delay` of blocking work.
    pub fn slow_page(mut self, url: &str, html: &str, delay: Duration) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self.slow_pages.insert(url.to_string(), delay);
        self
    }

    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl BrowserLauncher for FakeWeb {
    fn launch(&self) -> Result<Box<dyn Browser>, BrowserError> {
        self.launched.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeBrowser {
            pages: self.pages.clone(),
            slow_pages: self.slow_pages.clone(),
            current: None,
            closed: Arc::clone(&self.closed),
            scripts: Arc::clone(&self.scripts),
        }))
    }
}

struct FakeBrowser {
    pages: HashMap<String, String>,
    slow_pages: HashMap<String, Duration>,
    current: Option<String>,
    closed: Arc<AtomicUsize>,
    scripts: Arc<Mutex<Vec<String>>>,
}

impl Browser for FakeBrowser {
    fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        if let Some(delay) = self.slow_pages.get(url) {
            std::thread::sleep(*delay);
        }
        match self.pages.get(url) {
            Some(html) => {
                self.current = Some(html.clone());
                Ok(())
            }
            None => Err(BrowserError::Navigation {
                url: url.to_string(),
                message: "unreachable".into(),
            }),
        }
    }

    fn wait_for_element(&mut self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        match &self.current {
            Some(html) if html.contains(&format!("<{selector}")) => Ok(()),
            Some(_) => Err(BrowserError::Timeout {
                selector: selector.to_string(),
                timeout,
            }),
            None => Err(BrowserError::NoPage),
        }
    }

    fn rendered_html(&mut self) -> Result<String, BrowserError> {
        self.current.clone().ok_or(BrowserError::NoPage)
    }

    fn execute_script(&mut self, script: &str) -> Result<serde_json::Value, BrowserError> {
        self.scripts.lock().unwrap().push(script.to_string());
        Ok(serde_json::Value::Null)
    }

    fn close(&mut self) -> Result<(), BrowserError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Everything currently buffered on the receiver.
pub fn drain(rx: &mut mpsc::Receiver<ProgressMessage>) -> Vec<ProgressMessage> {
    let mut out = Vec::new();
    while let Ok(message) = rx.try_recv() {
        out.push(message);
    }
    out
}

pub fn texts(messages: &[ProgressMessage]) -> Vec<String> {
    messages
        .iter()
        .map(|m| m.to_frame().output)
        .collect()
}
