mod common;

use std::sync::Arc;
use std::time::Duration;

use dulai_core::{ApiKey, ErrorKind, ProgressMessage};
use dulai_engine::{
    BlockingOffloader, EngineConfig, Hyperlink, PageHeader, ProgressChannel, RetryPolicy,
    RetryingCompletionClient, ScrapeSettings, ScrapeSummarizer, NO_TEXT_SUMMARY,
};
use pretty_assertions::assert_eq;

use common::{drain, init_logging, FakeWeb, ScriptedTransport};

const PAGE: &str = r#"<html><head><style>body { margin: 0 }</style></head><body>Hello <script>x</script> World
<a href="/about">About us</a> <a href="https://elsewhere.example/">Elsewhere</a></body></html>"#;

fn settings() -> ScrapeSettings {
    ScrapeSettings::from(&EngineConfig {
        fast_llm_model: "fast-model".into(),
        fast_token_limit: 2000,
        ..EngineConfig::default()
    })
}

fn summarizer(
    web: Arc<FakeWeb>,
    transport: Arc<ScriptedTransport>,
    settings: ScrapeSettings,
) -> ScrapeSummarizer {
    let client = RetryingCompletionClient::new(
        transport,
        ApiKey::new("sk-test"),
        RetryPolicy::new(10, Duration::ZERO),
    );
    ScrapeSummarizer::new(web, Arc::new(BlockingOffloader::new(2)), client, settings)
}

#[tokio::test]
async fn script_text_is_gone_before_the_summary_request() {
    init_logging();
    let web = Arc::new(FakeWeb::new().page("https://site.example/", PAGE));
    let transport = Arc::new(ScriptedTransport::new().reply(Ok("A greeting page.".into())));

    let page = summarizer(web.clone(), transport.clone(), settings())
        .summarize("https://site.example/", "What does it say?")
        .await
        .unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    let (model, request) = &requests[0];
    assert_eq!(model, "fast-model");
    assert_eq!(request.max_tokens, Some(2000));
    let prompt = &request.messages[0].content;
    assert!(
        prompt.starts_with("\"\"\"Hello  World\nAbout us Elsewhere\"\"\""),
        "prompt: {prompt}"
    );
    assert!(!prompt.contains("margin"));
    assert!(prompt.contains("\"What does it say?\""));

    assert_eq!(page.summary, "A greeting page.");
    assert_eq!(
        page.links,
        vec![
            Hyperlink::new("About us", "https://site.example/about"),
            Hyperlink::new("Elsewhere", "https://elsewhere.example/"),
        ]
    );
    assert_eq!(web.launched(), 1);
    assert_eq!(web.closed(), 1);
}

#[tokio::test]
async fn failed_navigation_still_closes_the_browser() {
    init_logging();
    let web = Arc::new(FakeWeb::new());
    let transport = Arc::new(ScriptedTransport::new());

    let err = summarizer(web.clone(), transport.clone(), settings())
        .summarize("https://missing.example/", "q")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Scrape);
    assert_eq!(web.closed(), 1);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn page_without_wait_element_times_out() {
    init_logging();
    let web = Arc::new(FakeWeb::new().page("https://frame.example/", "<frameset></frameset>"));
    let transport = Arc::new(ScriptedTransport::new());

    let err = summarizer(web.clone(), transport, settings())
        .scrape("https://frame.example/")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PageLoadTimeout);
    assert_eq!(web.closed(), 1);
}

#[tokio::test]
async fn empty_page_is_not_sent_to_the_model() {
    init_logging();
    let web = Arc::new(FakeWeb::new().page("https://blank.example/", "<body> \n </body>"));
    let transport = Arc::new(ScriptedTransport::new());

    let page = summarizer(web, transport.clone(), settings())
        .summarize("https://blank.example/", "q")
        .await
        .unwrap();

    assert_eq!(page.summary, NO_TEXT_SUMMARY);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn long_text_is_summarised_per_chunk_then_combined() {
    init_logging();
    let transport = Arc::new(
        ScriptedTransport::new()
            .reply(Ok("first part".into()))
            .reply(Ok("second part".into()))
            .reply(Ok("combined".into())),
    );
    let settings = ScrapeSettings {
        chunk_max_length: 12,
        ..settings()
    };
    let web = Arc::new(FakeWeb::new());

    let summary = summarizer(web, transport.clone(), settings)
        .summarize_text("https://x.example/", "alpha beta\ngamma delta\n", "q")
        .await
        .unwrap();

    assert_eq!(summary, "combined");
    let prompts: Vec<String> = transport
        .requests()
        .into_iter()
        .map(|(_, r)| r.messages[0].content.clone())
        .collect();
    assert_eq!(prompts.len(), 3);
    assert!(prompts[0].starts_with("\"\"\"alpha beta\"\"\""));
    assert!(prompts[1].starts_with("\"\"\"gamma delta\"\"\""));
    assert!(prompts[2].starts_with("\"\"\"first part\nsecond part\"\"\""));
}

#[tokio::test]
async fn browse_with_progress_logs_around_the_scrape() {
    init_logging();
    let web = Arc::new(FakeWeb::new().page("https://site.example/", PAGE));
    let transport = Arc::new(ScriptedTransport::new().reply(Ok("Short summary".into())));
    let (channel, mut rx) = ProgressChannel::new(2, 8);

    let info = summarizer(web, transport, settings())
        .browse_with_progress("https://site.example/", "What?", &channel)
        .await
        .unwrap();

    assert_eq!(
        info,
        "Information gathered from url https://site.example/: Short summary"
    );
    assert_eq!(
        drain(&mut rx),
        vec![
            ProgressMessage::Log(
                "🔎 Researching https://site.example/ for relevant information on: What?...".into()
            ),
            ProgressMessage::Log("📝 Information gathered from https://site.example/: Short summary".into()),
        ]
    );
}

#[tokio::test]
async fn header_is_injected_after_extraction() {
    init_logging();
    let web = Arc::new(FakeWeb::new().page("https://site.example/", PAGE));
    let transport = Arc::new(ScriptedTransport::new());
    let settings = ScrapeSettings {
        page_header: Some(PageHeader {
            title: "Dulai".into(),
            subtitle: "Research".into(),
        }),
        ..settings()
    };

    let page = summarizer(web.clone(), transport, settings)
        .scrape("https://site.example/")
        .await
        .unwrap();

    assert!(!page.text.contains("Dulai"));
    let scripts = web.scripts.lock().unwrap().clone();
    assert_eq!(scripts.len(), 1);
    assert!(scripts[0].contains("<h1>Dulai</h1><h2>Research</h2>"));
}
