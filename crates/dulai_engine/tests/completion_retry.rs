mod common;

use std::sync::Arc;
use std::time::Duration;

use dulai_core::{ApiKey, ErrorKind, ProgressMessage};
use dulai_engine::{
    ChatMessage, CompletionRequest, EngineError, ProgressChannel, RetryPolicy,
    RetryingCompletionClient, TransportError,
};
use pretty_assertions::assert_eq;

use common::{drain, init_logging, ScriptedTransport};

fn client(transport: Arc<ScriptedTransport>) -> RetryingCompletionClient {
    RetryingCompletionClient::new(
        transport,
        ApiKey::new("sk-test"),
        RetryPolicy::new(10, Duration::ZERO),
    )
}

fn request() -> CompletionRequest {
    CompletionRequest::new(vec![ChatMessage::user("hello")]).with_model("gpt-4")
}

#[tokio::test]
async fn nine_transient_failures_then_success() {
    init_logging();
    let transport = Arc::new(
        ScriptedTransport::new()
            .replies(Err(TransportError::RateLimited("slow down".into())), 9)
            .reply(Ok("finally".into())),
    );

    let text = client(transport.clone())
        .complete(&request(), None)
        .await
        .expect("tenth attempt succeeds");

    assert_eq!(text, "finally");
    assert_eq!(transport.calls(), 10);
}

#[tokio::test]
async fn ten_transient_failures_exhaust_the_budget() {
    init_logging();
    let transport = Arc::new(ScriptedTransport::new().replies(
        Err(TransportError::Server {
            status: 503,
            message: "busy".into(),
        }),
        11,
    ));

    let err = client(transport.clone())
        .complete(&request(), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UpstreamExhausted);
    assert!(matches!(err, EngineError::UpstreamExhausted { attempts: 10, .. }));
    assert_eq!(transport.calls(), 10);
}

#[tokio::test]
async fn non_transient_failure_is_not_retried() {
    init_logging();
    let transport = Arc::new(
        ScriptedTransport::new()
            .reply(Err(TransportError::Unauthorized("bad key".into())))
            .reply(Ok("unused".into())),
    );

    let err = client(transport.clone())
        .complete(&request(), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UpstreamRejected);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn max_tokens_above_ceiling_fails_without_io() {
    init_logging();
    let transport = Arc::new(ScriptedTransport::new().reply(Ok("unused".into())));

    let err = client(transport.clone())
        .complete(&request().with_max_tokens(9000), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn missing_model_is_a_configuration_error() {
    init_logging();
    let transport = Arc::new(ScriptedTransport::new());
    let req = CompletionRequest::new(vec![ChatMessage::user("hello")]);

    let err = client(transport.clone()).complete(&req, None).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn streaming_without_channel_is_rejected() {
    init_logging();
    let transport = Arc::new(ScriptedTransport::new().stream_of(&["unused\n"]));

    let err = client(transport.clone())
        .complete(&request().streaming(), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn streamed_output_arrives_as_whole_lines() {
    init_logging();
    let transport = Arc::new(
        ScriptedTransport::new()
            .stream_open_error(TransportError::Timeout)
            .stream_of(&["# Rep", "ort\nBody te", "xt\n", "tail"]),
    );
    let (channel, mut rx) = ProgressChannel::new(1, 16);

    let text = client(transport.clone())
        .complete(&request().streaming(), Some(&channel))
        .await
        .unwrap();

    assert_eq!(text, "# Report\nBody text\ntail");
    assert_eq!(transport.calls(), 2);
    assert_eq!(
        drain(&mut rx),
        vec![
            ProgressMessage::ReportChunk("# Report\n".into()),
            ProgressMessage::ReportChunk("Body text\n".into()),
            ProgressMessage::ReportChunk("tail".into()),
        ]
    );
}

#[tokio::test]
async fn failure_mid_stream_is_surfaced_not_retried() {
    init_logging();
    let transport = Arc::new(
        ScriptedTransport::new()
            .stream_items(vec![
                Ok("line one\n".into()),
                Err(TransportError::Connection("reset".into())),
            ])
            .stream_of(&["unused\n"]),
    );
    let (channel, mut rx) = ProgressChannel::new(1, 16);

    let err = client(transport.clone())
        .complete(&request().streaming(), Some(&channel))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransientUpstream);
    assert_eq!(transport.calls(), 1);
    assert_eq!(
        drain(&mut rx),
        vec![ProgressMessage::ReportChunk("line one\n".into())]
    );
}

#[tokio::test]
async fn agent_policy_gives_up_after_three_attempts() {
    init_logging();
    let transport = Arc::new(ScriptedTransport::new().replies(Err(TransportError::Timeout), 5));
    let agent_client = client(transport.clone()).with_policy(RetryPolicy::new(3, Duration::ZERO));

    let err = agent_client.complete(&request(), None).await.unwrap_err();

    assert!(matches!(err, EngineError::UpstreamExhausted { attempts: 3, .. }));
    assert_eq!(transport.calls(), 3);
}
