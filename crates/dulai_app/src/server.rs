//! Websocket front door: one connection, one inbound frame, one task.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dulai_core::{ProgressMessage, TaskId};
use dulai_engine::{ProgressChannel, RunOutcome, TaskOrchestrator};
use engine_logging::{engine_debug, engine_error, engine_info, engine_trace, engine_warn};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;

pub const WS_PATH: &str = "/ws";

/// Outbound messages buffered per connection before producers wait.
const CHANNEL_CAPACITY: usize = 64;

type Socket = WebSocketStream<TcpStream>;

/// Accepts connections until `shutdown` fires. Every connection runs on its
/// own task and shares the orchestrator (and with it the scrape worker pool).
pub async fn serve(
    listener: TcpListener,
    orchestrator: Arc<TaskOrchestrator>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let next_id = Arc::new(AtomicU64::new(1));
    engine_info!("server_listening addr={}", listener.local_addr()?);
    loop {
        let (stream, peer) = tokio::select! {
            _ = shutdown.cancelled() => {
                engine_info!("server_shutdown");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(err) => {
                    engine_warn!("accept_failed error=\"{}\"", err);
                    continue;
                }
            },
        };
        let task_id = next_id.fetch_add(1, Ordering::Relaxed);
        let orchestrator = orchestrator.clone();
        let shutdown = shutdown.child_token();
        tokio::spawn(async move {
            handle_connection(stream, peer, task_id, orchestrator, shutdown).await;
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    task_id: TaskId,
    orchestrator: Arc<TaskOrchestrator>,
    cancel: CancellationToken,
) {
    let socket = match tokio_tungstenite::accept_hdr_async(stream, route).await {
        Ok(socket) => socket,
        Err(err) => {
            engine_debug!("handshake_rejected peer={} error=\"{}\"", peer, err);
            return;
        }
    };
    engine_info!("connection_open task={} peer={}", task_id, peer);
    let (sink, mut source) = socket.split();

    let Some(frame) = first_text_frame(&mut source, task_id).await else {
        engine_info!("connection_closed_before_start task={}", task_id);
        return;
    };

    let (channel, rx) = ProgressChannel::new(task_id, CHANNEL_CAPACITY);
    let writer = tokio::spawn(write_messages(sink, rx, task_id));
    let reader = tokio::spawn(watch_close(source, cancel.clone(), task_id));

    let outcome = orchestrator.run(task_id, frame, &channel, cancel).await;
    // Dropping the channel ends the writer once the queue is flushed.
    drop(channel);
    reader.abort();
    if let Err(err) = writer.await {
        engine_error!("writer_task_failed task={} error=\"{}\"", task_id, err);
    }
    match outcome {
        RunOutcome::Succeeded | RunOutcome::Failed => {
            engine_info!("connection_done task={} outcome={}", task_id, outcome.as_str())
        }
        RunOutcome::Abandoned => {
            engine_warn!("connection_abandoned task={}", task_id)
        }
    }
}

/// Handshake callback: only `/ws` is upgraded.
fn route(request: &Request, response: Response) -> Result<Response, ErrorResponse> {
    if request.uri().path() == WS_PATH {
        return Ok(response);
    }
    engine_debug!("handshake_not_found path={}", request.uri().path());
    let mut not_found = ErrorResponse::new(Some("not found".to_string()));
    *not_found.status_mut() = StatusCode::NOT_FOUND;
    Err(not_found)
}

async fn first_text_frame(source: &mut SplitStream<Socket>, task_id: TaskId) -> Option<String> {
    while let Some(item) = source.next().await {
        match item {
            Ok(Message::Text(text)) => return Some(text),
            Ok(Message::Close(_)) => return None,
            Ok(other) => {
                engine_trace!("frame_ignored task={} kind={}", task_id, frame_kind(&other));
            }
            Err(err) => {
                engine_warn!("read_failed task={} error=\"{}\"", task_id, err);
                return None;
            }
        }
    }
    None
}

fn frame_kind(message: &Message) -> &'static str {
    match message {
        Message::Binary(_) => "binary",
        Message::Ping(_) => "ping",
        Message::Pong(_) => "pong",
        _ => "other",
    }
}

async fn write_messages(
    mut sink: SplitSink<Socket, Message>,
    mut rx: mpsc::Receiver<ProgressMessage>,
    task_id: TaskId,
) {
    while let Some(message) = rx.recv().await {
        let json = match message.to_frame().to_json() {
            Ok(json) => json,
            Err(err) => {
                engine_error!("frame_encode_failed task={} error=\"{}\"", task_id, err);
                continue;
            }
        };
        if let Err(err) = sink.send(Message::Text(json)).await {
            // Dropping `rx` here lets the orchestrator see the disconnect.
            engine_debug!("write_failed task={} error=\"{}\"", task_id, err);
            return;
        }
    }
    if let Err(err) = sink.close().await {
        engine_debug!("close_failed task={} error=\"{}\"", task_id, err);
    }
}

/// Cancels the task when the client closes its side or the socket breaks.
async fn watch_close(mut source: SplitStream<Socket>, cancel: CancellationToken, task_id: TaskId) {
    while let Some(item) = source.next().await {
        match item {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
    engine_info!("client_closed task={}", task_id);
    cancel.cancel();
}
