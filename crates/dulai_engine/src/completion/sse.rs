use std::collections::VecDeque;

use futures_util::{stream, Stream, StreamExt};
use serde::Deserialize;

use super::{FragmentStream, TransportError};

/// Splits a server-sent-event byte stream into `data:` payloads.
///
/// Bytes are buffered until a full line is present, so multi-byte characters
/// split across network chunks decode correctly.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.trim_start().to_string());
            }
        }
        payloads
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SseItem {
    Content(String),
    Done,
    Skip,
}

#[derive(Deserialize)]
struct ChunkBody {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    content: Option<String>,
}

pub(crate) fn parse_payload(data: &str) -> Result<SseItem, TransportError> {
    if data == "[DONE]" {
        return Ok(SseItem::Done);
    }
    let body: ChunkBody = serde_json::from_str(data)
        .map_err(|err| TransportError::InvalidResponse(format!("stream chunk: {err}")))?;
    match body.choices.into_iter().next().and_then(|c| c.delta.content) {
        Some(content) if !content.is_empty() => Ok(SseItem::Content(content)),
        _ => Ok(SseItem::Skip),
    }
}

struct SseState<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    done: bool,
}

/// Turns a chat-completions event stream into content fragments.
pub(crate) fn content_fragments<S, B>(bytes: S) -> FragmentStream
where
    S: Stream<Item = Result<B, reqwest::Error>> + Unpin + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = SseState {
        bytes,
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(fragment) = st.pending.pop_front() {
                return Some((Ok(fragment), st));
            }
            if st.done {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    for payload in st.decoder.push(chunk.as_ref()) {
                        match parse_payload(&payload) {
                            Ok(SseItem::Content(text)) => st.pending.push_back(text),
                            Ok(SseItem::Done) => st.done = true,
                            Ok(SseItem::Skip) => {}
                            Err(err) => {
                                st.done = true;
                                st.pending.clear();
                                return Some((Err(err), st));
                            }
                        }
                    }
                }
                Some(Err(err)) => {
                    st.done = true;
                    return Some((Err(super::openai::map_reqwest_error(err)), st));
                }
                None => st.done = true,
            }
        }
    })
    .boxed()
}
