use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;

/// Regroups arbitrarily split text fragments into whole lines.
///
/// Every emitted line keeps its trailing `\n`. Concatenating all emitted lines
/// plus [`finish`](Self::finish) yields the input unchanged.
#[derive(Debug, Default, Clone)]
pub struct LineReassembler {
    partial: String,
}

impl LineReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: &str) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = fragment;
        while let Some(pos) = rest.find('\n') {
            let (head, tail) = rest.split_at(pos + 1);
            if self.partial.is_empty() {
                lines.push(head.to_string());
            } else {
                self.partial.push_str(head);
                lines.push(std::mem::take(&mut self.partial));
            }
            rest = tail;
        }
        self.partial.push_str(rest);
        lines
    }

    /// Text received after the last newline.
    pub fn pending(&self) -> &str {
        &self.partial
    }

    /// Flushes the unterminated remainder, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.partial))
        }
    }
}

/// Stream adapter produced by [`reassemble_lines`].
pub struct ReassembledLines<S> {
    source: S,
    reassembler: LineReassembler,
    ready: VecDeque<String>,
    done: bool,
}

/// Lazily turns a fragment stream into a line stream.
///
/// A source error is yielded once and ends the stream; text already buffered
/// for an unfinished line is discarded in that case.
pub fn reassemble_lines<S, E>(source: S) -> ReassembledLines<S>
where
    S: Stream<Item = Result<String, E>> + Unpin,
{
    ReassembledLines {
        source,
        reassembler: LineReassembler::new(),
        ready: VecDeque::new(),
        done: false,
    }
}

impl<S, E> Stream for ReassembledLines<S>
where
    S: Stream<Item = Result<String, E>> + Unpin,
{
    type Item = Result<String, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if let Some(line) = this.ready.pop_front() {
                return Poll::Ready(Some(Ok(line)));
            }
            if this.done {
                return Poll::Ready(None);
            }
            match Pin::new(&mut this.source).poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(fragment))) => {
                    this.ready.extend(this.reassembler.push(&fragment));
                }
                Poll::Ready(Some(Err(err))) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => {
                    this.done = true;
                    this.ready.extend(this.reassembler.finish());
                }
            }
        }
    }
}
