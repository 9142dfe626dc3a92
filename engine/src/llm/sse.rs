//! Server-sent events decoding for streamed chat completions
//!
//! Chat-completions endpoints stream `data: {json}` events separated by blank
//! lines and finish with `data: [DONE]`. Network chunks do not respect line
//! or UTF-8 boundaries, so [`SseDecoder`] buffers raw bytes until a full line
//! is available.

use super::{LLMError, Result, TextStream};
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;

/// Incremental decoder turning byte chunks into event payloads
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the data of every event it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.handle_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush whatever is left once the byte stream has ended
    pub fn finish(&mut self) -> Option<String> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string();
            if let Some(event) = self.handle_line(&line) {
                return Some(event);
            }
        }
        self.take_event()
    }

    fn handle_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.take_event();
        }
        // Comment lines are keep-alives
        if line.starts_with(':') {
            return None;
        }
        if let Some(data) = line.strip_prefix("data:") {
            self.data.push(data.strip_prefix(' ').unwrap_or(data).to_string());
        }
        None
    }

    fn take_event(&mut self) -> Option<String> {
        if self.data.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.data).join("\n"))
        }
    }
}

/// A decoded chat-completion event
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkEvent {
    /// A piece of answer text (may be empty for role-only chunks)
    Delta(String),
    /// End of the answer
    Done,
}

/// Interpret one event payload from a chat-completions stream
pub fn parse_chunk(data: &str) -> Result<ChunkEvent> {
    if data.trim() == "[DONE]" {
        return Ok(ChunkEvent::Done);
    }

    let json: Value = serde_json::from_str(data)
        .map_err(|e| LLMError::ParseError(format!("Invalid stream chunk: {}", e)))?;

    if let Some(error) = json.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| error.to_string());
        return Err(LLMError::ProviderUnavailable(message));
    }

    let content = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    Ok(ChunkEvent::Delta(content.to_string()))
}

struct DeltaState {
    bytes: BoxStream<'static, Result<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String>>,
    done: bool,
}

impl DeltaState {
    /// Queue the deltas of decoded events; stops at `[DONE]` or an error
    fn enqueue(&mut self, events: impl IntoIterator<Item = String>) {
        for event in events {
            match parse_chunk(&event) {
                Ok(ChunkEvent::Delta(text)) if text.is_empty() => {}
                Ok(ChunkEvent::Delta(text)) => self.pending.push_back(Ok(text)),
                Ok(ChunkEvent::Done) => {
                    self.done = true;
                    return;
                }
                Err(e) => {
                    self.pending.push_back(Err(e));
                    self.done = true;
                    return;
                }
            }
        }
    }
}

/// Turn a raw SSE byte stream into a stream of text deltas.
///
/// The stream ends at `[DONE]`, at the end of the body, or right after
/// the first error.
pub fn text_deltas(bytes: BoxStream<'static, Result<Vec<u8>>>) -> TextStream {
    let state = DeltaState {
        bytes,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.push(&chunk);
                    state.enqueue(events);
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
                None => {
                    let tail = state.decoder.finish();
                    state.enqueue(tail);
                    state.done = true;
                }
            }
        }
    })
    .boxed()
}
