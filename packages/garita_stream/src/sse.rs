//! Incremental decoder for the server's SSE wire format.
//!
//! Chunks arrive from the HTTP body with no alignment to message boundaries,
//! so the decoder buffers bytes and emits complete envelopes as blank lines
//! come in. Field handling follows the EventSource framing rules: `event:`
//! names the envelope, `data:` lines accumulate (joined with newlines),
//! comment lines (leading `:`) and unknown fields are ignored.

/// One decoded (event-name, raw payload) unit. Transient: handed to the
/// multiplexer and dropped after dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEnvelope {
    pub event: String,
    pub data: String,
}

/// Default event name when a message carries no `event:` field.
const DEFAULT_EVENT: &str = "message";

#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every envelope completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<RawEnvelope> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let mut line = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            if line.ends_with('\r') {
                line.pop();
            }
            if let Some(envelope) = self.take_line(&line) {
                out.push(envelope);
            }
        }
        out
    }

    /// Reset parse state, dropping any half-accumulated message. Called by
    /// the channel task on reconnect so stale fragments never leak across
    /// connections.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.event = None;
        self.data.clear();
    }

    fn take_line(&mut self, line: &str) -> Option<RawEnvelope> {
        if line.is_empty() {
            return self.flush();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            // `id` and `retry` are accepted but unused: ordering comes from
            // the single connection and retry pacing is owned by Backoff.
            "id" | "retry" => {}
            other => tracing::trace!(field = other, "ignoring unknown sse field"),
        }
        None
    }

    fn flush(&mut self) -> Option<RawEnvelope> {
        if self.data.is_empty() {
            // Blank line with no data resets the event name per the framing
            // rules; nothing to dispatch.
            self.event = None;
            return None;
        }
        let mut data = std::mem::take(&mut self.data);
        data.pop(); // trailing newline from the last data line
        let event = self
            .event
            .take()
            .unwrap_or_else(|| DEFAULT_EVENT.to_string());
        Some(RawEnvelope { event, data })
    }
}
