//! Minimal server-sent-events framing.
//!
//! Both remote transports consume SSE bodies: the streamable transport for
//! single-shot response bodies, the fallback transport for its long-lived
//! response stream.

/// One parsed SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseEvent {
    /// `event:` field, when present.
    pub event: Option<String>,
    /// Concatenated `data:` payload.
    pub data: String,
}

/// Incremental SSE parser over a byte stream.
///
/// Feed chunks as they arrive; complete events (terminated by a blank
/// line) are returned in order.
#[derive(Debug, Default)]
pub(crate) struct SseParser {
    buffer: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain any events it completed.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();

        while let Some(boundary) = find_event_boundary(&self.buffer) {
            let block: String = self.buffer.drain(..boundary.end).collect();
            if let Some(event) = parse_event_block(&block[..boundary.start]) {
                events.push(event);
            }
        }

        events
    }
}

struct Boundary {
    start: usize,
    end: usize,
}

/// Locate the first blank-line event terminator, tolerating `\n\n` and
/// `\r\n\r\n`.
fn find_event_boundary(buffer: &str) -> Option<Boundary> {
    let lf = buffer.find("\n\n").map(|i| Boundary {
        start: i,
        end: i + 2,
    });
    let crlf = buffer.find("\r\n\r\n").map(|i| Boundary {
        start: i,
        end: i + 4,
    });

    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.start <= b.start { a } else { b }),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

/// Parse the lines of one event block.
fn parse_event_block(block: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data_lines = Vec::new();

    for line in block.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            event = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.trim_start());
        }
        // Comments (":") and other fields are ignored.
    }

    if event.is_none() && data_lines.is_empty() {
        return None;
    }

    Some(SseEvent {
        event,
        data: data_lines.join("\n"),
    })
}

/// Parse every event out of a complete SSE body.
pub(crate) fn parse_body(body: &str) -> Vec<SseEvent> {
    let mut parser = SseParser::new();
    let mut events = parser.feed(body);
    // A final event may lack the trailing blank line.
    if !parser.buffer.trim().is_empty() {
        if let Some(event) = parse_event_block(&parser.buffer) {
            events.push(event);
        }
    }
    events
}
