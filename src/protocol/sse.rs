//! Buffered Server-Sent Events decoder
//!
//! Turns raw response chunks into [`TaggedEvent`]s. Network chunk boundaries
//! may split an event, a line, or a multi-byte UTF-8 character; all three are
//! buffered until complete.

use super::event::TaggedEvent;

/// Tag used when an event carries no `event:` field
const DEFAULT_TAG: &str = "message";

#[allow(clippy::module_name_repetitions)] // SSE is the format it decodes
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Decoded text not yet terminated by a blank line
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence
    incomplete_utf8: Vec<u8>,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and drain every event completed by them
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<TaggedEvent> {
        let mut bytes = std::mem::take(&mut self.incomplete_utf8);
        bytes.extend_from_slice(chunk);

        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    self.buffer
                        .push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        // Truncated sequence: wait for the next chunk
                        None => {
                            self.incomplete_utf8 = after.to_vec();
                            break;
                        }
                        Some(len) => {
                            tracing::warn!(
                                position = e.valid_up_to(),
                                "Invalid UTF-8 in event stream, dropping bytes"
                            );
                            rest = &after[len..];
                        }
                    }
                }
            }
        }

        self.drain_events()
    }

    /// Flush a final event the server did not terminate with a blank line
    pub fn finish(&mut self) -> Option<TaggedEvent> {
        self.incomplete_utf8.clear();
        let rest = std::mem::take(&mut self.buffer);
        parse_event(&rest)
    }

    #[must_use]
    pub fn has_remaining(&self) -> bool {
        !self.buffer.trim().is_empty() || !self.incomplete_utf8.is_empty()
    }

    fn drain_events(&mut self) -> Vec<TaggedEvent> {
        let mut events = Vec::new();
        while let Some((end, delimiter_len)) = find_event_boundary(&self.buffer) {
            let block: String = self.buffer.drain(..end + delimiter_len).collect();
            if let Some(event) = parse_event(&block) {
                events.push(event);
            }
        }
        events
    }
}

/// Position and length of the first blank-line delimiter
fn find_event_boundary(buffer: &str) -> Option<(usize, usize)> {
    ["\r\n\r\n", "\n\n"]
        .iter()
        .filter_map(|delimiter| buffer.find(delimiter).map(|pos| (pos, delimiter.len())))
        .min_by_key(|(pos, _)| *pos)
}

/// Parse one event block. Blocks with no `data:` lines (comments,
/// keep-alives) produce nothing.
fn parse_event(block: &str) -> Option<TaggedEvent> {
    let mut tag: Option<&str> = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in block.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }

        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => tag = Some(value.trim()),
            "data" => data_lines.push(value),
            // `id` and `retry` carry nothing the widget uses
            _ => {}
        }
    }

    if data_lines.is_empty() {
        return None;
    }

    Some(TaggedEvent::new(
        tag.filter(|t| !t.is_empty()).unwrap_or(DEFAULT_TAG),
        data_lines.join("\n"),
    ))
}
