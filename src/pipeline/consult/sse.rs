//! Incremental decoding of a `text/event-stream` body into completion frames.

use super::CompletionError;

/// One decoded event that carries data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    Data(String),
    /// The provider's `[DONE]` sentinel.
    Done,
}

/// Byte buffer fed with network chunks, yielding frames as events complete.
///
/// Only the undelimited tail counts against `limit`; complete events are
/// drained before the size is checked.
#[derive(Debug)]
pub struct SseBuffer {
    bytes: Vec<u8>,
    limit: usize,
}

impl SseBuffer {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Terminate a trailing event that arrived without a blank line.
    pub fn finish(&mut self) {
        if !self.bytes.is_empty() {
            self.bytes.extend_from_slice(b"\n\n");
        }
    }

    /// Fails when an incomplete event has grown past the limit.
    pub fn check_tail(&self) -> Result<(), CompletionError> {
        if self.bytes.len() > self.limit {
            return Err(CompletionError::Stream(format!(
                "SSE event exceeded {} bytes without a delimiter",
                self.limit
            )));
        }
        Ok(())
    }

    /// Next complete frame. Empty, comment-only and `event:`-only events are
    /// skipped.
    pub fn next_frame(&mut self) -> Option<Result<SseFrame, CompletionError>> {
        loop {
            let (end, delimiter) = blank_line(&self.bytes)?;
            let raw: Vec<u8> = self.bytes.drain(..end + delimiter).take(end).collect();

            let Ok(text) = std::str::from_utf8(&raw) else {
                return Some(Err(CompletionError::Stream(
                    "SSE event is not valid UTF-8".into(),
                )));
            };
            match data_of(text) {
                Some(data) if data.trim() == "[DONE]" => return Some(Ok(SseFrame::Done)),
                Some(data) => return Some(Ok(SseFrame::Data(data))),
                None => continue,
            }
        }
    }
}

/// Offset and length of the first `\n\n` or `\r\n\r\n` in one scan.
fn blank_line(bytes: &[u8]) -> Option<(usize, usize)> {
    (0..bytes.len()).find_map(|i| {
        let rest = &bytes[i..];
        if rest.starts_with(b"\n\n") {
            Some((i, 2))
        } else if rest.starts_with(b"\r\n\r\n") {
            Some((i, 4))
        } else {
            None
        }
    })
}

/// `data:` lines joined with `\n`; `None` when the event has none.
fn data_of(event: &str) -> Option<String> {
    let mut lines = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .peekable();
    lines.peek()?;
    Some(lines.collect::<Vec<_>>().join("\n"))
}
