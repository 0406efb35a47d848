// Incremental decoder for `data:`-prefixed, newline-delimited stream frames

use serde_json::Value;
use std::collections::VecDeque;
use thiserror::Error;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// Longest unterminated line kept while waiting for its newline.
pub const MAX_PENDING_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed stream frame {line:?}: {source}")]
    Json {
        line: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("stream frame exceeds {limit} bytes without a line break")]
    FrameTooLarge { limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Content(String),
    Done,
}

/// Splits a chunked byte stream into frames.
///
/// Chunk boundaries need not line up with frame boundaries: the bytes after
/// the last newline are carried into the next call. This also keeps
/// multi-byte UTF-8 sequences intact across reads.
///
/// Lines are decoded one at a time by [`FrameDecoder::next_frame`], so a bad
/// line only fails after every frame before it has been handed out.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    partial: Vec<u8>,
    lines: VecDeque<String>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk. Its complete lines are queued for `next_frame`.
    pub fn push(&mut self, chunk: &[u8]) {
        self.partial.extend_from_slice(chunk);

        let Some(last_newline) = self.partial.iter().rposition(|&b| b == b'\n') else {
            return;
        };

        let rest = self.partial.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.partial, rest);
        self.lines.extend(
            String::from_utf8_lossy(&complete)
                .split('\n')
                .map(str::to_string),
        );
    }

    /// The stream has ended: queue whatever is left as a final line.
    pub fn finish(&mut self) {
        let rest = std::mem::take(&mut self.partial);
        if !rest.is_empty() {
            self.lines
                .push_back(String::from_utf8_lossy(&rest).into_owned());
        }
    }

    /// Next decoded frame, or `None` once the queued lines are used up.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, DecodeError> {
        while let Some(line) = self.lines.pop_front() {
            if let Some(frame) = decode_line(&line)? {
                return Ok(Some(frame));
            }
        }

        if self.partial.len() > MAX_PENDING_BYTES {
            self.partial.clear();
            return Err(DecodeError::FrameTooLarge {
                limit: MAX_PENDING_BYTES,
            });
        }
        Ok(None)
    }

    pub fn has_pending(&self) -> bool {
        !self.partial.is_empty()
    }
}

/// Decode one line. Blank lines and payloads without text yield `None`.
pub fn decode_line(line: &str) -> Result<Option<Frame>, DecodeError> {
    let line = line.strip_prefix(DATA_PREFIX).unwrap_or(line).trim();
    if line.is_empty() {
        return Ok(None);
    }
    if line == DONE_SENTINEL {
        return Ok(Some(Frame::Done));
    }

    let payload: Value = serde_json::from_str(line).map_err(|source| DecodeError::Json {
        line: line.to_string(),
        source,
    })?;

    Ok(payload_text(&payload).map(Frame::Content))
}

/// Text carried by a payload: the top-level `content`, else the upstream
/// chunk's `choices[0].delta.content`. Non-string values are rendered as JSON.
fn payload_text(payload: &Value) -> Option<String> {
    let content = payload
        .get("content")
        .filter(|content| !content.is_null())
        .or_else(|| payload.pointer("/choices/0/delta/content"))?;

    match content {
        Value::Null | Value::Bool(false) => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}
