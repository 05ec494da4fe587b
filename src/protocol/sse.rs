// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Server-sent events decoding.
//!
//! The live event stream is a `text/event-stream` body:
//!
//! ```text
//! event: 3            ← event id assigned at registration
//! id: 1553697634000   ← sequence token
//! data: {"value":42}
//!                     ← blank line dispatches the frame
//! ```

use std::collections::VecDeque;

use futures::{Stream, StreamExt, stream};

use crate::error::ProtocolError;
use crate::protocol::FrameStream;
use crate::types::Frame;

/// Event type used when a frame carries no `event:` field.
const DEFAULT_EVENT_TYPE: &str = "message";

/// UTF-8 byte order mark, ignored at the start of the stream.
const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Incremental decoder for `text/event-stream` bodies.
///
/// Bytes may be pushed in arbitrary chunks; complete frames are returned
/// as soon as their terminating blank line has been seen. The sequence
/// token is sticky: a frame without an `id:` field reuses the previous one.
///
/// # Examples
///
/// ```
/// use tango_rest_client::protocol::SseDecoder;
///
/// let mut decoder = SseDecoder::new();
/// assert!(decoder.push(b"event: 1\nid: 42\nda").is_empty());
///
/// let frames = decoder.push(b"ta: {\"value\":1}\n\n");
/// assert_eq!(frames.len(), 1);
/// assert_eq!(frames[0].id, "1");
/// assert_eq!(frames[0].last_event_id, "42");
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    // bytes of `buffer` already known to hold no line break
    scanned: usize,
    bom_checked: bool,
    event_type: String,
    data: String,
    has_data: bool,
    last_event_id: String,
}

impl SseDecoder {
    /// Creates a new decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of bytes and returns every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        let mut search = self.scanned;
        while let Some(offset) = buffer[search..].iter().position(|&b| b == b'\n') {
            let end = search + offset;
            let mut raw = &buffer[start..end];
            if !self.bom_checked {
                self.bom_checked = true;
                raw = raw.strip_prefix(BOM).unwrap_or(raw);
            }
            let line = String::from_utf8_lossy(raw);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if let Some(frame) = self.process_line(line) {
                frames.push(frame);
            }
            start = end + 1;
            search = start;
        }

        buffer.drain(..start);
        self.scanned = buffer.len();
        self.buffer = buffer;
        frames
    }

    fn process_line(&mut self, line: &str) -> Option<Frame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => value.clone_into(&mut self.event_type),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" if !value.contains('\0') => value.clone_into(&mut self.last_event_id),
            // retry and unknown fields
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<Frame> {
        let event_type = std::mem::take(&mut self.event_type);
        if !self.has_data {
            return None;
        }
        self.has_data = false;

        let id = if event_type.is_empty() {
            DEFAULT_EVENT_TYPE.to_string()
        } else {
            event_type
        };
        Some(Frame {
            id,
            last_event_id: self.last_event_id.clone(),
            data: std::mem::take(&mut self.data),
        })
    }
}

/// Decodes a stream of body chunks into a [`FrameStream`].
///
/// The first chunk error is yielded as-is and ends the stream.
pub fn decode_frames<S, B, E>(chunks: S) -> FrameStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ProtocolError> + Send + 'static,
{
    let state = (Some(chunks.boxed()), SseDecoder::new(), VecDeque::new());

    stream::unfold(state, |(mut chunks, mut decoder, mut pending)| async move {
        loop {
            if let Some(frame) = pending.pop_front() {
                return Some((Ok(frame), (chunks, decoder, pending)));
            }
            let source = chunks.as_mut()?;
            match source.next().await {
                Some(Ok(chunk)) => pending.extend(decoder.push(chunk.as_ref())),
                Some(Err(e)) => return Some((Err(e.into()), (None, decoder, pending))),
                None => return None,
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_frame() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"event: 7\nid: 100\ndata: {\"value\":42}\n\n");

        assert_eq!(frames, vec![Frame::new("7", "100", r#"{"value":42}"#)]);
    }

    #[test]
    fn handles_crlf_line_endings() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"event: 7\r\nid: 100\r\ndata: 1\r\n\r\n");

        assert_eq!(frames, vec![Frame::new("7", "100", "1")]);
    }

    #[test]
    fn joins_multiline_data() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"event: 1\ndata: line one\ndata: line two\n\n");

        assert_eq!(frames[0].data, "line one\nline two");
    }

    #[test]
    fn sequence_token_is_sticky() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"event: 1\nid: 5\ndata: a\n\nevent: 1\ndata: b\n\n");

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].last_event_id, "5");
    }

    #[test]
    fn event_type_resets_between_frames() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"event: 1\ndata: a\n\ndata: b\n\n");

        assert_eq!(frames[0].id, "1");
        assert_eq!(frames[1].id, "message");
    }

    #[test]
    fn ignores_comments_and_empty_frames() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b": keep-alive\n\nevent: 1\n\nretry: 3000\n\n");

        assert!(frames.is_empty());
    }

    #[test]
    fn field_without_colon_has_empty_value() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"event: 2\ndata\n\n");

        assert_eq!(frames, vec![Frame::new("2", "", "")]);
    }

    #[test]
    fn strips_leading_byte_order_mark() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"\xEF\xBB").is_empty());

        let frames = decoder.push(b"\xBFevent: 4\ndata: a\n\n\xEF\xBB\xBFevent: 5\ndata: b\n\n");

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], Frame::new("4", "", "a"));
        // only the first line of the stream may carry it
        assert_eq!(frames[1].id, "message");
    }

    #[test]
    fn decodes_large_chunk_and_partial_tail() {
        let mut body = String::new();
        for i in 0..2000 {
            body.push_str(&format!("event: 1\nid: {i}\ndata: {{\"value\":{i}}}\n\n"));
        }
        body.push_str("event: 1\nid: 2000\ndata: {\"val");

        let mut decoder = SseDecoder::new();
        let frames = decoder.push(body.as_bytes());
        assert_eq!(frames.len(), 2000);
        assert_eq!(frames[1999].last_event_id, "1999");

        for byte in b"ue\":2000}\n" {
            assert!(decoder.push(&[*byte]).is_empty());
        }
        let frames = decoder.push(b"\n");
        assert_eq!(frames, vec![Frame::new("1", "2000", r#"{"value":2000}"#)]);
    }

    #[tokio::test]
    async fn decode_frames_spans_chunks() {
        let chunks: Vec<Result<&'static [u8], ProtocolError>> = vec![
            Ok(&b"event: 1\nid: 1\nda"[..]),
            Ok(&b"ta: {}\n\nevent: 1\nid: 2\ndata: {}\n\n"[..]),
        ];
        let frames: Vec<_> = decode_frames(stream::iter(chunks)).collect().await;

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].as_ref().unwrap().last_event_id, "2");
    }

    #[tokio::test]
    async fn decode_frames_stops_after_error() {
        let chunks: Vec<Result<&'static [u8], ProtocolError>> = vec![
            Ok(&b"event: 1\nid: 1\ndata: {}\n\n"[..]),
            Err(ProtocolError::ConnectionFailed("reset".to_string())),
            Ok(&b"event: 1\nid: 2\ndata: {}\n\n"[..]),
        ];
        let frames: Vec<_> = decode_frames(stream::iter(chunks)).collect().await;

        assert_eq!(frames.len(), 2);
        assert!(frames[0].is_ok());
        assert!(frames[1].is_err());
    }
}
