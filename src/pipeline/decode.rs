//! Line-oriented SSE framing (bytes -> data lines)
//!
//! Only `data:` lines matter to the chat pipeline. `event:`, `id:`, `retry:` and
//! comment lines are dropped, as are blank lines.

use crate::transport::TransportError;
use crate::ByteStream;
use futures::{stream, Stream, StreamExt};

const DONE_SIGNAL: &str = "[DONE]";

/// One meaningful upstream SSE line.
#[derive(Debug, Clone, PartialEq)]
pub enum SseLine {
    /// Payload of a `data:` line, prefix stripped
    Data(String),
    /// The literal `data: [DONE]` sentinel
    Done,
}

/// Classify a single line (without its trailing newline).
pub fn parse_line(raw: &str) -> Option<SseLine> {
    let line = raw.trim_end_matches('\r');
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }
    if trimmed == DONE_SIGNAL {
        return Some(SseLine::Done);
    }

    let payload = trimmed.strip_prefix("data:")?.trim_start();
    if payload == DONE_SIGNAL {
        Some(SseLine::Done)
    } else if payload.is_empty() {
        None
    } else {
        Some(SseLine::Data(payload.to_string()))
    }
}

/// Incrementally split a byte stream on `\n` and yield classified lines.
///
/// Bytes are buffered until a full line is present, so a multi-byte character
/// split across network reads is decoded intact. A trailing line without a
/// newline is still parsed at EOF. A transport error is yielded once and ends
/// the stream.
pub fn decode_lines(input: ByteStream) -> impl Stream<Item = Result<SseLine, TransportError>> + Send {
    stream::unfold(
        (input, Vec::<u8>::new(), false),
        |(mut input, mut buf, mut finished)| async move {
            loop {
                if let Some(idx) = buf.iter().position(|b| *b == b'\n') {
                    let rest = buf.split_off(idx + 1);
                    let line = String::from_utf8_lossy(&buf[..idx]).into_owned();
                    buf = rest;
                    if let Some(parsed) = parse_line(&line) {
                        return Some((Ok(parsed), (input, buf, finished)));
                    }
                    continue;
                }

                if finished {
                    return None;
                }

                match input.next().await {
                    Some(Ok(bytes)) => buf.extend_from_slice(&bytes),
                    Some(Err(e)) => {
                        buf.clear();
                        finished = true;
                        return Some((Err(e), (input, buf, finished)));
                    }
                    None => {
                        finished = true;
                        let line = String::from_utf8_lossy(&buf).into_owned();
                        buf.clear();
                        if let Some(parsed) = parse_line(&line) {
                            return Some((Ok(parsed), (input, buf, finished)));
                        }
                        return None;
                    }
                }
            }
        },
    )
}
