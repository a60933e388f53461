//! SSE plumbing shared by the send and regenerate streams.
//!
//! The backend delimits events with `\n\n` and carries one JSON payload per
//! `data:` line.  [`drain_events`] pulls complete payloads out of a grow
//! buffer (leaving any trailing partial event in place) and
//! [`event_stream`] turns a live `reqwest::Response` into a
//! [`BoxStream`] of decoded [`StreamEvent`]s.
//!
//! Terminal-resolution policy does NOT live here: the stream ends when the
//! body ends, and deciding whether that end was legitimate (a `done` +
//! `stored` pair was seen) belongs to the turn reducer downstream.

use pl_domain::error::Result;
use pl_domain::stream::{BoxStream, StreamEvent};

use crate::rest::from_reqwest;

/// Extract complete `data:` payloads from an SSE buffer.
///
/// Consumed bytes are drained in place; a trailing partial event stays in
/// the buffer for the next call.  Non-`data:` lines (`event:`, `id:`,
/// `retry:`, comments) are dropped.
pub(crate) fn drain_events(buffer: &mut String) -> Vec<String> {
    let mut payloads = Vec::new();

    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos + 2).collect();

        payloads.extend(block.lines().filter_map(|line| {
            let data = line.trim().strip_prefix("data:")?.trim();
            (!data.is_empty()).then(|| data.to_string())
        }));
    }

    payloads
}

/// Build a [`BoxStream`] of [`StreamEvent`]s from a streaming response.
///
/// `decode` maps one `data:` payload to zero or more events; it is `FnMut`
/// so decoders may keep state across payloads.  When the body closes, any
/// buffered partial event is flushed through the decoder.
pub(crate) fn event_stream<F>(
    response: reqwest::Response,
    mut decode: F,
) -> BoxStream<'static, Result<StreamEvent>>
where
    F: FnMut(&str) -> Vec<Result<StreamEvent>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer = String::new();

        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));
                    for payload in drain_events(&mut buffer) {
                        for event in decode(&payload) {
                            yield event;
                        }
                    }
                }
                Ok(None) => {
                    // Body closed -- flush a trailing partial event, if any.
                    if !buffer.trim().is_empty() {
                        buffer.push_str("\n\n");
                        for payload in drain_events(&mut buffer) {
                            for event in decode(&payload) {
                                yield event;
                            }
                        }
                    }
                    break;
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    break;
                }
            }
        }
    };

    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
