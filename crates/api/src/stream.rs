//! Streaming send/regenerate: request construction and wire-event decoding.
//!
//! One POST opens an SSE response; each `data:` payload is a JSON object
//! tagged by `type`.  [`decode_chat_event`] maps payloads to
//! [`StreamEvent`]s, tolerating unknown tags (the backend may add event
//! types; old clients must keep working).

use serde_json::Value;

use pl_domain::error::{Error, Result};
use pl_domain::stream::{BoxStream, StoredIds, StreamEvent, Usage};

use crate::rest::{from_reqwest, BackendClient};
use crate::sse::event_stream;
use crate::types::{ContinueRequest, MemoryDto, RegenerateRequest, SendRequest};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stream openers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl BackendClient {
    /// Open the streaming send endpoint for one user message.
    ///
    /// A non-2xx status is reported as an error before any stream exists;
    /// streaming requests are never retried.
    pub async fn open_send_stream(
        &self,
        req: &SendRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        self.open_chat_stream("/api/chat/send", serde_json::to_value(req)?)
            .await
    }

    /// Open the streaming regenerate endpoint for a past user message.
    pub async fn open_regenerate_stream(
        &self,
        req: &RegenerateRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        self.open_chat_stream("/api/chat/regenerate", serde_json::to_value(req)?)
            .await
    }

    /// Open a continuation stream: another responder replies to the same
    /// user message (multi-entity conversations).
    pub async fn open_continue_stream(
        &self,
        req: &ContinueRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        self.open_chat_stream("/api/chat/continue", serde_json::to_value(req)?)
            .await
    }

    async fn open_chat_stream(
        &self,
        path: &str,
        body: Value,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = self.endpoint_url(path);

        tracing::debug!(url = %url, "opening chat stream");

        let resp = self
            .decorate(self.streaming_http().post(&url))
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(event_stream(resp, |payload| {
            match decode_chat_event(payload) {
                Ok(Some(event)) => vec![Ok(event)],
                Ok(None) => Vec::new(),
                Err(e) => vec![Err(e)],
            }
        }))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire-event decoding
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Decode one SSE `data:` payload into a [`StreamEvent`].
///
/// Unknown `type` tags decode to `None`; only malformed JSON is an error.
fn decode_chat_event(payload: &str) -> Result<Option<StreamEvent>> {
    let v: Value = serde_json::from_str(payload)?;
    let tag = v.get("type").and_then(|t| t.as_str()).unwrap_or("");

    let event = match tag {
        "memories" => {
            let trimmed = v
                .get("trimmed")
                .and_then(|t| t.as_array())
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| id.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();

            let added = match v.get("added") {
                Some(items) => serde_json::from_value::<Vec<MemoryDto>>(items.clone())?
                    .into_iter()
                    .map(Into::into)
                    .collect(),
                None => Vec::new(),
            };

            StreamEvent::Memories {
                entity_id: str_field(&v, "entityId"),
                entity_label: str_field(&v, "entityLabel"),
                trimmed,
                added,
            }
        }

        "start" => StreamEvent::Start,

        "token" => StreamEvent::Token {
            text: str_field(&v, "text").unwrap_or_default(),
        },

        "tool_start" => StreamEvent::ToolStart {
            call_id: str_field(&v, "callId").unwrap_or_default(),
            tool_name: str_field(&v, "toolName").unwrap_or_default(),
        },

        "tool_result" => StreamEvent::ToolResult {
            call_id: str_field(&v, "callId").unwrap_or_default(),
            content: str_field(&v, "content").unwrap_or_default(),
        },

        "done" => {
            let usage = v.get("usage").and_then(|u| {
                Some(Usage {
                    input_tokens: u.get("inputTokens")?.as_u64()? as u32,
                    output_tokens: u.get("outputTokens")?.as_u64()? as u32,
                })
            });
            StreamEvent::Done { usage }
        }

        "stored" => StreamEvent::Stored(StoredIds {
            human_id: str_field(&v, "humanId"),
            assistant_id: str_field(&v, "assistantId"),
        }),

        "error" => StreamEvent::Error {
            message: str_field(&v, "message").unwrap_or_else(|| "unknown error".into()),
        },

        other => {
            tracing::debug!(tag = other, "ignoring unknown stream event type");
            return Ok(None);
        }
    };

    Ok(Some(event))
}

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(|f| f.as_str()).map(str::to_string)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(payload: &str) -> StreamEvent {
        decode_chat_event(payload)
            .unwrap()
            .expect("payload should decode to an event")
    }

    #[test]
    fn token_payload_decodes() {
        let ev = decode(r#"{"type":"token","text":"Hel"}"#);
        assert!(matches!(ev, StreamEvent::Token { text } if text == "Hel"));
    }

    #[test]
    fn memories_payload_decodes_trim_and_add() {
        let payload = r#"{
            "type": "memories",
            "entityId": "ent-a",
            "entityLabel": "Archivist",
            "trimmed": ["m1", "m2"],
            "added": [{"id": "m3", "role": "human", "content": "likes tea"}]
        }"#;
        match decode(payload) {
            StreamEvent::Memories {
                entity_id,
                trimmed,
                added,
                ..
            } => {
                assert_eq!(entity_id.as_deref(), Some("ent-a"));
                assert_eq!(trimmed, vec!["m1", "m2"]);
                assert_eq!(added.len(), 1);
                assert_eq!(added[0].id, "m3");
            }
            other => panic!("wrong event: {other:?}"),
        }
    }

    #[test]
    fn memories_without_entity_is_flat() {
        let payload = r#"{"type":"memories","trimmed":[],"added":[]}"#;
        match decode(payload) {
            StreamEvent::Memories { entity_id, .. } => assert!(entity_id.is_none()),
            other => panic!("wrong event: {other:?}"),
        }
    }

    #[test]
    fn done_carries_usage() {
        let payload = r#"{"type":"done","usage":{"inputTokens":120,"outputTokens":48}}"#;
        match decode(payload) {
            StreamEvent::Done { usage: Some(u) } => {
                assert_eq!(u.input_tokens, 120);
                assert_eq!(u.output_tokens, 48);
                assert_eq!(u.total(), 168);
            }
            other => panic!("wrong event: {other:?}"),
        }
    }

    #[test]
    fn done_without_usage_decodes() {
        let ev = decode(r#"{"type":"done"}"#);
        assert!(matches!(ev, StreamEvent::Done { usage: None }));
    }

    #[test]
    fn stored_decodes_partial_ids() {
        let payload = r#"{"type":"stored","assistantId":"msg-9"}"#;
        match decode(payload) {
            StreamEvent::Stored(ids) => {
                assert!(ids.human_id.is_none());
                assert_eq!(ids.assistant_id.as_deref(), Some("msg-9"));
            }
            other => panic!("wrong event: {other:?}"),
        }
    }

    #[test]
    fn unknown_tag_is_skipped_not_errored() {
        let decoded = decode_chat_event(r#"{"type":"typing_indicator"}"#).unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(decode_chat_event("{not json").is_err());
    }
}
