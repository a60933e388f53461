//! The stream consumer: a pure reducer from wire events to one finalized
//! reply.
//!
//! [`TurnReducer`] folds the event sequence of a single send/regenerate
//! into an append-only text buffer and enforces the protocol invariants:
//! tokens only before `done`, `stored` applied exactly once, and exactly
//! one terminal resolution (`done`+`stored`, `error`, or `aborted`).
//! It performs no I/O and mutates nothing outside itself; callers route
//! the returned [`TurnUpdate`]s to the transcript, the memory buffer, and
//! the renderer.

use std::collections::HashMap;

use pl_domain::chat::MemoryItem;
use pl_domain::error::{Error, Result};
use pl_domain::stream::{StoredIds, StreamEvent, Usage};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Updates & outcomes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// State changes a caller must project after applying one event.
#[derive(Debug, Clone)]
pub enum TurnUpdate {
    /// A memory delta to merge into the visible set.
    MemoryDelta {
        entity_id: Option<String>,
        entity_label: Option<String>,
        trimmed: Vec<String>,
        added: Vec<MemoryItem>,
    },

    /// Text appended to the in-progress reply.
    TextDelta { text: String },

    /// A tool invocation began.
    ToolStarted { call_id: String, tool_name: String },

    /// A tool invocation finished.
    ToolFinished {
        call_id: String,
        tool_name: String,
        content: String,
    },

    /// The stream reached its terminal resolution.
    Finalized(TurnOutcome),
}

/// The single terminal resolution of one stream.
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// `done` + `stored`: the reply is durable.
    Completed {
        text: String,
        usage: Option<Usage>,
        stored: StoredIds,
    },

    /// Terminal failure.  `server_reported` distinguishes an `error`
    /// event (shown inline in the transcript) from a transport failure.
    Failed {
        message: String,
        server_reported: bool,
    },

    /// User cancellation: the partial text is kept, tagged incomplete.
    Cancelled { partial_text: String },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reducer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Lifecycle phase of one streamed reply.
enum Phase {
    /// Accepting tokens.
    Streaming,
    /// `done` seen; the text buffer is frozen, awaiting `stored`.
    Frozen { usage: Option<Usage> },
    /// A terminal resolution has been applied.
    Resolved,
}

/// Folds one stream's events into one reply.
///
/// Create a fresh reducer per stream; a resolved reducer rejects every
/// further event.
pub struct TurnReducer {
    phase: Phase,
    text: String,
    /// Open tool invocations (call id → tool name).
    open_tools: HashMap<String, String>,
}

impl Default for TurnReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnReducer {
    pub fn new() -> Self {
        Self {
            phase: Phase::Streaming,
            text: String::new(),
            open_tools: HashMap::new(),
        }
    }

    /// The accumulated reply text so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.phase, Phase::Resolved)
    }

    /// Apply one event in arrival order.
    ///
    /// Returns the update to project, `None` for pure hook points, or a
    /// protocol error for sequences the backend must never produce.
    pub fn apply(&mut self, event: StreamEvent) -> Result<Option<TurnUpdate>> {
        if self.is_resolved() {
            return Err(Error::Protocol(
                "event received after terminal resolution".into(),
            ));
        }

        match event {
            StreamEvent::Memories {
                entity_id,
                entity_label,
                trimmed,
                added,
            } => Ok(Some(TurnUpdate::MemoryDelta {
                entity_id,
                entity_label,
                trimmed,
                added,
            })),

            StreamEvent::Start => Ok(None),

            StreamEvent::Token { text } => {
                if matches!(self.phase, Phase::Frozen { .. }) {
                    return Err(Error::Protocol("token after done".into()));
                }
                self.text.push_str(&text);
                Ok(Some(TurnUpdate::TextDelta { text }))
            }

            StreamEvent::ToolStart { call_id, tool_name } => {
                self.open_tools.insert(call_id.clone(), tool_name.clone());
                Ok(Some(TurnUpdate::ToolStarted { call_id, tool_name }))
            }

            StreamEvent::ToolResult { call_id, content } => {
                // A result with no matching start is a no-op, not an error.
                match self.open_tools.remove(&call_id) {
                    Some(tool_name) => Ok(Some(TurnUpdate::ToolFinished {
                        call_id,
                        tool_name,
                        content,
                    })),
                    None => Ok(None),
                }
            }

            StreamEvent::Done { usage } => match self.phase {
                Phase::Streaming => {
                    self.phase = Phase::Frozen { usage };
                    Ok(None)
                }
                _ => Err(Error::Protocol("second done event".into())),
            },

            StreamEvent::Stored(stored) => match self.phase {
                Phase::Frozen { usage } => {
                    self.phase = Phase::Resolved;
                    Ok(Some(TurnUpdate::Finalized(TurnOutcome::Completed {
                        text: std::mem::take(&mut self.text),
                        usage,
                        stored,
                    })))
                }
                Phase::Streaming => Err(Error::Protocol("stored before done".into())),
                Phase::Resolved => unreachable!("checked above"),
            },

            StreamEvent::Error { message } => {
                self.phase = Phase::Resolved;
                self.text.clear();
                Ok(Some(TurnUpdate::Finalized(TurnOutcome::Failed {
                    message,
                    server_reported: true,
                })))
            }

            StreamEvent::Aborted => {
                self.phase = Phase::Resolved;
                Ok(Some(TurnUpdate::Finalized(TurnOutcome::Cancelled {
                    partial_text: std::mem::take(&mut self.text),
                })))
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn token(text: &str) -> StreamEvent {
        StreamEvent::Token { text: text.into() }
    }

    fn stored() -> StreamEvent {
        StreamEvent::Stored(StoredIds {
            human_id: Some("h1".into()),
            assistant_id: Some("a1".into()),
        })
    }

    fn finalize(reducer: &mut TurnReducer, event: StreamEvent) -> TurnOutcome {
        match reducer.apply(event).unwrap() {
            Some(TurnUpdate::Finalized(outcome)) => outcome,
            other => panic!("expected finalization, got {other:?}"),
        }
    }

    #[test]
    fn text_is_token_concatenation_in_arrival_order() {
        let mut r = TurnReducer::new();
        r.apply(StreamEvent::Start).unwrap();
        for t in ["Hel", "lo", ", wor", "ld"] {
            r.apply(token(t)).unwrap();
        }
        r.apply(StreamEvent::Done { usage: None }).unwrap();

        match finalize(&mut r, stored()) {
            TurnOutcome::Completed { text, .. } => assert_eq!(text, "Hello, world"),
            other => panic!("wrong outcome: {other:?}"),
        }
    }

    #[test]
    fn empty_reply_completes() {
        let mut r = TurnReducer::new();
        r.apply(StreamEvent::Done { usage: None }).unwrap();
        match finalize(&mut r, stored()) {
            TurnOutcome::Completed { text, .. } => assert!(text.is_empty()),
            other => panic!("wrong outcome: {other:?}"),
        }
    }

    #[test]
    fn usage_from_done_reaches_the_outcome() {
        let mut r = TurnReducer::new();
        r.apply(StreamEvent::Done {
            usage: Some(Usage {
                input_tokens: 10,
                output_tokens: 5,
            }),
        })
        .unwrap();

        match finalize(&mut r, stored()) {
            TurnOutcome::Completed { usage: Some(u), .. } => {
                assert_eq!(u.input_tokens, 10);
                assert_eq!(u.output_tokens, 5);
            }
            other => panic!("wrong outcome: {other:?}"),
        }
    }

    #[test]
    fn token_after_done_is_a_protocol_error() {
        let mut r = TurnReducer::new();
        r.apply(token("hi")).unwrap();
        r.apply(StreamEvent::Done { usage: None }).unwrap();
        assert!(matches!(r.apply(token("more")), Err(Error::Protocol(_))));
    }

    #[test]
    fn second_done_is_a_protocol_error() {
        let mut r = TurnReducer::new();
        r.apply(StreamEvent::Done { usage: None }).unwrap();
        assert!(matches!(
            r.apply(StreamEvent::Done { usage: None }),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn stored_before_done_is_a_protocol_error() {
        let mut r = TurnReducer::new();
        assert!(matches!(r.apply(stored()), Err(Error::Protocol(_))));
    }

    #[test]
    fn events_after_terminal_resolution_are_rejected() {
        let mut r = TurnReducer::new();
        r.apply(StreamEvent::Done { usage: None }).unwrap();
        finalize(&mut r, stored());
        assert!(r.is_resolved());
        assert!(matches!(r.apply(token("late")), Err(Error::Protocol(_))));
        assert!(matches!(r.apply(stored()), Err(Error::Protocol(_))));
    }

    #[test]
    fn error_event_discards_accumulated_text() {
        let mut r = TurnReducer::new();
        r.apply(token("half a rep")).unwrap();
        match finalize(
            &mut r,
            StreamEvent::Error {
                message: "model overloaded".into(),
            },
        ) {
            TurnOutcome::Failed {
                message,
                server_reported,
            } => {
                assert_eq!(message, "model overloaded");
                assert!(server_reported);
            }
            other => panic!("wrong outcome: {other:?}"),
        }
        assert!(r.text().is_empty());
    }

    #[test]
    fn abort_keeps_partial_text() {
        let mut r = TurnReducer::new();
        r.apply(token("partial ans")).unwrap();
        match finalize(&mut r, StreamEvent::Aborted) {
            TurnOutcome::Cancelled { partial_text } => {
                assert_eq!(partial_text, "partial ans");
            }
            other => panic!("wrong outcome: {other:?}"),
        }
    }

    #[test]
    fn abort_before_any_token_yields_empty_partial() {
        let mut r = TurnReducer::new();
        match finalize(&mut r, StreamEvent::Aborted) {
            TurnOutcome::Cancelled { partial_text } => assert!(partial_text.is_empty()),
            other => panic!("wrong outcome: {other:?}"),
        }
    }

    #[test]
    fn tool_result_pairs_with_prior_start() {
        let mut r = TurnReducer::new();
        r.apply(StreamEvent::ToolStart {
            call_id: "c1".into(),
            tool_name: "web.fetch".into(),
        })
        .unwrap();

        match r
            .apply(StreamEvent::ToolResult {
                call_id: "c1".into(),
                content: "200 OK".into(),
            })
            .unwrap()
        {
            Some(TurnUpdate::ToolFinished {
                tool_name, content, ..
            }) => {
                assert_eq!(tool_name, "web.fetch");
                assert_eq!(content, "200 OK");
            }
            other => panic!("wrong update: {other:?}"),
        }
    }

    #[test]
    fn orphan_tool_result_is_a_noop() {
        let mut r = TurnReducer::new();
        let update = r
            .apply(StreamEvent::ToolResult {
                call_id: "ghost".into(),
                content: "ignored".into(),
            })
            .unwrap();
        assert!(update.is_none());
    }

    #[test]
    fn memories_pass_through_as_a_delta() {
        let mut r = TurnReducer::new();
        let update = r
            .apply(StreamEvent::Memories {
                entity_id: Some("ent-a".into()),
                entity_label: None,
                trimmed: vec!["m1".into()],
                added: vec![],
            })
            .unwrap();
        assert!(matches!(
            update,
            Some(TurnUpdate::MemoryDelta { entity_id: Some(ref e), .. }) if e == "ent-a"
        ));
    }
}
