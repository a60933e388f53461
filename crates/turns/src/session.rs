//! Per-conversation session state and the stream-driving loop.
//!
//! [`ChatSession`] is the single owner of a conversation's client-side
//! state: transcript, memory buffer, turn coordinator, send gate, and
//! notices.  It is handed to subsystems by reference — there is no
//! ambient global state.
//!
//! A turn runs in two steps: a `prepare_*` call decides whether the
//! action proceeds or needs an entity-selection detour, and
//! [`ChatSession::drive_stream`] folds an opened event stream into the
//! transcript, resolving exactly once.

use futures_util::StreamExt;

use pl_domain::chat::{derive_title, Attachment, Conversation, Message, Role};
use pl_domain::error::{Error, Result};
use pl_domain::stream::{BoxStream, StreamEvent, Usage};
use pl_domain::trace::TraceEvent;

use crate::cancel::CancelToken;
use crate::consumer::{TurnOutcome, TurnReducer, TurnUpdate};
use crate::coordinator::{TurnCoordinator, TurnDecision};
use crate::gate::{SendGate, SendPermit};
use crate::memory::MemoryMergeBuffer;
use crate::transcript::TranscriptState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Plans, notices, reports
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Result of preparing a user action.
pub enum SendPlan {
    /// Proceed: open the stream targeting `responder` and hold `permit`
    /// until the turn resolves.
    Open {
        responder: Option<String>,
        permit: SendPermit,
    },

    /// Suspend: pick exactly one responder from `participants`.
    AwaitResponder { participants: Vec<String> },

    /// Suspend: pick ≥2 participants for a new multi-entity conversation.
    AwaitParticipants,
}

/// A dismissible user-visible notification.
#[derive(Debug, Clone)]
pub struct Notice {
    pub message: String,
}

/// What one resolved turn means for the caller.
pub struct TurnReport {
    pub outcome: TurnOutcome,
    /// Title to persist when auto-titling fired on this turn.
    pub new_title: Option<String>,
    /// Responder candidates to re-offer (multi-entity continuation mode).
    pub offer_responders: Option<Vec<String>>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Client-side state for one open conversation.
pub struct ChatSession {
    conversation: Conversation,
    coordinator: TurnCoordinator,
    transcript: TranscriptState,
    memory: MemoryMergeBuffer,
    gate: SendGate,
    notices: Vec<Notice>,
    last_usage: Option<Usage>,
    /// Insert point for the next draft, set by a prepared regenerate.
    next_insert_at: Option<usize>,
}

impl ChatSession {
    pub fn new(conversation: Conversation, history: Vec<Message>) -> Self {
        let coordinator = TurnCoordinator::for_conversation(&conversation);
        Self {
            conversation,
            coordinator,
            transcript: TranscriptState::from_messages(history),
            memory: MemoryMergeBuffer::new(),
            gate: SendGate::new(),
            notices: Vec::new(),
            last_usage: None,
            next_insert_at: None,
        }
    }

    // ── accessors ────────────────────────────────────────────────────

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn transcript(&self) -> &TranscriptState {
        &self.transcript
    }

    pub fn memory(&self) -> &MemoryMergeBuffer {
        &self.memory
    }

    pub fn last_usage(&self) -> Option<Usage> {
        self.last_usage
    }

    pub fn is_sending(&self) -> bool {
        self.gate.is_sending()
    }

    /// Drain accumulated notices for display.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn push_notice(&mut self, message: impl Into<String>) {
        self.notices.push(Notice {
            message: message.into(),
        });
    }

    // ── validation ───────────────────────────────────────────────────

    /// Block empty sends before any request is issued.
    pub fn validate_outgoing(content: &str, attachments: &[Attachment]) -> Result<()> {
        if content.trim().is_empty() && attachments.is_empty() {
            return Err(Error::Validation(
                "message is empty and has no attachments".into(),
            ));
        }
        Ok(())
    }

    // ── turn preparation ─────────────────────────────────────────────

    /// Prepare an outgoing message.
    ///
    /// On `Open`, the user message has been appended to the transcript
    /// and the send gate is held; the caller opens the stream and calls
    /// [`drive_stream`](Self::drive_stream).  On an `Await*` plan the
    /// caller surfaces the selection affordance and parks the action.
    pub fn prepare_send(
        &mut self,
        content: &str,
        attachments: &[Attachment],
        responder: Option<&str>,
        skip_selection: bool,
    ) -> Result<SendPlan> {
        Self::validate_outgoing(content, attachments)?;

        match self.coordinator.decide(responder, skip_selection)? {
            TurnDecision::Proceed { responder } => {
                let permit = self.gate.begin()?;
                self.transcript.push_human(content);
                self.emit_stream_opened(responder.as_deref(), false);
                Ok(SendPlan::Open { responder, permit })
            }
            TurnDecision::SelectParticipants => Ok(SendPlan::AwaitParticipants),
            TurnDecision::SelectResponder { participants } => {
                Ok(SendPlan::AwaitResponder { participants })
            }
        }
    }

    /// Prepare regeneration of the reply to a stored user message.
    ///
    /// On `Open`, the old assistant reply immediately following the
    /// message has already been removed from the transcript — the
    /// regenerate turn boundary — regardless of which entity was chosen.
    pub fn prepare_regenerate(
        &mut self,
        message_id: &str,
        responder: Option<&str>,
        skip_selection: bool,
    ) -> Result<SendPlan> {
        let boundary = self
            .transcript
            .messages()
            .iter()
            .position(|m| m.id.as_deref() == Some(message_id) && m.role == Role::Human)
            .ok_or_else(|| {
                Error::Validation(format!("no stored user message with id {message_id}"))
            })?;

        match self.coordinator.decide(responder, skip_selection)? {
            TurnDecision::Proceed { responder } => {
                let permit = self.gate.begin()?;
                self.transcript.remove_reply_after(message_id);
                self.next_insert_at = Some(boundary + 1);
                self.emit_stream_opened(responder.as_deref(), true);
                Ok(SendPlan::Open { responder, permit })
            }
            TurnDecision::SelectResponder { participants } => {
                Ok(SendPlan::AwaitResponder { participants })
            }
            TurnDecision::SelectParticipants => Err(Error::Validation(
                "cannot regenerate in a conversation without participants".into(),
            )),
        }
    }

    /// Prepare a continuation turn: another responder replies to the same
    /// user message (multi-entity conversations only).
    pub fn prepare_continuation(&mut self, responder: &str) -> Result<SendPlan> {
        if self.coordinator.continuation().is_none() {
            return Err(Error::Validation(
                "continuation only applies to multi-entity conversations".into(),
            ));
        }

        match self.coordinator.decide(Some(responder), true)? {
            TurnDecision::Proceed { responder } => {
                let permit = self.gate.begin()?;
                self.emit_stream_opened(responder.as_deref(), false);
                Ok(SendPlan::Open { responder, permit })
            }
            // decide() with a chosen responder either proceeds or errors.
            _ => Err(Error::Protocol("continuation cannot suspend".into())),
        }
    }

    // ── stream driving ───────────────────────────────────────────────

    /// Drive one opened event stream to its single terminal resolution.
    ///
    /// Errors never escape: every failure path resolves into the returned
    /// [`TurnReport`] and (for failures) exactly one notice.  `on_update`
    /// observes live updates for rendering; the transcript and memory
    /// buffer are updated here.
    pub async fn drive_stream(
        &mut self,
        mut stream: BoxStream<'static, Result<StreamEvent>>,
        cancel: &CancelToken,
        permit: SendPermit,
        responder: Option<String>,
        mut on_update: impl FnMut(&TurnUpdate),
    ) -> TurnReport {
        // Held for the whole turn; dropping it reopens the gate.
        let _permit = permit;

        let mut reducer = TurnReducer::new();
        let insert_at = self.next_insert_at.take();
        if let Err(e) = self.transcript.begin_draft_at(responder, insert_at) {
            return self.resolve(TurnOutcome::Failed {
                message: e.to_string(),
                server_reported: false,
            });
        }

        let outcome = loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    break match reducer.apply(StreamEvent::Aborted) {
                        Ok(Some(TurnUpdate::Finalized(outcome))) => outcome,
                        _ => TurnOutcome::Cancelled {
                            partial_text: reducer.text().to_string(),
                        },
                    };
                }

                event = stream.next() => match event {
                    Some(Ok(event)) => match reducer.apply(event) {
                        Ok(Some(update)) => {
                            if let Some(outcome) = self.project(&update, &mut on_update) {
                                break outcome;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::warn!(error = %e, "stream protocol violation");
                            break TurnOutcome::Failed {
                                message: e.to_string(),
                                server_reported: false,
                            };
                        }
                    },
                    Some(Err(e)) => {
                        break TurnOutcome::Failed {
                            message: e.to_string(),
                            server_reported: false,
                        };
                    }
                    None => {
                        break TurnOutcome::Failed {
                            message: "stream ended before completion".into(),
                            server_reported: false,
                        };
                    }
                }
            }
        };

        self.resolve(outcome)
    }

    /// Route one non-terminal update; return the outcome on finalization.
    fn project(
        &mut self,
        update: &TurnUpdate,
        on_update: &mut impl FnMut(&TurnUpdate),
    ) -> Option<TurnOutcome> {
        match update {
            TurnUpdate::MemoryDelta {
                entity_id,
                entity_label,
                trimmed,
                added,
            } => {
                self.memory.apply(
                    entity_id.as_deref(),
                    entity_label.as_deref(),
                    trimmed,
                    added.clone(),
                );
                on_update(update);
                None
            }
            TurnUpdate::TextDelta { text } => {
                // The draft mirrors the reducer buffer for mid-stream reads.
                let _ = self.transcript.append_draft(text);
                on_update(update);
                None
            }
            TurnUpdate::ToolStarted { .. } | TurnUpdate::ToolFinished { .. } => {
                on_update(update);
                None
            }
            TurnUpdate::Finalized(outcome) => Some(outcome.clone()),
        }
    }

    /// Apply the terminal resolution to session state.
    fn resolve(&mut self, outcome: TurnOutcome) -> TurnReport {
        let mut new_title = None;
        let mut offer_responders = None;

        match &outcome {
            TurnOutcome::Completed {
                text,
                usage,
                stored,
            } => {
                let _ = self
                    .transcript
                    .finalize_draft(text.clone(), stored.assistant_id.clone(), false);
                if let Some(human_id) = &stored.human_id {
                    self.transcript.assign_last_human_id(human_id.clone());
                }
                self.last_usage = *usage;

                new_title = self.auto_title();
                offer_responders = self.coordinator.continuation();

                TraceEvent::TurnFinalized {
                    conversation_id: self.conversation.id.clone(),
                    outcome: "completed".into(),
                    chars: text.len(),
                    input_tokens: usage.map(|u| u.input_tokens),
                    output_tokens: usage.map(|u| u.output_tokens),
                }
                .emit();
            }

            TurnOutcome::Failed { message, .. } => {
                self.transcript.discard_draft();
                self.push_notice(message.clone());

                TraceEvent::TurnFinalized {
                    conversation_id: self.conversation.id.clone(),
                    outcome: "failed".into(),
                    chars: 0,
                    input_tokens: None,
                    output_tokens: None,
                }
                .emit();
            }

            TurnOutcome::Cancelled { partial_text } => {
                // Kept and tagged incomplete; deliberately no notice.
                let _ = self
                    .transcript
                    .finalize_draft(partial_text.clone(), None, true);

                TraceEvent::TurnFinalized {
                    conversation_id: self.conversation.id.clone(),
                    outcome: "cancelled".into(),
                    chars: partial_text.len(),
                    input_tokens: None,
                    output_tokens: None,
                }
                .emit();
            }
        }

        TurnReport {
            outcome,
            new_title,
            offer_responders,
        }
    }

    fn emit_stream_opened(&self, entity_id: Option<&str>, regenerate: bool) {
        TraceEvent::StreamOpened {
            conversation_id: self.conversation.id.clone(),
            entity_id: entity_id.map(str::to_string),
            regenerate,
        }
        .emit();
    }

    /// Derive and record the title on the first stored exchange.
    ///
    /// Returns the title for the caller to persist; the session applies
    /// it locally so a second turn never re-titles.
    fn auto_title(&mut self) -> Option<String> {
        if self.conversation.title.is_some() {
            return None;
        }
        let title = derive_title(&self.transcript.first_human()?.content);
        if title.is_empty() {
            return None;
        }

        self.conversation.title = Some(title.clone());
        TraceEvent::ConversationTitled {
            conversation_id: self.conversation.id.clone(),
            title_chars: title.chars().count(),
        }
        .emit();
        Some(title)
    }
}
