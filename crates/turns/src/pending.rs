//! The pending-action queue: one deferred user action bridged across an
//! entity-selection detour.
//!
//! At most one action is ever outstanding.  Dismissing the selection
//! affordance discards it entirely — no retry, no re-queue.  A valid
//! selection resumes it with skip-selection set, so the detour cannot
//! trigger twice.

use pl_domain::chat::Attachment;
use pl_domain::error::{Error, Result};
use pl_domain::trace::TraceEvent;

/// A user action suspended on an entity selection.
#[derive(Debug, Clone)]
pub enum PendingAction {
    /// Create a multi-entity conversation (awaiting ≥2 participants).
    CreateConversation,

    /// Send a message (awaiting one responder).
    SendMessage {
        content: String,
        attachments: Vec<Attachment>,
    },

    /// Regenerate the reply to a past message (awaiting one responder).
    Regenerate { message_id: String },
}

impl PendingAction {
    fn name(&self) -> &'static str {
        match self {
            PendingAction::CreateConversation => "create_conversation",
            PendingAction::SendMessage { .. } => "send_message",
            PendingAction::Regenerate { .. } => "regenerate",
        }
    }
}

/// Single-slot holder for the one pending action.
#[derive(Debug, Default)]
pub struct PendingSlot {
    slot: Option<PendingAction>,
}

impl PendingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park an action while its selection affordance is up.
    ///
    /// A second stash without resolving the first is a programming error.
    pub fn stash(&mut self, action: PendingAction) -> Result<()> {
        if let Some(existing) = &self.slot {
            return Err(Error::Protocol(format!(
                "a {} action is already pending",
                existing.name()
            )));
        }
        TraceEvent::PendingActionQueued {
            action: action.name().into(),
        }
        .emit();
        self.slot = Some(action);
        Ok(())
    }

    /// Take the parked action for resumption with skip-selection set.
    pub fn resume(&mut self) -> Option<PendingAction> {
        self.slot.take()
    }

    /// Drop the parked action — the user dismissed the affordance.
    pub fn discard(&mut self) {
        if let Some(action) = self.slot.take() {
            TraceEvent::PendingActionDiscarded {
                action: action.name().into(),
            }
            .emit();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }
}
