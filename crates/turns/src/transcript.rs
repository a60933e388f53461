//! In-memory transcript projection for one conversation.
//!
//! Finalized messages are immutable; at most one in-flight draft exists
//! while a reply streams.  The draft is either finalized into a message
//! (complete or cancelled-partial) or discarded (server error) — it is
//! never left half-rendered.
//!
//! The client owns no persistence format: this state is rebuilt from the
//! backend on every conversation load.

use pl_domain::chat::Message;
use pl_domain::error::{Error, Result};

/// The in-flight assistant reply.
#[derive(Debug, Clone)]
pub struct Draft {
    /// Responding entity, when known (multi-entity conversations).
    pub entity_id: Option<String>,
    /// Append-only text accumulated so far.
    pub text: String,
    /// Finalization index for regenerated replies; `None` appends.
    insert_at: Option<usize>,
}

/// Ordered messages plus at most one streaming draft.
#[derive(Debug, Default)]
pub struct TranscriptState {
    messages: Vec<Message>,
    draft: Option<Draft>,
}

impl TranscriptState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from messages fetched off the backend.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            draft: None,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append the outgoing user message.
    pub fn push_human(&mut self, content: impl Into<String>) {
        self.messages.push(Message::human(content));
    }

    /// The first user message, used for deriving the conversation title.
    pub fn first_human(&self) -> Option<&Message> {
        self.messages
            .iter()
            .find(|m| m.role == pl_domain::chat::Role::Human)
    }

    // ── draft lifecycle ──────────────────────────────────────────────

    pub fn begin_draft(&mut self, entity_id: Option<String>) -> Result<()> {
        self.begin_draft_at(entity_id, None)
    }

    /// Begin a draft that finalizes at a fixed transcript position — the
    /// regenerate turn boundary.
    pub fn begin_draft_at(
        &mut self,
        entity_id: Option<String>,
        insert_at: Option<usize>,
    ) -> Result<()> {
        if self.draft.is_some() {
            return Err(Error::Protocol("a reply draft already exists".into()));
        }
        self.draft = Some(Draft {
            entity_id,
            text: String::new(),
            insert_at,
        });
        Ok(())
    }

    pub fn draft(&self) -> Option<&Draft> {
        self.draft.as_ref()
    }

    pub fn append_draft(&mut self, text: &str) -> Result<()> {
        match self.draft.as_mut() {
            Some(draft) => {
                draft.text.push_str(text);
                Ok(())
            }
            None => Err(Error::Protocol("no reply draft to append to".into())),
        }
    }

    /// Turn the draft into an immutable message.
    ///
    /// `text` is the reducer's authoritative buffer; `incomplete` marks a
    /// cancelled partial.
    pub fn finalize_draft(
        &mut self,
        text: String,
        id: Option<String>,
        incomplete: bool,
    ) -> Result<&Message> {
        let draft = self
            .draft
            .take()
            .ok_or_else(|| Error::Protocol("no reply draft to finalize".into()))?;

        let mut message = Message::assistant(text, draft.entity_id);
        message.id = id;
        message.incomplete = incomplete;

        let at = match draft.insert_at {
            Some(i) if i <= self.messages.len() => i,
            _ => self.messages.len(),
        };
        self.messages.insert(at, message);
        Ok(&self.messages[at])
    }

    /// Drop the draft without a trace (server-reported stream error).
    pub fn discard_draft(&mut self) {
        self.draft = None;
    }

    // ── durable ids & regeneration ───────────────────────────────────

    /// Attach the durable id from a `stored` event to the most recent
    /// human message that does not have one yet.
    pub fn assign_last_human_id(&mut self, id: String) {
        if let Some(msg) = self
            .messages
            .iter_mut()
            .rev()
            .find(|m| m.role == pl_domain::chat::Role::Human && m.id.is_none())
        {
            msg.id = Some(id);
        }
    }

    /// Remove the assistant reply immediately following the message with
    /// `message_id`, returning it.
    ///
    /// This is the regenerate turn boundary: the old reply leaves the
    /// visible transcript before the new stream starts, regardless of
    /// which entity regenerates.
    pub fn remove_reply_after(&mut self, message_id: &str) -> Option<Message> {
        let idx = self
            .messages
            .iter()
            .position(|m| m.id.as_deref() == Some(message_id))?;

        match self.messages.get(idx + 1) {
            Some(next) if next.role == pl_domain::chat::Role::Assistant => {
                Some(self.messages.remove(idx + 1))
            }
            _ => None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use pl_domain::chat::Role;

    fn human(id: &str, content: &str) -> Message {
        let mut m = Message::human(content);
        m.id = Some(id.into());
        m
    }

    fn assistant(id: &str, content: &str, entity: &str) -> Message {
        let mut m = Message::assistant(content, Some(entity.into()));
        m.id = Some(id.into());
        m
    }

    #[test]
    fn draft_finalizes_into_immutable_message() {
        let mut t = TranscriptState::new();
        t.push_human("hi");
        t.begin_draft(Some("ent-a".into())).unwrap();
        t.append_draft("hel").unwrap();
        t.append_draft("lo").unwrap();

        let msg = t
            .finalize_draft("hello".into(), Some("a1".into()), false)
            .unwrap();
        assert_eq!(msg.content, "hello");
        assert_eq!(msg.entity_id.as_deref(), Some("ent-a"));
        assert!(!msg.incomplete);
        assert!(t.draft().is_none());
        assert_eq!(t.messages().len(), 2);
    }

    #[test]
    fn second_draft_is_rejected_while_one_streams() {
        let mut t = TranscriptState::new();
        t.begin_draft(None).unwrap();
        assert!(t.begin_draft(None).is_err());
    }

    #[test]
    fn discard_removes_the_draft_entirely() {
        let mut t = TranscriptState::new();
        t.begin_draft(None).unwrap();
        t.append_draft("half-rendered").unwrap();
        t.discard_draft();
        assert!(t.draft().is_none());
        assert!(t.messages().is_empty());
    }

    #[test]
    fn cancelled_partial_is_tagged_incomplete() {
        let mut t = TranscriptState::new();
        t.begin_draft(None).unwrap();
        let msg = t.finalize_draft("partial".into(), None, true).unwrap();
        assert!(msg.incomplete);
        assert!(msg.id.is_none());
    }

    #[test]
    fn stored_id_lands_on_latest_unidentified_human_message() {
        let mut t = TranscriptState::from_messages(vec![human("h1", "old")]);
        t.push_human("new question");
        t.assign_last_human_id("h2".into());

        assert_eq!(t.messages()[0].id.as_deref(), Some("h1"));
        assert_eq!(t.messages()[1].id.as_deref(), Some("h2"));
    }

    #[test]
    fn remove_reply_after_takes_the_following_assistant_message() {
        let mut t = TranscriptState::from_messages(vec![
            human("h1", "q1"),
            assistant("a1", "r1", "ent-a"),
            human("h2", "q2"),
            assistant("a2", "r2", "ent-b"),
        ]);

        let removed = t.remove_reply_after("h1").unwrap();
        assert_eq!(removed.id.as_deref(), Some("a1"));
        assert_eq!(t.messages().len(), 3);
        // The later exchange is untouched.
        assert_eq!(t.messages()[2].id.as_deref(), Some("a2"));
    }

    #[test]
    fn remove_reply_after_is_a_noop_when_next_is_not_assistant() {
        let mut t = TranscriptState::from_messages(vec![
            human("h1", "q1"),
            human("h2", "q2"),
        ]);
        assert!(t.remove_reply_after("h1").is_none());
        assert_eq!(t.messages().len(), 2);
    }

    #[test]
    fn remove_reply_after_unknown_id_is_a_noop() {
        let mut t = TranscriptState::from_messages(vec![human("h1", "q1")]);
        assert!(t.remove_reply_after("ghost").is_none());
    }

    #[test]
    fn positional_draft_finalizes_at_the_turn_boundary() {
        let mut t = TranscriptState::from_messages(vec![
            human("h1", "q1"),
            assistant("a1", "old reply", "ent-a"),
            human("h2", "q2"),
            assistant("a2", "r2", "ent-b"),
        ]);

        t.remove_reply_after("h1").unwrap();
        t.begin_draft_at(Some("ent-b".into()), Some(1)).unwrap();
        t.finalize_draft("new reply".into(), Some("a3".into()), false)
            .unwrap();

        let contents: Vec<&str> = t.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q1", "new reply", "q2", "r2"]);
        assert_eq!(t.messages()[1].entity_id.as_deref(), Some("ent-b"));
    }

    #[test]
    fn out_of_range_insert_point_appends() {
        let mut t = TranscriptState::new();
        t.begin_draft_at(None, Some(99)).unwrap();
        t.finalize_draft("text".into(), None, false).unwrap();
        assert_eq!(t.messages().len(), 1);
    }

    #[test]
    fn first_human_skips_assistant_messages() {
        let t = TranscriptState::from_messages(vec![
            assistant("a0", "greeting", "ent-a"),
            human("h1", "the actual question"),
        ]);
        assert_eq!(t.first_human().unwrap().content, "the actual question");
    }
}
