//! Chat data model: conversations, entities, messages, memories.
//!
//! Entities are immutable for the session once fetched.  A conversation's
//! participant list is a snapshot taken at creation time, not a live
//! reference to the entity catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Conversation titles derive from the first user message, cut to this many
/// characters.
pub const TITLE_MAX_CHARS: usize = 50;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    Normal,
    MultiEntity,
}

impl Default for ConversationKind {
    fn default() -> Self {
        Self::Normal
    }
}

/// A conversation as the backend reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    /// `None` until the first message lands; set exactly once after that.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub kind: ConversationKind,
    /// Participant entity ids.  Empty unless `kind` is `MultiEntity`.
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn is_multi_entity(&self) -> bool {
        self.kind == ConversationKind::MultiEntity
    }
}

/// Derive a conversation title from the first user message.
///
/// Whitespace-trimmed, then cut to [`TITLE_MAX_CHARS`] Unicode scalar
/// values (never mid-character).
pub fn derive_title(first_message: &str) -> String {
    let trimmed = first_message.trim();
    match trimmed.char_indices().nth(TITLE_MAX_CHARS) {
        Some((byte_idx, _)) => trimmed[..byte_idx].to_string(),
        None => trimmed.to_string(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entity
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An AI persona hosted by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub label: String,
    pub provider: String,
    pub default_model: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Human,
    Assistant,
}

/// A finalized transcript message.
///
/// While a reply streams, its text lives in the turn reducer's append-only
/// buffer; a `Message` is minted only at finalization and is immutable
/// afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Durable server-assigned id.  `None` for messages finalized locally
    /// before (or without) a `stored` event, e.g. aborted partials.
    #[serde(default)]
    pub id: Option<String>,
    pub role: Role,
    pub content: String,
    /// Responding entity, for assistant messages in multi-entity
    /// conversations.
    #[serde(default)]
    pub entity_id: Option<String>,
    /// Set when the reply was cut off by user cancellation.
    #[serde(default)]
    pub incomplete: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            id: None,
            role: Role::Human,
            content: content.into(),
            entity_id: None,
            incomplete: false,
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, entity_id: Option<String>) -> Self {
        Self {
            id: None,
            role: Role::Assistant,
            content: content.into(),
            entity_id,
            incomplete: false,
            created_at: Utc::now(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Memory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A retrieved memory snippet as pushed by the server.
///
/// The visible memory set only mirrors what the server reports; it is
/// never authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: String,
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub retrieval_count: u32,
    /// Owning entity in multi-entity conversations.
    #[serde(default)]
    pub entity_id: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Attachment
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A file attached to an outgoing message.
///
/// The payload is an opaque reference passed through to the backend; this
/// client does not interpret or re-encode it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub media_type: String,
    pub data: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_under_limit_unchanged() {
        assert_eq!(derive_title("Hello"), "Hello");
    }

    #[test]
    fn title_trims_whitespace() {
        assert_eq!(derive_title("  Hello there \n"), "Hello there");
    }

    #[test]
    fn title_truncates_at_fifty_chars() {
        let long = "x".repeat(120);
        let title = derive_title(&long);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS);
    }

    #[test]
    fn title_truncation_respects_char_boundaries() {
        // 60 multi-byte characters; a byte-indexed cut would panic.
        let long = "é".repeat(60);
        let title = derive_title(&long);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS);
        assert!(title.chars().all(|c| c == 'é'));
    }

    #[test]
    fn title_exactly_at_limit() {
        let exact = "y".repeat(TITLE_MAX_CHARS);
        assert_eq!(derive_title(&exact), exact);
    }

    #[test]
    fn conversation_kind_default_is_normal() {
        assert_eq!(ConversationKind::default(), ConversationKind::Normal);
    }
}
