use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::chat::MemoryItem;

/// A boxed async stream, used for streamed assistant replies.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Events emitted while the backend generates one assistant reply.
///
/// The wire carries every variant except [`StreamEvent::Aborted`], which is
/// synthesized client-side when the caller's cancellation token fires.
///
/// Exactly one terminal resolution occurs per stream: `Done` + `Stored`,
/// or `Error`, or `Aborted`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// Retrieved-memory delta: `trimmed` ids leave the visible set before
    /// `added` items join it.
    #[serde(rename = "memories")]
    Memories {
        /// Owning entity, present only for multi-entity replies.
        entity_id: Option<String>,
        /// Display label for the owning entity, when one is named.
        entity_label: Option<String>,
        trimmed: Vec<String>,
        added: Vec<MemoryItem>,
    },

    /// Generation has begun.  Hook point only.
    #[serde(rename = "start")]
    Start,

    /// A text token chunk.
    #[serde(rename = "token")]
    Token { text: String },

    /// A tool invocation has started.
    #[serde(rename = "tool_start")]
    ToolStart { call_id: String, tool_name: String },

    /// Result of a tool invocation, correlated by `call_id`.
    #[serde(rename = "tool_result")]
    ToolResult { call_id: String, content: String },

    /// Generation finished; the text buffer is frozen.
    #[serde(rename = "done")]
    Done { usage: Option<Usage> },

    /// Durable identifiers for the messages just persisted.
    #[serde(rename = "stored")]
    Stored(StoredIds),

    /// The server reported a failure; the in-progress reply is void.
    #[serde(rename = "error")]
    Error { message: String },

    /// The caller cancelled mid-stream.  Never arrives on the wire.
    #[serde(rename = "aborted")]
    Aborted,
}

/// Durable message ids carried by a `stored` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredIds {
    #[serde(default)]
    pub human_id: Option<String>,
    #[serde(default)]
    pub assistant_id: Option<String>,
}

/// Token usage for one generated reply, for display only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}
