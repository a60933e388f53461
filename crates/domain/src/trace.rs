use serde::Serialize;

/// Structured trace events emitted across all Polylogue crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    ApiCall {
        endpoint: String,
        status: u16,
        duration_ms: u64,
    },
    StreamOpened {
        conversation_id: String,
        entity_id: Option<String>,
        regenerate: bool,
    },
    TurnFinalized {
        conversation_id: String,
        outcome: String,
        chars: usize,
        input_tokens: Option<u32>,
        output_tokens: Option<u32>,
    },
    ConversationTitled {
        conversation_id: String,
        title_chars: usize,
    },
    MemoryDeltaApplied {
        entity_id: Option<String>,
        trimmed: usize,
        added: usize,
    },
    PendingActionQueued {
        action: String,
    },
    PendingActionDiscarded {
        action: String,
    },
    StaleFetchDiscarded {
        ticket: u64,
        latest: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "pl_event");
    }
}
