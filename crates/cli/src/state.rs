use std::sync::Arc;

use pl_api::BackendClient;
use pl_domain::chat::Entity;
use pl_domain::config::Config;
use pl_turns::{CancelToken, FetchSequencer};

/// Shared application state passed to every command.
///
/// Fields are grouped by concern:
/// - **Core services** — config, backend client
/// - **Catalog** — the entity list, fetched eagerly at startup and
///   immutable for the session
/// - **Guards** — fetch sequencer plus one cancellation token per
///   operation class (send/regenerate and import/export are independent)
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub api: Arc<BackendClient>,

    // ── Catalog ───────────────────────────────────────────────────────
    pub entities: Arc<Vec<Entity>>,

    // ── Guards ────────────────────────────────────────────────────────
    pub seq: Arc<FetchSequencer>,
    pub send_cancel: CancelToken,
    pub transfer_cancel: CancelToken,
}

impl AppState {
    /// Look up an entity's display label, falling back to its id.
    pub fn entity_label<'a>(&'a self, entity_id: &'a str) -> &'a str {
        self.entities
            .iter()
            .find(|e| e.id == entity_id)
            .map(|e| e.label.as_str())
            .unwrap_or(entity_id)
    }
}
