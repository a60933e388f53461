//! Process startup: tracing and application state construction.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use pl_api::BackendClient;
use pl_domain::config::Config;
use pl_turns::{CancelToken, FetchSequencer};

use crate::state::AppState;

/// Initialize tracing for CLI commands.
///
/// Quiet by default so REPL output stays clean; raise with `RUST_LOG`
/// (e.g. `RUST_LOG=pl_api=debug`).  Logs go to stderr.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Build the shared [`AppState`]: backend client plus the eagerly-fetched
/// entity catalog.
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let api = BackendClient::new(&config.backend)
        .context("building backend client")?;

    let entities = api
        .list_entities()
        .await
        .context("fetching entity catalog")?;

    tracing::info!(entities = entities.len(), "entity catalog loaded");

    Ok(AppState {
        config,
        api: Arc::new(api),
        entities: Arc::new(entities),
        seq: Arc::new(FetchSequencer::new()),
        send_cancel: CancelToken::new(),
        transfer_cancel: CancelToken::new(),
    })
}
