//! `polylogue export` / `polylogue import` — conversation transfer.
//!
//! The blob schema is owned by the backend; this client moves it around
//! as an opaque JSON document.  Transfers run under their own
//! cancellation token, independent of any in-flight send: Ctrl+C aborts
//! the transfer without touching chat state.

use std::path::Path;

use crate::state::AppState;

pub async fn export(state: &AppState, id: &str, out: Option<&Path>) -> anyhow::Result<()> {
    state.transfer_cancel.rearm();
    let watcher = spawn_ctrl_c_watcher(state);

    let result = tokio::select! {
        blob = state.api.export_conversation(id) => blob,
        _ = state.transfer_cancel.cancelled() => {
            eprintln!("export aborted");
            watcher.abort();
            return Ok(());
        }
    };
    watcher.abort();

    let blob = result?;
    let rendered = serde_json::to_string_pretty(&blob)?;
    match out {
        Some(path) => {
            std::fs::write(path, rendered)?;
            println!("Exported {id} to {}.", path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

pub async fn import(state: &AppState, file: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)?;
    let blob: serde_json::Value = serde_json::from_str(&raw)?;

    state.transfer_cancel.rearm();
    let watcher = spawn_ctrl_c_watcher(state);

    let result = tokio::select! {
        convo = state.api.import_conversation(&blob) => convo,
        _ = state.transfer_cancel.cancelled() => {
            eprintln!("import aborted");
            watcher.abort();
            return Ok(());
        }
    };
    watcher.abort();

    let convo = result?;
    println!(
        "Imported {} ({}).",
        convo.id,
        convo.title.as_deref().unwrap_or("untitled")
    );
    Ok(())
}

fn spawn_ctrl_c_watcher(state: &AppState) -> tokio::task::JoinHandle<()> {
    let token = state.transfer_cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    })
}
