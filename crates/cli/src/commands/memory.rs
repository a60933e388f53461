//! `polylogue memories` — inspect the backend's long-term memory.

use pl_domain::chat::MemoryItem;

use crate::state::AppState;

pub async fn list(state: &AppState, entity: Option<&str>, limit: u32) -> anyhow::Result<()> {
    let memories = state.api.list_memories(entity, limit).await?;
    print_memories(state, &memories);
    Ok(())
}

pub async fn search(state: &AppState, query: &str, limit: u32) -> anyhow::Result<()> {
    let memories = state.api.search_memories(query, limit).await?;
    if memories.is_empty() {
        println!("No memories match {query:?}.");
        return Ok(());
    }
    print_memories(state, &memories);
    Ok(())
}

pub async fn stats(state: &AppState) -> anyhow::Result<()> {
    let stats = state.api.memory_stats().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn print_memories(state: &AppState, memories: &[MemoryItem]) {
    if memories.is_empty() {
        println!("No memories.");
        return;
    }

    for mem in memories {
        let score = mem
            .score
            .map(|s| format!("{s:.2}"))
            .unwrap_or_else(|| "-".into());
        let owner = mem
            .entity_id
            .as_deref()
            .map(|id| format!("  [{}]", state.entity_label(id)))
            .unwrap_or_default();
        println!(
            "{}  score={score}  seen={}{}\n    {}",
            mem.id, mem.retrieval_count, owner, mem.content
        );
    }
}
