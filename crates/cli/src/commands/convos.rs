//! `polylogue convos` — conversation management commands.

use pl_domain::chat::Conversation;

use crate::state::AppState;

pub async fn list(state: &AppState, include_archived: bool) -> anyhow::Result<()> {
    let ticket = state.seq.begin();
    let conversations = state.api.list_conversations(include_archived).await?;
    if !state.seq.admit(ticket) {
        // A newer fetch superseded this one; show nothing stale.
        return Ok(());
    }

    if conversations.is_empty() {
        println!("No conversations.");
        return Ok(());
    }

    for convo in &conversations {
        println!("{}", render_line(state, convo));
    }
    Ok(())
}

pub async fn archive(state: &AppState, id: &str) -> anyhow::Result<()> {
    state.api.archive_conversation(id).await?;
    println!("Archived {id}.");
    Ok(())
}

pub async fn unarchive(state: &AppState, id: &str) -> anyhow::Result<()> {
    state.api.unarchive_conversation(id).await?;
    println!("Unarchived {id}.");
    Ok(())
}

pub async fn delete(state: &AppState, id: &str) -> anyhow::Result<()> {
    state.api.delete_conversation(id).await?;
    println!("Deleted {id}.");
    Ok(())
}

/// One listing line: id, kind marker, title, participants.
pub fn render_line(state: &AppState, convo: &Conversation) -> String {
    let title = convo.title.as_deref().unwrap_or("(untitled)");
    let archived = if convo.archived { " [archived]" } else { "" };

    if convo.is_multi_entity() {
        let participants: Vec<&str> = convo
            .participants
            .iter()
            .map(|id| state.entity_label(id))
            .collect();
        format!(
            "{}  {}{}  (multi: {})",
            convo.id,
            title,
            archived,
            participants.join(", ")
        )
    } else {
        format!("{}  {}{}", convo.id, title, archived)
    }
}
