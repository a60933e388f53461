//! `polylogue chat` — interactive REPL command.
//!
//! Opens a readline-based loop that sends each line to the backend and
//! streams the reply back token-by-token.  Multi-entity conversations
//! detour through responder/participant pickers; the picked-or-dismissed
//! outcome resumes or discards the parked action.  Supports slash
//! commands for conversation management and REPL conveniences.
//!
//! Rendering only: all protocol state lives in [`pl_turns`].

use std::io::Write;
use std::sync::Arc;

use rustyline::DefaultEditor;

use pl_api::types::{ContinueRequest, CreateConversationRequest, RegenerateRequest, SendRequest};
use pl_domain::chat::{Conversation, Role};
use pl_domain::config::Config;
use pl_turns::gate::SendPermit;
use pl_turns::{
    ChatSession, PendingAction, PendingSlot, SendPlan, TurnCoordinator, TurnOutcome, TurnUpdate,
};

use crate::bootstrap;
use crate::commands::convos;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Public entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run the interactive chat REPL.
pub async fn chat(config: Arc<Config>, conversation: Option<String>) -> anyhow::Result<()> {
    // 1. Boot shared state (backend client + entity catalog).
    let state = bootstrap::build_app_state(config.clone()).await?;

    // 2. Initialize rustyline with persistent history.
    let history_path = config.repl.history_file.clone().unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_default()
            .join(".polylogue")
            .join("history.txt")
    });
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let mut rl = DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    let mut app = ChatApp {
        state,
        session: None,
        pending: PendingSlot::new(),
        conversations: Vec::new(),
        model: None,
    };

    // 3. Resume a conversation when one was named.
    if let Some(id) = conversation {
        if let Err(e) = app.switch_to(&id).await {
            eprintln!("\x1B[31merror: {e}\x1B[0m");
        }
    }

    // 4. Welcome banner to stderr (keep stdout clean for replies).
    eprintln!("Polylogue interactive chat");
    eprintln!("Type /help for commands, Ctrl+D to exit");
    eprintln!();

    // 5. REPL loop.
    loop {
        let readline = rl.readline(&app.prompt());

        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                rl.add_history_entry(&line).ok();

                // ── Slash commands ────────────────────────────────
                if trimmed.starts_with('/') {
                    if app.handle_slash_command(trimmed, &mut rl).await {
                        break;
                    }
                    continue;
                }

                // ── User message → turn ──────────────────────────
                app.send_text(trimmed, &mut rl).await;
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(Use Ctrl+D or /exit to quit)");
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                break;
            }
            Err(e) => {
                eprintln!("\x1B[31mreadline error: {e}\x1B[0m");
                break;
            }
        }
    }

    // 6. Save history.
    rl.save_history(&history_path).ok();

    eprintln!("Goodbye!");
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// REPL state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What kind of stream the next turn opens.
enum TurnRequest {
    Send { content: String },
    Regenerate { message_id: String },
    Continue,
}

struct ChatApp {
    state: AppState,
    session: Option<ChatSession>,
    /// The one parked action bridging an entity-selection detour.
    pending: PendingSlot,
    conversations: Vec<Conversation>,
    /// `/model` override for this REPL session.
    model: Option<String>,
}

impl ChatApp {
    fn prompt(&self) -> String {
        match &self.session {
            Some(session) => {
                let title = session
                    .conversation()
                    .title
                    .as_deref()
                    .unwrap_or("new conversation");
                format!("[{title}] you> ")
            }
            None => "you> ".to_string(),
        }
    }

    fn model_override(&self) -> Option<String> {
        self.model
            .clone()
            .or_else(|| self.state.config.chat.model.clone())
    }

    // ── Slash command handling ───────────────────────────────────────

    /// Process a slash command.  Returns `true` if the REPL should exit.
    async fn handle_slash_command(&mut self, input: &str, rl: &mut DefaultEditor) -> bool {
        let parts: Vec<&str> = input.splitn(2, ' ').collect();
        let cmd = parts[0];
        let arg = parts.get(1).map(|s| s.trim());

        match cmd {
            "/exit" | "/quit" => return true,

            "/conversations" => {
                if let Err(e) = self.refresh_conversations().await {
                    eprintln!("\x1B[31merror: {e}\x1B[0m");
                    return false;
                }
                if self.conversations.is_empty() {
                    eprintln!("No conversations.");
                }
                for (i, convo) in self.conversations.iter().enumerate() {
                    eprintln!("  {}. {}", i + 1, convos::render_line(&self.state, convo));
                }
            }

            "/switch" => match arg.filter(|s| !s.is_empty()) {
                Some(target) => {
                    let id = self.resolve_conversation_arg(target);
                    if let Err(e) = self.switch_to(&id).await {
                        eprintln!("\x1B[31merror: {e}\x1B[0m");
                    }
                }
                None => eprintln!("Usage: /switch <id | list number>"),
            },

            "/new" => {
                let multi = arg == Some("multi");
                self.new_conversation(multi, rl).await;
            }

            "/regen" => self.regenerate(rl).await,

            "/memories" => self.show_memories(),

            "/entities" => {
                for entity in self.state.entities.iter() {
                    eprintln!(
                        "  {}  {} ({} / {})",
                        entity.id, entity.label, entity.provider, entity.default_model
                    );
                }
            }

            "/models" => match self.state.api.chat_config().await {
                Ok(config) => {
                    for provider in &config.providers {
                        eprintln!("  {}:", provider.provider);
                        for model in &provider.models {
                            eprintln!("    {model}");
                        }
                    }
                }
                Err(e) => eprintln!("\x1B[31merror: {e}\x1B[0m"),
            },

            "/model" => {
                if let Some(name) = arg.filter(|s| !s.is_empty()) {
                    self.model = Some(name.to_string());
                    eprintln!("Model set to: {name}");
                } else {
                    let current = self.model_override();
                    eprintln!(
                        "Current model: {}",
                        current.as_deref().unwrap_or("(entity default)")
                    );
                    eprintln!("Usage: /model <name>");
                }
            }

            "/clear" => {
                // ANSI escape: clear screen and move cursor to top-left.
                eprint!("\x1B[2J\x1B[1;1H");
            }

            "/help" => {
                eprintln!("Commands:");
                eprintln!("  /conversations     List conversations");
                eprintln!("  /switch <id|n>     Open a conversation");
                eprintln!("  /new [multi]       Start a conversation (multi = pick ≥2 entities)");
                eprintln!("  /regen             Regenerate the latest reply");
                eprintln!("  /memories          Show retrieved memories for this conversation");
                eprintln!("  /entities          List available entities");
                eprintln!("  /models            List providers and models");
                eprintln!("  /model <name>      Override the model for this session");
                eprintln!("  /clear             Clear the screen");
                eprintln!("  /exit, /quit       Exit the chat");
                eprintln!();
                eprintln!("Ctrl+C while a reply streams stops it and keeps the partial text.");
            }

            other => {
                eprintln!("Unknown command: {other}  (type /help for a list)");
            }
        }

        false
    }

    /// `/switch` accepts a list number from the last `/conversations`.
    fn resolve_conversation_arg(&self, arg: &str) -> String {
        if let Ok(n) = arg.parse::<usize>() {
            if let Some(convo) = self.conversations.get(n.saturating_sub(1)) {
                return convo.id.clone();
            }
        }
        arg.to_string()
    }

    // ── Conversation lifecycle ───────────────────────────────────────

    async fn refresh_conversations(&mut self) -> anyhow::Result<()> {
        let ticket = self.state.seq.begin();
        let conversations = self.state.api.list_conversations(false).await?;
        if self.state.seq.admit(ticket) {
            self.conversations = conversations;
        }
        Ok(())
    }

    async fn switch_to(&mut self, id: &str) -> anyhow::Result<()> {
        let ticket = self.state.seq.begin();
        let (conversation, messages) = self.state.api.get_conversation(id).await?;
        if !self.state.seq.admit(ticket) {
            // A later switch superseded this one.
            return Ok(());
        }

        self.render_transcript(&conversation, &messages);
        self.session = Some(ChatSession::new(conversation, messages));
        Ok(())
    }

    async fn new_conversation(&mut self, multi: bool, rl: &mut DefaultEditor) {
        if multi {
            if let Err(e) = self.pending.stash(PendingAction::CreateConversation) {
                eprintln!("\x1B[31merror: {e}\x1B[0m");
                return;
            }
            match self.pick_participants(rl) {
                Some(participants) => {
                    // Selection applied: resume the parked create.
                    self.pending.resume();
                    self.create_conversation("multi_entity", participants).await;
                }
                None => self.pending.discard(),
            }
        } else {
            match self.default_entity() {
                Some(entity_id) => {
                    self.create_conversation("normal", vec![entity_id]).await;
                }
                None => eprintln!("\x1B[31mno entities available\x1B[0m"),
            }
        }
    }

    fn default_entity(&self) -> Option<String> {
        self.state
            .config
            .chat
            .default_entity
            .clone()
            .or_else(|| self.state.entities.first().map(|e| e.id.clone()))
    }

    async fn create_conversation(&mut self, kind: &str, participants: Vec<String>) {
        let req = CreateConversationRequest {
            kind: kind.to_string(),
            participants,
        };
        match self.state.api.create_conversation(&req).await {
            Ok(conversation) => {
                eprintln!(
                    "Started {} conversation {}.",
                    if conversation.is_multi_entity() {
                        "a multi-entity"
                    } else {
                        "a"
                    },
                    conversation.id
                );
                self.session = Some(ChatSession::new(conversation, Vec::new()));
            }
            Err(e) => eprintln!("\x1B[31merror: {e}\x1B[0m"),
        }
    }

    fn render_transcript(&self, conversation: &Conversation, messages: &[pl_domain::chat::Message]) {
        eprintln!(
            "── {} ──",
            conversation.title.as_deref().unwrap_or("(untitled)")
        );
        for message in messages {
            match message.role {
                Role::Human => eprintln!("you> {}", message.content),
                Role::Assistant => {
                    let speaker = message
                        .entity_id
                        .as_deref()
                        .map(|id| self.state.entity_label(id))
                        .unwrap_or("assistant");
                    let tail = if message.incomplete { " (incomplete)" } else { "" };
                    eprintln!("{speaker}> {}{tail}", message.content);
                }
            }
        }
    }

    fn show_memories(&self) {
        let Some(session) = &self.session else {
            eprintln!("No open conversation.");
            return;
        };
        let memory = session.memory();
        if memory.is_empty() {
            eprintln!("No retrieved memories yet.");
            return;
        }

        for item in memory.flat() {
            eprintln!("  {}  {}", item.id, item.content);
        }
        for partition in memory.entities() {
            let label = partition
                .label
                .as_deref()
                .unwrap_or_else(|| self.state.entity_label(&partition.entity_id));
            eprintln!("  [{label}]");
            for item in &partition.items {
                eprintln!("    {}  {}", item.id, item.content);
            }
        }
    }

    // ── Sending ──────────────────────────────────────────────────────

    async fn send_text(&mut self, text: &str, rl: &mut DefaultEditor) {
        if self.session.is_none() {
            // First send creates the conversation implicitly.
            self.new_conversation(false, rl).await;
            if self.session.is_none() {
                return;
            }
        }

        let plan = self
            .session
            .as_mut()
            .unwrap()
            .prepare_send(text, &[], None, false);

        match plan {
            Ok(SendPlan::Open { responder, permit }) => {
                self.run_exchange(
                    TurnRequest::Send {
                        content: text.to_string(),
                    },
                    responder,
                    permit,
                    rl,
                )
                .await;
            }

            Ok(SendPlan::AwaitResponder { participants }) => {
                if let Err(e) = self.pending.stash(PendingAction::SendMessage {
                    content: text.to_string(),
                    attachments: Vec::new(),
                }) {
                    eprintln!("\x1B[31merror: {e}\x1B[0m");
                    return;
                }

                match self.pick_responder(&participants, rl) {
                    Some(responder) => {
                        let Some(PendingAction::SendMessage {
                            content,
                            attachments,
                        }) = self.pending.resume()
                        else {
                            return;
                        };
                        let resumed = self.session.as_mut().unwrap().prepare_send(
                            &content,
                            &attachments,
                            Some(responder.as_str()),
                            true,
                        );
                        match resumed {
                            Ok(SendPlan::Open { responder, permit }) => {
                                self.run_exchange(
                                    TurnRequest::Send { content },
                                    responder,
                                    permit,
                                    rl,
                                )
                                .await;
                            }
                            Ok(_) => eprintln!("\x1B[31merror: selection did not apply\x1B[0m"),
                            Err(e) => eprintln!("\x1B[31merror: {e}\x1B[0m"),
                        }
                    }
                    None => self.pending.discard(),
                }
            }

            Ok(SendPlan::AwaitParticipants) => {
                eprintln!("This conversation has no participants yet; use /new multi.");
            }

            Err(e) => eprintln!("\x1B[31merror: {e}\x1B[0m"),
        }
    }

    async fn regenerate(&mut self, rl: &mut DefaultEditor) {
        let Some(session) = self.session.as_mut() else {
            eprintln!("No open conversation.");
            return;
        };

        // The latest stored user message anchors the regenerate.
        let Some(message_id) = session
            .transcript()
            .messages()
            .iter()
            .rev()
            .find(|m| m.role == Role::Human && m.id.is_some())
            .and_then(|m| m.id.clone())
        else {
            eprintln!("Nothing to regenerate yet.");
            return;
        };

        match session.prepare_regenerate(&message_id, None, false) {
            Ok(SendPlan::Open { responder, permit }) => {
                self.run_exchange(
                    TurnRequest::Regenerate { message_id },
                    responder,
                    permit,
                    rl,
                )
                .await;
            }

            Ok(SendPlan::AwaitResponder { participants }) => {
                if let Err(e) = self.pending.stash(PendingAction::Regenerate {
                    message_id: message_id.clone(),
                }) {
                    eprintln!("\x1B[31merror: {e}\x1B[0m");
                    return;
                }

                match self.pick_responder(&participants, rl) {
                    Some(responder) => {
                        let Some(PendingAction::Regenerate { message_id }) =
                            self.pending.resume()
                        else {
                            return;
                        };
                        let resumed = self.session.as_mut().unwrap().prepare_regenerate(
                            &message_id,
                            Some(responder.as_str()),
                            true,
                        );
                        match resumed {
                            Ok(SendPlan::Open { responder, permit }) => {
                                self.run_exchange(
                                    TurnRequest::Regenerate { message_id },
                                    responder,
                                    permit,
                                    rl,
                                )
                                .await;
                            }
                            Ok(_) => eprintln!("\x1B[31merror: selection did not apply\x1B[0m"),
                            Err(e) => eprintln!("\x1B[31merror: {e}\x1B[0m"),
                        }
                    }
                    None => self.pending.discard(),
                }
            }

            Ok(SendPlan::AwaitParticipants) => {
                eprintln!("This conversation has no participants yet.");
            }

            Err(e) => eprintln!("\x1B[31merror: {e}\x1B[0m"),
        }
    }

    // ── Turn driving ─────────────────────────────────────────────────

    /// Run a turn and any continuation turns the user requests after it.
    async fn run_exchange(
        &mut self,
        request: TurnRequest,
        responder: Option<String>,
        permit: SendPermit,
        rl: &mut DefaultEditor,
    ) {
        let mut next = Some((request, responder, permit));

        while let Some((request, responder, permit)) = next.take() {
            let offers = self.run_single_turn(request, responder, permit).await;

            let Some(participants) = offers else { break };
            let Some(chosen) = self.pick_continuation_responder(&participants, rl) else {
                break;
            };

            match self
                .session
                .as_mut()
                .unwrap()
                .prepare_continuation(&chosen)
            {
                Ok(SendPlan::Open { responder, permit }) => {
                    next = Some((TurnRequest::Continue, responder, permit));
                }
                Ok(_) => {}
                Err(e) => eprintln!("\x1B[31merror: {e}\x1B[0m"),
            }
        }
    }

    /// Open the stream for one turn, drive it to resolution, and render
    /// the result.  Returns responder candidates when continuation mode
    /// applies.
    async fn run_single_turn(
        &mut self,
        request: TurnRequest,
        responder: Option<String>,
        permit: SendPermit,
    ) -> Option<Vec<String>> {
        let (conversation_id, is_multi) = {
            let session = self.session.as_ref().expect("turn requires a session");
            (
                session.conversation().id.clone(),
                session.conversation().is_multi_entity(),
            )
        };
        let model = self.model_override();
        let temperature = self.state.config.chat.temperature;

        let opened = match &request {
            TurnRequest::Send { content } => {
                self.state
                    .api
                    .open_send_stream(&SendRequest {
                        conversation_id: conversation_id.clone(),
                        content: content.clone(),
                        attachments: Vec::new(),
                        responder_id: responder.clone(),
                        model,
                        temperature,
                    })
                    .await
            }
            TurnRequest::Regenerate { message_id } => {
                self.state
                    .api
                    .open_regenerate_stream(&RegenerateRequest {
                        conversation_id: conversation_id.clone(),
                        message_id: message_id.clone(),
                        responder_id: responder.clone(),
                        model,
                        temperature,
                    })
                    .await
            }
            TurnRequest::Continue => {
                let responder_id = responder.clone().expect("continuation names a responder");
                self.state
                    .api
                    .open_continue_stream(&ContinueRequest {
                        conversation_id: conversation_id.clone(),
                        responder_id,
                        model,
                        temperature,
                    })
                    .await
            }
        };

        let stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                // Transport failure before any stream existed: the permit
                // drops here and the gate reopens.
                eprintln!("\x1B[31merror: {e}\x1B[0m");
                return None;
            }
        };

        if let Some(entity_id) = &responder {
            if is_multi {
                eprintln!("\x1B[2m[{}]\x1B[0m", self.state.entity_label(entity_id));
            }
        }

        // Ctrl+C during the stream cancels this turn only.
        let cancel = self.state.send_cancel.clone();
        cancel.rearm();
        let watcher = {
            let token = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    token.cancel();
                }
            })
        };

        let report = self
            .session
            .as_mut()
            .expect("turn requires a session")
            .drive_stream(stream, &cancel, permit, responder, |update| match update {
                TurnUpdate::TextDelta { text } => {
                    print!("{text}");
                    std::io::stdout().flush().ok();
                }
                TurnUpdate::ToolStarted { tool_name, .. } => {
                    eprintln!("\x1B[2m[tool: {tool_name}]\x1B[0m");
                }
                TurnUpdate::ToolFinished { tool_name, .. } => {
                    eprintln!("\x1B[2m[tool {tool_name} finished]\x1B[0m");
                }
                // Memory deltas render on demand via /memories.
                TurnUpdate::MemoryDelta { .. } => {}
                TurnUpdate::Finalized(_) => {}
            })
            .await;
        watcher.abort();

        match &report.outcome {
            TurnOutcome::Completed { usage, .. } => {
                println!();
                println!();
                if self.state.config.repl.show_usage {
                    if let Some(u) = usage {
                        eprintln!(
                            "\x1B[2m[{} in / {} out tokens]\x1B[0m",
                            u.input_tokens, u.output_tokens
                        );
                    }
                }
            }
            TurnOutcome::Cancelled { .. } => {
                println!();
                eprintln!("\x1B[2m(response incomplete)\x1B[0m");
            }
            TurnOutcome::Failed {
                message,
                server_reported,
            } => {
                // Server-reported errors show inline in the transcript
                // flow; transport failures surface via the notice alone.
                if *server_reported {
                    println!();
                    eprintln!("\x1B[31m[error: {message}]\x1B[0m");
                }
            }
        }

        for notice in self.session.as_mut().unwrap().take_notices() {
            eprintln!("\x1B[31m! {}\x1B[0m", notice.message);
        }

        // Persist the auto-derived title.
        if let Some(title) = &report.new_title {
            match self.state.api.set_title(&conversation_id, title).await {
                Ok(()) => eprintln!("\x1B[2m[conversation titled: {title}]\x1B[0m"),
                Err(e) => eprintln!("\x1B[2m[title not saved: {e}]\x1B[0m"),
            }
        }

        report.offer_responders
    }

    // ── Entity pickers ───────────────────────────────────────────────

    /// One responder from the participants; empty input dismisses.
    fn pick_responder(&self, participants: &[String], rl: &mut DefaultEditor) -> Option<String> {
        eprintln!("Choose a responder (enter to cancel):");
        self.print_numbered(participants);
        self.read_pick(participants, "responder> ", rl)
    }

    /// Continuation offer after a stored turn; empty input declines.
    fn pick_continuation_responder(
        &self,
        participants: &[String],
        rl: &mut DefaultEditor,
    ) -> Option<String> {
        eprintln!("Another entity responds? (enter to continue)");
        self.print_numbered(participants);
        self.read_pick(participants, "responder> ", rl)
    }

    /// ≥2 participants for a new multi-entity conversation; empty input
    /// dismisses.  Fewer than two never confirms.
    fn pick_participants(&self, rl: &mut DefaultEditor) -> Option<Vec<String>> {
        let all: Vec<String> = self.state.entities.iter().map(|e| e.id.clone()).collect();
        if all.len() < 2 {
            eprintln!("\x1B[31mneed at least 2 entities on the backend\x1B[0m");
            return None;
        }

        eprintln!("Pick ≥2 entities, comma-separated (enter to cancel):");
        self.print_numbered(&all);

        loop {
            let line = match rl.readline("entities> ") {
                Ok(line) => line,
                Err(_) => return None,
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return None;
            }

            let mut picked: Vec<String> = Vec::new();
            for part in trimmed.split(',') {
                let part = part.trim();
                let resolved = part
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| all.get(n.saturating_sub(1)).cloned())
                    .or_else(|| all.iter().find(|id| *id == part).cloned());
                match resolved {
                    Some(id) if !picked.contains(&id) => picked.push(id),
                    Some(_) => {}
                    None => {
                        picked.clear();
                        break;
                    }
                }
            }

            if picked.is_empty() {
                eprintln!("Unrecognized selection; use numbers or entity ids.");
                continue;
            }
            if let Err(e) = TurnCoordinator::validate_participants(&picked) {
                eprintln!("{e}");
                continue;
            }
            return Some(picked);
        }
    }

    fn print_numbered(&self, ids: &[String]) {
        for (i, id) in ids.iter().enumerate() {
            eprintln!("  {}. {}", i + 1, self.state.entity_label(id));
        }
    }

    fn read_pick(
        &self,
        participants: &[String],
        prompt: &str,
        rl: &mut DefaultEditor,
    ) -> Option<String> {
        loop {
            let line = match rl.readline(prompt) {
                Ok(line) => line,
                Err(_) => return None,
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return None;
            }

            if let Some(id) = trimmed
                .parse::<usize>()
                .ok()
                .and_then(|n| participants.get(n.saturating_sub(1)))
            {
                return Some(id.clone());
            }
            if let Some(id) = participants.iter().find(|id| *id == trimmed) {
                return Some(id.clone());
            }
            eprintln!("Pick a number between 1 and {}.", participants.len());
        }
    }
}
