pub mod chat;
pub mod config;
pub mod convos;
pub mod doctor;
pub mod memory;
pub mod transfer;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Polylogue — a terminal client for a multi-entity conversational-AI
/// platform.
#[derive(Debug, Parser)]
#[command(name = "polylogue", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open the interactive chat REPL (default when no subcommand is given).
    Chat {
        /// Conversation id to resume.
        #[arg(long)]
        conversation: Option<String>,
    },
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Conversation management.
    #[command(subcommand)]
    Convos(ConvosCommand),
    /// Inspect the backend's long-term memory.
    #[command(subcommand)]
    Memories(MemoriesCommand),
    /// Export a conversation as the backend's JSON blob.
    Export {
        /// Conversation id.
        id: String,
        /// Write to this file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Import a previously exported conversation blob.
    Import {
        /// Path to the exported JSON file.
        file: PathBuf,
    },
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

#[derive(Debug, Subcommand)]
pub enum ConvosCommand {
    /// List conversations.
    List {
        /// Include archived conversations.
        #[arg(long)]
        archived: bool,
    },
    /// Archive a conversation.
    Archive { id: String },
    /// Restore an archived conversation.
    Unarchive { id: String },
    /// Delete a conversation permanently.
    Delete { id: String },
}

#[derive(Debug, Subcommand)]
pub enum MemoriesCommand {
    /// List stored memories.
    List {
        /// Restrict to one entity.
        #[arg(long)]
        entity: Option<String>,
        #[arg(long, default_value = "20")]
        limit: u32,
    },
    /// Search memories by content.
    Search {
        query: String,
        #[arg(long, default_value = "10")]
        limit: u32,
    },
    /// Show memory store statistics.
    Stats,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `PL_CONFIG` (or
/// `polylogue.toml` by default).  Returns the parsed config and the path
/// that was used.
pub fn load_config() -> anyhow::Result<(pl_domain::config::Config, String)> {
    let config_path =
        std::env::var("PL_CONFIG").unwrap_or_else(|_| "polylogue.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        pl_domain::config::Config::default()
    };

    Ok((config, config_path))
}
