use std::sync::Arc;

use clap::Parser;

mod bootstrap;
mod commands;
mod state;

use commands::{Cli, Command, ConfigCommand, ConvosCommand, MemoriesCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to the chat REPL when no subcommand is given.
        None => {
            bootstrap::init_tracing();
            let (config, _) = commands::load_config()?;
            commands::chat::chat(Arc::new(config), None).await
        }
        Some(Command::Chat { conversation }) => {
            bootstrap::init_tracing();
            let (config, _) = commands::load_config()?;
            commands::chat::chat(Arc::new(config), conversation).await
        }
        Some(Command::Doctor) => {
            let (config, config_path) = commands::load_config()?;
            let passed = commands::doctor::run(&config, &config_path).await?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = commands::load_config()?;
            let valid = commands::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _) = commands::load_config()?;
            commands::config::show(&config);
            Ok(())
        }
        Some(Command::Convos(cmd)) => {
            bootstrap::init_tracing();
            let (config, _) = commands::load_config()?;
            let state = bootstrap::build_app_state(Arc::new(config)).await?;
            match cmd {
                ConvosCommand::List { archived } => commands::convos::list(&state, archived).await,
                ConvosCommand::Archive { id } => commands::convos::archive(&state, &id).await,
                ConvosCommand::Unarchive { id } => commands::convos::unarchive(&state, &id).await,
                ConvosCommand::Delete { id } => commands::convos::delete(&state, &id).await,
            }
        }
        Some(Command::Memories(cmd)) => {
            bootstrap::init_tracing();
            let (config, _) = commands::load_config()?;
            let state = bootstrap::build_app_state(Arc::new(config)).await?;
            match cmd {
                MemoriesCommand::List { entity, limit } => {
                    commands::memory::list(&state, entity.as_deref(), limit).await
                }
                MemoriesCommand::Search { query, limit } => {
                    commands::memory::search(&state, &query, limit).await
                }
                MemoriesCommand::Stats => commands::memory::stats(&state).await,
            }
        }
        Some(Command::Export { id, out }) => {
            bootstrap::init_tracing();
            let (config, _) = commands::load_config()?;
            let state = bootstrap::build_app_state(Arc::new(config)).await?;
            commands::transfer::export(&state, &id, out.as_deref()).await
        }
        Some(Command::Import { file }) => {
            bootstrap::init_tracing();
            let (config, _) = commands::load_config()?;
            let state = bootstrap::build_app_state(Arc::new(config)).await?;
            commands::transfer::import(&state, &file).await
        }
        Some(Command::Version) => {
            println!("polylogue {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
