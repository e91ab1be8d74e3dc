//! agentloop: drive resumable agent conversations from the command line
//!
//! Conversations are checkpointed to disk after every step, so a run that
//! pauses for human input can be resumed later, even from another process.

mod commands;
mod config;
mod observer;
mod oracle;
mod tools;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::UserConfig;

#[derive(Debug, Parser)]
#[command(name = "agentloop")]
#[command(about = "Resumable decide/execute agent loop", version)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Checkpoint directory (overrides config)
    #[arg(long, global = true, env = "AGENTLOOP_STORE_DIR")]
    store_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Send a message to a conversation
    Run {
        /// Conversation id
        #[arg(short, long)]
        conversation: String,

        /// The message to send
        #[arg(required = true)]
        message: Vec<String>,
    },

    /// Answer a conversation that is waiting for human input
    Resume {
        /// Conversation id
        #[arg(short, long)]
        conversation: String,

        /// The answer to deliver
        #[arg(required = true)]
        answer: Vec<String>,
    },

    /// Continue a conversation from its last checkpoint after a failure
    Recover {
        /// Conversation id
        #[arg(short, long)]
        conversation: String,
    },

    /// Print a stored conversation
    Show {
        /// Conversation id
        conversation: String,

        /// Output the raw checkpoint as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored conversations
    List,

    /// Delete a stored conversation
    Forget {
        /// Conversation id
        conversation: String,
    },

    /// Run the built-in examples offline
    Demo,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Write a default config file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = UserConfig::load()?;
    let store_dir = cli.store_dir.as_deref();

    match cli.command {
        Commands::Run {
            conversation,
            message,
        } => {
            let store = commands::open_store(&config, store_dir).await?;
            let controller = commands::build_controller(&config, store, cli.verbose);
            commands::run(&controller, &conversation, &message.join(" ")).await
        }
        Commands::Resume {
            conversation,
            answer,
        } => {
            let store = commands::open_store(&config, store_dir).await?;
            let controller = commands::build_controller(&config, store, cli.verbose);
            commands::resume(&controller, &conversation, &answer.join(" ")).await
        }
        Commands::Recover { conversation } => {
            let store = commands::open_store(&config, store_dir).await?;
            let controller = commands::build_controller(&config, store, cli.verbose);
            commands::recover(&controller, &conversation).await
        }
        Commands::Show { conversation, json } => {
            let store = commands::open_store(&config, store_dir).await?;
            commands::show(store.as_ref(), &conversation, json).await
        }
        Commands::List => {
            let store = commands::open_store(&config, store_dir).await?;
            commands::list(store.as_ref()).await
        }
        Commands::Forget { conversation } => {
            let store = commands::open_store(&config, store_dir).await?;
            commands::forget(store.as_ref(), &conversation).await
        }
        Commands::Demo => commands::demo(&config, cli.verbose).await,
        Commands::Config { action } => match action {
            ConfigAction::Init => commands::config_init(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_resume() {
        let cli = Cli::parse_from(["agentloop", "resume", "-c", "demo_789", "yes", "please"]);
        match cli.command {
            Commands::Resume {
                conversation,
                answer,
            } => {
                assert_eq!(conversation, "demo_789");
                assert_eq!(answer.join(" "), "yes please");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
