//! CLI commands.

mod publish;
mod replay;
mod topics;
mod validate;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hub_events::{EventClient, Publish, TopicRegistry};
use serde_json::Value;

use crate::config::Config;
use crate::error::CliError;
use crate::output::OutputFormat;

/// hubctl - Inspect event topics and publish events to the event hub.
#[derive(Debug, Parser)]
#[command(name = "hubctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Topic definitions file (overrides HUB_TOPICS_FILE).
    #[arg(long, global = true)]
    topics: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the defined topics.
    Topics(topics::TopicsCommand),

    /// Validate an event against its topic without sending it.
    Validate(validate::ValidateCommand),

    /// Publish one event immediately.
    Publish(publish::PublishCommand),

    /// Queue a file of publish requests in one session and flush it.
    Replay(replay::ReplayCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self, mut config: Config) -> Result<()> {
        if let Some(topics) = self.topics {
            config.topics_file = topics;
        }

        let ctx = CommandContext {
            config,
            format: self.format,
        };

        match self.command {
            Commands::Topics(cmd) => cmd.run(ctx),
            Commands::Validate(cmd) => cmd.run(ctx).await,
            Commands::Publish(cmd) => cmd.run(ctx).await,
            Commands::Replay(cmd) => cmd.run(ctx).await,
            Commands::Version => {
                println!("hubctl {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub config: Config,
    pub format: OutputFormat,
}

impl CommandContext {
    /// Load the topic definitions.
    pub fn registry(&self) -> Result<TopicRegistry> {
        let path = &self.config.topics_file;
        TopicRegistry::from_path(path)
            .with_context(|| format!("Failed to load topics from {}", path.display()))
    }

    /// Build an event client; `offline` never touches the network.
    pub fn client(&self, offline: bool) -> Result<Arc<EventClient>> {
        let client = EventClient::new(self.config.client_config(offline), self.registry()?)?;
        Ok(client)
    }

    pub fn is_offline(&self) -> bool {
        self.config.api_url.is_none()
    }
}

/// Topic and payload flags shared by `validate` and `publish`.
#[derive(Debug, Args)]
pub struct EventArgs {
    /// Entity name, e.g. `Test`.
    #[arg(long)]
    entity: String,

    /// Action name, e.g. `Created`.
    #[arg(long)]
    action: String,

    /// Category (defaults to the configured default category).
    #[arg(long)]
    category: Option<String>,

    /// Event payload as a JSON object.
    #[arg(long)]
    data: String,
}

impl EventArgs {
    fn to_publish(&self) -> Result<Publish> {
        let data: Value = serde_json::from_str(&self.data).map_err(CliError::InvalidData)?;

        let mut request = Publish::new()
            .entity(&self.entity)
            .action(&self.action)
            .data(data);
        if let Some(category) = &self.category {
            request = request.category(category);
        }
        Ok(request)
    }
}
