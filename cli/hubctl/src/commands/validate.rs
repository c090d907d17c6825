//! Validate command (pre-flight checks, no network).

use anyhow::{Context, Result};
use clap::Args;
use hub_events::PublishError;
use serde_json::json;

use crate::output::{print_single, print_success, OutputFormat};

use super::{CommandContext, EventArgs};

/// Validate an event against the envelope and its topic schema.
#[derive(Debug, Args)]
pub struct ValidateCommand {
    #[command(flatten)]
    event: EventArgs,
}

impl ValidateCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let client = ctx.client(true)?;
        let mut session = client.service_session("hubctl-validate");

        session.publish(self.event.to_publish()?).await?;

        let event = session
            .events()
            .first()
            .context("validated event was not queued")?;
        event.validate().map_err(PublishError::from)?;
        let topic = event.topic().name();

        match ctx.format {
            OutputFormat::Table => print_success(&format!("Event is valid for {topic}")),
            OutputFormat::Json => print_single(&json!({
                "topic": topic,
                "valid": true,
                "request": event.request_json(),
            })),
        }
        Ok(())
    }
}
