//! Publish command.

use anyhow::Result;
use clap::Args;
use hub_events::{Actor, ActorType};
use serde_json::json;

use crate::output::{print_info, print_single, print_success, OutputFormat};

use super::{CommandContext, EventArgs};

/// Publish one event immediately.
#[derive(Debug, Args)]
pub struct PublishCommand {
    #[command(flatten)]
    event: EventArgs,

    /// Who the event is attributed to: user, service or third-party.
    #[arg(long, default_value = "service")]
    actor_type: ActorType,

    /// Actor id (defaults to the service name; required for users).
    #[arg(long)]
    actor_id: Option<String>,

    /// Job id sent as the correlation header.
    #[arg(long, env = "HUB_JOB_ID", default_value = "hubctl")]
    job_id: String,
}

impl PublishCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let actor_id = match (self.actor_type, self.actor_id) {
            (_, Some(id)) => id,
            (ActorType::User, None) => {
                anyhow::bail!("--actor-id is required when --actor-type is user")
            }
            (_, None) => ctx.config.service_name.clone(),
        };

        let client = ctx.client(false)?;
        let mut session = client
            .session(Actor::new(actor_id, self.actor_type), &self.job_id)
            .publish_immediately(true);

        let request = self.event.to_publish()?;
        session.publish(request).await?;

        let destination = client.publish_url().unwrap_or("(offline)").to_string();
        match ctx.format {
            OutputFormat::Table => {
                if ctx.is_offline() {
                    print_info("HUB_API_URL is not set; the event was validated and logged only");
                }
                print_success(&format!("Published event to {destination}"));
            }
            OutputFormat::Json => print_single(&json!({
                "published": !ctx.is_offline(),
                "destination": destination,
                "job_id": self.job_id,
            })),
        }
        Ok(())
    }
}
