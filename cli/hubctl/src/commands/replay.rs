//! Replay command: queue a file of publish requests and flush them together.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use hub_events::{Publish, SMALL_BATCH_THRESHOLD};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::CliError;
use crate::output::{print_info, print_single, print_success, OutputFormat};

use super::CommandContext;

/// Queue every request in FILE in one session, then flush.
#[derive(Debug, Args)]
pub struct ReplayCommand {
    /// JSON array of `{action, entity, category?, data}` objects.
    file: PathBuf,

    /// Discard the queued events instead of sending them.
    #[arg(long)]
    rollback: bool,

    /// Job id sent as the correlation header.
    #[arg(long, env = "HUB_JOB_ID", default_value = "hubctl-replay")]
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct ReplayRequest {
    action: String,
    entity: String,
    #[serde(default)]
    category: Option<String>,
    data: Value,
}

impl From<ReplayRequest> for Publish {
    fn from(request: ReplayRequest) -> Self {
        let publish = Publish::new()
            .action(request.action)
            .entity(request.entity)
            .data(request.data);
        match request.category {
            Some(category) => publish.category(category),
            None => publish,
        }
    }
}

fn read_requests(path: &Path) -> Result<Vec<ReplayRequest>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let requests = serde_json::from_str(&contents)
        .map_err(|e| CliError::InvalidReplayFile(e.to_string()))?;
    Ok(requests)
}

impl ReplayCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let requests = read_requests(&self.file)?;
        let count = requests.len();

        let client = ctx.client(false)?;
        let mut session = client.service_session(&self.job_id);

        for (index, request) in requests.into_iter().enumerate() {
            session
                .publish(request.into())
                .await
                .with_context(|| format!("Request #{index} in {}", self.file.display()))?;
        }

        debug!(count, file = %self.file.display(), job_id = %self.job_id, "Queued replay requests");

        let outcome = if self.rollback {
            session.rollback();
            "rolled back"
        } else {
            session.flush().await?;
            if count > SMALL_BATCH_THRESHOLD {
                "flushed in bulk"
            } else {
                "flushed"
            }
        };

        match ctx.format {
            OutputFormat::Table => {
                if ctx.is_offline() && !self.rollback {
                    print_info("HUB_API_URL is not set; events were validated and logged only");
                }
                print_success(&format!("{count} events {outcome}"));
            }
            OutputFormat::Json => print_single(&json!({
                "events": count,
                "outcome": outcome,
                "job_id": self.job_id,
            })),
        }
        Ok(())
    }
}
