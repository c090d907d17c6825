//! Error handling and display for the CLI.

use colored::Colorize;
use hub_events::{ClientError, DeliveryError, PublishError, RegistryError};
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid JSON in --data: {0}")]
    InvalidData(#[source] serde_json::Error),

    #[error("Replay file must contain a JSON array of publish requests: {0}")]
    InvalidReplayFile(String),
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    if let Some(hint) = hint_for(err) {
        eprintln!("\n{}", format!("Hint: {hint}").yellow());
    }
}

fn hint_for(err: &anyhow::Error) -> Option<&'static str> {
    if let Some(publish_err) = err.downcast_ref::<PublishError>() {
        return match publish_err {
            PublishError::TopicNotFound(_) | PublishError::ShorthandNotResolved(_) => {
                Some("Run `hubctl topics` to list the topics that are defined.")
            }
            PublishError::Validation(_) => {
                Some("Check --data against the topic schema with `hubctl validate`.")
            }
            PublishError::Delivery(DeliveryError::TimeBudgetExhausted { .. }) => Some(
                "The event API kept failing. Check HUB_API_URL and your network connection.",
            ),
            PublishError::Delivery(DeliveryError::Rejected { .. }) => {
                Some("The event API refused the request; retrying will not help.")
            }
            _ => None,
        };
    }

    if let Some(client_err) = err.downcast_ref::<ClientError>() {
        return match client_err {
            ClientError::MissingDefaultCategory => {
                Some("Set HUB_DEFAULT_CATEGORY or add `default_category` to the topic definitions.")
            }
            _ => None,
        };
    }

    match err.downcast_ref::<RegistryError>() {
        Some(RegistryError::Io { .. }) => {
            Some("Point HUB_TOPICS_FILE (or --topics) at your topic definitions.")
        }
        Some(_) => Some("Topic definitions map category -> Entity -> Action -> JSON schema."),
        None => None,
    }
}
