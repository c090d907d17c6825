//! Topics command.

use anyhow::Result;
use clap::Args;
use hub_events::{shorthand_for, Topic};
use serde::Serialize;
use tabled::Tabled;

use crate::output::print_output;

use super::CommandContext;

/// List the defined topics.
#[derive(Debug, Args)]
pub struct TopicsCommand {
    /// Only list topics in this category.
    #[arg(long)]
    category: Option<String>,
}

#[derive(Debug, Serialize, Tabled)]
struct TopicRow {
    #[tabled(rename = "Topic")]
    name: String,

    #[tabled(rename = "Category")]
    category: String,

    #[tabled(rename = "Entity")]
    entity: String,

    #[tabled(rename = "Action")]
    action: String,

    #[tabled(rename = "Shorthand")]
    shorthand: String,
}

impl From<&Topic> for TopicRow {
    fn from(topic: &Topic) -> Self {
        Self {
            name: topic.name(),
            category: topic.category().to_string(),
            entity: topic.entity().to_string(),
            action: topic.action().to_string(),
            shorthand: shorthand_for(topic),
        }
    }
}

impl TopicsCommand {
    pub fn run(self, ctx: CommandContext) -> Result<()> {
        let registry = ctx.registry()?;

        let rows: Vec<TopicRow> = registry
            .topics()
            .filter(|topic| {
                self.category
                    .as_deref()
                    .is_none_or(|category| topic.category() == category)
            })
            .map(|topic| TopicRow::from(topic.as_ref()))
            .collect();

        print_output(&rows, ctx.format);
        Ok(())
    }
}
