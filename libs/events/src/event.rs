//! A single occurrence bound to a topic and a session.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;

use crate::delivery::{correlation_headers, Payload, ResilientDelivery};
use crate::envelope::validate_envelope;
use crate::error::{PublishError, ValidationError};
use crate::session::SessionContext;
use crate::topic::Topic;

/// One event waiting to be published.
#[derive(Clone)]
pub struct Event {
    topic: Arc<Topic>,
    data: Value,
    context: Arc<SessionContext>,
}

impl Event {
    pub(crate) fn new(topic: Arc<Topic>, data: Value, context: Arc<SessionContext>) -> Self {
        Self {
            topic,
            data,
            context,
        }
    }

    pub fn topic(&self) -> &Arc<Topic> {
        &self.topic
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Replace the payload before publishing.
    pub fn set_data(&mut self, data: Value) {
        self.data = data;
    }

    /// Point the event at another topic before publishing.
    pub fn set_topic(&mut self, topic: Arc<Topic>) {
        self.topic = topic;
    }

    /// The request body for the event API.
    pub fn request_json(&self) -> Value {
        json!({
            "action": self.topic.action(),
            "category": self.topic.category(),
            "entity": self.topic.entity(),
            "data": self.data,
            "actor": self.context.actor(),
        })
    }

    /// Check the envelope, then the payload against the topic schema.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_envelope(&self.request_json())?;
        self.topic.validate_data(&self.data)
    }

    /// Validate and deliver this event on its own.
    ///
    /// Without a configured event endpoint the event is only logged.
    pub async fn publish(&self) -> Result<(), PublishError> {
        self.validate()?;

        let request_json = self.request_json();
        let client = self.context.client();

        let Some(url) = client.publish_url() else {
            info!(
                topic = %self,
                job_id = %self.context.job_id(),
                payload = %request_json,
                "No event API configured; logging event only"
            );
            return Ok(());
        };

        info!(topic = %self, job_id = %self.context.job_id(), "Publishing event");

        let delivery = ResilientDelivery::new(
            client.transport(),
            url,
            correlation_headers(self.context.job_id()),
            client.retry_policy().clone(),
        );
        delivery.invoke(Payload::Single(request_json)).await?;

        Ok(())
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.topic)
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("topic", &self.topic.name())
            .field("data", &self.data)
            .field("actor", self.context.actor())
            .field("job_id", &self.context.job_id())
            .finish()
    }
}
