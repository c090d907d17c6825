//! Event sessions: per-request or per-job queues of events.
//!
//! A session collects events while a unit of work runs and publishes them on
//! [`EventSession::flush`], or throws them away on [`EventSession::rollback`]
//! when the work failed. Small queues are delivered event by event; larger
//! ones go through the bulk endpoint in chunks.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::client::EventClient;
use crate::delivery::{correlation_headers, Payload, ResilientDelivery};
use crate::envelope::{Actor, ActorType};
use crate::error::PublishError;
use crate::event::Event;
use crate::shorthand::resolve_shorthand;
use crate::topic::Topic;

/// Queues of this many events or fewer are published one event at a time.
pub const SMALL_BATCH_THRESHOLD: usize = 5;

/// Maximum records in one bulk request.
pub const MAX_BULK_SIZE: usize = 250;

/// Who is acting, for which job, through which client.
#[derive(Debug)]
pub struct SessionContext {
    actor: Actor,
    job_id: String,
    client: Arc<EventClient>,
}

impl SessionContext {
    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn client(&self) -> &Arc<EventClient> {
        &self.client
    }
}

/// Named arguments for [`EventSession::publish`].
///
/// `action`, `entity` and `data` are required; `category` falls back to the
/// client's default category.
#[derive(Debug, Clone, Default)]
pub struct Publish {
    action: Option<String>,
    entity: Option<String>,
    data: Option<Value>,
    category: Option<String>,
}

impl Publish {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// A queue of events attributed to one actor and job.
#[derive(Debug)]
pub struct EventSession {
    context: Arc<SessionContext>,
    publish_immediately: bool,
    events: Vec<Event>,
}

impl EventSession {
    /// Create a session whose events are queued until [`flush`](Self::flush).
    pub fn new(actor: Actor, job_id: impl Into<String>, client: Arc<EventClient>) -> Self {
        Self {
            context: Arc::new(SessionContext {
                actor,
                job_id: job_id.into(),
                client,
            }),
            publish_immediately: false,
            events: Vec::new(),
        }
    }

    /// Publish each event as soon as it is created instead of queueing it.
    pub fn publish_immediately(mut self, immediately: bool) -> Self {
        self.publish_immediately = immediately;
        self
    }

    pub fn is_immediate(&self) -> bool {
        self.publish_immediately
    }

    pub fn actor_id(&self) -> &str {
        &self.context.actor.id
    }

    pub fn actor_type(&self) -> ActorType {
        self.context.actor.actor_type
    }

    pub fn job_id(&self) -> &str {
        &self.context.job_id
    }

    pub fn client(&self) -> &Arc<EventClient> {
        &self.context.client
    }

    /// Events queued and not yet flushed or rolled back.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Mutable access to queued events, e.g. to amend a payload before flush.
    pub fn events_mut(&mut self) -> &mut [Event] {
        &mut self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Publish `data` to the topic named by the request.
    pub async fn publish(&mut self, request: Publish) -> Result<(), PublishError> {
        let Publish {
            action,
            entity,
            data,
            category,
        } = request;

        let (Some(action), Some(entity), Some(data)) = (action, entity, data) else {
            return Err(PublishError::Usage(
                "publish requires named `action`, `entity` and `data` arguments".to_string(),
            ));
        };

        let client = Arc::clone(&self.context.client);
        let category = category.as_deref().unwrap_or(client.default_category());
        let topic = client.resolve(category, &entity, &action)?;

        self.publish_to(topic, data).await
    }

    /// Publish through a shorthand name such as `created_test` or
    /// `test_created`, always in the default category.
    pub async fn publish_shorthand(&mut self, name: &str, data: Value) -> Result<(), PublishError> {
        let client = &self.context.client;
        let topic = resolve_shorthand(client.registry(), client.default_category(), name)
            .ok_or_else(|| PublishError::ShorthandNotResolved(name.to_string()))?;

        self.publish_to(topic, data).await
    }

    async fn publish_to(&mut self, topic: Arc<Topic>, data: Value) -> Result<(), PublishError> {
        let event = Event::new(topic, data, Arc::clone(&self.context));

        if self.publish_immediately {
            event.publish().await
        } else {
            debug!(topic = %event, job_id = %self.context.job_id, "Queued event");
            self.events.push(event);
            Ok(())
        }
    }

    /// Publish every queued event and empty the queue.
    ///
    /// The queue is emptied even when delivery fails. Every event (or bulk
    /// chunk) is attempted; the first failure is returned.
    pub async fn flush(&mut self) -> Result<(), PublishError> {
        let events = std::mem::take(&mut self.events);
        if events.is_empty() {
            return Ok(());
        }

        info!(
            job_id = %self.context.job_id,
            count = events.len(),
            bulk = events.len() > SMALL_BATCH_THRESHOLD,
            "Flushing events"
        );

        if events.len() > SMALL_BATCH_THRESHOLD {
            return self.publish_bulk(&events).await;
        }

        let mut first_error = None;
        for event in &events {
            if let Err(e) = event.publish().await {
                error!(topic = %event, job_id = %self.context.job_id, error = %e, "Failed to publish event");
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Publish `events` through the bulk endpoint in chunks of
    /// [`MAX_BULK_SIZE`], preserving order.
    ///
    /// Events failing validation are logged and left out; the rest are
    /// still sent. The first error (validation or delivery) is returned.
    pub async fn publish_bulk(&self, events: &[Event]) -> Result<(), PublishError> {
        let mut first_error = None;
        let mut valid = Vec::with_capacity(events.len());
        for event in events {
            match event.validate() {
                Ok(()) => valid.push(event),
                Err(e) => {
                    error!(
                        topic = %event,
                        job_id = %self.context.job_id,
                        error = %e,
                        "Dropping invalid event from bulk publish"
                    );
                    first_error.get_or_insert(PublishError::from(e));
                }
            }
        }

        let client = &self.context.client;
        let Some(url) = client.publish_bulk_url() else {
            info!(
                job_id = %self.context.job_id,
                count = valid.len(),
                topics = ?valid.iter().map(|e| e.topic().name()).collect::<Vec<_>>(),
                "No bulk event API configured; logging events only"
            );
            return first_error.map_or(Ok(()), Err);
        };

        let delivery = ResilientDelivery::new(
            client.transport(),
            url,
            correlation_headers(&self.context.job_id),
            client.retry_policy().clone(),
        );

        for (index, chunk) in valid.chunks(MAX_BULK_SIZE).enumerate() {
            let records = chunk.iter().map(|event| event.request_json()).collect();

            match delivery.invoke(Payload::Bulk(records)).await {
                Ok(report) => debug!(
                    job_id = %self.context.job_id,
                    chunk = index,
                    records = report.records_sent,
                    attempts = report.attempts,
                    rejected_records = report.rejected_records,
                    "Delivered bulk chunk"
                ),
                Err(e) => {
                    error!(
                        job_id = %self.context.job_id,
                        chunk = index,
                        records = chunk.len(),
                        error = %e,
                        "Failed to deliver bulk chunk"
                    );
                    first_error.get_or_insert(PublishError::from(e));
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Discard every queued event without sending it.
    pub fn rollback(&mut self) {
        let discarded = std::mem::take(&mut self.events);
        if discarded.is_empty() {
            return;
        }

        warn!(
            job_id = %self.context.job_id,
            count = discarded.len(),
            topics = ?discarded.iter().map(|e| e.topic().name()).collect::<Vec<_>>(),
            "Rolled back unpublished events"
        );
    }
}
