//! # hub-events
//!
//! Client-side publisher for the event hub API.
//!
//! ## Design Principles
//!
//! - Every event belongs to exactly one schema-bound topic
//! - Events are validated locally (envelope first, then payload) before
//!   anything touches the network
//! - A session queues events for one unit of work; flushing publishes them,
//!   rolling back discards them
//! - Delivery retries transient failures within a time budget and narrows
//!   bulk retries to the records that still fail
//!
//! ## Topics
//!
//! A topic is named `{category}.{Entity}{Action}`, e.g. `testing.TestCreated`.
//! Topics and their payload schemas are loaded into a [`TopicRegistry`] from
//! a YAML or JSON definitions document.
//!
//! ## Offline mode
//!
//! A client without an API URL validates and logs events but sends nothing.
//!
//! ## Example
//!
//! ```no_run
//! use hub_events::{ClientConfig, EventClient, Publish, TopicRegistry};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = TopicRegistry::from_path("topics.yaml")?;
//! let mut config = ClientConfig::new("billing");
//! config.api_url = Some("https://events.example.com".into());
//!
//! let client = EventClient::new(config, registry)?;
//! let mut session = client.user_session("user-1234", "job-5678");
//!
//! session
//!     .publish(Publish::new().entity("Invoice").action("Paid").data(json!({"id": "inv-1"})))
//!     .await?;
//! session.publish_shorthand("created_invoice", json!({"id": "inv-2"})).await?;
//! session.flush().await?;
//! # Ok(())
//! # }
//! ```

mod backoff;
mod client;
mod delivery;
mod envelope;
mod error;
mod event;
mod registry;
mod session;
mod shorthand;
mod topic;
mod transport;

pub use backoff::RetryPolicy;
pub use client::{ClientConfig, EventClient};
pub use delivery::{
    assess_attempt, correlation_headers, extract_failed_record, is_retryable_error_type,
    DeliveryReport, Payload, ResilientDelivery, RetryState, Verdict, CORRELATION_HEADER,
    RETRYABLE_ERROR_TYPES,
};
pub use envelope::{envelope_schema, validate_envelope, Actor, ActorType};
pub use error::{
    ClientError, DeliveryError, PublishError, RegistryError, TransportError, ValidationError,
};
pub use event::Event;
pub use registry::TopicRegistry;
pub use session::{EventSession, Publish, SessionContext, MAX_BULK_SIZE, SMALL_BATCH_THRESHOLD};
pub use shorthand::{resolve_shorthand, shorthand_for};
pub use topic::{topic_name, Topic};
pub use transport::{
    Headers, HttpTransport, MockTransport, RecordedRequest, Transport, TransportResponse,
};
