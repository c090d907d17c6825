//! Event client: endpoints, topics and the transport shared by sessions.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::backoff::RetryPolicy;
use crate::envelope::{Actor, ActorType};
use crate::error::{ClientError, PublishError};
use crate::registry::TopicRegistry;
use crate::session::EventSession;
use crate::topic::Topic;
use crate::transport::{HttpTransport, Transport};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the event API. Without it, events are validated and
    /// logged but never sent.
    pub api_url: Option<String>,

    /// Bulk endpoint; defaults to `{api_url}/events/bulk`. Ignored without
    /// `api_url`.
    pub bulk_url: Option<String>,

    /// Name of the publishing service, used as actor id for service and
    /// third-party sessions.
    pub service_name: String,

    /// Overrides the default category from the topic definitions.
    pub default_category: Option<String>,

    pub retry: RetryPolicy,

    /// Timeout for a single HTTP request.
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            api_url: None,
            bulk_url: None,
            service_name: service_name.into(),
            default_category: None,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Shared entry point for publishing events.
pub struct EventClient {
    config: ClientConfig,
    registry: TopicRegistry,
    transport: Arc<dyn Transport>,
    default_category: String,
    publish_url: Option<String>,
    publish_bulk_url: Option<String>,
}

impl EventClient {
    /// Create a client that talks HTTP to the configured API.
    pub fn new(config: ClientConfig, registry: TopicRegistry) -> Result<Arc<Self>, ClientError> {
        let transport = HttpTransport::new(config.request_timeout)?;
        Self::with_transport(config, registry, Arc::new(transport))
    }

    /// Create a client over any transport.
    pub fn with_transport(
        config: ClientConfig,
        registry: TopicRegistry,
        transport: Arc<dyn Transport>,
    ) -> Result<Arc<Self>, ClientError> {
        let default_category = config
            .default_category
            .clone()
            .or_else(|| registry.default_category().map(str::to_string))
            .ok_or(ClientError::MissingDefaultCategory)?;

        let api_url = config
            .api_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .filter(|url| !url.is_empty());

        let publish_url = api_url.map(|url| format!("{url}/events"));
        let publish_bulk_url = api_url.map(|url| {
            config
                .bulk_url
                .clone()
                .unwrap_or_else(|| format!("{url}/events/bulk"))
        });

        info!(
            service = %config.service_name,
            default_category = %default_category,
            topics = registry.len(),
            publish_url = ?publish_url,
            publish_bulk_url = ?publish_bulk_url,
            "Event client ready"
        );

        Ok(Arc::new(Self {
            config,
            registry,
            transport,
            default_category,
            publish_url,
            publish_bulk_url,
        }))
    }

    pub fn publish_url(&self) -> Option<&str> {
        self.publish_url.as_deref()
    }

    pub fn publish_bulk_url(&self) -> Option<&str> {
        self.publish_bulk_url.as_deref()
    }

    pub fn default_category(&self) -> &str {
        &self.default_category
    }

    pub fn service_name(&self) -> &str {
        &self.config.service_name
    }

    pub fn registry(&self) -> &TopicRegistry {
        &self.registry
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.config.retry
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    /// Find the topic for a triple.
    pub fn resolve(
        &self,
        category: &str,
        entity: &str,
        action: &str,
    ) -> Result<Arc<Topic>, PublishError> {
        self.registry.resolve(category, entity, action)
    }

    /// A session acting on behalf of a user.
    pub fn user_session(
        self: &Arc<Self>,
        user_id: impl Into<String>,
        job_id: impl Into<String>,
    ) -> EventSession {
        self.session(Actor::new(user_id, ActorType::User), job_id)
    }

    /// A session acting as this service.
    pub fn service_session(self: &Arc<Self>, job_id: impl Into<String>) -> EventSession {
        self.session(
            Actor::new(self.config.service_name.clone(), ActorType::Service),
            job_id,
        )
    }

    /// A session for work done by an external system through this service.
    pub fn third_party_session(self: &Arc<Self>, job_id: impl Into<String>) -> EventSession {
        self.session(
            Actor::new(self.config.service_name.clone(), ActorType::ThirdParty),
            job_id,
        )
    }

    pub fn session(self: &Arc<Self>, actor: Actor, job_id: impl Into<String>) -> EventSession {
        EventSession::new(actor, job_id, Arc::clone(self))
    }
}

impl std::fmt::Debug for EventClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventClient")
            .field("service_name", &self.config.service_name)
            .field("default_category", &self.default_category)
            .field("publish_url", &self.publish_url)
            .field("publish_bulk_url", &self.publish_bulk_url)
            .field("topics", &self.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    const DEFINITIONS: &str = r#"
default_category: testing
topics:
  testing:
    Test:
      Created: {type: object}
      Deleted: {type: object}
    TestEntity:
      Create: {type: object}
"#;

    fn registry() -> TopicRegistry {
        TopicRegistry::from_yaml_str(DEFINITIONS).unwrap()
    }

    fn client(config: ClientConfig) -> Arc<EventClient> {
        EventClient::with_transport(config, registry(), Arc::new(MockTransport::new())).unwrap()
    }

    #[test]
    fn test_offline_client_has_no_urls() {
        let client = client(ClientConfig::new("BcEventsUnitTests"));
        assert_eq!(client.publish_url(), None);
        assert_eq!(client.publish_bulk_url(), None);
        assert_eq!(client.default_category(), "testing");
        assert_eq!(client.service_name(), "BcEventsUnitTests");
    }

    #[test]
    fn test_urls_derived_from_api_url() {
        let mut config = ClientConfig::new("BcEventsUnitTests");
        config.api_url = Some("https://fake-site.example.com/".into());
        let client = client(config);

        assert_eq!(client.publish_url(), Some("https://fake-site.example.com/events"));
        assert_eq!(
            client.publish_bulk_url(),
            Some("https://fake-site.example.com/events/bulk")
        );
    }

    #[test]
    fn test_bulk_url_override() {
        let mut config = ClientConfig::new("BcEventsUnitTests");
        config.api_url = Some("https://fake-site.example.com".into());
        config.bulk_url = Some("https://bulk.example.com/ingest".into());
        let client = client(config);

        assert_eq!(client.publish_bulk_url(), Some("https://bulk.example.com/ingest"));
    }

    #[test]
    fn test_bulk_url_ignored_when_offline() {
        let mut config = ClientConfig::new("BcEventsUnitTests");
        config.bulk_url = Some("https://bulk.example.com/ingest".into());
        assert_eq!(client(config).publish_bulk_url(), None);
    }

    #[test]
    fn test_default_category_override() {
        let mut config = ClientConfig::new("BcEventsUnitTests");
        config.default_category = Some("audit".into());
        assert_eq!(client(config).default_category(), "audit");
    }

    #[test]
    fn test_missing_default_category() {
        let registry = TopicRegistry::from_yaml_str("topics: {}").unwrap();
        let err = EventClient::with_transport(
            ClientConfig::new("BcEventsUnitTests"),
            registry,
            Arc::new(MockTransport::new()),
        )
        .unwrap_err();

        assert!(matches!(err, ClientError::MissingDefaultCategory));
    }

    #[test]
    fn test_resolve() {
        let client = client(ClientConfig::new("BcEventsUnitTests"));

        assert_eq!(client.registry().len(), 3);
        assert_eq!(
            client.resolve("testing", "Test", "Created").unwrap().name(),
            "testing.TestCreated"
        );

        let err = client.resolve("nope", "NotReal", "Failed").unwrap_err();
        assert!(matches!(err, PublishError::TopicNotFound(ref name) if name == "nope.NotRealFailed"));
    }

    #[test]
    fn test_session_factories() {
        let client = client(ClientConfig::new("BcEventsUnitTests"));

        let user = client.user_session("USER_ID", "JOB_ID");
        assert_eq!(user.actor_id(), "USER_ID");
        assert_eq!(user.actor_type(), ActorType::User);

        let service = client.service_session("JOB_ID");
        assert_eq!(service.actor_id(), "BcEventsUnitTests");
        assert_eq!(service.actor_type(), ActorType::Service);

        let immediate = client
            .session(Actor::new("partner-42", ActorType::ThirdParty), "JOB_ID")
            .publish_immediately(true);
        assert!(immediate.is_immediate());
        assert_eq!(immediate.job_id(), "JOB_ID");
    }
}
