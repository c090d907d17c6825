//! Error types for publishing events.

use std::time::Duration;

use thiserror::Error;

/// An event (or its envelope) did not satisfy a schema.
///
/// Raised locally before any network call and never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{subject} failed validation: {}", .violations.join("; "))]
pub struct ValidationError {
    /// What was validated, e.g. `event envelope` or `testing.TestCreated data`.
    pub subject: String,

    /// One human-readable message per violated constraint.
    pub violations: Vec<String>,
}

impl ValidationError {
    pub(crate) fn new(subject: impl Into<String>, violations: Vec<String>) -> Self {
        Self {
            subject: subject.into(),
            violations,
        }
    }
}

/// Errors raised by the transport layer for a single HTTP attempt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection could not be established or was dropped.
    #[error("connection error: {0}")]
    Connect(String),

    /// The request or the response body timed out.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The request could not be built or sent for a non-transient reason.
    #[error("request error: {0}")]
    Request(String),
}

impl TransportError {
    /// Connectivity and timeout failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Connect(_) | TransportError::Timeout(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_body() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Terminal outcome of a delivery that did not succeed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The server rejected the whole request with a non-retryable error.
    #[error("delivery to {url} rejected with HTTP {status}: {}", .error_type.as_deref().unwrap_or("no errorType"))]
    Rejected {
        url: String,
        status: u16,
        error_type: Option<String>,
    },

    /// Transient failures persisted past the retry time budget.
    #[error(
        "delivery to {url} gave up after {attempts} attempts in {elapsed:?} with {remaining_records} records outstanding: {last_failure}"
    )]
    TimeBudgetExhausted {
        url: String,
        attempts: u32,
        elapsed: Duration,
        remaining_records: usize,
        last_failure: String,
    },

    /// The transport failed for a reason retrying cannot fix.
    #[error("delivery to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },
}

/// Errors surfaced by the publish operations of sessions and events.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Envelope or payload failed schema checks.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No topic is registered for the requested triple.
    #[error("topic not found: {0}")]
    TopicNotFound(String),

    /// A shorthand name matched no topic in either word order.
    #[error("could not resolve shorthand publish call: {0}")]
    ShorthandNotResolved(String),

    /// The publish request was incomplete.
    #[error("invalid publish call: {0}")]
    Usage(String),

    /// Delivery failed after validation succeeded.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Errors loading topic definitions.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read topic definitions from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse topic definitions: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("malformed topic definitions: {0}")]
    Malformed(String),

    #[error("invalid schema for topic {topic}: {message}")]
    InvalidSchema { topic: String, message: String },
}

/// Errors constructing an [`EventClient`](crate::EventClient).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("failed to build HTTP transport: {0}")]
    Transport(#[from] TransportError),

    #[error("no default category: set one in the client config or the topic definitions")]
    MissingDefaultCategory,
}
