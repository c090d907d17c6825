//! Resilient delivery of event payloads.
//!
//! One delivery is one logical HTTP submission: a single event envelope or a
//! bulk list of envelopes. Each attempt is judged by [`assess_attempt`]:
//!
//! - connectivity/timeout failures and retryable server error types are
//!   retried with the same payload
//! - other 400/500 rejections end the delivery immediately
//! - a bulk response reporting failed records narrows the payload to the
//!   records that failed with a retryable error type
//!
//! Retries back off exponentially until [`RetryPolicy::max_time`] has
//! elapsed.

use std::sync::Arc;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::backoff::RetryPolicy;
use crate::error::{DeliveryError, TransportError};
use crate::transport::{Headers, Transport, TransportResponse};

/// Server error types that are worth another attempt.
pub const RETRYABLE_ERROR_TYPES: [&str; 2] = [
    "ProvisionedThroughputExceededException",
    "InternalFailureException",
];

/// Header carrying the originating job id.
pub const CORRELATION_HEADER: &str = "x-correlation-job-id";

pub fn is_retryable_error_type(error_type: &str) -> bool {
    RETRYABLE_ERROR_TYPES.contains(&error_type)
}

/// Headers attached to every delivery made on behalf of a job.
pub fn correlation_headers(job_id: &str) -> Headers {
    Headers::from([(CORRELATION_HEADER.to_string(), job_id.to_string())])
}

/// The body of one submission.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// One event envelope, sent as a JSON object.
    Single(Value),
    /// Several event envelopes, sent as a JSON array.
    Bulk(Vec<Value>),
}

impl Payload {
    /// Number of event records in the payload.
    pub fn len(&self) -> usize {
        match self {
            Payload::Single(_) => 1,
            Payload::Bulk(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_body(&self) -> Value {
        match self {
            Payload::Single(record) => record.clone(),
            Payload::Bulk(records) => Value::Array(records.clone()),
        }
    }

    fn records(&self) -> &[Value] {
        match self {
            Payload::Single(record) => std::slice::from_ref(record),
            Payload::Bulk(records) => records,
        }
    }
}

/// What to do after an attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Nothing left to send.
    Delivered {
        /// Records the server reported as failed with a non-retryable error.
        rejected_records: usize,
    },

    /// Try again with the same payload.
    Retry { reason: String },

    /// Try again with only the records that still need it.
    Narrow {
        remaining: Payload,
        rejected_records: usize,
        reason: String,
    },

    /// The server rejected the request outright.
    Rejected {
        status: u16,
        error_type: Option<String>,
    },

    /// The transport failed in a way retrying cannot fix.
    Failed(TransportError),
}

/// Return `record` if its paired bulk `result` names a retryable error.
///
/// A result is either a string (`"Success"` or an error type name) or an
/// object carrying `errorType` or `errorCode`.
pub fn extract_failed_record(record: &Value, result: &Value) -> Option<Value> {
    let error_type = match result {
        Value::String(s) => Some(s.as_str()),
        Value::Object(fields) => fields
            .get("errorType")
            .or_else(|| fields.get("errorCode"))
            .and_then(Value::as_str),
        _ => None,
    };

    error_type
        .filter(|t| is_retryable_error_type(t))
        .map(|_| record.clone())
}

/// Decide whether an attempt that sent `payload` needs another try.
pub fn assess_attempt(
    payload: &Payload,
    outcome: Result<TransportResponse, TransportError>,
) -> Verdict {
    let response = match outcome {
        Ok(response) => response,
        Err(e) if e.is_transient() => {
            return Verdict::Retry {
                reason: e.to_string(),
            }
        }
        Err(e) => return Verdict::Failed(e),
    };

    if response.status == 400 || response.status == 500 {
        let error_type = response
            .body
            .get("errorType")
            .and_then(Value::as_str)
            .map(str::to_string);

        return match error_type {
            Some(t) if is_retryable_error_type(&t) => Verdict::Retry {
                reason: format!("HTTP {}: {t}", response.status),
            },
            error_type => Verdict::Rejected {
                status: response.status,
                error_type,
            },
        };
    }

    let failed_records = response.body.get("failedRecords").and_then(Value::as_u64);
    if failed_records.is_none() && response.status >= 400 {
        warn!(
            status = response.status,
            "Error status without failedRecords; treating as delivered"
        );
    }
    if failed_records.unwrap_or(0) == 0 {
        return Verdict::Delivered {
            rejected_records: 0,
        };
    }
    let failed_records = failed_records.unwrap_or(0);

    let sent = payload.records();
    let results = match response.body.get("records").and_then(Value::as_array) {
        Some(results) if results.len() == sent.len() => results,
        results => {
            // Without a parallel `records` array failures can't be attributed,
            // so the whole payload goes again.
            warn!(
                failed_records,
                sent = sent.len(),
                results = ?results.map(Vec::len),
                "Bulk response records do not line up with the payload"
            );
            return Verdict::Retry {
                reason: format!("{failed_records} records failed (unattributed)"),
            };
        }
    };

    let mut retryable: Vec<Value> = sent
        .iter()
        .zip(results)
        .filter_map(|(record, result)| extract_failed_record(record, result))
        .collect();
    let rejected_records = (failed_records as usize).saturating_sub(retryable.len());

    if retryable.is_empty() {
        return Verdict::Delivered { rejected_records };
    }

    let reason = format!("{} of {} records failed", retryable.len(), sent.len());
    let remaining = match payload {
        Payload::Single(_) => Payload::Single(retryable.swap_remove(0)),
        Payload::Bulk(_) => Payload::Bulk(retryable),
    };

    Verdict::Narrow {
        remaining,
        rejected_records,
        reason,
    }
}

/// Retry state threaded through the attempts of one delivery.
#[derive(Debug, Clone)]
pub struct RetryState {
    /// What the next attempt sends; shrinks as bulk records succeed.
    pub remaining: Payload,

    /// Number of attempts made so far.
    pub attempts: u32,

    /// When the delivery started.
    pub started: Instant,

    /// After this instant no further attempt is made.
    pub deadline: Instant,
}

impl RetryState {
    pub fn new(payload: Payload, policy: &RetryPolicy) -> Self {
        let started = Instant::now();
        Self {
            remaining: payload,
            attempts: 0,
            started,
            deadline: started + policy.max_time,
        }
    }

    /// The wait before the next attempt, or `None` once the budget is spent.
    pub fn next_wait(&self, policy: &RetryPolicy) -> Option<std::time::Duration> {
        let now = Instant::now();
        if now >= self.deadline {
            return None;
        }
        let backoff = policy.backoff(self.attempts.saturating_sub(1));
        Some(backoff.min(self.deadline - now))
    }
}

/// Summary of a successful delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub attempts: u32,

    /// Records in the first attempt.
    pub records_sent: usize,

    /// Records dropped because the server failed them with a
    /// non-retryable error.
    pub rejected_records: usize,
}

/// Delivers one payload to one URL, retrying per [`RetryPolicy`].
pub struct ResilientDelivery {
    transport: Arc<dyn Transport>,
    url: String,
    headers: Headers,
    policy: RetryPolicy,
}

impl ResilientDelivery {
    pub fn new(
        transport: Arc<dyn Transport>,
        url: impl Into<String>,
        headers: Headers,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            url: url.into(),
            headers,
            policy,
        }
    }

    /// Send `payload`, retrying until delivered, rejected, or out of time.
    pub async fn invoke(&self, payload: Payload) -> Result<DeliveryReport, DeliveryError> {
        let records_sent = payload.len();
        let mut rejected_records = 0;
        let mut state = RetryState::new(payload, &self.policy);

        loop {
            state.attempts += 1;
            debug!(
                url = %self.url,
                attempt = state.attempts,
                records = state.remaining.len(),
                "Posting to event API"
            );

            let outcome = self
                .transport
                .post_json(&self.url, &self.headers, &state.remaining.to_body())
                .await;

            let reason = match assess_attempt(&state.remaining, outcome) {
                Verdict::Delivered {
                    rejected_records: rejected,
                } => {
                    rejected_records += rejected;
                    if rejected_records > 0 {
                        error!(
                            url = %self.url,
                            rejected_records,
                            "Event API failed records with non-retryable errors"
                        );
                    }
                    return Ok(DeliveryReport {
                        attempts: state.attempts,
                        records_sent,
                        rejected_records,
                    });
                }
                Verdict::Retry { reason } => reason,
                Verdict::Narrow {
                    remaining,
                    rejected_records: rejected,
                    reason,
                } => {
                    rejected_records += rejected;
                    state.remaining = remaining;
                    reason
                }
                Verdict::Rejected { status, error_type } => {
                    error!(
                        url = %self.url,
                        status,
                        error_type = ?error_type,
                        "Event API rejected request"
                    );
                    return Err(DeliveryError::Rejected {
                        url: self.url.clone(),
                        status,
                        error_type,
                    });
                }
                Verdict::Failed(source) => {
                    error!(url = %self.url, error = %source, "Event delivery failed");
                    return Err(DeliveryError::Transport {
                        url: self.url.clone(),
                        source,
                    });
                }
            };

            let Some(wait) = state.next_wait(&self.policy) else {
                error!(
                    url = %self.url,
                    attempts = state.attempts,
                    remaining_records = state.remaining.len(),
                    last_failure = %reason,
                    "Giving up on event delivery"
                );
                return Err(DeliveryError::TimeBudgetExhausted {
                    url: self.url.clone(),
                    attempts: state.attempts,
                    elapsed: state.started.elapsed(),
                    remaining_records: state.remaining.len(),
                    last_failure: reason,
                });
            };

            warn!(
                url = %self.url,
                attempt = state.attempts,
                delay_ms = wait.as_millis() as u64,
                remaining_records = state.remaining.len(),
                reason = %reason,
                "Delivery attempt failed, retrying"
            );
            tokio::time::sleep(wait).await;
        }
    }
}
