//! HTTP-level delivery tests using wiremock.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use hub_events::{
    ClientConfig, DeliveryError, EventClient, HttpTransport, Payload, PublishError,
    ResilientDelivery, RetryPolicy, TopicRegistry, TransportError,
};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEFINITIONS: &str = r#"
default_category: testing
topics:
  testing:
    Test:
      Created:
        type: object
        required: [id, url]
"#;

fn fast_retries() -> RetryPolicy {
    RetryPolicy {
        delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        max_time: Duration::from_secs(5),
        jitter: 0.0,
    }
}

fn client(server: &MockServer) -> Arc<EventClient> {
    let mut config = ClientConfig::new("BcEventsUnitTests");
    config.api_url = Some(server.uri());
    config.retry = fast_retries();
    config.request_timeout = Duration::from_secs(2);

    EventClient::new(config, TopicRegistry::from_yaml_str(DEFINITIONS).unwrap()).unwrap()
}

fn payload(n: usize) -> Value {
    json!({"id": format!("MyTestId{n}"), "url": format!("https://somewhere.com/tests/{n}")})
}

async fn received_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|request| request.body_json::<Value>().unwrap())
        .collect()
}

#[tokio::test]
async fn test_publish_sends_envelope_and_correlation_header() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/events"))
        .and(header("x-correlation-job-id", "JOB_ID"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"failedRecords": 0})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let mut session = client
        .user_session("USER_ID", "JOB_ID")
        .publish_immediately(true);
    session
        .publish_shorthand("created_test", payload(1))
        .await
        .unwrap();

    let bodies = received_bodies(&server).await;
    assert_eq!(
        bodies[0],
        json!({
            "action": "Created",
            "category": "testing",
            "entity": "Test",
            "data": payload(1),
            "actor": {"id": "USER_ID", "type": "user"}
        })
    );
}

#[tokio::test]
async fn test_retryable_error_type_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/events"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"errorType": "InternalFailureException"})),
        )
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"failedRecords": 0})))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut session = client
        .user_session("USER_ID", "JOB_ID")
        .publish_immediately(true);
    session
        .publish_shorthand("created_test", payload(1))
        .await
        .unwrap();

    let bodies = received_bodies(&server).await;
    assert_eq!(bodies.len(), 3);
    assert!(bodies.iter().all(|body| body == &bodies[0]));
}

#[tokio::test]
async fn test_unknown_error_type_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/events"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"errorType": "ValidationException"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let mut session = client
        .user_session("USER_ID", "JOB_ID")
        .publish_immediately(true);
    let err = session
        .publish_shorthand("created_test", payload(1))
        .await
        .unwrap_err();

    match err {
        PublishError::Delivery(DeliveryError::Rejected {
            status, error_type, ..
        }) => {
            assert_eq!(status, 400);
            assert_eq!(error_type.as_deref(), Some("ValidationException"));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_bulk_retry_narrows_to_failed_records() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/events/bulk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "failedRecords": 3,
            "records": [
                "Success",
                "ProvisionedThroughputExceededException",
                "Success",
                "InternalFailureException",
                "Success",
                "Success",
                "ValidationException"
            ]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/events/bulk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"failedRecords": 0})))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut session = client.user_session("USER_ID", "JOB_ID");
    for n in 0..7 {
        session
            .publish_shorthand("created_test", payload(n))
            .await
            .unwrap();
    }
    session.flush().await.unwrap();

    let bodies = received_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0].as_array().unwrap().len(), 7);

    let retried: Vec<Value> = bodies[1]
        .as_array()
        .unwrap()
        .iter()
        .map(|record| record["data"].clone())
        .collect();
    assert_eq!(retried, vec![payload(1), payload(3)]);
}

#[tokio::test]
async fn test_non_json_success_body_is_delivered() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let transport = Arc::new(HttpTransport::new(Duration::from_secs(2)).unwrap());
    let delivery = ResilientDelivery::new(
        transport,
        format!("{}/events", server.uri()),
        Default::default(),
        fast_retries(),
    );

    let report = delivery
        .invoke(Payload::Single(json!({"hello": "world"})))
        .await
        .unwrap();
    assert_eq!(report.attempts, 1);
    assert_eq!(report.records_sent, 1);
}

#[tokio::test]
async fn test_unreachable_endpoint_exhausts_time_budget() {
    let transport = Arc::new(HttpTransport::new(Duration::from_millis(500)).unwrap());
    let policy = RetryPolicy {
        max_time: Duration::from_millis(200),
        ..fast_retries()
    };
    let delivery = ResilientDelivery::new(
        transport,
        "http://127.0.0.1:1/events",
        Default::default(),
        policy,
    );

    let err = delivery
        .invoke(Payload::Single(json!({"hello": "world"})))
        .await
        .unwrap_err();

    match err {
        DeliveryError::TimeBudgetExhausted {
            attempts,
            remaining_records,
            ..
        } => {
            assert!(attempts >= 2, "attempts = {attempts}");
            assert_eq!(remaining_records, 1);
        }
        other => panic!("expected time budget exhaustion, got {other:?}"),
    }
}

#[test]
fn test_registry_loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(DEFINITIONS.as_bytes()).unwrap();

    let registry = TopicRegistry::from_path(file.path()).unwrap();

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.default_category(), Some("testing"));
    assert!(registry.get("testing.TestCreated").is_some());
}

#[test]
fn test_registry_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = TopicRegistry::from_path(dir.path().join("missing.yaml")).unwrap_err();
    assert!(err.to_string().contains("missing.yaml"), "{err}");
}

#[test]
fn test_transport_error_kinds() {
    assert!(TransportError::Connect("refused".into()).is_transient());
    assert!(TransportError::Timeout("slow".into()).is_transient());
    assert!(!TransportError::Request("bad url".into()).is_transient());
}
