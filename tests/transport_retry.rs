//! End-to-end retry behavior against a mock HTTP server, covering the literal scenarios this
//! driver's retry policy is required to satisfy: a `Retry-After`-honoring recovery, and an
//! exhausted-budget failure carrying the last status code seen.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use waresql::auth::NoAuthProvider;
use waresql::error::Error;
use waresql::retry::{CommandType, RetryConfig};
use waresql::transport::{TimeoutConfig, Transport};

fn timeouts() -> TimeoutConfig {
    TimeoutConfig {
        connect_timeout: Duration::from_secs(5),
        request_timeout: Duration::from_secs(10),
    }
}

/// Replies with a fixed sequence of responses, one per call, holding the last one for any call
/// beyond the sequence's length. Lets a single mock drive a deterministic `[503, 503, 200]`-style
/// scenario without depending on wiremock's cross-mock ordering.
struct Sequence {
    responses: Vec<ResponseTemplate>,
    calls: AtomicUsize,
}

impl Sequence {
    fn new(responses: Vec<ResponseTemplate>) -> Self {
        Self { responses, calls: AtomicUsize::new(0) }
    }
}

impl Respond for Sequence {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses[index.min(self.responses.len() - 1)].clone()
    }
}

#[tokio::test]
async fn retries_through_retry_after_then_succeeds() {
    let server = MockServer::start().await;

    let sequence = Sequence::new(vec![
        ResponseTemplate::new(503).insert_header("Retry-After", "1"),
        ResponseTemplate::new(503),
        ResponseTemplate::new(200).set_body_string("ok"),
    ]);

    Mock::given(method("GET"))
        .and(path("/api/2.0/sql/statements/abc"))
        .respond_with(sequence)
        .expect(3)
        .mount(&server)
        .await;

    let transport = Transport::new(
        server.uri(),
        &timeouts(),
        RetryConfig::default(),
        Arc::new(NoAuthProvider),
    )
    .unwrap();

    let started = std::time::Instant::now();
    let response = transport
        .request(
            Method::GET,
            "/api/2.0/sql/statements/abc",
            None,
            None,
            CommandType::GetOperationStatus,
        )
        .await
        .unwrap();

    assert!(response.is_success());
    assert_eq!(response.data.as_ref(), b"ok");
    // The first retry must honor the server's Retry-After of 1s.
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn exhausts_retry_budget_and_surfaces_last_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/sql/statements/abc"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut config = RetryConfig::default();
    config.stop_after_attempts_count = 2;
    config.delay_min = Duration::from_millis(1);
    config.delay_default = Duration::from_millis(1);
    config.delay_max = Duration::from_millis(5);

    let transport = Transport::new(server.uri(), &timeouts(), config, Arc::new(NoAuthProvider)).unwrap();

    let err = transport
        .request(
            Method::GET,
            "/api/2.0/sql/statements/abc",
            None,
            None,
            CommandType::GetOperationStatus,
        )
        .await
        .unwrap_err();

    match err {
        Error::MaxRetry { attempts, context } => {
            assert_eq!(attempts, 2);
            assert_eq!(context.http_code, Some(503));
        }
        other => panic!("expected MaxRetry, got {other:?}"),
    }
}
