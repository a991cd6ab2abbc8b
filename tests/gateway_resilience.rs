//! Resilience behaviour of the gateway against a real socket backend.

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use media_gateway::gateway::{DegradeReason, Gateway, GatewayError, OperationKind, OperationResponse, Outcome};
use media_gateway::observability::CorrelationId;
use media_gateway::resilience::CircuitState;
use media_gateway::upstream::{Payload, UpstreamError};

mod common;
use common::{gateway_config, MockReply, MockUpstream, DETECTION_JSON, PLATE_JSON, TRANSCRIPTION_JSON};

fn jpeg() -> Payload {
    Payload::new(b"\xFF\xD8\xFF\xE0fake-jpeg".to_vec())
        .with_file_name("car.jpg")
        .with_content_type("image/jpeg")
}

fn state(gateway: &Gateway, operation: &str) -> CircuitState {
    gateway.breakers().for_operation(operation).unwrap().state()
}

#[tokio::test]
async fn test_retry_recovers_from_transient_server_errors() {
    let upstream = MockUpstream::start(|i| {
        if i < 2 {
            MockReply::error(503)
        } else {
            MockReply::ok(DETECTION_JSON)
        }
    })
    .await;
    let gateway = Gateway::from_config(&gateway_config(&upstream)).unwrap();

    let outcome = gateway.invoke(OperationKind::Detect, jpeg()).await.unwrap();
    match outcome {
        Outcome::Success(OperationResponse::Detection(r)) => {
            assert!(r.success);
            assert_eq!(r.detections[0].class_name, "car");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(upstream.hits(), 3);
    assert_eq!(state(&gateway, "detect"), CircuitState::Closed);

    // All attempts of one invocation share a correlation id.
    let ids: Vec<_> = upstream
        .requests()
        .iter()
        .map(|r| r.header("x-request-id").unwrap().to_string())
        .collect();
    assert!(ids.iter().all(|id| id == &ids[0]));
}

#[tokio::test]
async fn test_client_error_is_not_retried_or_counted() {
    let upstream = MockUpstream::fixed(MockReply::json(400, r#"{"detail": "unsupported format"}"#)).await;
    let mut config = gateway_config(&upstream);
    config.breaker.failure_threshold = 1;
    let gateway = Gateway::from_config(&config).unwrap();

    for _ in 0..3 {
        let err = gateway.invoke(OperationKind::LicensePlate, jpeg()).await.unwrap_err();
        match err {
            GatewayError::UpstreamRejected { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("unsupported format"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(upstream.hits(), 3);
    assert_eq!(state(&gateway, "license-plate"), CircuitState::Closed);
}

#[tokio::test]
async fn test_breaker_opens_and_short_circuits() {
    let upstream = MockUpstream::fixed(MockReply::error(500)).await;
    let mut config = gateway_config(&upstream);
    config.breaker.failure_threshold = 3;
    config.retries.max_attempts = 1;
    let gateway = Gateway::from_config(&config).unwrap();

    for _ in 0..3 {
        let outcome = gateway.invoke(OperationKind::LicensePlate, jpeg()).await.unwrap();
        assert!(matches!(
            outcome.reason(),
            Some(DegradeReason::RetriesExhausted {
                last: UpstreamError::ServerError { status: 500 },
                ..
            })
        ));
    }
    assert_eq!(state(&gateway, "license-plate"), CircuitState::Open);

    let outcome = gateway.invoke(OperationKind::LicensePlate, jpeg()).await.unwrap();
    assert!(matches!(outcome.reason(), Some(DegradeReason::CircuitOpen { .. })));
    assert!(!outcome.response().success());
    assert_eq!(upstream.hits(), 3, "no network attempt while open");

    // Other groups are unaffected.
    assert_eq!(state(&gateway, "detect"), CircuitState::Closed);
}

#[tokio::test]
async fn test_timeout_counts_as_failure() {
    let upstream = MockUpstream::fixed(MockReply::ok(PLATE_JSON).delayed(Duration::from_secs(2))).await;
    let mut config = gateway_config(&upstream);
    config.upstream.read_timeout_ms = 200;
    config.breaker.failure_threshold = 1;
    config.retries.max_attempts = 1;
    let gateway = Gateway::from_config(&config).unwrap();

    let started = std::time::Instant::now();
    let outcome = gateway.invoke(OperationKind::LicensePlate, jpeg()).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(matches!(
        outcome.reason(),
        Some(DegradeReason::RetriesExhausted {
            last: UpstreamError::Timeout(_),
            ..
        })
    ));
    assert_eq!(state(&gateway, "license-plate"), CircuitState::Open);
}

#[tokio::test]
async fn test_request_carries_correlation_id_and_file_part() {
    let upstream = MockUpstream::fixed(MockReply::ok(PLATE_JSON)).await;
    let gateway = Gateway::from_config(&gateway_config(&upstream)).unwrap();

    let outcome = gateway
        .invoke_with_id(OperationKind::LicensePlate, jpeg(), CorrelationId::from("corr-xyz"))
        .await
        .unwrap();
    match outcome.into_inner() {
        OperationResponse::LicensePlate(r) => {
            assert_eq!(r.plate_number.as_deref(), Some("12가3456"));
            assert_eq!(r.request_id.as_deref(), Some("corr-xyz"));
            assert_eq!(r.bounding_box.unwrap().width, 120);
        }
        other => panic!("unexpected {other:?}"),
    }

    let requests = upstream.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/api/v1/license-plate/detect");
    assert_eq!(request.header("x-request-id"), Some("corr-xyz"));
    assert_eq!(request.header("x-request-source"), Some("media-gateway"));
    assert!(request.header("content-type").unwrap().starts_with("multipart/form-data"));
    assert!(request.body_contains(b"name=\"file\""));
    assert!(request.body_contains(b"filename=\"car.jpg\""));
    assert!(request.body_contains(b"fake-jpeg"));
}

#[tokio::test]
async fn test_unguarded_operations_retry_and_degrade() {
    let upstream = MockUpstream::fixed(MockReply::error(503)).await;
    let mut config = gateway_config(&upstream);
    config.breaker.failure_threshold = 1;
    let gateway = Gateway::from_config(&config).unwrap();

    for _ in 0..2 {
        let outcome = gateway.invoke(OperationKind::Caption, jpeg()).await.unwrap();
        assert!(matches!(
            outcome.reason(),
            Some(DegradeReason::RetriesExhausted { attempts: 3, .. })
        ));
        assert!(outcome.response().error_message().is_some());
    }
    assert_eq!(upstream.hits(), 6);
    assert!(gateway.breakers().for_operation("caption").is_none());
}

#[tokio::test]
async fn test_half_open_probe_closes_circuit() {
    let upstream = MockUpstream::start(|i| {
        if i == 0 {
            MockReply::error(502)
        } else {
            MockReply::ok(TRANSCRIPTION_JSON)
        }
    })
    .await;
    let mut config = gateway_config(&upstream);
    config.breaker.failure_threshold = 1;
    config.breaker.cool_down_ms = 100;
    config.retries.max_attempts = 1;
    let gateway = Gateway::from_config(&config).unwrap();

    assert!(gateway.invoke(OperationKind::Transcribe, jpeg()).await.unwrap().is_degraded());
    let refused = gateway.invoke(OperationKind::Transcribe, jpeg()).await.unwrap();
    assert!(matches!(refused.reason(), Some(DegradeReason::CircuitOpen { .. })));
    assert_eq!(upstream.hits(), 1);

    tokio::time::sleep(Duration::from_millis(150)).await;

    let outcome = gateway.invoke(OperationKind::Transcribe, jpeg()).await.unwrap();
    assert!(!outcome.is_degraded());
    assert_eq!(state(&gateway, "transcribe"), CircuitState::Closed);
    assert_eq!(upstream.hits(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_probe_while_half_open() {
    let upstream = MockUpstream::start(|i| {
        if i == 0 {
            MockReply::error(500)
        } else {
            MockReply::ok(DETECTION_JSON).delayed(Duration::from_millis(200))
        }
    })
    .await;
    let mut config = gateway_config(&upstream);
    config.breaker.failure_threshold = 1;
    config.breaker.cool_down_ms = 50;
    config.retries.max_attempts = 1;
    let gateway = Arc::new(Gateway::from_config(&config).unwrap());

    gateway.invoke(OperationKind::Detect, jpeg()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let handles = (0..5).map(|_| {
        let gateway = Arc::clone(&gateway);
        tokio::spawn(async move { gateway.invoke(OperationKind::Detect, jpeg()).await.unwrap() })
    });
    let successes = join_all(handles)
        .await
        .into_iter()
        .filter(|outcome| !outcome.as_ref().unwrap().is_degraded())
        .count();

    assert_eq!(successes, 1);
    assert_eq!(upstream.hits(), 2);
    assert_eq!(state(&gateway, "detect"), CircuitState::Closed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_outcome_of_call_admitted_before_opening_is_ignored_while_half_open() {
    // 0: slow success admitted while Closed, 1: opens the breaker, 2: slow probe.
    let upstream = MockUpstream::start(|i| match i {
        0 => MockReply::ok(DETECTION_JSON).delayed(Duration::from_millis(400)),
        1 => MockReply::error(500),
        _ => MockReply::ok(DETECTION_JSON).delayed(Duration::from_millis(1200)),
    })
    .await;
    let mut config = gateway_config(&upstream);
    config.breaker.failure_threshold = 1;
    config.breaker.cool_down_ms = 100;
    config.retries.max_attempts = 1;
    let gateway = Arc::new(Gateway::from_config(&config).unwrap());

    let spawn_invoke = |gateway: &Arc<Gateway>| {
        let gateway = Arc::clone(gateway);
        tokio::spawn(async move { gateway.invoke(OperationKind::Detect, jpeg()).await.unwrap() })
    };

    let early = spawn_invoke(&gateway);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(gateway.invoke(OperationKind::Detect, jpeg()).await.unwrap().is_degraded());
    assert_eq!(state(&gateway, "detect"), CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(150)).await;
    let probe = spawn_invoke(&gateway);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(state(&gateway, "detect"), CircuitState::HalfOpen);

    assert!(!early.await.unwrap().is_degraded());
    assert_eq!(state(&gateway, "detect"), CircuitState::HalfOpen);

    let refused = gateway.invoke(OperationKind::Detect, jpeg()).await.unwrap();
    assert!(matches!(refused.reason(), Some(DegradeReason::CircuitOpen { .. })));
    assert_eq!(upstream.hits(), 3);

    assert!(!probe.await.unwrap().is_degraded());
    assert_eq!(state(&gateway, "detect"), CircuitState::Closed);
}
