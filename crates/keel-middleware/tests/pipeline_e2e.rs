//! End-to-end tests of the standard HTTP chain.
//!
//! Each test drives a request through context, timer, timeout and
//! authentication stages into a handler that answers with the REST writer.

use bytes::Bytes;
use http::{Request as HttpRequest, StatusCode};
use http_body_util::{BodyExt, Full};
use keel_core::fixtures::{MemorySessionManager, RecordingLogger, StaticTokenEngine, SAVED_SESSION_HEADER};
use keel_core::{ErrorCode, RequestState, Severity, UserId};
use keel_middleware::{require_authentication, BoxFuture, HttpPipeline, Request, Response, Runtime};
use keel_response::{ResponseFinalizer, Rest};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    pipeline: HttpPipeline,
    recorder: RecordingLogger,
    sessions: MemorySessionManager,
}

fn harness() -> Harness {
    let recorder = RecordingLogger::new();
    let sessions = MemorySessionManager::new("sess-1");
    let engine = StaticTokenEngine::new("Bearer")
        .accept("abc123", "42", "a b")
        .expire("stale");
    let runtime = Runtime::new(Arc::new(engine))
        .with_node_id(2)
        .with_logger(recorder.handle())
        .with_session_manager(Arc::new(sessions.clone()))
        .with_request_timeout(Duration::from_millis(200));

    Harness {
        pipeline: HttpPipeline::standard(Arc::new(runtime)),
        recorder,
        sessions,
    }
}

fn make_request(authorization: Option<&str>) -> Request {
    let mut builder = HttpRequest::builder().method("GET").uri("/v1/me");
    if let Some(value) = authorization {
        builder = builder.header("authorization", value);
    }
    builder.body(Full::new(Bytes::new())).unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Answers with the caller's user id, or `not_found` for anonymous callers.
fn whoami(state: RequestState, _: Request) -> BoxFuture<'static, Response> {
    Box::pin(async move {
        let result = state
            .user_id()
            .map(UserId::get)
            .ok_or_else(|| ErrorCode::NOT_FOUND.enrich("anonymous caller").into());
        ResponseFinalizer::<Rest, _>::new(&state, result)
            .map(StatusCode::NOT_FOUND, &[ErrorCode::NOT_FOUND])
            .write()
    })
}

#[tokio::test]
async fn test_bearer_credential_reaches_handler() {
    let h = harness();

    let response = h.pipeline.process(make_request(Some("Bearer abc123")), whoami).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[SAVED_SESSION_HEADER], "sess-1");
    assert_eq!(body_json(response).await, json!({"status": "success", "data": 42}));
    assert_eq!(h.sessions.save_count(), 1);
    assert_eq!(h.recorder.events(), vec!["request", "auth-info", "response"]);
}

#[tokio::test]
async fn test_every_record_carries_request_id() {
    let h = harness();

    let _ = h.pipeline.process(make_request(Some("Bearer abc123")), whoami).await;

    let records = h.recorder.records();
    let first = records[0].attr("request_id").unwrap().to_string();
    assert!(records
        .iter()
        .all(|record| record.attr("request_id") == Some(first.as_str())));
    assert_eq!(records[0].attr("node_id"), Some("2"));
    assert_eq!(records[0].attr("uri"), Some("/v1/me"));
}

#[tokio::test]
async fn test_request_ids_differ_between_requests() {
    let h = harness();

    let _ = h.pipeline.process(make_request(None), whoami).await;
    let _ = h.pipeline.process(make_request(None), whoami).await;

    let ids: Vec<String> = h
        .recorder
        .records()
        .iter()
        .filter(|record| record.event == "request")
        .map(|record| record.attr("request_id").unwrap().to_string())
        .collect();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
}

#[tokio::test]
async fn test_missing_header_still_invokes_handler() {
    let h = harness();

    let response = h.pipeline.process(make_request(None), whoami).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "not_found");
    assert_eq!(body["error_description"], "anonymous caller");
    assert_eq!(h.recorder.max_severity(), Some(Severity::Debug));
}

#[tokio::test]
async fn test_expired_token_is_anonymous() {
    let h = harness();

    let response = h.pipeline.process(make_request(Some("Bearer stale")), whoami).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(h.recorder.find("expired token").is_some());
}

#[tokio::test]
async fn test_guard_rejects_anonymous() {
    let h = harness();

    let response = h
        .pipeline
        .process(make_request(Some("Basic abc123")), require_authentication(whoami))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "unauthenticated");
    assert_eq!(body["error_description"], "require authentication to access api");
}

#[tokio::test]
async fn test_guard_admits_authenticated() {
    let h = harness();

    let response = h
        .pipeline
        .process(make_request(Some("Bearer abc123")), require_authentication(whoami))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn test_slow_failure_becomes_gateway_timeout() {
    let h = harness();

    let response = h
        .pipeline
        .process(make_request(None), |state: RequestState, _: Request| -> BoxFuture<'static, Response> {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                let result: anyhow::Result<()> = Err(anyhow::anyhow!("wrote 3 of 5 rows"));
                ResponseFinalizer::<Rest, _>::new(&state, result)
                    .map(StatusCode::BAD_REQUEST, &[])
                    .write()
            })
        })
        .await;

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let body = body_json(response).await;
    assert_eq!(body["error"], "server_timeout");
    assert_eq!(body["error_description"], "server timeout");
    assert!(!body.to_string().contains("rows"));
    assert_eq!(h.recorder.count(Severity::Critical), 0);
}

#[tokio::test]
async fn test_unclassified_failure_logged_critical_once() {
    let h = harness();

    let response = h
        .pipeline
        .process(make_request(None), |state: RequestState, _: Request| -> BoxFuture<'static, Response> {
            Box::pin(async move {
                let result: anyhow::Result<()> = Err(anyhow::anyhow!("dsn=postgres://admin:hunter2@db"));
                ResponseFinalizer::<Rest, _>::new(&state, result).write()
            })
        })
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "server_error");
    assert!(!body.to_string().contains("hunter2"));
    assert_eq!(h.recorder.count(Severity::Critical), 1);
}
