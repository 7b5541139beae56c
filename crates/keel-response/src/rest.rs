//! REST envelope writer.
//!
//! Success bodies look like `{"status":"success","data":...}`; failure bodies
//! look like
//! `{"status":"error","error":"...","error_description":"...","metadata":{...}}`.
//! The session is saved into the response headers before the body is built.

use crate::finalizer::{ResponseFinalizer, ResponseOutcome};
use crate::protocol::{Rest, REST_UNEXPECTED_DESCRIPTION};
use bytes::Bytes;
use chrono::Utc;
use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use http::{Response, StatusCode};
use http_body_util::Full;
use keel_core::{find_rich, is_code, Attr, ErrorCode, ReducedError, RequestState, RichError};
use keel_telemetry::fields;
use serde::{Deserialize, Serialize};

/// Response type produced by the REST writers.
pub type HttpResponse = Response<Full<Bytes>>;

/// Timestamp pattern used in error metadata and redirect queries.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Event logged when a response body could not be produced.
pub const WRITE_FAILED_EVENT: &str = "failed to write response";

const STATUS_SUCCESS: &str = "success";
const STATUS_ERROR: &str = "error";

/// The JSON envelope of every REST response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestEnvelope<T> {
    /// `success` or `error`; omitted by unwrapped error bodies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// The handler payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    /// Safe error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Safe error description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,

    /// Correlation data attached to errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ErrorMetadata>,
}

impl<T> RestEnvelope<T> {
    /// Wraps a success payload.
    pub fn success(data: T) -> Self {
        Self {
            status: Some(STATUS_SUCCESS.to_string()),
            data: Some(data),
            error: None,
            error_description: None,
            metadata: None,
        }
    }

    /// Builds an error body for `error`.
    pub fn failure(state: &RequestState, error: &ReducedError) -> Self {
        Self {
            status: Some(STATUS_ERROR.to_string()),
            data: None,
            error: Some(error.code().to_string()),
            error_description: Some(error.description().to_string()),
            metadata: Some(ErrorMetadata::now(state)),
        }
    }

    /// Drops the `status` field.
    #[must_use]
    pub fn without_status(mut self) -> Self {
        self.status = None;
        self
    }
}

/// Error correlation data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMetadata {
    /// UTC time the error was written, formatted with [`TIMESTAMP_FORMAT`].
    pub timestamp: String,
    /// The request id, empty if none was assigned.
    pub request_id: String,
}

impl ErrorMetadata {
    /// Captures the current time and the request id of `state`.
    pub fn now(state: &RequestState) -> Self {
        Self {
            timestamp: timestamp(),
            request_id: state
                .request_id()
                .map(|id| id.to_string())
                .unwrap_or_default(),
        }
    }
}

/// Returns the current UTC time formatted with [`TIMESTAMP_FORMAT`].
pub fn timestamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

impl<T: Serialize> ResponseFinalizer<Rest, T> {
    /// Finalizes and writes the enveloped response.
    pub fn write(self) -> HttpResponse {
        let (outcome, state) = self.finalize_with_state();
        match outcome {
            ResponseOutcome::Success { payload, code } => {
                json_response(&state, code, &RestEnvelope::success(payload))
            }
            ResponseOutcome::Failure { code, error } => {
                json_response(&state, code, &RestEnvelope::<()>::failure(&state, &error))
            }
        }
    }

    /// Finalizes and writes the payload without the success envelope.
    ///
    /// Errors still use the error body, minus the `status` field.
    pub fn write_without_wrap(self) -> HttpResponse {
        let (outcome, state) = self.finalize_with_state();
        match outcome {
            ResponseOutcome::Success { payload, code } => json_response(&state, code, &payload),
            ResponseOutcome::Failure { code, error } => json_response(
                &state,
                code,
                &RestEnvelope::<()>::failure(&state, &error).without_status(),
            ),
        }
    }
}

/// Writes an error body with an explicit status, code and description.
pub fn write_error(
    state: &RequestState,
    status: StatusCode,
    code: ErrorCode,
    description: impl Into<String>,
) -> HttpResponse {
    let error = ReducedError::new(code, description);
    json_response(state, status, &RestEnvelope::<()>::failure(state, &error))
}

/// Writes the response for a request that could not be parsed.
///
/// Errors that are, or wrap, `invalid_request` or a body/query decoding
/// error become 400 with their own text as description. Anything else is
/// answered with 500 and the generic message.
pub fn write_invalid_request_error(state: &RequestState, err: anyhow::Error) -> HttpResponse {
    if is_invalid_request(&err) {
        let description = find_rich(&err)
            .filter(|rich| rich.safe_code() == ErrorCode::INVALID_REQUEST)
            .map_or_else(|| format!("{err:#}"), |rich| rich.safe_description().to_string());
        return write_error(
            state,
            StatusCode::BAD_REQUEST,
            ErrorCode::INVALID_REQUEST,
            description,
        );
    }

    state
        .logger()
        .debug("failed-to-parse-data", &[Attr::new(fields::ERROR, format!("{err:#}"))]);
    write_error(
        state,
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorCode::SERVER_ERROR,
        REST_UNEXPECTED_DESCRIPTION,
    )
}

fn is_invalid_request(err: &anyhow::Error) -> bool {
    is_code(err, ErrorCode::INVALID_REQUEST)
        || err.chain().any(|layer| {
            layer.is::<serde_json::Error>() || layer.is::<serde_urlencoded::de::Error>()
        })
}

/// Saves the request's session into `headers`, logging a failure.
pub(crate) fn save_session(state: &RequestState, headers: &mut HeaderMap) {
    let Some(session) = state.session() else {
        return;
    };
    if let Err(err) = session.save(headers) {
        state
            .logger()
            .warn("failed-to-save-session", &[Attr::new(fields::ERROR, err)]);
    }
}

pub(crate) fn bare_response(status: StatusCode, headers: HeaderMap) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn json_response(state: &RequestState, status: StatusCode, body: &impl Serialize) -> HttpResponse {
    let mut headers = HeaderMap::new();
    save_session(state, &mut headers);

    match serde_json::to_vec(body) {
        Ok(bytes) => {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            let mut response = bare_response(status, headers);
            *response.body_mut() = Full::new(Bytes::from(bytes));
            response
        }
        Err(err) => {
            state
                .logger()
                .critical(WRITE_FAILED_EVENT, &[Attr::new(fields::ERROR, err)]);
            bare_response(StatusCode::INTERNAL_SERVER_ERROR, headers)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use keel_core::fixtures::{MemorySessionManager, RecordingLogger, SAVED_SESSION_HEADER};
    use keel_core::{Deadline, RequestId, Session, SessionHandle, Severity};
    use serde::ser::Error as _;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    async fn body_json(response: HttpResponse) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn state_with(recorder: &RecordingLogger) -> RequestState {
        RequestState::with_root_logger(recorder.handle()).with_request_id(RequestId::new())
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("cyclic payload"))
        }
    }

    #[tokio::test]
    async fn test_success_envelope() {
        let recorder = RecordingLogger::new();
        let state = state_with(&recorder);

        let response = ResponseFinalizer::<Rest, _>::new(&state, Ok("ok")).write();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(body_json(response).await, json!({"status": "success", "data": "ok"}));
        assert!(recorder.records().is_empty());
    }

    #[tokio::test]
    async fn test_error_envelope() {
        let recorder = RecordingLogger::new();
        let state = state_with(&recorder);
        let result: anyhow::Result<()> = Err(ErrorCode::DUPLICATED.enrich("email already used").into());

        let response = ResponseFinalizer::<Rest, _>::new(&state, result)
            .map(StatusCode::CONFLICT, &[ErrorCode::DUPLICATED])
            .write();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "duplicated");
        assert_eq!(body["error_description"], "email already used");
        assert_eq!(body["metadata"]["request_id"], state.request_id().unwrap().to_string());
        let stamp = body["metadata"]["timestamp"].as_str().unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).is_ok());
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn test_without_wrap() {
        let state = RequestState::new();

        let ok = ResponseFinalizer::<Rest, _>::new(&state, Ok(json!({"id": 1}))).write_without_wrap();
        assert_eq!(body_json(ok).await, json!({"id": 1}));

        let result: anyhow::Result<Value> = Err(ErrorCode::NOT_FOUND.enrich("gone").into());
        let failed = ResponseFinalizer::<Rest, _>::new(&state, result)
            .map(StatusCode::NOT_FOUND, &[ErrorCode::NOT_FOUND])
            .write_without_wrap();
        assert_eq!(failed.status(), StatusCode::NOT_FOUND);
        let body = body_json(failed).await;
        assert!(body.get("status").is_none());
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_body_hides_original() {
        let (deadline, _guard) = Deadline::start(Duration::from_millis(1), ErrorCode::SERVER_TIMEOUT);
        let state = RequestState::new().with_deadline(deadline);
        tokio::time::advance(Duration::from_millis(5)).await;

        let result: anyhow::Result<()> = Err(anyhow::anyhow!("charged card, email not sent"));
        let response = ResponseFinalizer::<Rest, _>::new(&state, result).write();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let body = body_json(response).await;
        assert_eq!(body["error"], "server_timeout");
        assert_eq!(body["error_description"], "server timeout");
    }

    #[tokio::test]
    async fn test_session_saved_before_write() {
        let manager = MemorySessionManager::new("s-9");
        let session = SessionHandle::new(Arc::new(manager.clone()), Session::existing("s-9"));
        let state = RequestState::new().with_session(session);

        let response = ResponseFinalizer::<Rest, _>::new(&state, Ok(1)).write();

        assert_eq!(manager.save_count(), 1);
        assert_eq!(response.headers()[SAVED_SESSION_HEADER], "s-9");
    }

    #[tokio::test]
    async fn test_unencodable_payload_is_bare_500() {
        let recorder = RecordingLogger::new();
        let state = state_with(&recorder);

        let response = ResponseFinalizer::<Rest, _>::new(&state, Ok(Unserializable)).write();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(CONTENT_TYPE).is_none());
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
        assert_eq!(
            recorder.find(WRITE_FAILED_EVENT).unwrap().severity,
            Severity::Critical
        );
    }

    #[tokio::test]
    async fn test_invalid_request_from_decoder() {
        let recorder = RecordingLogger::new();
        let state = state_with(&recorder);
        let err = serde_json::from_str::<Value>("{not json").unwrap_err();

        let response = write_invalid_request_error(&state, anyhow::Error::from(err).context("decoding body"));

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid_request");
        assert!(body["error_description"]
            .as_str()
            .unwrap()
            .starts_with("decoding body: "));
        assert!(recorder.records().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_request_from_classified_error() {
        let state = RequestState::new();
        let err = ErrorCode::INVALID_REQUEST.enrich("page must be positive").into();

        let body = body_json(write_invalid_request_error(&state, err)).await;

        assert_eq!(body["error_description"], "page must be positive");
    }

    #[tokio::test]
    async fn test_invalid_request_other_error_is_generic() {
        let recorder = RecordingLogger::new();
        let state = state_with(&recorder);

        let response = write_invalid_request_error(&state, anyhow::anyhow!("socket reset"));

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "server_error");
        assert_eq!(body["error_description"], REST_UNEXPECTED_DESCRIPTION);
        let record = recorder.find("failed-to-parse-data").unwrap();
        assert_eq!(record.severity, Severity::Debug);
        assert_eq!(record.attr("err"), Some("socket reset"));
    }

    #[test]
    fn test_envelope_roundtrip_shape() {
        let envelope: RestEnvelope<Value> =
            serde_json::from_value(json!({"status": "success", "data": [1, 2]})).unwrap();
        assert_eq!(envelope.data, Some(json!([1, 2])));
        assert!(envelope.metadata.is_none());
    }
}
