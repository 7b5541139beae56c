//! Redirect variant of the REST writer.
//!
//! Used by browser-facing flows (OAuth2 authorize, login callbacks) where the
//! caller expects a `Location` rather than a JSON body.

use crate::finalizer::{ResponseFinalizer, ResponseOutcome};
use crate::protocol::Rest;
use crate::rest::{bare_response, save_session, timestamp, HttpResponse, WRITE_FAILED_EVENT};
use http::header::{HeaderMap, HeaderValue, LOCATION};
use http::StatusCode;
use keel_core::{Attr, ReducedError, RequestState};
use keel_telemetry::fields;
use url::Url;

/// Query keys a failed redirect carries.
pub const ERROR_QUERY_KEYS: [&str; 4] = ["error", "error_description", "timestamp", "request_id"];

impl ResponseFinalizer<Rest, String> {
    /// Finalizes and answers with a redirect.
    ///
    /// On success the payload is the destination. On failure the client is
    /// sent to `failure_target` with the safe error fields appended to its
    /// query, replacing any existing values for those keys.
    pub fn redirect(self, redirect_code: StatusCode, failure_target: Url) -> HttpResponse {
        let (outcome, state) = self.finalize_with_state();
        let destination = match outcome {
            ResponseOutcome::Success { payload, .. } => payload,
            ResponseOutcome::Failure { error, .. } => {
                error_destination(&state, failure_target, &error).into()
            }
        };

        let mut headers = HeaderMap::new();
        save_session(&state, &mut headers);

        match HeaderValue::try_from(destination) {
            Ok(location) => {
                headers.insert(LOCATION, location);
                bare_response(redirect_code, headers)
            }
            Err(err) => {
                state
                    .logger()
                    .critical(WRITE_FAILED_EVENT, &[Attr::new(fields::ERROR, err)]);
                bare_response(StatusCode::INTERNAL_SERVER_ERROR, headers)
            }
        }
    }
}

fn error_destination(state: &RequestState, mut target: Url, error: &ReducedError) -> Url {
    let retained: Vec<(String, String)> = target
        .query_pairs()
        .filter(|(key, _)| !ERROR_QUERY_KEYS.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    let request_id = state
        .request_id()
        .map(|id| id.to_string())
        .unwrap_or_default();

    target
        .query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair("error", error.code().as_str())
        .append_pair("error_description", error.description())
        .append_pair("timestamp", &timestamp())
        .append_pair("request_id", &request_id);
    target
}
