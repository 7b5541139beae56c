//! RPC status encoder.

use crate::finalizer::{ResponseFinalizer, ResponseOutcome};
use crate::protocol::Rpc;
use tonic::Status;

impl<T> ResponseFinalizer<Rpc, T> {
    /// Finalizes into the handler's payload or a status carrying the
    /// assigned code and the safe message.
    pub fn into_result(self) -> Result<T, Status> {
        match self.finalize() {
            ResponseOutcome::Success { payload, .. } => Ok(payload),
            ResponseOutcome::Failure { code, error } => {
                Err(Status::new(code, single_line(&error.to_string())))
            }
        }
    }

    /// Like [`into_result`](Self::into_result), wrapped as a `tonic` response.
    pub fn into_response(self) -> Result<tonic::Response<T>, Status> {
        self.into_result().map(tonic::Response::new)
    }
}

/// Joins the lines of `message` with single spaces.
fn single_line(message: &str) -> String {
    message
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
