//! Wire protocols a response can be finalized for.

use keel_core::{ErrorCode, ReducedError};
use std::fmt::Debug;

/// Description of the generic REST fallback error.
pub const REST_UNEXPECTED_DESCRIPTION: &str =
    "an unexpected error occurred, please contact to admin if you see this error";

/// Code of the generic RPC fallback error.
pub const RPC_UNEXPECTED_CODE: ErrorCode = ErrorCode::new("unexpected_server_error");

/// Description of the generic RPC fallback error.
pub const RPC_UNEXPECTED_DESCRIPTION: &str = "an unexpected error occured";

/// A transport protocol and its status code vocabulary.
pub trait Protocol: Send + Sync + 'static {
    /// The protocol's status code type.
    type Code: Copy + Eq + Debug + Send + Sync + 'static;

    /// Default code when no error occurred.
    fn success() -> Self::Code;

    /// Code assigned when the request's own deadline expired.
    fn timeout() -> Self::Code;

    /// Catch-all code for errors no rule matched.
    fn internal() -> Self::Code;

    /// Returns true for the "unassigned" sentinel, which may never be a
    /// target code.
    fn is_sentinel(_code: Self::Code) -> bool {
        false
    }

    /// The placeholder disclosed in place of an unclassified error.
    fn unexpected_error() -> ReducedError;
}

/// HTTP/REST surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rest;

impl Protocol for Rest {
    type Code = http::StatusCode;

    fn success() -> Self::Code {
        http::StatusCode::OK
    }

    fn timeout() -> Self::Code {
        http::StatusCode::GATEWAY_TIMEOUT
    }

    fn internal() -> Self::Code {
        http::StatusCode::INTERNAL_SERVER_ERROR
    }

    fn unexpected_error() -> ReducedError {
        ReducedError::new(ErrorCode::SERVER_ERROR, REST_UNEXPECTED_DESCRIPTION)
    }
}

/// RPC surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rpc;

impl Protocol for Rpc {
    type Code = tonic::Code;

    fn success() -> Self::Code {
        tonic::Code::Ok
    }

    fn timeout() -> Self::Code {
        tonic::Code::DeadlineExceeded
    }

    fn internal() -> Self::Code {
        tonic::Code::Internal
    }

    fn is_sentinel(code: Self::Code) -> bool {
        code == tonic::Code::Unknown
    }

    fn unexpected_error() -> ReducedError {
        ReducedError::new(RPC_UNEXPECTED_CODE, RPC_UNEXPECTED_DESCRIPTION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_defaults() {
        assert_eq!(Rest::success(), http::StatusCode::OK);
        assert_eq!(Rest::timeout(), http::StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(Rest::internal(), http::StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!Rest::is_sentinel(http::StatusCode::OK));
    }

    #[test]
    fn test_rpc_unknown_is_sentinel() {
        assert!(Rpc::is_sentinel(tonic::Code::Unknown));
        assert!(!Rpc::is_sentinel(tonic::Code::Internal));
    }

    #[test]
    fn test_rpc_unexpected_message_is_single_line() {
        let message = Rpc::unexpected_error().to_string();
        assert_eq!(message, "unexpected_server_error: an unexpected error occured");
        assert!(!message.contains('\n'));
    }
}
