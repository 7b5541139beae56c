//! Standard log field names.
//!
//! Use these names for consistency across every record the runtime emits.

/// Request ID, attached to every record of a request.
pub const REQUEST_ID: &str = "request_id";

/// Identity of the node serving the request.
pub const NODE_ID: &str = "node_id";

/// Request URI.
pub const URI: &str = "uri";

/// HTTP method.
pub const METHOD: &str = "method";

/// Remote address of the caller.
pub const REMOTE_ADDR: &str = "rip";

/// Full RPC method name.
pub const FUNCTION: &str = "function";

/// Round-trip time of the request.
pub const RTT: &str = "rtt";

/// Authenticated user id.
pub const USER_ID: &str = "uid";

/// Granted scopes.
pub const SCOPE: &str = "scope";

/// Error text.
pub const ERROR: &str = "err";

/// Prefix of the attributes carrying each layer of an error chain.
pub const CAUSE_PREFIX: &str = "cause";

/// Builds the attribute key for layer `index` of an error chain.
#[must_use]
pub fn cause(index: usize) -> String {
    format!("{CAUSE_PREFIX}.{index}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cause_key() {
        assert_eq!(cause(0), "cause.0");
        assert_eq!(cause(3), "cause.3");
    }
}
