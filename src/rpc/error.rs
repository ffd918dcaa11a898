//! JSON-RPC 2.0 error objects and the crate's code assignments.

use serde::Serialize;

/// Request body was not valid JSON.
pub const PARSE_ERROR: i64 = -32700;
/// Request was valid JSON but not a valid request object.
pub const INVALID_REQUEST: i64 = -32600;
/// No such method.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Params did not match the method's schema.
pub const INVALID_PARAMS: i64 = -32602;
/// Any error from the core services.
pub const SERVER_ERROR: i64 = -32000;

/// A JSON-RPC error object.
#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    /// One of the codes above.
    pub code: i64,
    /// Human-readable description.
    pub message: String,
}

impl RpcError {
    /// The body was not parseable JSON.
    pub fn parse(err: impl std::fmt::Display) -> Self {
        Self { code: PARSE_ERROR, message: format!("parse error: {err}") }
    }

    /// The entry was not a request object.
    pub fn invalid_request() -> Self {
        Self { code: INVALID_REQUEST, message: "invalid request".into() }
    }

    /// The method name is not registered.
    pub fn method_not_found(method: &str) -> Self {
        Self { code: METHOD_NOT_FOUND, message: format!("method not found: {method}") }
    }

    /// The params did not deserialize into the method's schema.
    pub fn invalid_params(err: impl std::fmt::Display) -> Self {
        Self { code: INVALID_PARAMS, message: format!("invalid params: {err}") }
    }

    /// A core-service failure, surfaced with its message.
    pub fn core(err: impl std::fmt::Display) -> Self {
        Self { code: SERVER_ERROR, message: err.to_string() }
    }
}
