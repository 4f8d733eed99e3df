//! JSON-RPC 2.0 defined error codes and messages as constants.

pub const PARSE_ERROR: (i32, &str) = (-32700, "Parse error");
pub const INVALID_REQUEST: (i32, &str) = (-32600, "Invalid Request");
pub const METHOD_NOT_FOUND: (i32, &str) = (-32601, "Method not found");
pub const INVALID_PARAMS: (i32, &str) = (-32602, "Invalid params");
pub const INTERNAL_ERROR: (i32, &str) = (-32603, "Internal error");

/// Message for [`ErrorCode::ServerError`](crate::error::ErrorCode::ServerError);
/// the `i32` code itself is the caller's choice.
pub const SERVER_ERROR: &str = "Server error";
