//! Error object.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{
    constants::{INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR},
    ErrorCode,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: ErrorCode,
    pub message: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    pub const fn from_code(code: ErrorCode) -> Self {
        Self {
            message: Cow::Borrowed(code.msg()),
            code,
            data: None,
        }
    }

    pub const fn parse_error() -> Self {
        Self {
            code: ErrorCode::ParseError,
            message: Cow::Borrowed(PARSE_ERROR.1),
            data: None,
        }
    }

    pub const fn invalid_request() -> Self {
        Self {
            code: ErrorCode::InvalidRequest,
            message: Cow::Borrowed(INVALID_REQUEST.1),
            data: None,
        }
    }

    pub const fn method_not_found() -> Self {
        Self {
            code: ErrorCode::MethodNotFound,
            message: Cow::Borrowed(METHOD_NOT_FOUND.1),
            data: None,
        }
    }

    pub const fn invalid_params() -> Self {
        Self {
            code: ErrorCode::InvalidParams,
            message: Cow::Borrowed(INVALID_PARAMS.1),
            data: None,
        }
    }

    pub const fn internal_error() -> Self {
        Self {
            code: ErrorCode::InternalError,
            message: Cow::Borrowed(INTERNAL_ERROR.1),
            data: None,
        }
    }

    pub fn server_error(code: i32, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code: ErrorCode::ServerError(code),
            message: message.into(),
            data: None,
        }
    }
}

impl std::fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for ErrorObject {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_matches_code_and_message() {
        assert_eq!(format!("{}", ErrorObject::parse_error()), "-32700: Parse error");
        assert_eq!(format!("{}", ErrorObject::method_not_found()), "-32601: Method not found");
    }
}
