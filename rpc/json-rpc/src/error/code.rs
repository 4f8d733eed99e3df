//! Error codes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::constants::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, SERVER_ERROR,
};

/// Custom codes past `-32099` are not modeled; nothing in this daemon's
/// RPC surface needs one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorCode {
    #[error("{}: {}", PARSE_ERROR.0, PARSE_ERROR.1)]
    ParseError,
    #[error("{}: {}", INVALID_REQUEST.0, INVALID_REQUEST.1)]
    InvalidRequest,
    #[error("{}: {}", METHOD_NOT_FOUND.0, METHOD_NOT_FOUND.1)]
    MethodNotFound,
    #[error("{}: {}", INVALID_PARAMS.0, INVALID_PARAMS.1)]
    InvalidParams,
    #[error("{}: {}", INTERNAL_ERROR.0, INTERNAL_ERROR.1)]
    InternalError,
    #[error("{0}: {SERVER_ERROR}")]
    ServerError(i32),
}

impl ErrorCode {
    pub const fn from_code(code: i32) -> Self {
        mod i32s {
            use super::*;
            pub(super) const PARSE_ERROR_I32: i32 = PARSE_ERROR.0;
            pub(super) const INVALID_REQUEST_I32: i32 = INVALID_REQUEST.0;
            pub(super) const METHOD_NOT_FOUND_I32: i32 = METHOD_NOT_FOUND.0;
            pub(super) const INVALID_PARAMS_I32: i32 = INVALID_PARAMS.0;
            pub(super) const INTERNAL_ERROR_I32: i32 = INTERNAL_ERROR.0;
        }
        use i32s::*;

        match code {
            PARSE_ERROR_I32 => Self::ParseError,
            INVALID_REQUEST_I32 => Self::InvalidRequest,
            METHOD_NOT_FOUND_I32 => Self::MethodNotFound,
            INVALID_PARAMS_I32 => Self::InvalidParams,
            INTERNAL_ERROR_I32 => Self::InternalError,
            code => Self::ServerError(code),
        }
    }

    pub const fn code(&self) -> i32 {
        match self {
            Self::ParseError => PARSE_ERROR.0,
            Self::InvalidRequest => INVALID_REQUEST.0,
            Self::MethodNotFound => METHOD_NOT_FOUND.0,
            Self::InvalidParams => INVALID_PARAMS.0,
            Self::InternalError => INTERNAL_ERROR.0,
            Self::ServerError(code) => *code,
        }
    }

    pub const fn msg(&self) -> &'static str {
        match self {
            Self::ParseError => PARSE_ERROR.1,
            Self::InvalidRequest => INVALID_REQUEST.1,
            Self::MethodNotFound => METHOD_NOT_FOUND.1,
            Self::InvalidParams => INVALID_PARAMS.1,
            Self::InternalError => INTERNAL_ERROR.1,
            Self::ServerError(_) => SERVER_ERROR,
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_code(i32::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_through_code() {
        for code in [
            ErrorCode::ParseError,
            ErrorCode::InvalidRequest,
            ErrorCode::MethodNotFound,
            ErrorCode::InvalidParams,
            ErrorCode::InternalError,
            ErrorCode::ServerError(1),
        ] {
            assert_eq!(ErrorCode::from_code(code.code()), code);
        }
    }

    #[test]
    fn unknown_code_is_server_error() {
        assert_eq!(ErrorCode::from_code(0), ErrorCode::ServerError(0));
    }
}
