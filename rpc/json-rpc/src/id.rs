//! Request/response correlation ID.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Null,
    Num(u64),
    Str(Cow<'static, str>),
}

impl Id {
    pub const fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<u64> for Id {
    fn from(n: u64) -> Self {
        Self::Num(n)
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Self::Str(Cow::Owned(s))
    }
}

impl From<&'static str> for Id {
    fn from(s: &'static str) -> Self {
        Self::Str(Cow::Borrowed(s))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn null_is_null() {
        assert!(Id::Null.is_null());
        assert!(!Id::Num(0).is_null());
    }

    #[test]
    fn accessors() {
        assert_eq!(Id::Num(5).as_u64(), Some(5));
        assert_eq!(Id::from("x").as_str(), Some("x"));
        assert_eq!(Id::Null.as_u64(), None);
    }
}
