//! JSON-RPC 2.0 request object.

use serde::{Deserialize, Serialize};

use crate::{id::Id, version::Version};

/// The generic `T` carries both `method` and `params`, flattened, so that
/// callers can use a `#[serde(tag = "method", content = "params")]` enum
/// as the body.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Request<T> {
    pub jsonrpc: Version,

    /// Omitted entirely when `None`; a request with no `id` is a
    /// notification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,

    #[serde(flatten)]
    pub body: T,
}

impl<T> Request<T> {
    pub const fn new(body: T) -> Self {
        Self {
            jsonrpc: Version,
            id: None,
            body,
        }
    }

    pub const fn new_with_id(id: Id, body: T) -> Self {
        Self {
            jsonrpc: Version,
            id: Some(id),
            body,
        }
    }

    pub const fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "method", content = "params")]
    #[serde(rename_all = "snake_case")]
    enum Method {
        GetHeight,
    }

    #[test]
    fn none_id_omits_field() {
        let req = Request::new(Method::GetHeight);
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value, json!({"jsonrpc": "2.0", "method": "get_height"}));
    }

    #[test]
    fn some_id_serializes() {
        let req = Request::new_with_id(Id::Num(7), Method::GetHeight);
        assert!(!req.is_notification());
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "id": 7, "method": "get_height"})
        );
    }
}
