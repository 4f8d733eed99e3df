//! JSON-RPC 2.0 response object.

use serde::{ser::SerializeStruct, Deserialize, Deserializer, Serialize, Serializer};

use crate::{error::ErrorObject, id::Id, version::Version};

/// Exactly one of a successful payload or an [`ErrorObject`], matching
/// the `result`/`error` mutual exclusion the spec requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response<T> {
    pub jsonrpc: Version,
    pub id: Id,
    pub payload: Result<T, ErrorObject>,
}

impl<T> Response<T> {
    pub const fn ok(id: Id, result: T) -> Self {
        Self {
            jsonrpc: Version,
            id,
            payload: Ok(result),
        }
    }

    pub const fn err(id: Id, error: ErrorObject) -> Self {
        Self {
            jsonrpc: Version,
            id,
            payload: Err(error),
        }
    }
}

impl<T: Serialize> Serialize for Response<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Response", 3)?;
        state.serialize_field("jsonrpc", &self.jsonrpc)?;
        state.serialize_field("id", &self.id)?;
        match &self.payload {
            Ok(result) => state.serialize_field("result", result)?,
            Err(error) => state.serialize_field("error", error)?,
        }
        state.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Response<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw<T> {
            jsonrpc: Version,
            id: Id,
            result: Option<T>,
            error: Option<ErrorObject>,
        }

        let raw = Raw::<T>::deserialize(deserializer)?;
        let payload = match (raw.result, raw.error) {
            (Some(result), None) => Ok(result),
            (None, Some(error)) => Err(error),
            _ => return Err(serde::de::Error::custom("expected exactly one of result/error")),
        };

        Ok(Self {
            jsonrpc: raw.jsonrpc,
            id: raw.id,
            payload,
        })
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn ok_serializes_result() {
        let resp = Response::ok(Id::Num(1), 5u64);
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({"jsonrpc": "2.0", "id": 1, "result": 5})
        );
    }

    #[test]
    fn err_serializes_error() {
        let resp = Response::<u64>::err(Id::Num(1), ErrorObject::method_not_found());
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["error"]["code"], json!(-32601));
    }
}
