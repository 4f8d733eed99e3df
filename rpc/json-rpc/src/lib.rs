//! A small, protocol-only [JSON-RPC 2.0](https://www.jsonrpc.org/specification)
//! implementation: the `Request`/`Response` envelope, `Id`, and the error
//! object. Nothing in this crate knows about any particular method; it is
//! `cn-rpc-types`/`cn-rpc-interface` that layer daemon-specific meaning on
//! top (§6).

pub mod error;

mod id;
pub use id::Id;

mod version;
pub use version::Version;

mod request;
pub use request::Request;

mod response;
pub use response::Response;
