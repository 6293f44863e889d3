//! Request/response RPC envelopes over the packwire MessagePack codec.
//!
//! Every message is a [`Header`] value immediately followed by a body value
//! on the same stream. MessagePack is self-delimiting, so there is no extra
//! length framing. One [`RpcCodec`] owns one connection and serves either the
//! [`ClientCodec`] or the [`ServerCodec`] role.

pub mod codec;
pub mod conn;
pub mod error;
pub mod header;

pub use codec::{ClientCodec, RpcCodec, ServerCodec};
pub use conn::Connection;
pub use error::{Result, RpcError};
pub use header::Header;
