//! MessagePack serialization with typed and open-value decoding.
//!
//! # Crate Structure
//!
//! - [`codec`]: Wire format, encoder, decoder, open values, records
//! - [`rpc`]: Request/response envelopes over a connection (behind `rpc` feature)

/// Re-export codec types.
pub mod codec {
    pub use packwire_codec::*;
}

/// Re-export RPC types (requires `rpc` feature).
#[cfg(feature = "rpc")]
pub mod rpc {
    pub use packwire_rpc::*;
}

pub use packwire_codec::{marshal, unmarshal, unmarshal_into, Decoder, Encoder, Value};
