use packwire_codec::{DecodeError, EncodeError};

/// Errors that can occur in RPC codec operations.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Encoding a header or body failed.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Decoding a header or body failed.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Connection-level I/O error outside of encoding or decoding.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The codec has been closed.
    #[error("codec is closed")]
    Closed,

    /// An earlier error left the stream out of sync.
    #[error("codec is unusable after an earlier error")]
    Poisoned,

    /// The peer closed the connection between messages.
    #[error("connection closed by peer")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, RpcError>;
