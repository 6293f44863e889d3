/// Errors that can occur while encoding a value.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The value cannot be represented on the wire.
    #[error("unsupported value ({type_name}): {reason}")]
    UnsupportedType {
        type_name: &'static str,
        reason: String,
    },

    /// A shared pointer refers back to a value that is still being encoded.
    #[error("cyclic reference detected while encoding")]
    CyclicReference,

    /// Writing the encoded bytes to the sink failed.
    #[error("sink write failed: {0}")]
    SinkWriteFailure(#[from] std::io::Error),
}

/// Errors that can occur while decoding a value.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The tag byte is not a valid MessagePack tag.
    #[error("malformed tag byte 0x{tag:02x}")]
    MalformedTag { tag: u8 },

    /// The source ended in the middle of a value.
    #[error("stream truncated ({needed} more bytes expected)")]
    TruncatedStream { needed: usize },

    /// The source ended cleanly before the first byte of a value.
    #[error("end of stream")]
    EndOfStream,

    /// The wire category cannot be stored in the destination.
    #[error("type mismatch: cannot decode {found} into {expected}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// The wire value does not fit the destination type.
    #[error("value {value} overflows {target}")]
    Overflow { value: String, target: &'static str },

    /// The destination has no storage to write the result into.
    #[error("no addressable target to decode into")]
    NoAddressableTarget,

    /// Reading from the source failed.
    #[error("source read failed: {0}")]
    SourceReadFailure(#[from] std::io::Error),

    /// An extension type code that this decoder does not handle.
    #[error("unknown extension type {type_code}")]
    UnknownExtension { type_code: i8 },

    /// A known extension with a payload of the wrong size.
    #[error("malformed extension type {type_code} ({len} byte payload)")]
    MalformedExtension { type_code: i8, len: usize },

    /// Reserving memory for a declared length failed.
    ///
    /// Declared lengths only cap pre-allocation, which is bounded per chunk,
    /// so this surfaces only when the allocator refuses a small reservation.
    /// A length header larger than the stream fails as `TruncatedStream`.
    #[error("allocation of {requested} elements failed")]
    AllocationFailure { requested: usize },

    /// A text value was not valid UTF-8.
    #[error("invalid utf-8 in text value: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Containers are nested deeper than the configured limit.
    #[error("nesting depth exceeds limit of {max}")]
    DepthLimitExceeded { max: usize },
}

pub type EncodeResult<T> = std::result::Result<T, EncodeError>;
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;
