//! MessagePack encoding and decoding.
//!
//! Values are written with the shortest tag that holds them and read back
//! either into a typed destination or, when the shape is not known up front,
//! into an open [`Value`].
//!
//! - [`Encode`] / [`Decode`] are implemented for primitives, strings,
//!   [`Bytes`](bytes::Bytes), sequences, maps, `Option`, smart pointers,
//!   [`Timestamp`] and [`Value`].
//! - [`record!`] declares structs that travel as maps keyed by field name.
//! - [`Encoder`] / [`Decoder`] stream values over any `Write` / `Read`.
//! - [`DecodeConfig`] resolves the ambiguous cases of open decoding.

pub mod config;
pub mod decode;
pub mod encode;
pub mod error;
pub mod reader;
pub mod record;
pub mod timestamp;
pub mod value;
pub mod wire;
pub mod writer;

use bytes::BytesMut;

pub use bytes::Bytes;

pub use config::{DecodeConfig, EncodeOptions, MapContainer, TimestampResolution, DEFAULT_MAX_DEPTH};
pub use decode::Decode;
pub use encode::Encode;
pub use error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
pub use reader::{Decoder, Head, ValueReader};
pub use record::{decode_record, encode_record, Record};
pub use timestamp::Timestamp;
pub use value::Value;
pub use writer::{encode_to_bytes, Encoder, ValueWriter};

/// Encode `value` into a new buffer.
pub fn marshal<T: Encode + ?Sized>(value: &T, options: &EncodeOptions) -> EncodeResult<Bytes> {
    encode_to_bytes(value, options)
}

/// Decode one value from `bytes` into a fresh `T`.
///
/// Trailing bytes after the first value are ignored.
pub fn unmarshal<T: Decode + Default>(bytes: &[u8], config: &DecodeConfig) -> DecodeResult<T> {
    let mut value = T::default();
    unmarshal_into(bytes, Some(&mut value), config)?;
    Ok(value)
}

/// Decode one value from `bytes` into existing storage.
///
/// Fails with [`DecodeError::NoAddressableTarget`] when `dest` is `None`.
pub fn unmarshal_into<T: Decode + ?Sized>(
    bytes: &[u8],
    dest: Option<&mut T>,
    config: &DecodeConfig,
) -> DecodeResult<()> {
    let dest = dest.ok_or(DecodeError::NoAddressableTarget)?;
    let mut src = bytes;
    let mut buf = BytesMut::new();
    let mut reader = ValueReader::new(&mut src, &mut buf, config);
    if !reader.has_more()? {
        return Err(DecodeError::EndOfStream);
    }
    dest.decode_from(&mut reader)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn someday() {
        let bytes = marshal("someday", &EncodeOptions::default()).unwrap();
        assert_eq!(&bytes[..], [0xa7, b's', b'o', b'm', b'e', b'd', b'a', b'y']);
        let v: Value = unmarshal(&bytes, &DecodeConfig::default()).unwrap();
        assert_eq!(v.as_str(), Some("someday"));
    }

    #[test]
    fn negative_fixint() {
        let bytes = marshal(&-8i64, &EncodeOptions::default()).unwrap();
        assert_eq!(&bytes[..], [0xf8]);
        let v: Value = unmarshal(&bytes, &DecodeConfig::default()).unwrap();
        assert_eq!(v, Value::Int8(-8));
    }

    #[test]
    fn shortest_positive() {
        assert_eq!(&marshal(&8u32, &EncodeOptions::default()).unwrap()[..], [0x08]);
    }

    #[test]
    fn nil_destination() {
        let err = unmarshal_into::<Value>(&[0x01], None, &DecodeConfig::default()).unwrap_err();
        assert!(matches!(err, DecodeError::NoAddressableTarget));
    }

    #[test]
    fn in_place_update() {
        let mut v = vec![9u8, 9, 9];
        unmarshal_into(&[0x91, 0x01], Some(&mut v), &DecodeConfig::default()).unwrap();
        assert_eq!(v, [1]);
    }

    #[test]
    fn empty_input() {
        let err = unmarshal::<bool>(&[], &DecodeConfig::default()).unwrap_err();
        assert!(matches!(err, DecodeError::EndOfStream));
    }
}
