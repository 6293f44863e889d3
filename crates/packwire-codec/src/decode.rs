//! The [`Decode`] trait and its implementations for standard types.
//!
//! Decoding writes into existing storage. Scalars accept every compatible
//! wire category (any integer tag into any integer type that can hold the
//! value, integers and either float width into floats). Nil resets a scalar
//! or container to its empty value and clears an `Option`.

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use bytes::Bytes;

use crate::error::{DecodeError, DecodeResult};
use crate::reader::{prealloc, Head, ValueReader};
use crate::timestamp::Timestamp;
use crate::wire::{self, Integer};

/// A destination that MessagePack can be decoded into.
///
/// Object safe, so records can hand out their fields as `&mut dyn Decode`.
pub trait Decode {
    fn decode_from(&mut self, r: &mut ValueReader<'_>) -> DecodeResult<()>;
}

impl<T: Decode + ?Sized> Decode for &mut T {
    fn decode_from(&mut self, r: &mut ValueReader<'_>) -> DecodeResult<()> {
        (**self).decode_from(r)
    }
}

impl Decode for () {
    fn decode_from(&mut self, r: &mut ValueReader<'_>) -> DecodeResult<()> {
        match r.read_head()? {
            Head::Nil => Ok(()),
            other => Err(other.mismatch("()")),
        }
    }
}

impl Decode for bool {
    fn decode_from(&mut self, r: &mut ValueReader<'_>) -> DecodeResult<()> {
        match r.read_head()? {
            Head::Bool(b) => *self = b,
            Head::Nil => *self = false,
            other => return Err(other.mismatch("bool")),
        }
        Ok(())
    }
}

fn integer_into<T>(value: Integer, target: &'static str) -> DecodeResult<T>
where
    T: TryFrom<u64> + TryFrom<i64>,
{
    let converted = match value {
        Integer::Unsigned(v) => <T as TryFrom<u64>>::try_from(v).ok(),
        Integer::Signed(v) => <T as TryFrom<i64>>::try_from(v).ok(),
    };
    converted.ok_or_else(|| DecodeError::Overflow {
        value: value.to_string(),
        target,
    })
}

macro_rules! decode_int {
    ($($ty:ty),*) => {$(
        impl Decode for $ty {
            fn decode_from(&mut self, r: &mut ValueReader<'_>) -> DecodeResult<()> {
                match r.read_head()? {
                    Head::Int { value, .. } => *self = integer_into(value, stringify!($ty))?,
                    Head::Nil => *self = 0,
                    other => return Err(other.mismatch(stringify!($ty))),
                }
                Ok(())
            }
        }
    )*};
}

decode_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl Decode for f64 {
    fn decode_from(&mut self, r: &mut ValueReader<'_>) -> DecodeResult<()> {
        match r.read_head()? {
            Head::F64(v) => *self = v,
            Head::F32(v) => *self = f64::from(v),
            Head::Int { value, .. } => *self = value.as_f64(),
            Head::Nil => *self = 0.0,
            other => return Err(other.mismatch("f64")),
        }
        Ok(())
    }
}

impl Decode for f32 {
    fn decode_from(&mut self, r: &mut ValueReader<'_>) -> DecodeResult<()> {
        match r.read_head()? {
            Head::F32(v) => *self = v,
            Head::F64(v) => *self = v as f32,
            Head::Int { value, .. } => *self = value.as_f64() as f32,
            Head::Nil => *self = 0.0,
            other => return Err(other.mismatch("f32")),
        }
        Ok(())
    }
}

/// Accepts str and bin data; bin must hold valid UTF-8.
impl Decode for String {
    fn decode_from(&mut self, r: &mut ValueReader<'_>) -> DecodeResult<()> {
        match r.read_head()? {
            Head::Str(len) | Head::Bin(len) => *self = r.read_text(len)?,
            Head::Nil => self.clear(),
            other => return Err(other.mismatch("String")),
        }
        Ok(())
    }
}

/// Accepts bin and str data.
impl Decode for Bytes {
    fn decode_from(&mut self, r: &mut ValueReader<'_>) -> DecodeResult<()> {
        match r.read_head()? {
            Head::Bin(len) | Head::Str(len) => *self = Bytes::from(r.read_payload(len)?),
            Head::Nil => *self = Bytes::new(),
            other => return Err(other.mismatch("Bytes")),
        }
        Ok(())
    }
}

/// Interpret a timestamp extension payload.
pub(crate) fn timestamp_from_ext(
    type_code: i8,
    payload: &[u8],
    r: &ValueReader<'_>,
) -> DecodeResult<Timestamp> {
    let resolution = r.config().timestamp_resolution;
    let malformed = || DecodeError::MalformedExtension {
        type_code,
        len: payload.len(),
    };
    let overflow = |value: String| DecodeError::Overflow {
        value,
        target: "Timestamp",
    };
    match type_code {
        wire::TIMESTAMP_EXT_TYPE => {
            let ticks = i64::from_be_bytes(payload.try_into().map_err(|_| malformed())?);
            Timestamp::from_ticks(ticks, resolution).ok_or_else(|| overflow(ticks.to_string()))
        }
        wire::STANDARD_TIMESTAMP_EXT_TYPE => {
            let (secs, nanos) = match payload.len() {
                4 => {
                    let secs = u32::from_be_bytes(payload.try_into().map_err(|_| malformed())?);
                    (i64::from(secs), 0u32)
                }
                8 => {
                    let raw = u64::from_be_bytes(payload.try_into().map_err(|_| malformed())?);
                    ((raw & 0x3_ffff_ffff) as i64, (raw >> 34) as u32)
                }
                12 => {
                    let nanos = u32::from_be_bytes(payload[..4].try_into().map_err(|_| malformed())?);
                    let secs = i64::from_be_bytes(payload[4..].try_into().map_err(|_| malformed())?);
                    (secs, nanos)
                }
                _ => return Err(malformed()),
            };
            let ts = Timestamp::from_parts(secs, nanos)
                .ok_or_else(|| overflow(format!("{secs}s+{nanos}ns")))?;
            Ok(ts.truncate(resolution))
        }
        other => Err(DecodeError::UnknownExtension { type_code: other }),
    }
}

/// Accepts the timestamp extensions, and a bare integer as a tick count at
/// the configured resolution.
impl Decode for Timestamp {
    fn decode_from(&mut self, r: &mut ValueReader<'_>) -> DecodeResult<()> {
        match r.read_head()? {
            Head::Ext(type_code, len) => {
                let payload = r.read_payload(len)?;
                *self = timestamp_from_ext(type_code, &payload, r)?;
            }
            Head::Int { value, .. } => {
                let ticks: i64 = integer_into(value, "Timestamp")?;
                *self = Timestamp::from_ticks(ticks, r.config().timestamp_resolution).ok_or_else(
                    || DecodeError::Overflow {
                        value: ticks.to_string(),
                        target: "Timestamp",
                    },
                )?;
            }
            Head::Nil => *self = Timestamp::UNIX_EPOCH,
            other => return Err(other.mismatch("Timestamp")),
        }
        Ok(())
    }
}

fn reserve<T>(vec: &mut Vec<T>, len: usize) -> DecodeResult<()> {
    vec.try_reserve(prealloc(len))
        .map_err(|_| DecodeError::AllocationFailure { requested: len })
}

/// Replaces the contents with the decoded array.
impl<T: Decode + Default> Decode for Vec<T> {
    fn decode_from(&mut self, r: &mut ValueReader<'_>) -> DecodeResult<()> {
        match r.read_head()? {
            Head::Array(len) => {
                self.clear();
                reserve(self, len)?;
                r.descend()?;
                for _ in 0..len {
                    let mut item = T::default();
                    item.decode_from(r)?;
                    self.push(item);
                }
                r.ascend();
            }
            Head::Nil => self.clear(),
            other => return Err(other.mismatch("Vec")),
        }
        Ok(())
    }
}

fn decode_entries<K, V>(
    r: &mut ValueReader<'_>,
    len: usize,
    mut insert: impl FnMut(K, V),
) -> DecodeResult<()>
where
    K: Decode + Default,
    V: Decode + Default,
{
    r.descend()?;
    for _ in 0..len {
        let mut key = K::default();
        key.decode_from(r)?;
        let mut value = V::default();
        value.decode_from(r)?;
        insert(key, value);
    }
    r.ascend();
    Ok(())
}

/// Decoded entries are merged into the existing map.
impl<K, V, S> Decode for HashMap<K, V, S>
where
    K: Decode + Default + Eq + Hash,
    V: Decode + Default,
    S: BuildHasher,
{
    fn decode_from(&mut self, r: &mut ValueReader<'_>) -> DecodeResult<()> {
        match r.read_head()? {
            Head::Map(len) => {
                self.try_reserve(prealloc(len))
                    .map_err(|_| DecodeError::AllocationFailure { requested: len })?;
                decode_entries(r, len, |k, v| {
                    self.insert(k, v);
                })
            }
            Head::Nil => {
                self.clear();
                Ok(())
            }
            other => Err(other.mismatch("HashMap")),
        }
    }
}

impl<K, V> Decode for BTreeMap<K, V>
where
    K: Decode + Default + Ord,
    V: Decode + Default,
{
    fn decode_from(&mut self, r: &mut ValueReader<'_>) -> DecodeResult<()> {
        match r.read_head()? {
            Head::Map(len) => decode_entries(r, len, |k, v| {
                self.insert(k, v);
            }),
            Head::Nil => {
                self.clear();
                Ok(())
            }
            other => Err(other.mismatch("BTreeMap")),
        }
    }
}

/// Nil clears the option; anything else decodes into the existing value,
/// allocating a default one first when absent.
impl<T: Decode + Default> Decode for Option<T> {
    fn decode_from(&mut self, r: &mut ValueReader<'_>) -> DecodeResult<()> {
        if r.take_nil()? {
            *self = None;
            return Ok(());
        }
        self.get_or_insert_with(T::default).decode_from(r)
    }
}

impl<T: Decode + ?Sized> Decode for Box<T> {
    fn decode_from(&mut self, r: &mut ValueReader<'_>) -> DecodeResult<()> {
        (**self).decode_from(r)
    }
}
