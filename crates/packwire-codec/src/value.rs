//! Open values: the representation chosen when the destination shape is not
//! known at decode time.

use std::collections::{HashMap, HashSet};
use std::fmt;

use bytes::Bytes;

use crate::config::MapContainer;
use crate::decode::{timestamp_from_ext, Decode};
use crate::encode::Encode;
use crate::error::{DecodeError, DecodeResult, EncodeResult};
use crate::reader::{prealloc, Head, ValueReader};
use crate::timestamp::Timestamp;
use crate::wire::{self, Integer};
use crate::writer::ValueWriter;

/// Any MessagePack value.
///
/// Decoding into a `Value` follows [`DecodeConfig`](crate::DecodeConfig):
/// integers come back as `Int8` when small and narrowing is on, otherwise as
/// `Int64`/`UInt64`; maps come back as `Map` when every key is text.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    String(String),
    Binary(Bytes),
    Array(Vec<Value>),
    /// Text-keyed map.
    Map(HashMap<String, Value>),
    /// Map with arbitrary keys, in wire order.
    AnyMap(Vec<(Value, Value)>),
    Timestamp(Timestamp),
    /// Extension with a type code this codec does not interpret.
    Extension { type_code: i8, data: Bytes },
}

impl Value {
    /// Short category name.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int8(_) => "int8",
            Value::Int16(_) => "int16",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::UInt8(_) => "uint8",
            Value::UInt16(_) => "uint16",
            Value::UInt32(_) => "uint32",
            Value::UInt64(_) => "uint64",
            Value::Float32(_) => "float32",
            Value::Float64(_) => "float64",
            Value::String(_) => "string",
            Value::Binary(_) => "binary",
            Value::Array(_) => "array",
            Value::Map(_) | Value::AnyMap(_) => "map",
            Value::Timestamp(_) => "timestamp",
            Value::Extension { .. } => "extension",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    fn integer(&self) -> Option<Integer> {
        Some(match *self {
            Value::Int8(v) => Integer::Signed(i64::from(v)),
            Value::Int16(v) => Integer::Signed(i64::from(v)),
            Value::Int32(v) => Integer::Signed(i64::from(v)),
            Value::Int64(v) => Integer::Signed(v),
            Value::UInt8(v) => Integer::Unsigned(u64::from(v)),
            Value::UInt16(v) => Integer::Unsigned(u64::from(v)),
            Value::UInt32(v) => Integer::Unsigned(u64::from(v)),
            Value::UInt64(v) => Integer::Unsigned(v),
            _ => return None,
        })
    }

    /// Any integer variant whose value fits in `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        self.integer().and_then(Integer::as_i64)
    }

    /// Any non-negative integer variant.
    pub fn as_u64(&self) -> Option<u64> {
        self.integer().and_then(Integer::as_u64)
    }

    /// Floats, and integers converted to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float32(v) => Some(f64::from(v)),
            Value::Float64(v) => Some(v),
            _ => self.integer().map(Integer::as_f64),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<Timestamp> {
        match *self {
            Value::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }

    /// Look up a text key in either map form.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(m) => m.get(key),
            Value::AnyMap(entries) => entries
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Render as JSON for logs and diagnostics.
    ///
    /// Binary data becomes an array of byte values, timestamps become Unix
    /// nanoseconds, non-text map keys are rendered as their JSON text.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Nil => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Float32(v) => float_json(f64::from(*v)),
            Value::Float64(v) => float_json(*v),
            Value::String(s) => Json::String(s.clone()),
            Value::Binary(b) => bytes_json(b),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(m) => Json::Object(m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
            Value::AnyMap(entries) => Json::Object(
                entries
                    .iter()
                    .map(|(k, v)| {
                        let key = match k {
                            Value::String(s) => s.clone(),
                            other => other.to_json().to_string(),
                        };
                        (key, v.to_json())
                    })
                    .collect(),
            ),
            Value::Timestamp(ts) => Json::from(ts.unix_nanos()),
            Value::Extension { type_code, data } => serde_json::json!({
                "type": type_code,
                "data": bytes_json(data),
            }),
            int => match int.integer() {
                Some(Integer::Signed(v)) => Json::from(v),
                Some(Integer::Unsigned(v)) => Json::from(v),
                None => Json::Null,
            },
        }
    }
}

fn float_json(v: f64) -> serde_json::Value {
    serde_json::Number::from_f64(v)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn bytes_json(b: &[u8]) -> serde_json::Value {
    serde_json::Value::Array(b.iter().map(|&x| serde_json::Value::from(x)).collect())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }
    )*};
}

value_from!(
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    String => String,
    Bytes => Binary,
    Vec<Value> => Array,
    HashMap<String, Value> => Map,
    Timestamp => Timestamp,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Nil, Into::into)
    }
}

impl Encode for Value {
    fn encode_to(&self, w: &mut ValueWriter<'_>) -> EncodeResult<()> {
        match self {
            Value::Nil => w.write_nil(),
            Value::Bool(b) => w.write_bool(*b),
            Value::Float32(v) => w.write_f32(*v),
            Value::Float64(v) => w.write_f64(*v),
            Value::String(s) => return w.write_str(s),
            Value::Binary(b) => return w.write_bin(b),
            Value::Array(items) => return items.encode_to(w),
            Value::Map(m) => return m.encode_to(w),
            Value::AnyMap(entries) => {
                w.write_map_len(entries.len())?;
                for (k, v) in entries {
                    k.encode_to(w)?;
                    v.encode_to(w)?;
                }
            }
            Value::Timestamp(ts) => w.write_timestamp(*ts),
            Value::Extension { type_code, data } => return w.write_ext(*type_code, data),
            int => match int.integer() {
                Some(Integer::Signed(v)) => w.write_int(v),
                Some(Integer::Unsigned(v)) => w.write_uint(v),
                None => w.write_nil(),
            },
        }
        Ok(())
    }
}

fn open_int(value: Integer, fixint: bool, r: &ValueReader<'_>) -> Value {
    if r.config().small_uint_as_narrow_int && value.is_narrow() {
        if let Some(v) = value.as_i64() {
            return Value::Int8(v as i8);
        }
    }
    match value {
        Integer::Signed(v) => Value::Int64(v),
        Integer::Unsigned(v) if fixint => Value::Int64(v as i64),
        Integer::Unsigned(v) => Value::UInt64(v),
    }
}

fn open_map(r: &mut ValueReader<'_>, len: usize) -> DecodeResult<Value> {
    let mut entries = Vec::new();
    entries
        .try_reserve(prealloc(len))
        .map_err(|_| DecodeError::AllocationFailure { requested: len })?;
    r.descend()?;
    for _ in 0..len {
        let key = r.read_value()?;
        let value = r.read_value()?;
        entries.push((key, value));
    }
    r.ascend();

    // Non-text or repeated keys would be lost in a text-keyed map.
    let text_keyed = r.config().map_container_type == MapContainer::TextKeyed && {
        let mut seen = HashSet::with_capacity(entries.len());
        entries
            .iter()
            .all(|(k, _)| k.as_str().is_some_and(|k| seen.insert(k)))
    };
    if !text_keyed {
        return Ok(Value::AnyMap(entries));
    }
    let map = entries
        .into_iter()
        .filter_map(|(k, v)| match k {
            Value::String(k) => Some((k, v)),
            _ => None,
        })
        .collect();
    Ok(Value::Map(map))
}

/// Replaces the current value with whatever the wire holds.
impl Decode for Value {
    fn decode_from(&mut self, r: &mut ValueReader<'_>) -> DecodeResult<()> {
        let head = r.read_head()?;
        *self = match head {
            Head::Nil => Value::Nil,
            Head::Bool(b) => Value::Bool(b),
            Head::Int { value, fixint } => open_int(value, fixint, r),
            Head::F32(v) => Value::Float32(v),
            Head::F64(v) => Value::Float64(v),
            // Str payloads are not verified on the wire; keep undecodable text as bytes.
            Head::Str(len) => match String::from_utf8(r.read_payload(len)?) {
                Ok(text) => Value::String(text),
                Err(err) => Value::Binary(Bytes::from(err.into_bytes())),
            },
            Head::Bin(len) => {
                let raw = r.read_payload(len)?;
                if r.config().decode_raw_as_text_when_ambiguous {
                    match String::from_utf8(raw) {
                        Ok(text) => Value::String(text),
                        Err(err) => Value::Binary(Bytes::from(err.into_bytes())),
                    }
                } else {
                    Value::Binary(Bytes::from(raw))
                }
            }
            Head::Array(len) => {
                let mut items = Vec::new();
                items
                    .try_reserve(prealloc(len))
                    .map_err(|_| DecodeError::AllocationFailure { requested: len })?;
                r.descend()?;
                for _ in 0..len {
                    items.push(r.read_value()?);
                }
                r.ascend();
                Value::Array(items)
            }
            Head::Map(len) => open_map(r, len)?,
            Head::Ext(type_code, len) => {
                let payload = r.read_payload(len)?;
                match type_code {
                    wire::TIMESTAMP_EXT_TYPE | wire::STANDARD_TIMESTAMP_EXT_TYPE => {
                        Value::Timestamp(timestamp_from_ext(type_code, &payload, r)?)
                    }
                    _ if r.config().keep_unknown_extensions => Value::Extension {
                        type_code,
                        data: Bytes::from(payload),
                    },
                    _ => return Err(DecodeError::UnknownExtension { type_code }),
                }
            }
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::config::{DecodeConfig, EncodeOptions};
    use crate::writer::encode_to_bytes;

    fn open(bytes: &[u8]) -> DecodeResult<Value> {
        open_with(bytes, &DecodeConfig::default())
    }

    fn open_with(bytes: &[u8], cfg: &DecodeConfig) -> DecodeResult<Value> {
        let mut src = bytes;
        let mut buf = BytesMut::new();
        ValueReader::new(&mut src, &mut buf, cfg).read_value()
    }

    fn enc<T: Encode + ?Sized>(value: &T) -> Vec<u8> {
        encode_to_bytes(value, &EncodeOptions::default()).unwrap().to_vec()
    }

    #[test]
    fn small_integers_decode_narrow() {
        assert_eq!(open(&[0x08]).unwrap(), Value::Int8(8));
        assert_eq!(open(&[0xf8]).unwrap(), Value::Int8(-8));
        assert_eq!(open(&enc(&-100i64)).unwrap(), Value::Int8(-100));
        assert_eq!(open(&enc(&127u64)).unwrap(), Value::Int8(127));
    }

    #[test]
    fn large_integers_decode_wide() {
        assert_eq!(open(&enc(&160u8)).unwrap(), Value::UInt64(160));
        assert_eq!(open(&enc(&-1616i16)).unwrap(), Value::Int64(-1616));
        assert_eq!(open(&enc(&u64::MAX)).unwrap(), Value::UInt64(u64::MAX));
    }

    #[test]
    fn narrowing_disabled() {
        let cfg = DecodeConfig::default().with_small_uint_as_narrow_int(false);
        assert_eq!(open_with(&[0x08], &cfg).unwrap(), Value::Int64(8));
        assert_eq!(open_with(&[0xf8], &cfg).unwrap(), Value::Int64(-8));
        assert_eq!(open_with(&[wire::UINT8, 8], &cfg).unwrap(), Value::UInt64(8));
    }

    #[test]
    fn floats_keep_width() {
        assert_eq!(open(&enc(&-3232.0f32)).unwrap(), Value::Float32(-3232.0));
        assert_eq!(open(&enc(&6464.5f64)).unwrap(), Value::Float64(6464.5));
    }

    #[test]
    fn text_and_binary() {
        assert_eq!(open(&enc("someday")).unwrap(), Value::from("someday"));
        let bin = enc(&Bytes::from_static(b"day"));
        assert_eq!(open(&bin).unwrap(), Value::Binary(Bytes::from_static(b"day")));

        let cfg = DecodeConfig::default().with_raw_as_text(true);
        assert_eq!(open_with(&bin, &cfg).unwrap(), Value::from("day"));
        let invalid = [wire::BIN8, 1, 0xff];
        assert_eq!(
            open_with(&invalid, &cfg).unwrap(),
            Value::Binary(Bytes::from_static(&[0xff]))
        );
    }

    #[test]
    fn invalid_utf8_string_keeps_raw_bytes() {
        assert_eq!(
            open(&[0xa2, 0xff, 0xfe]).unwrap(),
            Value::Binary(Bytes::from_static(&[0xff, 0xfe]))
        );
        // [1, "\xc3"]
        assert_eq!(
            open(&[0x92, 0x01, 0xa1, 0xc3]).unwrap(),
            Value::Array(vec![Value::Int8(1), Value::Binary(Bytes::from_static(&[0xc3]))])
        );
    }

    #[test]
    fn duplicate_text_keys_keep_every_entry() {
        // {"a": 1, "a": 2}
        let dup = [0x82, 0xa1, b'a', 0x01, 0xa1, b'a', 0x02];
        assert_eq!(
            open(&dup).unwrap(),
            Value::AnyMap(vec![
                (Value::from("a"), Value::Int8(1)),
                (Value::from("a"), Value::Int8(2)),
            ])
        );
        // {"a": 1, "b": 2}
        let v = open(&[0x82, 0xa1, b'a', 0x01, 0xa1, b'b', 0x02]).unwrap();
        assert_eq!(v.as_map().map(HashMap::len), Some(2));
    }

    #[test]
    fn maps_pick_container_by_keys() {
        let mut m = HashMap::new();
        m.insert("a".to_string(), Value::from(1i8));
        let v = open(&enc(&m)).unwrap();
        assert_eq!(v.get("a"), Some(&Value::Int8(1)));
        assert!(v.as_map().is_some());

        // {1: "x"}
        let v = open(&[0x81, 0x01, 0xa1, b'x']).unwrap();
        assert_eq!(v, Value::AnyMap(vec![(Value::Int8(1), Value::from("x"))]));

        let cfg = DecodeConfig::default().with_map_container_type(MapContainer::AnyKeyed);
        let v = open_with(&enc(&m), &cfg).unwrap();
        assert_eq!(v, Value::AnyMap(vec![(Value::from("a"), Value::Int8(1))]));
        assert_eq!(v.get("a"), Some(&Value::Int8(1)));
    }

    #[test]
    fn heterogeneous_array() {
        let items = vec![
            Value::from(-1616i64),
            Value::from("i"),
            Value::from(false),
            Value::Nil,
        ];
        let v = open(&enc(&items)).unwrap();
        assert_eq!(v.as_array().map(<[Value]>::len), Some(4));
        assert_eq!(v.as_array().unwrap()[0], Value::Int64(-1616));
        assert!(v.as_array().unwrap()[3].is_nil());
    }

    #[test]
    fn timestamps_and_extensions() {
        let ts = Timestamp::from_unix_nanos(1_328_148_122_000_002_000);
        assert_eq!(open(&enc(&ts)).unwrap(), Value::Timestamp(ts));

        let ext = [wire::FIXEXT2, 7, 0xab, 0xcd];
        assert!(matches!(
            open(&ext),
            Err(DecodeError::UnknownExtension { type_code: 7 })
        ));
        let cfg = DecodeConfig::default().with_unknown_extensions(true);
        let v = open_with(&ext, &cfg).unwrap();
        assert_eq!(
            v,
            Value::Extension {
                type_code: 7,
                data: Bytes::from_static(&[0xab, 0xcd])
            }
        );
        assert_eq!(enc(&v), ext);
    }

    #[test]
    fn encode_matches_typed_encode() {
        assert_eq!(enc(&Value::Int16(1616)), enc(&1616i16));
        assert_eq!(enc(&Value::UInt8(8)), [0x08]);
        assert_eq!(enc(&Value::from(-8i8)), [0xf8]);
        assert_eq!(enc(&Value::Nil), [wire::NIL]);
        let any = Value::AnyMap(vec![(Value::from(true), Value::from(1u8))]);
        assert_eq!(enc(&any), [0x81, wire::TRUE, 0x01]);
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::UInt64(5).as_i64(), Some(5));
        assert_eq!(Value::UInt64(u64::MAX).as_i64(), None);
        assert_eq!(Value::Int8(-1).as_u64(), None);
        assert_eq!(Value::Int32(3).as_f64(), Some(3.0));
        assert_eq!(Value::from(Some(true)).as_bool(), Some(true));
        assert!(Value::from(Option::<i64>::None).is_nil());
        assert_eq!(Value::from(Bytes::from_static(b"x")).as_bytes().map(|b| b.len()), Some(1));
    }

    #[test]
    fn json_rendering() {
        let mut m = HashMap::new();
        m.insert("n".to_string(), Value::from(vec![Value::Int8(1), Value::Nil]));
        let json = Value::Map(m).to_json();
        assert_eq!(json, serde_json::json!({"n": [1, null]}));
        assert_eq!(Value::Float64(f64::NAN).to_json(), serde_json::Value::Null);
        assert_eq!(Value::from("x").to_string(), "\"x\"");
    }

    #[test]
    fn nested_depth_is_limited() {
        let cfg = DecodeConfig::default().with_max_depth(1);
        assert!(open_with(&[0x91, 0x90], &cfg).is_err());
        assert!(open_with(&[0x91, 0x01], &cfg).is_ok());
    }
}
