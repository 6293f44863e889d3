//! Named-field records.
//!
//! A record encodes as a map keyed by field name, in declaration order.
//! Decoding matches wire keys to fields, skips keys it does not know and
//! leaves fields without a wire key untouched.
//!
//! Use the [`record!`](crate::record!) macro to declare a struct together
//! with its [`Record`], [`Encode`] and [`Decode`] implementations.

use crate::decode::Decode;
use crate::encode::Encode;
use crate::error::{DecodeResult, EncodeResult};
use crate::reader::{Head, ValueReader};
use crate::writer::ValueWriter;

/// A struct whose fields can be visited by name.
pub trait Record {
    /// Type name used in error messages.
    fn type_name(&self) -> &'static str;

    /// Field names in declaration order.
    fn field_names(&self) -> &'static [&'static str];

    /// Field names paired with their values, in declaration order.
    fn fields(&self) -> Vec<(&'static str, &dyn Encode)>;

    /// The field called `name`, if there is one.
    fn field_mut(&mut self, name: &str) -> Option<&mut dyn Decode>;
}

/// Write `record` as a map of every field.
pub fn encode_record<R: Record + ?Sized>(record: &R, w: &mut ValueWriter<'_>) -> EncodeResult<()> {
    let fields = record.fields();
    w.write_map_len(fields.len())?;
    for (name, value) in fields {
        w.write_str(name)?;
        value.encode_to(w)?;
    }
    Ok(())
}

fn resolve_field(names: &'static [&'static str], key: &str, ignore_case: bool) -> Option<&'static str> {
    names
        .iter()
        .find(|name| **name == key)
        .or_else(|| {
            if ignore_case {
                names.iter().find(|name| name.eq_ignore_ascii_case(key))
            } else {
                None
            }
        })
        .copied()
}

/// Read a map into the fields of `record`.
pub fn decode_record<R: Record + ?Sized>(record: &mut R, r: &mut ValueReader<'_>) -> DecodeResult<()> {
    let type_name = record.type_name();
    let len = match r.read_head()? {
        Head::Map(len) => len,
        other => return Err(other.mismatch(type_name)),
    };
    let names = record.field_names();
    let ignore_case = r.config().case_insensitive_fields;

    r.descend()?;
    for _ in 0..len {
        let key = match r.read_head()? {
            Head::Str(len) => match String::from_utf8(r.read_payload(len)?) {
                Ok(key) => key,
                Err(_) => {
                    tracing::trace!(record = type_name, "skipping non-utf-8 key");
                    r.skip_value()?;
                    continue;
                }
            },
            other => {
                r.skip_body(other)?;
                r.skip_value()?;
                continue;
            }
        };
        let field = resolve_field(names, &key, ignore_case).and_then(|name| record.field_mut(name));
        match field {
            Some(field) => field.decode_from(r)?,
            None => {
                tracing::trace!(record = type_name, key = %key, "skipping unknown field");
                r.skip_value()?;
            }
        }
    }
    r.ascend();
    Ok(())
}

/// Declare a struct that encodes and decodes as a record.
///
/// Field attributes and visibility are passed through. Every field type must
/// implement [`Encode`](crate::Encode) and [`Decode`](crate::Decode).
///
/// ```
/// packwire_codec::record! {
///     #[derive(Debug, Default, PartialEq)]
///     pub struct Point {
///         pub x: i32,
///         pub y: i32,
///     }
/// }
///
/// let opts = packwire_codec::EncodeOptions::default();
/// let bytes = packwire_codec::marshal(&Point { x: 1, y: -2 }, &opts).unwrap();
/// let back: Point = packwire_codec::unmarshal(&bytes, &Default::default()).unwrap();
/// assert_eq!(back, Point { x: 1, y: -2 });
/// ```
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[$fmeta:meta])* $fvis:vis $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $(#[$fmeta])* $fvis $field : $ty ),*
        }

        impl $crate::Record for $name {
            fn type_name(&self) -> &'static str {
                ::core::stringify!($name)
            }

            fn field_names(&self) -> &'static [&'static str] {
                &[$(::core::stringify!($field)),*]
            }

            fn fields(&self) -> ::std::vec::Vec<(&'static str, &dyn $crate::Encode)> {
                ::std::vec![$((::core::stringify!($field), &self.$field as &dyn $crate::Encode)),*]
            }

            #[allow(unused_variables)]
            fn field_mut(&mut self, name: &str) -> ::core::option::Option<&mut dyn $crate::Decode> {
                match name {
                    $(::core::stringify!($field) => ::core::option::Option::Some(&mut self.$field as &mut dyn $crate::Decode),)*
                    _ => ::core::option::Option::None,
                }
            }
        }

        impl $crate::Encode for $name {
            fn encode_to(&self, w: &mut $crate::ValueWriter<'_>) -> $crate::EncodeResult<()> {
                $crate::encode_record(self, w)
            }
        }

        impl $crate::Decode for $name {
            fn decode_from(&mut self, r: &mut $crate::ValueReader<'_>) -> $crate::DecodeResult<()> {
                $crate::decode_record(self, r)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::config::DecodeConfig;
    use crate::error::DecodeError;
    use crate::value::Value;
    use crate::wire;
    use crate::{marshal, unmarshal, unmarshal_into, EncodeOptions, Record};

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        struct Point {
            x: i32,
            y: i32,
            label: String,
        }
    }

    crate::record! {
        #[derive(Debug, Default, PartialEq)]
        struct Segment {
            from: Point,
            to: Option<Box<Point>>,
        }
    }

    crate::record! {
        #[derive(Debug, Default)]
        struct Empty {}
    }

    fn point() -> Point {
        Point {
            x: 1,
            y: -2,
            label: "p".to_string(),
        }
    }

    #[test]
    fn fields_in_declaration_order() {
        let bytes = marshal(&point(), &EncodeOptions::default()).unwrap();
        assert_eq!(
            &bytes[..],
            [
                0x83, 0xa1, b'x', 0x01, 0xa1, b'y', 0xfe, 0xa5, b'l', b'a', b'b', b'e', b'l', 0xa1,
                b'p'
            ]
        );
        assert_eq!(point().field_names(), ["x", "y", "label"]);
        assert_eq!(point().type_name(), "Point");
    }

    #[test]
    fn roundtrip_nested() {
        let seg = Segment {
            from: point(),
            to: None,
        };
        let bytes = marshal(&seg, &EncodeOptions::default()).unwrap();
        let back: Segment = unmarshal(&bytes, &DecodeConfig::default()).unwrap();
        assert_eq!(back, seg);
        assert!(back.to.is_none());
    }

    #[test]
    fn missing_keys_keep_existing_values() {
        let mut m = HashMap::new();
        m.insert("y".to_string(), Value::from(9i8));
        let bytes = marshal(&m, &EncodeOptions::default()).unwrap();

        let mut p = point();
        unmarshal_into(&bytes, Some(&mut p), &DecodeConfig::default()).unwrap();
        assert_eq!(p.x, 1);
        assert_eq!(p.y, 9);
        assert_eq!(p.label, "p");
    }

    #[test]
    fn unknown_and_non_text_keys_are_skipped() {
        // {"z": [1, 2], 7: "seven", "x": 5}
        let bytes = [
            0x83, 0xa1, b'z', 0x92, 0x01, 0x02, 0x07, 0xa5, b's', b'e', b'v', b'e', b'n', 0xa1,
            b'x', 0x05,
        ];
        let p: Point = unmarshal(&bytes, &DecodeConfig::default()).unwrap();
        assert_eq!(p.x, 5);
        assert_eq!(p.y, 0);
    }

    #[test]
    fn undecodable_text_keys_are_skipped() {
        // {"\xff": "bad", "y": 3}
        let bytes = [0x82, 0xa1, 0xff, 0xa3, b'b', b'a', b'd', 0xa1, b'y', 0x03];
        let p: Point = unmarshal(&bytes, &DecodeConfig::default()).unwrap();
        assert_eq!(p.x, 0);
        assert_eq!(p.y, 3);
    }

    #[test]
    fn case_insensitive_matching_is_opt_in() {
        let bytes = [0x81, 0xa1, b'X', 0x05];
        let p: Point = unmarshal(&bytes, &DecodeConfig::default()).unwrap();
        assert_eq!(p.x, 0);

        let cfg = DecodeConfig::default().with_case_insensitive_fields(true);
        let p: Point = unmarshal(&bytes, &cfg).unwrap();
        assert_eq!(p.x, 5);
    }

    #[test]
    fn non_map_is_type_mismatch() {
        let err = unmarshal::<Point>(&[0x90], &DecodeConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::TypeMismatch {
                expected: "Point",
                found: "array"
            }
        ));
        let err = unmarshal::<Point>(&[wire::NIL], &DecodeConfig::default()).unwrap_err();
        assert!(matches!(err, DecodeError::TypeMismatch { found: "nil", .. }));
    }

    #[test]
    fn field_type_mismatch_propagates() {
        // {"x": "one"}
        let bytes = [0x81, 0xa1, b'x', 0xa3, b'o', b'n', b'e'];
        let err = unmarshal::<Point>(&bytes, &DecodeConfig::default()).unwrap_err();
        assert!(matches!(err, DecodeError::TypeMismatch { expected: "i32", .. }));
    }

    #[test]
    fn empty_record() {
        let bytes = marshal(&Empty {}, &EncodeOptions::default()).unwrap();
        assert_eq!(&bytes[..], [0x80]);
        let mut e = Empty {};
        assert!(e.field_mut("x").is_none());
        assert!(unmarshal::<Empty>(&[0x81, 0xa1, b'x', 0x01], &DecodeConfig::default()).is_ok());
    }
}
