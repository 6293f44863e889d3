//! MessagePack tag table.
//!
//! Every value on the wire starts with one tag byte. Some tags carry their
//! payload or length inline (fixint, fixstr, fixarray, fixmap); the rest are
//! followed by a big-endian length or scalar of fixed width.
//!
//! ```text
//! 0x00-0x7f  positive fixint      0xc0  nil        0xcc-0xcf  uint8..uint64
//! 0x80-0x8f  fixmap               0xc2  false      0xd0-0xd3  int8..int64
//! 0x90-0x9f  fixarray             0xc3  true       0xd4-0xd8  fixext1..fixext16
//! 0xa0-0xbf  fixstr               0xc4-0xc6 bin    0xd9-0xdb  str8..str32
//! 0xe0-0xff  negative fixint      0xc7-0xc9 ext    0xdc/0xdd  array16/32
//!                                 0xca/0xcb float  0xde/0xdf  map16/32
//! ```

pub const NIL: u8 = 0xc0;
/// Never used by the format; always rejected.
pub const NEVER_USED: u8 = 0xc1;
pub const FALSE: u8 = 0xc2;
pub const TRUE: u8 = 0xc3;
pub const BIN8: u8 = 0xc4;
pub const BIN16: u8 = 0xc5;
pub const BIN32: u8 = 0xc6;
pub const EXT8: u8 = 0xc7;
pub const EXT16: u8 = 0xc8;
pub const EXT32: u8 = 0xc9;
pub const FLOAT32: u8 = 0xca;
pub const FLOAT64: u8 = 0xcb;
pub const UINT8: u8 = 0xcc;
pub const UINT16: u8 = 0xcd;
pub const UINT32: u8 = 0xce;
pub const UINT64: u8 = 0xcf;
pub const INT8: u8 = 0xd0;
pub const INT16: u8 = 0xd1;
pub const INT32: u8 = 0xd2;
pub const INT64: u8 = 0xd3;
pub const FIXEXT1: u8 = 0xd4;
pub const FIXEXT2: u8 = 0xd5;
pub const FIXEXT4: u8 = 0xd6;
pub const FIXEXT8: u8 = 0xd7;
pub const FIXEXT16: u8 = 0xd8;
pub const STR8: u8 = 0xd9;
pub const STR16: u8 = 0xda;
pub const STR32: u8 = 0xdb;
pub const ARRAY16: u8 = 0xdc;
pub const ARRAY32: u8 = 0xdd;
pub const MAP16: u8 = 0xde;
pub const MAP32: u8 = 0xdf;

pub const FIXMAP_PREFIX: u8 = 0x80;
pub const FIXARRAY_PREFIX: u8 = 0x90;
pub const FIXSTR_PREFIX: u8 = 0xa0;

/// Largest value stored in a positive fixint.
pub const FIXINT_MAX: u64 = 0x7f;
/// Smallest value stored in a negative fixint.
pub const NEG_FIXINT_MIN: i64 = -32;
/// Longest string stored as fixstr.
pub const FIXSTR_MAX_LEN: usize = 31;
/// Largest element count stored in fixarray/fixmap.
pub const FIXCONTAINER_MAX_LEN: usize = 15;

/// Extension type code of the tick-count timestamp this codec writes.
pub const TIMESTAMP_EXT_TYPE: i8 = 1;
/// Extension type code of the standard MessagePack timestamp (read only).
pub const STANDARD_TIMESTAMP_EXT_TYPE: i8 = -1;

/// Value category a tag byte belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Nil,
    Bool,
    PositiveFixint,
    NegativeFixint,
    Uint,
    Int,
    Float32,
    Float64,
    Str,
    Bin,
    Array,
    Map,
    Ext,
    /// `0xc1`, reserved and never valid.
    Never,
}

impl Family {
    /// Classify a tag byte.
    pub fn of(tag: u8) -> Self {
        match tag {
            0x00..=0x7f => Family::PositiveFixint,
            0x80..=0x8f => Family::Map,
            0x90..=0x9f => Family::Array,
            0xa0..=0xbf => Family::Str,
            NIL => Family::Nil,
            NEVER_USED => Family::Never,
            FALSE | TRUE => Family::Bool,
            BIN8..=BIN32 => Family::Bin,
            EXT8..=EXT32 | FIXEXT1..=FIXEXT16 => Family::Ext,
            FLOAT32 => Family::Float32,
            FLOAT64 => Family::Float64,
            UINT8..=UINT64 => Family::Uint,
            INT8..=INT64 => Family::Int,
            STR8..=STR32 => Family::Str,
            ARRAY16 | ARRAY32 => Family::Array,
            MAP16 | MAP32 => Family::Map,
            0xe0..=0xff => Family::NegativeFixint,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Family::Nil => "nil",
            Family::Bool => "bool",
            Family::PositiveFixint | Family::NegativeFixint => "fixint",
            Family::Uint => "uint",
            Family::Int => "int",
            Family::Float32 => "float32",
            Family::Float64 => "float64",
            Family::Str => "str",
            Family::Bin => "bin",
            Family::Array => "array",
            Family::Map => "map",
            Family::Ext => "ext",
            Family::Never => "never-used",
        }
    }
}

/// Width in bytes of the length field following a variable-length tag.
///
/// Returns `None` for tags whose length is inline or implied.
pub fn length_width(tag: u8) -> Option<usize> {
    match tag {
        BIN8 | STR8 | EXT8 => Some(1),
        BIN16 | STR16 | EXT16 | ARRAY16 | MAP16 => Some(2),
        BIN32 | STR32 | EXT32 | ARRAY32 | MAP32 => Some(4),
        _ => None,
    }
}

/// Payload size of a fixext tag.
pub fn fixext_len(tag: u8) -> Option<usize> {
    match tag {
        FIXEXT1 => Some(1),
        FIXEXT2 => Some(2),
        FIXEXT4 => Some(4),
        FIXEXT8 => Some(8),
        FIXEXT16 => Some(16),
        _ => None,
    }
}

/// Width in bytes of the scalar following a numeric tag.
pub fn scalar_width(tag: u8) -> Option<usize> {
    match tag {
        UINT8 | INT8 => Some(1),
        UINT16 | INT16 => Some(2),
        UINT32 | INT32 | FLOAT32 => Some(4),
        UINT64 | INT64 | FLOAT64 => Some(8),
        _ => None,
    }
}

/// An integer as it appeared on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Integer {
    /// Positive fixint or uint8..uint64.
    Unsigned(u64),
    /// Negative fixint or int8..int64.
    Signed(i64),
}

impl Integer {
    /// The value as `i64`, if it fits.
    pub fn as_i64(self) -> Option<i64> {
        match self {
            Integer::Unsigned(v) => i64::try_from(v).ok(),
            Integer::Signed(v) => Some(v),
        }
    }

    /// The value as `u64`, if it is non-negative.
    pub fn as_u64(self) -> Option<u64> {
        match self {
            Integer::Unsigned(v) => Some(v),
            Integer::Signed(v) => u64::try_from(v).ok(),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Integer::Unsigned(v) => v as f64,
            Integer::Signed(v) => v as f64,
        }
    }

    /// Whether the value lies in `i8` range.
    pub fn is_narrow(self) -> bool {
        self.as_i64().is_some_and(|v| i8::try_from(v).is_ok())
    }
}

impl std::fmt::Display for Integer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Integer::Unsigned(v) => write!(f, "{v}"),
            Integer::Signed(v) => write!(f, "{v}"),
        }
    }
}

/// Number of bytes the shortest encoding of an unsigned integer takes.
pub fn uint_encoded_len(v: u64) -> usize {
    if v <= FIXINT_MAX {
        1
    } else if v <= u8::MAX as u64 {
        2
    } else if v <= u16::MAX as u64 {
        3
    } else if v <= u32::MAX as u64 {
        5
    } else {
        9
    }
}

/// Number of bytes the shortest encoding of a signed integer takes.
pub fn int_encoded_len(v: i64) -> usize {
    if v >= 0 {
        uint_encoded_len(v as u64)
    } else if v >= NEG_FIXINT_MIN {
        1
    } else if v >= i8::MIN as i64 {
        2
    } else if v >= i16::MIN as i64 {
        3
    } else if v >= i32::MIN as i64 {
        5
    } else {
        9
    }
}

/// Size of the header (tag plus length field) for a string of `len` bytes.
pub fn str_header_len(len: usize) -> usize {
    if len <= FIXSTR_MAX_LEN {
        1
    } else if len <= u8::MAX as usize {
        2
    } else if len <= u16::MAX as usize {
        3
    } else {
        5
    }
}

/// Size of the header for an array or map of `len` elements.
pub fn container_header_len(len: usize) -> usize {
    if len <= FIXCONTAINER_MAX_LEN {
        1
    } else if len <= u16::MAX as usize {
        3
    } else {
        5
    }
}
