//! The [`Encode`] trait and its implementations for standard types.
//!
//! Dispatch is by value category: integers pick their tag from the value,
//! text goes to the str family, [`Bytes`] to the bin family, sequences to
//! arrays, maps to maps, `None` to nil.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{EncodeError, EncodeResult};
use crate::timestamp::Timestamp;
use crate::writer::ValueWriter;

/// A value that can be written as MessagePack.
///
/// Object safe, so records can hand out their fields as `&dyn Encode`.
pub trait Encode {
    fn encode_to(&self, w: &mut ValueWriter<'_>) -> EncodeResult<()>;
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode_to(&self, w: &mut ValueWriter<'_>) -> EncodeResult<()> {
        (**self).encode_to(w)
    }
}

impl<T: Encode + ?Sized> Encode for &mut T {
    fn encode_to(&self, w: &mut ValueWriter<'_>) -> EncodeResult<()> {
        (**self).encode_to(w)
    }
}

impl Encode for () {
    fn encode_to(&self, w: &mut ValueWriter<'_>) -> EncodeResult<()> {
        w.write_nil();
        Ok(())
    }
}

impl Encode for bool {
    fn encode_to(&self, w: &mut ValueWriter<'_>) -> EncodeResult<()> {
        w.write_bool(*self);
        Ok(())
    }
}

macro_rules! encode_signed {
    ($($ty:ty),*) => {$(
        impl Encode for $ty {
            fn encode_to(&self, w: &mut ValueWriter<'_>) -> EncodeResult<()> {
                w.write_int(*self as i64);
                Ok(())
            }
        }
    )*};
}

macro_rules! encode_unsigned {
    ($($ty:ty),*) => {$(
        impl Encode for $ty {
            fn encode_to(&self, w: &mut ValueWriter<'_>) -> EncodeResult<()> {
                w.write_uint(*self as u64);
                Ok(())
            }
        }
    )*};
}

encode_signed!(i8, i16, i32, i64, isize);
encode_unsigned!(u8, u16, u32, u64, usize);

impl Encode for f32 {
    fn encode_to(&self, w: &mut ValueWriter<'_>) -> EncodeResult<()> {
        w.write_f32(*self);
        Ok(())
    }
}

impl Encode for f64 {
    fn encode_to(&self, w: &mut ValueWriter<'_>) -> EncodeResult<()> {
        w.write_f64(*self);
        Ok(())
    }
}

impl Encode for str {
    fn encode_to(&self, w: &mut ValueWriter<'_>) -> EncodeResult<()> {
        w.write_str(self)
    }
}

impl Encode for String {
    fn encode_to(&self, w: &mut ValueWriter<'_>) -> EncodeResult<()> {
        w.write_str(self)
    }
}

impl Encode for Bytes {
    fn encode_to(&self, w: &mut ValueWriter<'_>) -> EncodeResult<()> {
        w.write_bin(self)
    }
}

impl Encode for Timestamp {
    fn encode_to(&self, w: &mut ValueWriter<'_>) -> EncodeResult<()> {
        w.write_timestamp(*self);
        Ok(())
    }
}

impl<T: Encode> Encode for [T] {
    fn encode_to(&self, w: &mut ValueWriter<'_>) -> EncodeResult<()> {
        w.write_array_len(self.len())?;
        for item in self {
            item.encode_to(w)?;
        }
        Ok(())
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode_to(&self, w: &mut ValueWriter<'_>) -> EncodeResult<()> {
        self.as_slice().encode_to(w)
    }
}

impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encode_to(&self, w: &mut ValueWriter<'_>) -> EncodeResult<()> {
        self.as_slice().encode_to(w)
    }
}

fn encode_entries<'e, K, V>(
    len: usize,
    entries: impl Iterator<Item = (&'e K, &'e V)>,
    w: &mut ValueWriter<'_>,
) -> EncodeResult<()>
where
    K: Encode + 'e,
    V: Encode + 'e,
{
    w.write_map_len(len)?;
    for (k, v) in entries {
        k.encode_to(w)?;
        v.encode_to(w)?;
    }
    Ok(())
}

/// Entry order follows the map's iteration order and is not stable.
impl<K: Encode, V: Encode, S> Encode for HashMap<K, V, S> {
    fn encode_to(&self, w: &mut ValueWriter<'_>) -> EncodeResult<()> {
        encode_entries(self.len(), self.iter(), w)
    }
}

impl<K: Encode, V: Encode> Encode for BTreeMap<K, V> {
    fn encode_to(&self, w: &mut ValueWriter<'_>) -> EncodeResult<()> {
        encode_entries(self.len(), self.iter(), w)
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode_to(&self, w: &mut ValueWriter<'_>) -> EncodeResult<()> {
        match self {
            Some(value) => value.encode_to(w),
            None => {
                w.write_nil();
                Ok(())
            }
        }
    }
}

impl<T: Encode + ?Sized> Encode for Box<T> {
    fn encode_to(&self, w: &mut ValueWriter<'_>) -> EncodeResult<()> {
        (**self).encode_to(w)
    }
}

fn encode_shared<T: Encode>(ptr: *const T, value: &T, w: &mut ValueWriter<'_>) -> EncodeResult<()> {
    let addr = ptr as usize;
    w.enter_shared(addr)?;
    let result = value.encode_to(w);
    w.leave_shared(addr);
    result
}

/// Shared pointers encode their pointee; a pointer reached again while its
/// own encoding is in progress is a cycle.
impl<T: Encode> Encode for Rc<T> {
    fn encode_to(&self, w: &mut ValueWriter<'_>) -> EncodeResult<()> {
        encode_shared(Rc::as_ptr(self), self, w)
    }
}

impl<T: Encode> Encode for Arc<T> {
    fn encode_to(&self, w: &mut ValueWriter<'_>) -> EncodeResult<()> {
        encode_shared(Arc::as_ptr(self), self, w)
    }
}

impl<T: Encode> Encode for RefCell<T> {
    fn encode_to(&self, w: &mut ValueWriter<'_>) -> EncodeResult<()> {
        let value = self
            .try_borrow()
            .map_err(|_| EncodeError::UnsupportedType {
                type_name: "RefCell",
                reason: "value is mutably borrowed".to_string(),
            })?;
        value.encode_to(w)
    }
}
