use std::io::{ErrorKind, Read};
use std::sync::Arc;

use bytes::{Buf, BytesMut};

use crate::config::DecodeConfig;
use crate::decode::Decode;
use crate::error::{DecodeError, DecodeResult};
use crate::value::Value;
use crate::wire::{self, Family, Integer};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;
/// Upper bound on elements reserved up front from a declared length.
pub(crate) const PREALLOC_LIMIT: usize = 4 * 1024;

/// A decoded tag: the value category plus any inline scalar or length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Head {
    Nil,
    Bool(bool),
    /// `fixint` is true for the single-byte positive/negative fixint forms.
    Int { value: Integer, fixint: bool },
    F32(f32),
    F64(f64),
    /// Byte length of a string payload.
    Str(usize),
    /// Byte length of a binary payload.
    Bin(usize),
    /// Element count of an array.
    Array(usize),
    /// Entry count of a map.
    Map(usize),
    /// Extension type code and payload length.
    Ext(i8, usize),
}

impl Head {
    /// Short category name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Head::Nil => "nil",
            Head::Bool(_) => "bool",
            Head::Int {
                value: Integer::Unsigned(_),
                ..
            } => "uint",
            Head::Int {
                value: Integer::Signed(_),
                ..
            } => "int",
            Head::F32(_) => "float32",
            Head::F64(_) => "float64",
            Head::Str(_) => "str",
            Head::Bin(_) => "bin",
            Head::Array(_) => "array",
            Head::Map(_) => "map",
            Head::Ext(..) => "ext",
        }
    }

    /// Build the type mismatch error for decoding this head into `expected`.
    pub fn mismatch(&self, expected: &'static str) -> DecodeError {
        DecodeError::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }
}

/// Low-level MessagePack reader used by [`Decode`] implementations.
///
/// Pulls bytes from the source into a shared buffer on demand; bytes read
/// past the current value stay buffered for the next one.
pub struct ValueReader<'a> {
    src: &'a mut dyn Read,
    buf: &'a mut BytesMut,
    config: &'a DecodeConfig,
    depth: usize,
    consumed: usize,
}

impl<'a> ValueReader<'a> {
    pub fn new(src: &'a mut dyn Read, buf: &'a mut BytesMut, config: &'a DecodeConfig) -> Self {
        Self {
            src,
            buf,
            config,
            depth: 0,
            consumed: 0,
        }
    }

    pub fn config(&self) -> &DecodeConfig {
        self.config
    }

    /// Bytes consumed by this reader so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Ensure at least `n` bytes are buffered.
    fn fill(&mut self, n: usize) -> DecodeResult<()> {
        while self.buf.len() < n {
            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.src.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(DecodeError::SourceReadFailure(err)),
            };
            if read == 0 {
                return Err(DecodeError::TruncatedStream {
                    needed: n - self.buf.len(),
                });
            }
            self.buf.extend_from_slice(&chunk[..read]);
        }
        Ok(())
    }

    /// Whether another value starts in the source. Blocks until a byte is
    /// available or the source reports end of input.
    pub fn has_more(&mut self) -> DecodeResult<bool> {
        match self.fill(1) {
            Ok(()) => Ok(true),
            Err(DecodeError::TruncatedStream { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn advance(&mut self, n: usize) {
        self.buf.advance(n);
        self.consumed += n;
    }

    fn read_u8(&mut self) -> DecodeResult<u8> {
        self.fill(1)?;
        self.consumed += 1;
        Ok(self.buf.get_u8())
    }

    fn read_be<const N: usize>(&mut self) -> DecodeResult<[u8; N]> {
        self.fill(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[..N]);
        self.advance(N);
        Ok(out)
    }

    fn read_len(&mut self, width: usize) -> DecodeResult<usize> {
        Ok(match width {
            1 => self.read_u8()? as usize,
            2 => u16::from_be_bytes(self.read_be()?) as usize,
            _ => u32::from_be_bytes(self.read_be()?) as usize,
        })
    }

    /// Peek at the next tag byte without consuming it.
    pub fn peek_tag(&mut self) -> DecodeResult<u8> {
        self.fill(1)?;
        Ok(self.buf[0])
    }

    /// Consume a nil tag if it is next. Returns whether it did.
    pub fn take_nil(&mut self) -> DecodeResult<bool> {
        if self.peek_tag()? == wire::NIL {
            self.advance(1);
            return Ok(true);
        }
        Ok(false)
    }

    /// Read the next tag and its length or inline scalar.
    pub fn read_head(&mut self) -> DecodeResult<Head> {
        let tag = self.read_u8()?;
        let head = match Family::of(tag) {
            Family::PositiveFixint => Head::Int {
                value: Integer::Unsigned(u64::from(tag)),
                fixint: true,
            },
            Family::NegativeFixint => Head::Int {
                value: Integer::Signed(i64::from(tag as i8)),
                fixint: true,
            },
            Family::Nil => Head::Nil,
            Family::Bool => Head::Bool(tag == wire::TRUE),
            Family::Never => return Err(DecodeError::MalformedTag { tag }),
            Family::Float32 => Head::F32(f32::from_be_bytes(self.read_be()?)),
            Family::Float64 => Head::F64(f64::from_be_bytes(self.read_be()?)),
            Family::Uint => {
                let value = match tag {
                    wire::UINT8 => u64::from(self.read_u8()?),
                    wire::UINT16 => u64::from(u16::from_be_bytes(self.read_be()?)),
                    wire::UINT32 => u64::from(u32::from_be_bytes(self.read_be()?)),
                    _ => u64::from_be_bytes(self.read_be()?),
                };
                Head::Int {
                    value: Integer::Unsigned(value),
                    fixint: false,
                }
            }
            Family::Int => {
                let value = match tag {
                    wire::INT8 => i64::from(self.read_u8()? as i8),
                    wire::INT16 => i64::from(i16::from_be_bytes(self.read_be()?)),
                    wire::INT32 => i64::from(i32::from_be_bytes(self.read_be()?)),
                    _ => i64::from_be_bytes(self.read_be()?),
                };
                Head::Int {
                    value: Integer::Signed(value),
                    fixint: false,
                }
            }
            Family::Str => match wire::length_width(tag) {
                Some(width) => Head::Str(self.read_len(width)?),
                None => Head::Str((tag & 0x1f) as usize),
            },
            Family::Bin => {
                let width = wire::length_width(tag).unwrap_or(1);
                Head::Bin(self.read_len(width)?)
            }
            Family::Array => match wire::length_width(tag) {
                Some(width) => Head::Array(self.read_len(width)?),
                None => Head::Array((tag & 0x0f) as usize),
            },
            Family::Map => match wire::length_width(tag) {
                Some(width) => Head::Map(self.read_len(width)?),
                None => Head::Map((tag & 0x0f) as usize),
            },
            Family::Ext => {
                let len = match wire::fixext_len(tag) {
                    Some(len) => len,
                    None => {
                        let width = wire::length_width(tag).unwrap_or(1);
                        self.read_len(width)?
                    }
                };
                let type_code = self.read_u8()? as i8;
                Head::Ext(type_code, len)
            }
        };
        Ok(head)
    }

    /// Read a payload of `len` bytes (after a str, bin or ext head).
    ///
    /// Memory grows as bytes actually arrive, so a bogus length on a short
    /// stream fails as truncation rather than a huge allocation.
    pub fn read_payload(&mut self, len: usize) -> DecodeResult<Vec<u8>> {
        let mut out = Vec::new();
        out.try_reserve_exact(len.min(READ_CHUNK_SIZE))
            .map_err(|_| DecodeError::AllocationFailure { requested: len })?;
        while out.len() < len {
            let want = (len - out.len()).min(READ_CHUNK_SIZE);
            if let Err(err) = self.fill(want) {
                return Err(match err {
                    DecodeError::TruncatedStream { .. } => DecodeError::TruncatedStream {
                        needed: len - out.len() - self.buf.len(),
                    },
                    other => other,
                });
            }
            out.try_reserve(want)
                .map_err(|_| DecodeError::AllocationFailure { requested: len })?;
            out.extend_from_slice(&self.buf[..want]);
            self.advance(want);
        }
        Ok(out)
    }

    /// Read a UTF-8 payload of `len` bytes.
    pub fn read_text(&mut self, len: usize) -> DecodeResult<String> {
        Ok(String::from_utf8(self.read_payload(len)?)?)
    }

    /// Discard `len` payload bytes without keeping them.
    fn discard(&mut self, mut len: usize) -> DecodeResult<()> {
        while len > 0 {
            let want = len.min(READ_CHUNK_SIZE);
            self.fill(want)?;
            self.advance(want);
            len -= want;
        }
        Ok(())
    }

    /// Skip one complete value.
    pub fn skip_value(&mut self) -> DecodeResult<()> {
        let head = self.read_head()?;
        self.skip_body(head)
    }

    /// Skip whatever follows an already-read head.
    pub fn skip_body(&mut self, head: Head) -> DecodeResult<()> {
        match head {
            Head::Str(len) | Head::Bin(len) | Head::Ext(_, len) => self.discard(len),
            Head::Array(len) => {
                self.descend()?;
                for _ in 0..len {
                    self.skip_value()?;
                }
                self.ascend();
                Ok(())
            }
            Head::Map(len) => {
                self.descend()?;
                for _ in 0..len {
                    self.skip_value()?;
                    self.skip_value()?;
                }
                self.ascend();
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Enter a container, enforcing the configured depth limit.
    pub fn descend(&mut self) -> DecodeResult<()> {
        if self.depth >= self.config.max_depth {
            return Err(DecodeError::DepthLimitExceeded {
                max: self.config.max_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    pub fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Decode one open value.
    pub fn read_value(&mut self) -> DecodeResult<Value> {
        let mut value = Value::Nil;
        value.decode_from(self)?;
        Ok(value)
    }
}

/// Bounded capacity to reserve for a container of declared length `len`.
pub(crate) fn prealloc(len: usize) -> usize {
    len.min(PREALLOC_LIMIT)
}

/// Reads complete values from any `Read` source.
///
/// Handles partial reads internally. The source is assumed to block until
/// data is available.
pub struct Decoder<R> {
    inner: R,
    buf: BytesMut,
    config: Arc<DecodeConfig>,
}

impl<R: Read> Decoder<R> {
    /// Create a new decoder with default configuration.
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, DecodeConfig::default())
    }

    /// Create a new decoder with explicit configuration.
    pub fn with_config(inner: R, config: impl Into<Arc<DecodeConfig>>) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config: config.into(),
        }
    }

    /// Decode the next value into `dest` (blocking).
    ///
    /// Returns `Err(DecodeError::EndOfStream)` when the source is exhausted
    /// before the value starts. On any other error `dest` may be partially
    /// updated.
    pub fn decode<T: Decode + ?Sized>(&mut self, dest: &mut T) -> DecodeResult<()> {
        let mut reader = ValueReader::new(&mut self.inner, &mut self.buf, &self.config);
        if !reader.has_more()? {
            return Err(DecodeError::EndOfStream);
        }
        dest.decode_from(&mut reader)?;
        tracing::trace!(bytes = reader.consumed(), "decoded value");
        Ok(())
    }

    /// Decode into an optional destination. A missing destination fails
    /// with `NoAddressableTarget` before any input is consumed.
    pub fn decode_into<T: Decode + ?Sized>(&mut self, dest: Option<&mut T>) -> DecodeResult<()> {
        match dest {
            Some(dest) => self.decode(dest),
            None => Err(DecodeError::NoAddressableTarget),
        }
    }

    /// Decode the next value into a fresh `T`.
    pub fn read<T: Decode + Default>(&mut self) -> DecodeResult<T> {
        let mut value = T::default();
        self.decode(&mut value)?;
        Ok(value)
    }

    /// Decode the next value as an open [`Value`].
    pub fn decode_value(&mut self) -> DecodeResult<Value> {
        self.read()
    }

    /// Skip the next value.
    pub fn skip(&mut self) -> DecodeResult<()> {
        let mut reader = ValueReader::new(&mut self.inner, &mut self.buf, &self.config);
        if !reader.has_more()? {
            return Err(DecodeError::EndOfStream);
        }
        reader.skip_value()
    }

    /// Bytes read from the source but not yet decoded.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Mutably borrow the underlying source.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Consume the decoder and return the inner source.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Current decoder configuration.
    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }
}
