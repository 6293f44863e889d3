use std::io::{ErrorKind, Write};

use bytes::{BufMut, Bytes, BytesMut};

use crate::config::EncodeOptions;
use crate::encode::Encode;
use crate::error::{EncodeError, EncodeResult};
use crate::timestamp::Timestamp;
use crate::wire;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Low-level MessagePack writer used by [`Encode`] implementations.
///
/// Every method picks the shortest tag that can hold its argument.
pub struct ValueWriter<'a> {
    buf: &'a mut BytesMut,
    options: &'a EncodeOptions,
    // Addresses of shared pointers currently being encoded.
    visiting: Vec<usize>,
}

impl<'a> ValueWriter<'a> {
    pub fn new(buf: &'a mut BytesMut, options: &'a EncodeOptions) -> Self {
        Self {
            buf,
            options,
            visiting: Vec::new(),
        }
    }

    pub fn options(&self) -> &EncodeOptions {
        self.options
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_nil(&mut self) {
        self.buf.put_u8(wire::NIL);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.put_u8(if v { wire::TRUE } else { wire::FALSE });
    }

    pub fn write_uint(&mut self, v: u64) {
        if v <= wire::FIXINT_MAX {
            self.buf.put_u8(v as u8);
        } else if v <= u8::MAX as u64 {
            self.buf.put_u8(wire::UINT8);
            self.buf.put_u8(v as u8);
        } else if v <= u16::MAX as u64 {
            self.buf.put_u8(wire::UINT16);
            self.buf.put_u16(v as u16);
        } else if v <= u32::MAX as u64 {
            self.buf.put_u8(wire::UINT32);
            self.buf.put_u32(v as u32);
        } else {
            self.buf.put_u8(wire::UINT64);
            self.buf.put_u64(v);
        }
    }

    /// Non-negative values use the unsigned family.
    pub fn write_int(&mut self, v: i64) {
        if v >= 0 {
            self.write_uint(v as u64);
        } else if v >= wire::NEG_FIXINT_MIN {
            self.buf.put_i8(v as i8);
        } else if v >= i8::MIN as i64 {
            self.buf.put_u8(wire::INT8);
            self.buf.put_i8(v as i8);
        } else if v >= i16::MIN as i64 {
            self.buf.put_u8(wire::INT16);
            self.buf.put_i16(v as i16);
        } else if v >= i32::MIN as i64 {
            self.buf.put_u8(wire::INT32);
            self.buf.put_i32(v as i32);
        } else {
            self.buf.put_u8(wire::INT64);
            self.buf.put_i64(v);
        }
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buf.put_u8(wire::FLOAT32);
        self.buf.put_f32(v);
    }

    pub fn write_f64(&mut self, v: f64) {
        self.buf.put_u8(wire::FLOAT64);
        self.buf.put_f64(v);
    }

    pub fn write_str(&mut self, s: &str) -> EncodeResult<()> {
        let len = wire_len(s.len(), "str")?;
        if s.len() <= wire::FIXSTR_MAX_LEN {
            self.buf.put_u8(wire::FIXSTR_PREFIX | len as u8);
        } else if len <= u8::MAX as u32 {
            self.buf.put_u8(wire::STR8);
            self.buf.put_u8(len as u8);
        } else if len <= u16::MAX as u32 {
            self.buf.put_u8(wire::STR16);
            self.buf.put_u16(len as u16);
        } else {
            self.buf.put_u8(wire::STR32);
            self.buf.put_u32(len);
        }
        self.buf.put_slice(s.as_bytes());
        Ok(())
    }

    pub fn write_bin(&mut self, b: &[u8]) -> EncodeResult<()> {
        let len = wire_len(b.len(), "bin")?;
        if len <= u8::MAX as u32 {
            self.buf.put_u8(wire::BIN8);
            self.buf.put_u8(len as u8);
        } else if len <= u16::MAX as u32 {
            self.buf.put_u8(wire::BIN16);
            self.buf.put_u16(len as u16);
        } else {
            self.buf.put_u8(wire::BIN32);
            self.buf.put_u32(len);
        }
        self.buf.put_slice(b);
        Ok(())
    }

    pub fn write_array_len(&mut self, len: usize) -> EncodeResult<()> {
        self.write_container_len(len, wire::FIXARRAY_PREFIX, wire::ARRAY16, wire::ARRAY32)
    }

    pub fn write_map_len(&mut self, len: usize) -> EncodeResult<()> {
        self.write_container_len(len, wire::FIXMAP_PREFIX, wire::MAP16, wire::MAP32)
    }

    fn write_container_len(&mut self, len: usize, fix: u8, tag16: u8, tag32: u8) -> EncodeResult<()> {
        let len = wire_len(len, "container")?;
        if len as usize <= wire::FIXCONTAINER_MAX_LEN {
            self.buf.put_u8(fix | len as u8);
        } else if len <= u16::MAX as u32 {
            self.buf.put_u8(tag16);
            self.buf.put_u16(len as u16);
        } else {
            self.buf.put_u8(tag32);
            self.buf.put_u32(len);
        }
        Ok(())
    }

    pub fn write_ext(&mut self, type_code: i8, data: &[u8]) -> EncodeResult<()> {
        let len = wire_len(data.len(), "ext")?;
        match len {
            1 => self.buf.put_u8(wire::FIXEXT1),
            2 => self.buf.put_u8(wire::FIXEXT2),
            4 => self.buf.put_u8(wire::FIXEXT4),
            8 => self.buf.put_u8(wire::FIXEXT8),
            16 => self.buf.put_u8(wire::FIXEXT16),
            n if n <= u8::MAX as u32 => {
                self.buf.put_u8(wire::EXT8);
                self.buf.put_u8(n as u8);
            }
            n if n <= u16::MAX as u32 => {
                self.buf.put_u8(wire::EXT16);
                self.buf.put_u16(n as u16);
            }
            n => {
                self.buf.put_u8(wire::EXT32);
                self.buf.put_u32(n);
            }
        }
        self.buf.put_i8(type_code);
        self.buf.put_slice(data);
        Ok(())
    }

    /// Timestamp extension: fixext8 holding a big-endian tick count.
    pub fn write_timestamp(&mut self, ts: Timestamp) {
        let ticks = ts.to_ticks(self.options.timestamp_resolution);
        self.buf.put_u8(wire::FIXEXT8);
        self.buf.put_i8(wire::TIMESTAMP_EXT_TYPE);
        self.buf.put_i64(ticks);
    }

    /// Mark a shared pointer as in progress; fails if it already is.
    pub(crate) fn enter_shared(&mut self, addr: usize) -> EncodeResult<()> {
        if self.visiting.contains(&addr) {
            return Err(EncodeError::CyclicReference);
        }
        self.visiting.push(addr);
        Ok(())
    }

    pub(crate) fn leave_shared(&mut self, addr: usize) {
        if let Some(pos) = self.visiting.iter().rposition(|&a| a == addr) {
            self.visiting.remove(pos);
        }
    }
}

fn wire_len(len: usize, what: &'static str) -> EncodeResult<u32> {
    u32::try_from(len).map_err(|_| EncodeError::UnsupportedType {
        type_name: what,
        reason: format!("length {len} exceeds the 32-bit wire limit"),
    })
}

/// Encode a single value into a fresh buffer.
pub fn encode_to_bytes<T: Encode + ?Sized>(value: &T, options: &EncodeOptions) -> EncodeResult<Bytes> {
    let mut buf = BytesMut::new();
    value.encode_to(&mut ValueWriter::new(&mut buf, options))?;
    Ok(buf.freeze())
}

/// Writes encoded values to any `Write` sink.
///
/// Each call stages the complete encoding in memory first, so a value that
/// fails to encode leaves nothing on the sink.
pub struct Encoder<W> {
    inner: W,
    buf: BytesMut,
    options: EncodeOptions,
}

impl<W: Write> Encoder<W> {
    /// Create a new encoder with default options.
    pub fn new(inner: W) -> Self {
        Self::with_options(inner, EncodeOptions::default())
    }

    /// Create a new encoder with explicit options.
    pub fn with_options(inner: W, options: EncodeOptions) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            options,
        }
    }

    /// Encode one value and write it to the sink (blocking).
    ///
    /// Does not flush.
    pub fn encode<T: Encode + ?Sized>(&mut self, value: &T) -> EncodeResult<()> {
        self.buf.clear();
        value.encode_to(&mut ValueWriter::new(&mut self.buf, &self.options))?;
        tracing::trace!(bytes = self.buf.len(), "encoded value");
        self.write_buffered()
    }

    /// Encode several values back to back and write them in one go.
    ///
    /// Either every value reaches the sink or none does (short of an I/O
    /// failure partway through the write).
    pub fn encode_all(&mut self, values: &[&dyn Encode]) -> EncodeResult<()> {
        self.buf.clear();
        {
            let mut writer = ValueWriter::new(&mut self.buf, &self.options);
            for value in values {
                value.encode_to(&mut writer)?;
            }
        }
        tracing::trace!(values = values.len(), bytes = self.buf.len(), "encoded");
        self.write_buffered()
    }

    fn write_buffered(&mut self) -> EncodeResult<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => {
                    return Err(EncodeError::SinkWriteFailure(std::io::Error::from(
                        ErrorKind::WriteZero,
                    )))
                }
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(EncodeError::SinkWriteFailure(err)),
            }
        }
        Ok(())
    }

    /// Flush the underlying sink.
    pub fn flush(&mut self) -> EncodeResult<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(EncodeError::SinkWriteFailure(err)),
            }
        }
    }

    /// Borrow the underlying sink.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutably borrow the underlying sink.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Consume the encoder and return the inner sink.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Current encoder options.
    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::config::TimestampResolution;

    fn written(f: impl FnOnce(&mut ValueWriter<'_>)) -> Vec<u8> {
        let options = EncodeOptions::default();
        let mut buf = BytesMut::new();
        f(&mut ValueWriter::new(&mut buf, &options));
        buf.to_vec()
    }

    #[test]
    fn integers_use_shortest_tag() {
        assert_eq!(written(|w| w.write_int(8)), [0x08]);
        assert_eq!(written(|w| w.write_int(-8)), [0xf8]);
        assert_eq!(written(|w| w.write_int(-32)), [0xe0]);
        assert_eq!(written(|w| w.write_int(-33)), [wire::INT8, 0xdf]);
        assert_eq!(written(|w| w.write_int(200)), [wire::UINT8, 200]);
        assert_eq!(written(|w| w.write_int(1616)), [wire::UINT16, 0x06, 0x50]);
        assert_eq!(written(|w| w.write_int(-1616)), [wire::INT16, 0xf9, 0xb0]);
        assert_eq!(
            written(|w| w.write_uint(32323232)),
            [wire::UINT32, 0x01, 0xed, 0x36, 0xa0]
        );
        assert_eq!(written(|w| w.write_uint(u64::MAX))[0], wire::UINT64);
        assert_eq!(written(|w| w.write_int(i64::MIN))[0], wire::INT64);
    }

    #[test]
    fn every_int_matches_encoded_len() {
        let samples = [
            0i64, 1, 127, 128, 255, 256, 65535, 65536, 4294967295, 4294967296, -1, -32, -33,
            -128, -129, -32768, -32769, -2147483648, -2147483649, i64::MIN, i64::MAX,
        ];
        for v in samples {
            assert_eq!(written(|w| w.write_int(v)).len(), wire::int_encoded_len(v), "{v}");
        }
    }

    #[test]
    fn strings_use_shortest_header() {
        assert_eq!(
            written(|w| w.write_str("someday").unwrap()),
            [0xa7, b's', b'o', b'm', b'e', b'd', b'a', b'y']
        );
        assert_eq!(written(|w| w.write_str("").unwrap()), [0xa0]);

        let long = "x".repeat(32);
        let out = written(|w| w.write_str(&long).unwrap());
        assert_eq!(&out[..2], &[wire::STR8, 32]);

        let longer = "x".repeat(300);
        let out = written(|w| w.write_str(&longer).unwrap());
        assert_eq!(&out[..3], &[wire::STR16, 0x01, 0x2c]);
    }

    #[test]
    fn binary_never_uses_str_tags() {
        assert_eq!(written(|w| w.write_bin(b"ab").unwrap()), [wire::BIN8, 2, b'a', b'b']);
        assert_eq!(written(|w| w.write_bin(&[0u8; 256]).unwrap())[0], wire::BIN16);
    }

    #[test]
    fn container_headers() {
        assert_eq!(written(|w| w.write_array_len(15).unwrap()), [0x9f]);
        assert_eq!(written(|w| w.write_array_len(16).unwrap()), [wire::ARRAY16, 0, 16]);
        assert_eq!(written(|w| w.write_map_len(0).unwrap()), [0x80]);
        assert_eq!(
            written(|w| w.write_map_len(70000).unwrap()),
            [wire::MAP32, 0x00, 0x01, 0x11, 0x70]
        );
    }

    #[test]
    fn ext_headers() {
        assert_eq!(written(|w| w.write_ext(5, &[1]).unwrap()), [wire::FIXEXT1, 5, 1]);
        assert_eq!(written(|w| w.write_ext(5, &[1, 2, 3]).unwrap()), [wire::EXT8, 3, 5, 1, 2, 3]);
        let out = written(|w| w.write_ext(-2, &[0; 16]).unwrap());
        assert_eq!(&out[..2], &[wire::FIXEXT16, 0xfe]);
    }

    #[test]
    fn floats_keep_declared_width() {
        assert_eq!(written(|w| w.write_f32(-3232.0)), [wire::FLOAT32, 0xc5, 0x4a, 0x00, 0x00]);
        assert_eq!(written(|w| w.write_f64(0.5))[0], wire::FLOAT64);
        assert_eq!(written(|w| w.write_f64(0.5)).len(), 9);
    }

    #[test]
    fn timestamp_is_microsecond_fixext8() {
        let ts = Timestamp::from_unix_nanos(1_328_148_122_000_002_999);
        let out = written(|w| w.write_timestamp(ts));
        assert_eq!(out[0], wire::FIXEXT8);
        assert_eq!(out[1], wire::TIMESTAMP_EXT_TYPE as u8);
        assert_eq!(i64::from_be_bytes(out[2..10].try_into().unwrap()), 1_328_148_122_000_002);

        let options = EncodeOptions {
            timestamp_resolution: TimestampResolution::Nano,
        };
        let mut buf = BytesMut::new();
        ValueWriter::new(&mut buf, &options).write_timestamp(ts);
        assert_eq!(
            i64::from_be_bytes(buf[2..10].try_into().unwrap()),
            1_328_148_122_000_002_999
        );
    }

    #[test]
    fn shared_guard_detects_reentry() {
        let options = EncodeOptions::default();
        let mut buf = BytesMut::new();
        let mut w = ValueWriter::new(&mut buf, &options);
        w.enter_shared(0x1000).unwrap();
        assert!(matches!(w.enter_shared(0x1000), Err(EncodeError::CyclicReference)));
        w.leave_shared(0x1000);
        w.enter_shared(0x1000).unwrap();
    }

    #[test]
    fn encoder_writes_to_sink() {
        let mut enc = Encoder::new(Cursor::new(Vec::new()));
        enc.encode("someday").unwrap();
        enc.encode(&-8i64).unwrap();
        let bytes = enc.into_inner().into_inner();
        assert_eq!(bytes, [0xa7, b's', b'o', b'm', b'e', b'd', b'a', b'y', 0xf8]);
    }

    #[test]
    fn encoder_handles_interrupted_and_would_block() {
        let sink = FlakySink {
            failures: vec![ErrorKind::Interrupted, ErrorKind::WouldBlock],
            data: Vec::new(),
        };
        let mut enc = Encoder::new(sink);
        enc.encode(&true).unwrap();
        enc.flush().unwrap();
        assert_eq!(enc.get_ref().data, [wire::TRUE]);
    }

    #[test]
    fn zero_write_is_a_sink_failure() {
        let mut enc = Encoder::new(ZeroWriter);
        let err = enc.encode(&1u8).unwrap_err();
        assert!(matches!(err, EncodeError::SinkWriteFailure(e) if e.kind() == ErrorKind::WriteZero));
    }

    #[test]
    fn encode_all_stages_every_value() {
        let mut enc = Encoder::new(Vec::new());
        enc.encode_all(&[&1u8 as &dyn Encode, &"a" as &dyn Encode]).unwrap();
        assert_eq!(enc.into_inner(), [0x01, 0xa1, b'a']);
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut enc = Encoder::new(Cursor::new(Vec::<u8>::new()));
        let _ = enc.get_ref();
        let _ = enc.get_mut();
        assert_eq!(enc.options(), &EncodeOptions::default());
        let _inner = enc.into_inner();
    }

    struct FlakySink {
        failures: Vec<ErrorKind>,
        data: Vec<u8>,
    }

    impl Write for FlakySink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if let Some(kind) = self.failures.pop() {
                return Err(std::io::Error::from(kind));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
