use std::io::ErrorKind;
use std::sync::Arc;

use packwire_codec::{Decode, DecodeConfig, DecodeError, Decoder, Encode, EncodeOptions, Encoder};
use tracing::{debug, warn};

use crate::conn::Connection;
use crate::error::{Result, RpcError};
use crate::header::Header;

/// Client role: send requests, receive responses.
pub trait ClientCodec {
    /// Write a request header followed by its body, then flush.
    fn write_request(&mut self, header: &Header, body: &dyn Encode) -> Result<()>;

    /// Read the next response header.
    fn read_response_header(&mut self) -> Result<Header>;

    /// Read the response body into `body`, or discard it when `None`.
    fn read_response_body(&mut self, body: Option<&mut dyn Decode>) -> Result<()>;

    /// Release the connection. Calling it again is a no-op.
    fn close(&mut self) -> Result<()>;
}

/// Server role: receive requests, send responses.
pub trait ServerCodec {
    /// Read the next request header.
    fn read_request_header(&mut self) -> Result<Header>;

    /// Read the request body into `body`, or discard it when `None`.
    fn read_request_body(&mut self, body: Option<&mut dyn Decode>) -> Result<()>;

    /// Write a response header followed by its body, then flush.
    fn write_response(&mut self, header: &Header, body: &dyn Encode) -> Result<()>;

    /// Release the connection. Calling it again is a no-op.
    fn close(&mut self) -> Result<()>;
}

struct Inner<C> {
    encoder: Encoder<C>,
    decoder: Decoder<C>,
    poisoned: bool,
}

/// MessagePack codec for one RPC connection, usable in either role.
///
/// Each message is two consecutive values, a [`Header`] and a body, with no
/// extra framing. Messages are strictly FIFO. Any encode, decode or I/O
/// failure poisons the codec: the stream cannot be resynchronised, so every
/// later call fails with [`RpcError::Poisoned`]. The connection is shut down
/// on [`close`](ClientCodec::close) or drop.
pub struct RpcCodec<C: Connection> {
    inner: Option<Inner<C>>,
}

impl<C: Connection> RpcCodec<C> {
    /// Wrap a connection with default codec configuration.
    pub fn new(conn: C) -> Result<Self> {
        Self::with_config(conn, DecodeConfig::default(), EncodeOptions::default())
    }

    /// Wrap a connection with explicit codec configuration.
    pub fn with_config(
        conn: C,
        decode_config: impl Into<Arc<DecodeConfig>>,
        encode_options: EncodeOptions,
    ) -> Result<Self> {
        let reader = conn.try_clone()?;
        Ok(Self {
            inner: Some(Inner {
                encoder: Encoder::with_options(conn, encode_options),
                decoder: Decoder::with_config(reader, decode_config),
                poisoned: false,
            }),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Whether an earlier failure made the codec unusable.
    pub fn is_poisoned(&self) -> bool {
        self.inner.as_ref().is_some_and(|inner| inner.poisoned)
    }

    /// The connection, unless closed.
    pub fn connection(&self) -> Option<&C> {
        self.inner.as_ref().map(|inner| inner.encoder.get_ref())
    }

    fn with_inner<T>(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut Inner<C>) -> Result<T>,
    ) -> Result<T> {
        let inner = self.inner.as_mut().ok_or(RpcError::Closed)?;
        if inner.poisoned {
            return Err(RpcError::Poisoned);
        }
        f(&mut *inner).inspect_err(|err| {
            inner.poisoned = true;
            warn!(op, error = %err, "rpc codec poisoned");
        })
    }

    fn write_message(&mut self, op: &'static str, header: &Header, body: &dyn Encode) -> Result<()> {
        self.with_inner(op, |inner| {
            inner.encoder.encode_all(&[header as &dyn Encode, body])?;
            inner.encoder.flush()?;
            Ok(())
        })?;
        debug!(
            op,
            service_method = %header.service_method,
            seq = header.sequence,
            error = %header.error,
            "message written"
        );
        Ok(())
    }

    fn read_header(&mut self, op: &'static str) -> Result<Header> {
        let header = self.with_inner(op, |inner| {
            let mut header = Header::default();
            match inner.decoder.decode(&mut header) {
                Ok(()) => Ok(header),
                Err(DecodeError::EndOfStream) => Err(RpcError::ConnectionClosed),
                Err(err) => Err(err.into()),
            }
        })?;
        debug!(
            op,
            service_method = %header.service_method,
            seq = header.sequence,
            "header read"
        );
        Ok(header)
    }

    fn read_body(&mut self, op: &'static str, body: Option<&mut dyn Decode>) -> Result<()> {
        self.with_inner(op, |inner| {
            match body {
                Some(body) => inner.decoder.decode(body)?,
                None => inner.decoder.skip()?,
            }
            Ok(())
        })
    }

    fn shutdown(&mut self) -> Result<()> {
        let Some(inner) = self.inner.take() else {
            return Ok(());
        };
        let result = match inner.encoder.get_ref().shutdown() {
            Err(err) if err.kind() != ErrorKind::NotConnected => Err(RpcError::Io(err)),
            _ => Ok(()),
        };
        debug!(poisoned = inner.poisoned, "rpc codec closed");
        result
    }
}

impl<C: Connection> ClientCodec for RpcCodec<C> {
    fn write_request(&mut self, header: &Header, body: &dyn Encode) -> Result<()> {
        self.write_message("write_request", header, body)
    }

    fn read_response_header(&mut self) -> Result<Header> {
        self.read_header("read_response_header")
    }

    fn read_response_body(&mut self, body: Option<&mut dyn Decode>) -> Result<()> {
        self.read_body("read_response_body", body)
    }

    fn close(&mut self) -> Result<()> {
        self.shutdown()
    }
}

impl<C: Connection> ServerCodec for RpcCodec<C> {
    fn read_request_header(&mut self) -> Result<Header> {
        self.read_header("read_request_header")
    }

    fn read_request_body(&mut self, body: Option<&mut dyn Decode>) -> Result<()> {
        self.read_body("read_request_body", body)
    }

    fn write_response(&mut self, header: &Header, body: &dyn Encode) -> Result<()> {
        self.write_message("write_response", header, body)
    }

    fn close(&mut self) -> Result<()> {
        self.shutdown()
    }
}

impl<C: Connection> Drop for RpcCodec<C> {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
