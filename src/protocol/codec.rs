//! Length-prefixed JSON framing.
//!
//! # Responsibilities
//! - Split a byte stream into frames behind a 4-byte big-endian length prefix
//! - Decode frames into envelopes, reporting `Ok(None)` on partial input
//! - Enforce the configured frame size cap before buffering a frame body
//! - Encode envelopes into ready-to-write byte sequences

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CodecError;
use crate::protocol::{RequestEnvelope, ResponseEnvelope};

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_BYTES: usize = 4;

/// Stateless framing codec with a configured frame cap.
///
/// Decoding consumes complete frames from the caller's buffer and leaves
/// partial input untouched, so the caller re-invokes once more bytes arrive.
#[derive(Debug, Clone)]
pub struct Codec {
    max_frame_bytes: usize,
}

impl Codec {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self { max_frame_bytes }
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    /// Decode one request envelope. `Ok(None)` means more bytes are needed.
    pub fn decode_request(
        &self,
        buf: &mut BytesMut,
    ) -> Result<Option<RequestEnvelope>, CodecError> {
        self.decode(buf)
    }

    /// Decode one response envelope. `Ok(None)` means more bytes are needed.
    pub fn decode_response(
        &self,
        buf: &mut BytesMut,
    ) -> Result<Option<ResponseEnvelope>, CodecError> {
        self.decode(buf)
    }

    fn decode<T: DeserializeOwned>(&self, buf: &mut BytesMut) -> Result<Option<T>, CodecError> {
        let Some(frame) = self.split_frame(buf)? else {
            return Ok(None);
        };
        let value =
            serde_json::from_slice(&frame).map_err(|e| CodecError::Malformed(e.to_string()))?;
        Ok(Some(value))
    }

    /// Split one complete frame body off the front of `buf`.
    ///
    /// The length check runs as soon as the prefix is readable: a frame one
    /// byte over the cap is rejected before its body arrives.
    fn split_frame(&self, buf: &mut BytesMut) -> Result<Option<Bytes>, CodecError> {
        if buf.len() < LENGTH_PREFIX_BYTES {
            return Ok(None);
        }
        let mut prefix = [0u8; LENGTH_PREFIX_BYTES];
        prefix.copy_from_slice(&buf[..LENGTH_PREFIX_BYTES]);
        let len = u32::from_be_bytes(prefix) as usize;

        if len > self.max_frame_bytes {
            return Err(CodecError::Oversized {
                len,
                cap: self.max_frame_bytes,
            });
        }
        if buf.len() < LENGTH_PREFIX_BYTES + len {
            return Ok(None);
        }

        buf.advance(LENGTH_PREFIX_BYTES);
        Ok(Some(buf.split_to(len).freeze()))
    }

    pub fn encode_request(&self, envelope: &RequestEnvelope) -> Result<Bytes, CodecError> {
        self.encode(envelope)
    }

    pub fn encode_response(&self, envelope: &ResponseEnvelope) -> Result<Bytes, CodecError> {
        self.encode(envelope)
    }

    /// Encoding is total for any well-formed envelope; serialization can only
    /// fail on payloads that are not representable as JSON.
    fn encode<T: Serialize>(&self, envelope: &T) -> Result<Bytes, CodecError> {
        let body =
            serde_json::to_vec(envelope).map_err(|e| CodecError::Malformed(e.to_string()))?;
        let mut out = BytesMut::with_capacity(LENGTH_PREFIX_BYTES + body.len());
        out.put_u32(body.len() as u32);
        out.put_slice(&body);
        Ok(out.freeze())
    }
}
