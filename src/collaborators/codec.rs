//! Length-prefixed framing shared by the API endpoint and the `wdb_update`
//! socket client (`spec.md` §6): a little-endian 32-bit byte count followed
//! by that many bytes of payload.
//!
//! Kept as pure encode/decode functions over [`bytes::Bytes`] so the wire
//! format is testable without a real socket; the thin `UnixStream` wiring
//! in [`super::wdb`] is the only piece that actually touches the network.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use miette::Diagnostic;
use thiserror::Error;

/// Maximum accepted frame payload, guarding against a malformed or hostile
/// length prefix causing an unbounded allocation.
pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum CodecError {
    #[error("frame length {0} exceeds the maximum of {MAX_FRAME_LEN}")]
    #[diagnostic(code(eventcascade::codec::frame_too_large))]
    FrameTooLarge(u32),
}

/// Encode `payload` as one length-prefixed frame.
pub fn encode(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_u32_le(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}

/// Attempt to decode one frame out of `buf`, advancing it past the frame on
/// success. Returns `Ok(None)` when fewer bytes than the full frame have
/// arrived yet — callers should read more and retry.
pub fn decode(buf: &mut BytesMut) -> Result<Option<Bytes>, CodecError> {
    if buf.len() < 4 {
        return Ok(None);
    }
    let len = u32::from_le_bytes(buf[..4].try_into().expect("checked above"));
    if len > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge(len));
    }
    let total = 4 + len as usize;
    if buf.len() < total {
        return Ok(None);
    }
    buf.advance(4);
    Ok(Some(buf.split_to(len as usize).freeze()))
}
