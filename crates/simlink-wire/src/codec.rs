use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, WireError};
use crate::tag;

/// Default maximum size accepted for a declared length field: 16 MiB.
///
/// The protocol itself trusts declared lengths; this cap only guards the
/// decoder against allocating for a garbage length after the stream has
/// desynchronized.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// One complete tagged message, per the wire layout below.
///
/// Frames are transient: they exist between decode and dispatch (or between
/// construction and encode) and are never persisted.
///
/// ```text
/// ┌───────────┬──────────────────────────────────────────────────────┐
/// │ Tag (1B)  │ Fields                                               │
/// ├───────────┼──────────────────────────────────────────────────────┤
/// │ 0 NEW_CLIENT  │ —                                                │
/// │ 1 SEND        │ from:u32 to:u32 length:u32 payload[length]       │
/// │ 2 RECV        │ from:u32 to:u32 size:u32 payload[size]           │
/// │ 3 DISCONNECT  │ endpoint:u32                                     │
/// │ 4 PROPGET     │ requester:u32 length:u32 name\0                  │
/// │ 5 PROPSET     │ length:u32 name\0 value\0                        │
/// │ 6 PROPVAL     │ requester:u32 length:u32 name\0 value\0          │
/// └───────────┴──────────────────────────────────────────────────────┘
/// ```
///
/// All integers are little-endian. The `length` of PROPGET/PROPSET/PROPVAL
/// covers the NUL-terminated string region that follows it.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Reserved controller-side tag; carries nothing.
    NewClient,
    /// Controller injects a message for the host to route.
    Send { from: u32, to: u32, payload: Bytes },
    /// Host delivers a message to the controller.
    Recv { from: u32, to: u32, payload: Bytes },
    /// Either side tears down an endpoint.
    Disconnect { endpoint: u32 },
    /// Controller requests a property value.
    PropGet { requester: u32, name: String },
    /// Controller stores a property value.
    PropSet { name: String, value: String },
    /// Host answers a PROPGET.
    PropVal {
        requester: u32,
        name: String,
        value: String,
    },
}

impl Frame {
    /// The tag byte this frame encodes to.
    pub fn tag(&self) -> u8 {
        match self {
            Frame::NewClient => tag::NEW_CLIENT,
            Frame::Send { .. } => tag::SEND,
            Frame::Recv { .. } => tag::RECV,
            Frame::Disconnect { .. } => tag::DISCONNECT,
            Frame::PropGet { .. } => tag::PROPGET,
            Frame::PropSet { .. } => tag::PROPSET,
            Frame::PropVal { .. } => tag::PROPVAL,
        }
    }
}

/// Encode a frame into the wire format, appending to `dst`.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    match frame {
        Frame::NewClient => {
            dst.put_u8(tag::NEW_CLIENT);
        }
        Frame::Send { from, to, payload } => {
            encode_message(tag::SEND, *from, *to, payload, dst)?;
        }
        Frame::Recv { from, to, payload } => {
            encode_message(tag::RECV, *from, *to, payload, dst)?;
        }
        Frame::Disconnect { endpoint } => {
            dst.reserve(5);
            dst.put_u8(tag::DISCONNECT);
            dst.put_u32_le(*endpoint);
        }
        Frame::PropGet { requester, name } => {
            reject_interior_nul(name, "PROPGET")?;
            let region = name.len() + 1;
            dst.reserve(9 + region);
            dst.put_u8(tag::PROPGET);
            dst.put_u32_le(*requester);
            dst.put_u32_le(region as u32);
            dst.put_slice(name.as_bytes());
            dst.put_u8(0);
        }
        Frame::PropSet { name, value } => {
            reject_interior_nul(name, "PROPSET")?;
            reject_interior_nul(value, "PROPSET")?;
            let region = name.len() + 1 + value.len() + 1;
            dst.reserve(5 + region);
            dst.put_u8(tag::PROPSET);
            dst.put_u32_le(region as u32);
            dst.put_slice(name.as_bytes());
            dst.put_u8(0);
            dst.put_slice(value.as_bytes());
            dst.put_u8(0);
        }
        Frame::PropVal {
            requester,
            name,
            value,
        } => {
            reject_interior_nul(name, "PROPVAL")?;
            reject_interior_nul(value, "PROPVAL")?;
            let region = name.len() + 1 + value.len() + 1;
            dst.reserve(9 + region);
            dst.put_u8(tag::PROPVAL);
            dst.put_u32_le(*requester);
            dst.put_u32_le(region as u32);
            dst.put_slice(name.as_bytes());
            dst.put_u8(0);
            dst.put_slice(value.as_bytes());
            dst.put_u8(0);
        }
    }
    Ok(())
}

fn encode_message(t: u8, from: u32, to: u32, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > u32::MAX as usize {
        return Err(WireError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(13 + payload.len());
    dst.put_u8(t);
    dst.put_u32_le(from);
    dst.put_u32_le(to);
    dst.put_u32_le(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

fn reject_interior_nul(text: &str, frame: &'static str) -> Result<()> {
    if text.as_bytes().contains(&0) {
        return Err(WireError::EmbeddedNul { frame });
    }
    Ok(())
}

/// Decode one frame from the front of `src`.
///
/// Returns `Ok(None)` when the buffer does not yet hold a complete frame;
/// no bytes are consumed in that case, so callers can keep appending as
/// input arrives. On success the frame's bytes are consumed.
///
/// An unrecognized tag consumes exactly the tag byte before returning
/// `WireError::UnknownTag` — the producer's frame length is unknown, so
/// nothing more can safely be skipped.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.is_empty() {
        return Ok(None);
    }

    match src[0] {
        tag::NEW_CLIENT => {
            src.advance(1);
            Ok(Some(Frame::NewClient))
        }
        t @ (tag::SEND | tag::RECV) => {
            // tag + from + to + length
            if src.len() < 13 {
                return Ok(None);
            }
            let length = read_u32(&src[9..13]) as usize;
            check_length(length, max_payload)?;
            if src.len() < 13 + length {
                return Ok(None);
            }
            let from = read_u32(&src[1..5]);
            let to = read_u32(&src[5..9]);
            src.advance(13);
            let payload = src.split_to(length).freeze();
            Ok(Some(if t == tag::SEND {
                Frame::Send { from, to, payload }
            } else {
                Frame::Recv { from, to, payload }
            }))
        }
        tag::DISCONNECT => {
            if src.len() < 5 {
                return Ok(None);
            }
            let endpoint = read_u32(&src[1..5]);
            src.advance(5);
            Ok(Some(Frame::Disconnect { endpoint }))
        }
        tag::PROPGET => {
            if src.len() < 9 {
                return Ok(None);
            }
            let length = read_u32(&src[5..9]) as usize;
            check_length(length, max_payload)?;
            if src.len() < 9 + length {
                return Ok(None);
            }
            let requester = read_u32(&src[1..5]);
            // Consume the full frame even when the region fails to parse,
            // so the stream stays aligned on the next frame boundary.
            let parsed = parse_name(&src[9..9 + length], "PROPGET");
            src.advance(9 + length);
            Ok(Some(Frame::PropGet {
                requester,
                name: parsed?,
            }))
        }
        tag::PROPSET => {
            if src.len() < 5 {
                return Ok(None);
            }
            let length = read_u32(&src[1..5]) as usize;
            check_length(length, max_payload)?;
            if src.len() < 5 + length {
                return Ok(None);
            }
            let parsed = parse_pair(&src[5..5 + length], "PROPSET");
            src.advance(5 + length);
            let (name, value) = parsed?;
            Ok(Some(Frame::PropSet { name, value }))
        }
        tag::PROPVAL => {
            if src.len() < 9 {
                return Ok(None);
            }
            let length = read_u32(&src[5..9]) as usize;
            check_length(length, max_payload)?;
            if src.len() < 9 + length {
                return Ok(None);
            }
            let requester = read_u32(&src[1..5]);
            let parsed = parse_pair(&src[9..9 + length], "PROPVAL");
            src.advance(9 + length);
            let (name, value) = parsed?;
            Ok(Some(Frame::PropVal {
                requester,
                name,
                value,
            }))
        }
        other => {
            src.advance(1);
            Err(WireError::UnknownTag { tag: other })
        }
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes(bytes.try_into().unwrap())
}

fn check_length(length: usize, max_payload: usize) -> Result<()> {
    if length > max_payload {
        return Err(WireError::PayloadTooLarge {
            size: length,
            max: max_payload,
        });
    }
    Ok(())
}

/// Parse a NUL-terminated name out of a PROPGET region.
fn parse_name(region: &[u8], frame: &'static str) -> Result<String> {
    let end = region
        .iter()
        .position(|&b| b == 0)
        .ok_or(WireError::MissingNul { frame })?;
    Ok(std::str::from_utf8(&region[..end])?.to_string())
}

/// Parse the `name\0value\0` pair out of a PROPSET/PROPVAL region.
fn parse_pair(region: &[u8], frame: &'static str) -> Result<(String, String)> {
    let split = region
        .iter()
        .position(|&b| b == 0)
        .ok_or(WireError::MissingNul { frame })?;
    let name = std::str::from_utf8(&region[..split])?.to_string();
    let rest = &region[split + 1..];
    let end = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or(WireError::MissingNul { frame })?;
    let value = std::str::from_utf8(&rest[..end])?.to_string();
    Ok((name, value))
}
