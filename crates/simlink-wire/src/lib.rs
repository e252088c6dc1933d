//! Tagged binary frame codec for the simlink controller protocol.
//!
//! Every message on the wire is one frame: a single tag byte followed by a
//! small tag-specific field layout. Integers are little-endian `u32`;
//! variable payloads are length-prefixed; property names and values are
//! NUL-terminated. Integrity relies on the transport being a reliable
//! local pipe — there is no magic number and no checksum.
//!
//! Decoding is incremental: feed bytes as they arrive and get `Ok(None)`
//! until a complete frame is buffered.

pub mod codec;
pub mod error;
pub mod tag;

pub use codec::{decode_frame, encode_frame, Frame, DEFAULT_MAX_PAYLOAD};
pub use error::{Result, WireError};
pub use tag::{tag_name, BROADCAST};
