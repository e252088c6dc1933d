//! Host capability hooks.
//!
//! The channel core is host-agnostic: when a SEND or DISCONNECT frame
//! arrives it invokes one of these two capabilities and nothing else. The
//! owning application (a simulation, a test harness, a real network stack)
//! supplies the implementation at construction.

use simlink_wire::BROADCAST;

/// Capabilities the dispatcher invokes but does not implement.
///
/// Both methods default to no-ops so hosts only override what they route.
/// Hook failures are the host's concern; implementations must not leave
/// the channel's I/O state depending on their success.
pub trait ChannelHost {
    /// An inbound SEND frame was decoded.
    ///
    /// `to == BROADCAST` (0) means "every known endpoint"; the core never
    /// fans out, so broadcast interpretation belongs entirely to this
    /// hook.
    fn deliver_message(&mut self, from: u32, to: u32, payload: &[u8]) {
        let _ = (from, to, payload);
    }

    /// An inbound DISCONNECT frame was decoded; release whatever is held
    /// for `endpoint`.
    ///
    /// The core does not track which ids were already closed, so this may
    /// be called more than once for the same id.
    fn close_channel(&mut self, endpoint: u32) {
        let _ = endpoint;
    }
}

/// A host that ignores everything. Useful as a default and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHost;

impl ChannelHost for NoopHost {}

/// True if a delivery destination means "all endpoints".
pub fn is_broadcast(to: u32) -> bool {
    to == BROADCAST
}
