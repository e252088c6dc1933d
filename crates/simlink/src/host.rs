use tracing::{info, warn};

use simlink_channel::{is_broadcast, ChannelHost, FrameSender};
use simlink_wire::BROADCAST;

/// A stand-in for the simulation's socket layer: every delivered message
/// is reflected back to the controller as a RECV frame.
///
/// Unicast deliveries come back with from/to swapped, as if the
/// destination answered; broadcasts come back unchanged so the controller
/// can observe its own fan-out convention. Handy while developing a
/// controller without a simulator attached.
pub struct LoopbackHost {
    sender: FrameSender,
}

impl LoopbackHost {
    pub fn new(sender: FrameSender) -> Self {
        Self { sender }
    }
}

impl ChannelHost for LoopbackHost {
    fn deliver_message(&mut self, from: u32, to: u32, payload: &[u8]) {
        let result = if is_broadcast(to) {
            self.sender.emit_recv(from, BROADCAST, payload)
        } else {
            self.sender.emit_recv(to, from, payload)
        };
        // Hook failures stay in the host; the dispatcher keeps polling.
        if let Err(err) = result {
            warn!(error = %err, from, to, "loopback echo failed");
        }
    }

    fn close_channel(&mut self, endpoint: u32) {
        info!(endpoint, "endpoint closed");
    }
}
