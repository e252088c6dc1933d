use std::io::{ErrorKind, Read};
use std::os::fd::AsRawFd;

use bytes::BytesMut;
use tracing::{debug, warn};

use simlink_wire::{decode_frame, tag, tag_name, Frame, WireError};

use crate::config::ChannelConfig;
use crate::error::Result;
use crate::hooks::ChannelHost;
use crate::properties::PropertyStore;
use crate::sender::FrameSender;
use crate::stream;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// What a single dispatcher step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// No complete frame was available; nothing was dispatched.
    Idle,
    /// A SEND frame was handed to the host's `deliver_message`.
    Delivered,
    /// A DISCONNECT frame was handed to the host's `close_channel`.
    Closed,
    /// A PROPGET was answered with an outbound PROPVAL.
    PropertyServed,
    /// A PROPSET updated the property store.
    PropertyStored,
    /// A well-formed frame arrived that travels the wrong direction
    /// (NEW_CLIENT, RECV, PROPVAL); it was reported and skipped.
    /// Unrecognized tag bytes are also reported but surface as `Idle`,
    /// since no frame could be decoded past them.
    Ignored,
}

/// Non-blocking, single-step frame dispatcher.
///
/// Designed for one logical polling context: the host's scheduler invokes
/// [`poll_once`](Dispatcher::poll_once) every tick (or in a tight drain
/// loop) and the dispatcher processes at most one frame per invocation,
/// never suspending the caller.
///
/// Bytes that arrive ahead of a complete frame stay in the reassembly
/// buffer across invocations, so a frame split over several pipe writes is
/// dispatched once its declared length is satisfied rather than being
/// dropped as malformed.
pub struct Dispatcher<I> {
    input: I,
    buf: BytesMut,
    store: PropertyStore,
    host: Box<dyn ChannelHost>,
    sender: FrameSender,
    config: ChannelConfig,
}

impl<I: Read + AsRawFd> Dispatcher<I> {
    /// Bind a dispatcher to an inbound stream.
    ///
    /// `sender` is the handle PROPGET answers are emitted through; hosts
    /// keep their own clones for RECV traffic.
    pub fn new(
        input: I,
        sender: FrameSender,
        host: Box<dyn ChannelHost>,
        config: ChannelConfig,
    ) -> Self {
        Self {
            input,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            store: PropertyStore::new(),
            host,
            sender,
            config,
        }
    }

    /// The property store backing PROPGET/PROPSET.
    pub fn store(&self) -> &PropertyStore {
        &self.store
    }

    /// Mutable access for host-side property publishing.
    pub fn store_mut(&mut self) -> &mut PropertyStore {
        &mut self.store
    }

    /// The inbound stream's descriptor.
    pub fn input_fd(&self) -> std::os::fd::RawFd {
        self.input.as_raw_fd()
    }

    /// Poll the inbound stream and process at most one frame.
    ///
    /// Returns immediately with [`PollOutcome::Idle`] when no input is
    /// ready, on EOF, and on absorbed read errors — the channel stays
    /// usable for subsequent cycles in all three cases. The only error
    /// this propagates is a failed PROPVAL write, which is fatal to the
    /// channel (outbound framing can no longer be trusted).
    pub fn poll_once(&mut self) -> Result<PollOutcome> {
        // A prior cycle may have buffered more than one frame's bytes.
        if !self.buf.is_empty() {
            if let Some(frame) = self.try_decode() {
                return self.dispatch(frame);
            }
        }

        match stream::input_ready(self.input.as_raw_fd()) {
            Ok(true) => {}
            Ok(false) => return Ok(PollOutcome::Idle),
            Err(err) => {
                warn!(error = %err, "input readiness poll failed");
                return Ok(PollOutcome::Idle);
            }
        }

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = match self.input.read(&mut chunk) {
            Ok(n) => n,
            Err(err)
                if err.kind() == ErrorKind::Interrupted
                    || err.kind() == ErrorKind::WouldBlock =>
            {
                return Ok(PollOutcome::Idle);
            }
            Err(err) => {
                warn!(error = %err, "bad read on input stream");
                return Ok(PollOutcome::Idle);
            }
        };
        if read == 0 {
            // EOF: nothing to do this cycle, not fatal.
            return Ok(PollOutcome::Idle);
        }
        self.buf.extend_from_slice(&chunk[..read]);

        match self.try_decode() {
            Some(frame) => self.dispatch(frame),
            None => Ok(PollOutcome::Idle),
        }
    }

    /// Decode one frame from the reassembly buffer, absorbing wire errors.
    fn try_decode(&mut self) -> Option<Frame> {
        loop {
            match decode_frame(&mut self.buf, self.config.max_frame_payload) {
                Ok(frame) => return frame,
                Err(WireError::UnknownTag { tag }) => {
                    // Only the tag byte was consumed; the remainder may be
                    // misaligned from here on, but the loop must not die.
                    warn!(tag, "unexpected command");
                    return None;
                }
                Err(WireError::PayloadTooLarge { size, max }) => {
                    // A garbage length usually means the stream already
                    // desynchronized; drop the buffer rather than spin on
                    // the same bytes forever.
                    warn!(size, max, "declared length over cap, dropping buffered input");
                    self.buf.clear();
                    return None;
                }
                Err(err) => {
                    // Malformed region; its bytes were consumed, so the
                    // next frame boundary is intact. Keep decoding.
                    warn!(error = %err, "dropping malformed frame");
                    continue;
                }
            }
        }
    }

    fn dispatch(&mut self, frame: Frame) -> Result<PollOutcome> {
        match frame {
            Frame::Send { from, to, payload } => {
                if self.config.verbose {
                    debug!(from, to, size = payload.len(), "SEND");
                }
                self.host.deliver_message(from, to, &payload);
                Ok(PollOutcome::Delivered)
            }
            Frame::Disconnect { endpoint } => {
                if self.config.verbose {
                    debug!(endpoint, "DISCONNECT");
                }
                self.host.close_channel(endpoint);
                Ok(PollOutcome::Closed)
            }
            Frame::PropGet { requester, name } => {
                let value = self.store.get(&name).to_string();
                if self.config.verbose {
                    debug!(requester, name = %name, value = %value, "PROPGET");
                }
                self.sender.emit_prop_val(requester, &name, &value)?;
                Ok(PollOutcome::PropertyServed)
            }
            Frame::PropSet { name, value } => {
                if self.config.verbose {
                    debug!(name = %name, value = %value, "PROPSET");
                }
                self.store.set(name, value);
                Ok(PollOutcome::PropertyStored)
            }
            other => {
                // NEW_CLIENT, RECV and PROPVAL are valid wire frames but
                // travel the other direction; decoding them fully keeps
                // the stream aligned, acting on them would be wrong.
                debug_assert!(!tag::is_simulation_bound(other.tag()));
                warn!(tag = tag_name(other.tag()), "unexpected command");
                Ok(PollOutcome::Ignored)
            }
        }
    }
}
