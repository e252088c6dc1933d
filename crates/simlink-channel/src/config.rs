use simlink_wire::DEFAULT_MAX_PAYLOAD;

/// Per-instance channel configuration.
///
/// Passed once at construction; nothing here is read from process-global
/// state, so tests can run independently configured channels side by side.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Emit a `debug!` trace line per frame sent and dispatched.
    ///
    /// Trace lines go to the logging subscriber (stderr by convention),
    /// never to the protocol stream.
    pub verbose: bool,
    /// Maximum declared length accepted when decoding inbound frames.
    pub max_frame_payload: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            max_frame_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}
