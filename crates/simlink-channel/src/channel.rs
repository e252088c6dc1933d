use std::fs::File;
use std::io::{Read, Stdin, Write};
use std::os::fd::AsRawFd;
use std::path::Path;

use crate::config::ChannelConfig;
use crate::dispatcher::{Dispatcher, PollOutcome};
use crate::error::Result;
use crate::hooks::ChannelHost;
use crate::sender::FrameSender;
use crate::stream::{open_pipe_reader, open_pipe_writer};
use crate::terminal::RawModeGuard;

/// The assembled controller channel.
///
/// Binds the (input, output) stream pair for its whole lifetime and wires
/// the dispatcher, the property store and the frame sender together. The
/// host supplies its capability hooks at construction and drives
/// [`poll_once`](SimChannel::poll_once) from its scheduling loop.
///
/// When the channel runs over the process's interactive stdin, the
/// terminal is held in raw mode and restored on drop — the guard's drop
/// runs on the unwind path too.
pub struct SimChannel<I> {
    dispatcher: Dispatcher<I>,
    sender: FrameSender,
    raw_mode: Option<RawModeGuard>,
}

impl<I> std::fmt::Debug for SimChannel<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimChannel").finish_non_exhaustive()
    }
}

impl<I: Read + AsRawFd> SimChannel<I> {
    /// Assemble a channel over an arbitrary stream pair.
    pub fn over(
        input: I,
        output: impl Write + Send + 'static,
        host: Box<dyn ChannelHost>,
        config: ChannelConfig,
    ) -> Self {
        let sender = FrameSender::new(output, &config);
        Self::from_parts(input, sender, host, config)
    }

    /// Assemble a channel from a pre-built sender.
    ///
    /// Useful when the host needs a sender clone before the channel exists
    /// (e.g. to hand it to per-connection callbacks at setup time).
    pub fn from_parts(
        input: I,
        sender: FrameSender,
        host: Box<dyn ChannelHost>,
        config: ChannelConfig,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(input, sender.clone(), host, config),
            sender,
            raw_mode: None,
        }
    }

    /// Switch the bound input to raw mode if it is a terminal.
    ///
    /// No-op for pipes and redirected input. The captured mode is restored
    /// when the channel drops.
    pub fn engage_raw_mode(&mut self) -> Result<()> {
        if self.raw_mode.is_none() {
            self.raw_mode = RawModeGuard::enable(self.dispatcher.input_fd())?;
        }
        Ok(())
    }

    /// Poll the inbound stream and process at most one frame.
    ///
    /// See [`Dispatcher::poll_once`] for the step semantics.
    pub fn poll_once(&mut self) -> Result<PollOutcome> {
        self.dispatcher.poll_once()
    }

    /// A cloneable handle for emitting outbound frames from any thread.
    pub fn sender(&self) -> FrameSender {
        self.sender.clone()
    }

    /// Publish a property from the host side.
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.dispatcher.store_mut().set(name, value);
    }

    /// Read a property; absent names read as `""`.
    pub fn get_property(&self, name: &str) -> &str {
        self.dispatcher.store().get(name)
    }
}

impl SimChannel<Stdin> {
    /// Bind the channel to the process's stdin/stdout, holding the
    /// terminal in raw mode for the channel's lifetime when stdin is
    /// interactive.
    pub fn stdio(host: Box<dyn ChannelHost>, config: ChannelConfig) -> Result<Self> {
        let sender = FrameSender::new(std::io::stdout(), &config);
        let mut channel = Self::from_parts(std::io::stdin(), sender, host, config);
        channel.engage_raw_mode()?;
        Ok(channel)
    }
}

impl SimChannel<File> {
    /// Bind the channel to a pair of FIFO paths.
    pub fn pipes(
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        host: Box<dyn ChannelHost>,
        config: ChannelConfig,
    ) -> Result<Self> {
        let input = open_pipe_reader(input)?;
        let output = open_pipe_writer(output)?;
        Ok(Self::over(input, output, host, config))
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::net::UnixStream;
    use std::sync::{Arc, Mutex};

    use bytes::BytesMut;
    use simlink_wire::{decode_frame, encode_frame, Frame, DEFAULT_MAX_PAYLOAD};

    use super::*;
    use crate::hooks::NoopHost;

    struct VecSink(Arc<Mutex<Vec<u8>>>);

    impl Write for VecSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn properties_readable_before_any_traffic() {
        let (input, _controller) = UnixStream::pair().unwrap();
        let mut channel = SimChannel::over(
            input,
            VecSink(Arc::new(Mutex::new(Vec::new()))),
            Box::new(NoopHost),
            ChannelConfig::default(),
        );

        channel.set_property("__node1.index", "1");
        assert_eq!(channel.get_property("__node1.index"), "1");
        assert_eq!(channel.get_property("missing"), "");
    }

    #[test]
    fn sender_clones_share_the_output_stream() {
        let (input, _controller) = UnixStream::pair().unwrap();
        let out = Arc::new(Mutex::new(Vec::new()));
        let channel = SimChannel::over(
            input,
            VecSink(Arc::clone(&out)),
            Box::new(NoopHost),
            ChannelConfig::default(),
        );

        let a = channel.sender();
        let b = channel.sender();
        a.emit_disconnect(1).unwrap();
        b.emit_disconnect(2).unwrap();

        let mut wire = BytesMut::from(out.lock().unwrap().as_slice());
        assert_eq!(
            decode_frame(&mut wire, DEFAULT_MAX_PAYLOAD).unwrap(),
            Some(Frame::Disconnect { endpoint: 1 })
        );
        assert_eq!(
            decode_frame(&mut wire, DEFAULT_MAX_PAYLOAD).unwrap(),
            Some(Frame::Disconnect { endpoint: 2 })
        );
    }

    #[test]
    fn engage_raw_mode_is_a_noop_on_sockets() {
        let (input, _controller) = UnixStream::pair().unwrap();
        let mut channel = SimChannel::over(
            input,
            VecSink(Arc::new(Mutex::new(Vec::new()))),
            Box::new(NoopHost),
            ChannelConfig::default(),
        );
        channel.engage_raw_mode().unwrap();
        channel.engage_raw_mode().unwrap();
    }

    #[test]
    fn poll_dispatches_through_the_assembled_channel() {
        use std::io::Write as _;

        let (input, mut controller) = UnixStream::pair().unwrap();
        let out = Arc::new(Mutex::new(Vec::new()));
        let mut channel = SimChannel::over(
            input,
            VecSink(Arc::clone(&out)),
            Box::new(NoopHost),
            ChannelConfig::default(),
        );

        let mut wire = BytesMut::new();
        encode_frame(
            &Frame::PropSet {
                name: "speed".to_string(),
                value: "42".to_string(),
            },
            &mut wire,
        )
        .unwrap();
        controller.write_all(&wire).unwrap();

        assert_eq!(channel.poll_once().unwrap(), PollOutcome::PropertyStored);
        assert_eq!(channel.get_property("speed"), "42");
    }

    #[test]
    fn pipes_constructor_reports_missing_path() {
        let err = SimChannel::pipes(
            "/nonexistent/in.pipe",
            "/nonexistent/out.pipe",
            Box::new(NoopHost),
            ChannelConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, crate::ChannelError::OpenPipe { .. }));
    }
}
