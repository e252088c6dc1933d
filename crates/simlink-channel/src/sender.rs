use std::io::{ErrorKind, Write};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::BytesMut;
use tracing::debug;

use simlink_wire::{encode_frame, Frame};

use crate::config::ChannelConfig;
use crate::error::{ChannelError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Cloneable handle for emitting outbound frames.
///
/// All clones serialize on one write lock held for the full
/// encode-write-flush of each frame, so concurrent emitters (per-connection
/// callbacks on other threads, the dispatcher answering a PROPGET) never
/// interleave partial frames. The flush happens before the lock is
/// released; a failed write or flush is fatal to the channel because the
/// peer's framing can no longer be trusted.
pub struct FrameSender {
    inner: Arc<Mutex<Sink>>,
    verbose: bool,
}

struct Sink {
    out: Box<dyn Write + Send>,
    buf: BytesMut,
}

impl Clone for FrameSender {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            verbose: self.verbose,
        }
    }
}

impl FrameSender {
    /// Wrap an output sink.
    pub fn new(out: impl Write + Send + 'static, config: &ChannelConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Sink {
                out: Box::new(out),
                buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            })),
            verbose: config.verbose,
        }
    }

    /// Emit a RECV frame: a simulation-side delivery for the controller.
    pub fn emit_recv(&self, from: u32, to: u32, payload: &[u8]) -> Result<()> {
        self.emit(&Frame::Recv {
            from,
            to,
            payload: payload.to_vec().into(),
        })?;
        if self.verbose {
            debug!(from, to, size = payload.len(), "RECV");
        }
        Ok(())
    }

    /// Emit a PROPVAL frame answering `requester`.
    pub fn emit_prop_val(&self, requester: u32, name: &str, value: &str) -> Result<()> {
        self.emit(&Frame::PropVal {
            requester,
            name: name.to_string(),
            value: value.to_string(),
        })?;
        if self.verbose {
            debug!(requester, name, value, "PROPVAL");
        }
        Ok(())
    }

    /// Emit a DISCONNECT frame for `endpoint`.
    pub fn emit_disconnect(&self, endpoint: u32) -> Result<()> {
        self.emit(&Frame::Disconnect { endpoint })?;
        if self.verbose {
            debug!(endpoint, "DISCONNECT");
        }
        Ok(())
    }

    fn emit(&self, frame: &Frame) -> Result<()> {
        let mut sink = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let sink = &mut *sink;

        sink.buf.clear();
        encode_frame(frame, &mut sink.buf)?;

        let mut offset = 0usize;
        while offset < sink.buf.len() {
            match sink.out.write(&sink.buf[offset..]) {
                Ok(0) => return Err(ChannelError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(ChannelError::Io(err)),
            }
        }

        loop {
            match sink.out.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(ChannelError::Io(err)),
            }
        }
    }
}

impl std::fmt::Debug for FrameSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSender")
            .field("verbose", &self.verbose)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use bytes::BytesMut;
    use simlink_wire::{decode_frame, DEFAULT_MAX_PAYLOAD};

    use super::*;

    /// A sink that shares its written bytes with the test.
    #[derive(Clone, Default)]
    struct SharedSink {
        data: Arc<Mutex<Vec<u8>>>,
        flushed: Arc<AtomicBool>,
    }

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn drain(sink: &SharedSink) -> Vec<Frame> {
        let mut wire = BytesMut::from(sink.data.lock().unwrap().as_slice());
        let mut frames = Vec::new();
        while let Some(frame) = decode_frame(&mut wire, DEFAULT_MAX_PAYLOAD).unwrap() {
            frames.push(frame);
        }
        assert!(wire.is_empty(), "trailing garbage after frames");
        frames
    }

    #[test]
    fn emit_recv_writes_one_frame_and_flushes() {
        let sink = SharedSink::default();
        let sender = FrameSender::new(sink.clone(), &ChannelConfig::default());

        sender.emit_recv(3, 5, &[1, 2, 3, 4]).unwrap();

        assert!(sink.flushed.load(Ordering::SeqCst));
        let frames = drain(&sink);
        assert_eq!(frames.len(), 1);
        assert!(matches!(
            &frames[0],
            Frame::Recv { from: 3, to: 5, payload } if payload.as_ref() == [1, 2, 3, 4]
        ));
    }

    #[test]
    fn emit_prop_val_roundtrips() {
        let sink = SharedSink::default();
        let sender = FrameSender::new(sink.clone(), &ChannelConfig::default());

        sender.emit_prop_val(7, "x.pos", "1.0 2.0").unwrap();

        let frames = drain(&sink);
        assert_eq!(
            frames[0],
            Frame::PropVal {
                requester: 7,
                name: "x.pos".to_string(),
                value: "1.0 2.0".to_string(),
            }
        );
    }

    #[test]
    fn emit_disconnect_roundtrips() {
        let sink = SharedSink::default();
        let sender = FrameSender::new(sink.clone(), &ChannelConfig::default());

        sender.emit_disconnect(9).unwrap();

        assert_eq!(drain(&sink), vec![Frame::Disconnect { endpoint: 9 }]);
    }

    #[test]
    fn concurrent_emitters_never_interleave() {
        let sink = SharedSink::default();
        let sender = FrameSender::new(sink.clone(), &ChannelConfig::default());

        let threads: Vec<_> = (0..50u32)
            .map(|i| {
                let sender = sender.clone();
                std::thread::spawn(move || {
                    let payload = vec![i as u8; 64];
                    sender.emit_recv(i, i + 1, &payload).unwrap();
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        let frames = drain(&sink);
        assert_eq!(frames.len(), 50);
        for frame in frames {
            let Frame::Recv { from, to, payload } = frame else {
                panic!("expected RECV frame");
            };
            assert_eq!(to, from + 1);
            assert_eq!(payload.as_ref(), vec![from as u8; 64].as_slice());
        }
    }

    #[test]
    fn zero_write_is_connection_closed() {
        struct ZeroWriter;
        impl Write for ZeroWriter {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Ok(0)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let sender = FrameSender::new(ZeroWriter, &ChannelConfig::default());
        let err = sender.emit_disconnect(1).unwrap_err();
        assert!(matches!(err, ChannelError::ConnectionClosed));
    }

    #[test]
    fn interrupted_write_retries_to_completion() {
        struct InterruptedOnce {
            tripped: bool,
            data: Vec<u8>,
        }
        impl Write for InterruptedOnce {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                if !self.tripped {
                    self.tripped = true;
                    return Err(std::io::Error::from(ErrorKind::Interrupted));
                }
                self.data.extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let sender = FrameSender::new(
            InterruptedOnce {
                tripped: false,
                data: Vec::new(),
            },
            &ChannelConfig::default(),
        );
        sender.emit_disconnect(2).unwrap();
    }

    #[test]
    fn write_error_propagates() {
        struct BrokenPipe;
        impl Write for BrokenPipe {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::from(ErrorKind::BrokenPipe))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let sender = FrameSender::new(BrokenPipe, &ChannelConfig::default());
        let err = sender.emit_recv(1, 2, b"x").unwrap_err();
        assert!(matches!(err, ChannelError::Io(_)));
    }
}
