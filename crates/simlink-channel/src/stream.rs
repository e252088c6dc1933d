//! Pipe endpoints and input readiness.
//!
//! The channel is constructed over two unidirectional byte streams. These
//! helpers open existing FIFO paths the way the daemon expects (read side
//! non-blocking, so construction never stalls waiting for the peer) and
//! provide the zero-timeout readiness check the dispatcher polls with.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::fd::RawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use crate::error::{ChannelError, Result};

/// Open the inbound FIFO path for non-blocking reads.
pub fn open_pipe_reader(path: impl AsRef<Path>) -> Result<File> {
    let path = path.as_ref();
    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .map_err(|source| ChannelError::OpenPipe {
            path: path.to_path_buf(),
            source,
        })
}

/// Open the outbound FIFO path for writing.
///
/// Fails with `ENXIO` if no reader holds the other end yet; the controller
/// is expected to open its read side before launching the host.
pub fn open_pipe_writer(path: impl AsRef<Path>) -> Result<File> {
    let path = path.as_ref();
    OpenOptions::new()
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .map_err(|source| ChannelError::OpenPipe {
            path: path.to_path_buf(),
            source,
        })
}

/// Zero-timeout readiness check on the inbound descriptor.
///
/// Returns true when at least one byte can be read without blocking, or
/// when the descriptor reports hangup or an error condition (so the
/// caller's read observes EOF or the failure instead of spinning).
/// Never suspends the caller.
pub fn input_ready(fd: RawFd) -> Result<bool> {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };

    loop {
        // SAFETY: `pollfd` is a valid, writable pollfd array of length 1
        // for the duration of the call, and a zero timeout cannot block.
        let rc = unsafe { libc::poll(&mut pollfd, 1, 0) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted {
                continue;
            }
            return Err(ChannelError::Io(err));
        }
        let wake = libc::POLLIN | libc::POLLHUP | libc::POLLERR | libc::POLLNVAL;
        return Ok(rc > 0 && pollfd.revents & wake != 0);
    }
}
