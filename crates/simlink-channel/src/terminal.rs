//! Terminal raw-mode management.
//!
//! When the inbound stream is the process's interactive stdin, the line
//! discipline must not buffer or echo protocol bytes. The guard captures
//! the current mode, disables canonical processing and echo for the
//! channel's lifetime, and restores the captured mode on drop — including
//! the unwind path of an abnormal exit.

use std::os::fd::RawFd;

use tracing::debug;

use crate::error::{ChannelError, Result};

/// RAII guard holding a terminal in raw (non-canonical, non-echoing) mode.
pub struct RawModeGuard {
    fd: RawFd,
    saved: libc::termios,
}

impl RawModeGuard {
    /// Switch `fd` to raw mode if it is a terminal.
    ///
    /// Returns `Ok(None)` when `fd` is not a tty (a pipe or a redirected
    /// stdin needs no mode change).
    pub fn enable(fd: RawFd) -> Result<Option<Self>> {
        // SAFETY: isatty only inspects the descriptor.
        if unsafe { libc::isatty(fd) } == 0 {
            return Ok(None);
        }

        // SAFETY: termios is a plain C struct; all-zeroes is a valid
        // initial value for tcgetattr to overwrite.
        let mut saved: libc::termios = unsafe { std::mem::zeroed() };
        // SAFETY: `saved` is a valid writable termios pointer.
        if unsafe { libc::tcgetattr(fd, &mut saved) } != 0 {
            return Err(ChannelError::Terminal(std::io::Error::last_os_error()));
        }

        let mut raw = saved;
        raw.c_lflag &= !(libc::ICANON | libc::ECHO);
        // SAFETY: `raw` is a valid termios obtained from tcgetattr.
        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &raw) } != 0 {
            return Err(ChannelError::Terminal(std::io::Error::last_os_error()));
        }

        debug!(fd, "terminal switched to raw mode");
        Ok(Some(Self { fd, saved }))
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        // SAFETY: `saved` holds the mode captured at construction for the
        // same descriptor. Restore failure is unreportable from drop.
        let rc = unsafe { libc::tcsetattr(self.fd, libc::TCSANOW, &self.saved) };
        if rc == 0 {
            debug!(fd = self.fd, "terminal mode restored");
        }
    }
}

impl std::fmt::Debug for RawModeGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawModeGuard").field("fd", &self.fd).finish()
    }
}
