use std::path::PathBuf;

/// Errors that can occur in channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Wire-level encode/decode error.
    #[error("wire error: {0}")]
    Wire(#[from] simlink_wire::WireError),

    /// An I/O error on the channel's streams.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The output sink accepted zero bytes; the peer is gone.
    #[error("output stream closed mid-frame")]
    ConnectionClosed,

    /// A named pipe path could not be opened.
    #[error("failed to open pipe {path}: {source}")]
    OpenPipe {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Terminal mode capture or restore failed.
    #[error("terminal mode error: {0}")]
    Terminal(std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
