//! Poll-driven controller channel runtime.
//!
//! This is the "just works" layer over [`simlink_wire`]: bind a pair of
//! byte streams (pipes or stdin/stdout), hand in a [`ChannelHost`] for the
//! two capability hooks, and call [`SimChannel::poll_once`] from your
//! scheduler tick. Outbound frames go through cloneable [`FrameSender`]
//! handles that serialize on a single write lock, so per-connection
//! callbacks on other threads can emit concurrently without interleaving
//! partial frames.
//!
//! POSIX-only: the readiness poll and the terminal raw-mode guard sit on
//! `poll(2)` and termios.

pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod hooks;
pub mod properties;
pub mod sender;
pub mod stream;
pub mod terminal;

pub use channel::SimChannel;
pub use config::ChannelConfig;
pub use dispatcher::{Dispatcher, PollOutcome};
pub use error::{ChannelError, Result};
pub use hooks::{is_broadcast, ChannelHost, NoopHost};
pub use properties::PropertyStore;
pub use sender::FrameSender;
pub use stream::{input_ready, open_pipe_reader, open_pipe_writer};
pub use terminal::RawModeGuard;
