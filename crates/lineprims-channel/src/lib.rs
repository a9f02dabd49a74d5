//! Duplex byte channel abstraction.
//!
//! A [`DuplexChannel`] is an already-connected, order-preserving,
//! two-directional byte channel. Everything above this crate assumes it is
//! handed one and never opens or accepts connections itself.
//!
//! Implementations are provided for:
//! - Unix domain socket streams (Linux/macOS)
//! - TCP streams
//!
//! The [`unix`] module also carries small bind/accept/connect helpers so the
//! CLI and tests can obtain real channels.

pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod unix;

pub use error::{ChannelError, Result};
pub use traits::DuplexChannel;

#[cfg(unix)]
pub use unix::{connect, UnixChannelListener};
