//! Connection lifecycle over a duplex channel.
//!
//! A [`Connection`] owns one [`DuplexChannel`](lineprims_channel::DuplexChannel)
//! and a connected/disconnected flag. Writes are gated on the flag, any I/O
//! failure flips it and tears the channel down exactly once, and the read
//! side is exposed as shared byte and token streams.

pub mod config;
pub mod connection;
pub mod error;

pub use config::ConnectionConfig;
pub use connection::{Connection, ConnectionState, STATE_EVENTS};
pub use error::{ConnectionError, Result};
