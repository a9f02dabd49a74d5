//! Delimited text over duplex byte channels.
//!
//! lineprims takes an already-connected two-way byte channel and turns it
//! into shared byte and string streams backed by a single reader thread,
//! with a connection lifecycle that gates writes and releases the channel
//! exactly once.
//!
//! # Crate Structure
//!
//! - [`channel`]: the `DuplexChannel` abstraction plus Unix socket helpers
//! - [`stream`]: shared byte streams, fan-out hub and delimiter framing
//! - [`conn`]: the `Connection` lifecycle built on the two above

/// Re-export channel types.
pub mod channel {
    pub use lineprims_channel::*;
}

/// Re-export stream types.
pub mod stream {
    pub use lineprims_stream::*;
}

/// Re-export connection types.
pub mod conn {
    pub use lineprims_conn::*;
}
