use std::io;

/// Errors surfaced by byte and token streams.
///
/// Every attached consumer receives its own copy of a terminal error, hence `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The channel failed while the read loop was waiting for a byte.
    #[error("connection closed while reading: {message}")]
    ChannelClosed { kind: io::ErrorKind, message: String },

    /// A delimiter set was built from no bytes at all.
    #[error("delimiter set must contain at least one byte")]
    EmptyDelimiters,
}

impl StreamError {
    /// Build a [`StreamError::ChannelClosed`] from the read failure that caused it.
    pub fn channel_closed(err: &io::Error) -> Self {
        Self::ChannelClosed {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// Returns true if this error reports a failed read.
    pub fn is_channel_closed(&self) -> bool {
        matches!(self, Self::ChannelClosed { .. })
    }
}

/// Errors from the non-blocking and deadline-bounded receive calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    /// Nothing arrived before the deadline.
    #[error("timed out waiting for the next item")]
    Timeout,

    /// Nothing is queued right now.
    #[error("no item available")]
    Empty,

    /// The stream terminated with an error.
    #[error(transparent)]
    Stream(#[from] StreamError),
}

pub type Result<T> = std::result::Result<T, StreamError>;
