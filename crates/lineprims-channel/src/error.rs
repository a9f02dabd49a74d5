use std::path::PathBuf;

/// Errors that can occur while obtaining or operating a duplex channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The channel's input or output stream could not be obtained.
    #[error("channel stream unavailable: {0}")]
    StreamUnavailable(std::io::Error),

    /// Failed to bind to the specified address.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the channel.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// The channel does not offer the requested capability.
    #[error("{0} is not supported by this channel")]
    Unsupported(&'static str),
}

impl ChannelError {
    /// Returns true when the error reports a missing capability rather than a failure.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, ChannelError::Unsupported(_))
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;
