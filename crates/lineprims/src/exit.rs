use std::fmt;
use std::io;

use lineprims::channel::ChannelError;
use lineprims::conn::ConnectionError;
use lineprims::stream::{StreamError, WaitError};

// sysexits-style codes.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const CHANNEL_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: &io::Error) -> CliError {
    let code = io_kind_code(err.kind());
    CliError::new(code, format!("{context}: {err}"))
}

fn io_kind_code(kind: io::ErrorKind) -> i32 {
    match kind {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::NotFound
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::BrokenPipe => FAILURE,
        _ => INTERNAL,
    }
}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    match &err {
        ChannelError::Bind { source, .. }
        | ChannelError::Connect { source, .. }
        | ChannelError::Accept(source)
        | ChannelError::StreamUnavailable(source)
        | ChannelError::Io(source) => io_error(context, source),
        ChannelError::PathTooLong { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        _ => CliError::new(CHANNEL_ERROR, format!("{context}: {err}")),
    }
}

pub fn connection_error(context: &str, err: ConnectionError) -> CliError {
    match err {
        ConnectionError::StreamUnavailable(err) => channel_error(context, err),
    }
}

pub fn stream_error(context: &str, err: &StreamError) -> CliError {
    match err {
        StreamError::ChannelClosed { kind, .. } => {
            CliError::new(io_kind_code(*kind), format!("{context}: {err}"))
        }
        StreamError::EmptyDelimiters => CliError::new(USAGE, format!("{context}: {err}")),
    }
}

pub fn wait_error(context: &str, err: &WaitError) -> CliError {
    match err {
        WaitError::Stream(err) => stream_error(context, err),
        WaitError::Timeout | WaitError::Empty => {
            CliError::new(TIMEOUT, format!("{context}: timed out"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_socket_maps_to_failure() {
        let err = channel_error(
            "connect failed",
            ChannelError::Connect {
                path: "/tmp/none.sock".into(),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
        );
        assert_eq!(err.code, FAILURE);
        assert!(err.message.starts_with("connect failed: "));
    }

    #[test]
    fn path_too_long_is_usage_error() {
        let err = channel_error(
            "bind failed",
            ChannelError::PathTooLong {
                path: "/x".into(),
                len: 200,
                max: 108,
            },
        );
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn unsupported_is_channel_error() {
        let err = channel_error("setup", ChannelError::Unsupported("write timeout"));
        assert_eq!(err.code, CHANNEL_ERROR);
    }

    #[test]
    fn closed_stream_uses_io_kind() {
        let closed = StreamError::channel_closed(&io::Error::from(io::ErrorKind::ConnectionReset));
        assert_eq!(stream_error("receive failed", &closed).code, FAILURE);
        assert_eq!(wait_error("receive failed", &WaitError::Timeout).code, TIMEOUT);
    }
}
