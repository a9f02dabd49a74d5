use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ChannelError, Result};

/// A connected, order-preserving, two-directional byte channel.
///
/// The input and output halves are obtained once by the owner and may be
/// moved to different threads. [`DuplexChannel::close`] must be callable
/// from any thread while a read or write is blocked on the channel, must
/// unblock that operation, and must be safe to call more than once.
pub trait DuplexChannel: Send + Sync + 'static {
    /// The read half.
    type Input: Read + Send + 'static;
    /// The write half.
    type Output: Write + Send + 'static;

    /// Obtain the channel's input stream.
    fn input(&self) -> Result<Self::Input>;

    /// Obtain the channel's output stream.
    fn output(&self) -> Result<Self::Output>;

    /// Close the channel. Calling this on an already-closed channel succeeds.
    fn close(&self) -> io::Result<()>;

    /// Apply a timeout to blocking writes.
    ///
    /// Channels without timeout support report [`ChannelError::Unsupported`].
    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        let _ = timeout;
        Err(ChannelError::Unsupported("write timeout"))
    }

    /// Transport name for diagnostics.
    fn describe(&self) -> &'static str {
        "duplex-channel"
    }
}

impl<C: DuplexChannel> DuplexChannel for Arc<C> {
    type Input = C::Input;
    type Output = C::Output;

    fn input(&self) -> Result<Self::Input> {
        (**self).input()
    }

    fn output(&self) -> Result<Self::Output> {
        (**self).output()
    }

    fn close(&self) -> io::Result<()> {
        (**self).close()
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        (**self).set_write_timeout(timeout)
    }

    fn describe(&self) -> &'static str {
        (**self).describe()
    }
}

#[cfg(unix)]
impl DuplexChannel for std::os::unix::net::UnixStream {
    type Input = std::os::unix::net::UnixStream;
    type Output = std::os::unix::net::UnixStream;

    fn input(&self) -> Result<Self::Input> {
        self.try_clone().map_err(ChannelError::StreamUnavailable)
    }

    fn output(&self) -> Result<Self::Output> {
        self.try_clone().map_err(ChannelError::StreamUnavailable)
    }

    fn close(&self) -> io::Result<()> {
        already_closed_is_ok(self.shutdown(Shutdown::Both))
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        std::os::unix::net::UnixStream::set_write_timeout(self, timeout).map_err(Into::into)
    }

    fn describe(&self) -> &'static str {
        "unix-stream"
    }
}

impl DuplexChannel for TcpStream {
    type Input = TcpStream;
    type Output = TcpStream;

    fn input(&self) -> Result<Self::Input> {
        self.try_clone().map_err(ChannelError::StreamUnavailable)
    }

    fn output(&self) -> Result<Self::Output> {
        self.try_clone().map_err(ChannelError::StreamUnavailable)
    }

    fn close(&self) -> io::Result<()> {
        already_closed_is_ok(self.shutdown(Shutdown::Both))
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        TcpStream::set_write_timeout(self, timeout).map_err(Into::into)
    }

    fn describe(&self) -> &'static str {
        "tcp-stream"
    }
}

// A second shutdown reports NotConnected on most platforms.
fn already_closed_is_ok(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
        other => other,
    }
}
