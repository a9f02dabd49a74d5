use std::io::{self, ErrorKind, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use lineprims_channel::DuplexChannel;
use lineprims_stream::{
    ByteStream, Delimiters, EventChannel, EventSource, Lines, Subscription, Termination,
};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::error::{ConnectionError, Result};

/// Name of the connection state event source.
pub const STATE_EVENTS: &str = "connection-state";

/// Whether a connection still accepts writes.
///
/// Starts `Connected` and moves to `Disconnected` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

struct Shared<C: DuplexChannel> {
    channel: C,
    connected: AtomicBool,
    output: Mutex<Option<C::Output>>,
    bytes: ByteStream,
    events: EventChannel<ConnectionState>,
}

impl<C: DuplexChannel> Shared<C> {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Move to `Disconnected` and release everything. Only the first caller
    /// does any work; returns whether this call was it.
    ///
    /// When no send holds the output it is dropped before the channel is
    /// closed. Otherwise the channel is closed first, which wakes a send
    /// blocked in `write`, and the output is taken once that send lets go.
    fn teardown(&self, cause: &'static str) -> bool {
        if self
            .connected
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        debug!(transport = self.channel.describe(), cause, "disconnecting");

        let output_released = self
            .output
            .try_lock()
            .map(|mut output| drop(output.take()))
            .is_some();
        if let Err(err) = self.channel.close() {
            debug!(error = %err, "channel close failed during teardown");
        }
        self.bytes.shutdown();
        if !output_released {
            drop(self.output.lock().take());
        }

        self.events.emit(ConnectionState::Disconnected);
        self.events.close();
        true
    }
}

/// Owns a duplex channel and governs when it may be written to.
///
/// Reads are exposed as shared streams backed by a single reader thread.
/// Writes go through [`send`](Self::send), which never raises: it returns
/// `false` when the connection is already down or the write fails, and a
/// failed write disconnects. A read failure disconnects too, while the peer
/// ending its side only completes the read streams. [`close`](Self::close)
/// may be called any number of times, from any thread; the channel is
/// released once.
pub struct Connection<C: DuplexChannel> {
    shared: Arc<Shared<C>>,
    config: ConnectionConfig,
}

impl<C: DuplexChannel> Connection<C> {
    /// Take ownership of `channel` with the default configuration.
    pub fn new(channel: C) -> Result<Self> {
        Self::with_config(channel, ConnectionConfig::default())
    }

    /// Take ownership of `channel`.
    ///
    /// If the channel's streams cannot be obtained the channel is closed
    /// before [`ConnectionError::StreamUnavailable`] is returned.
    pub fn with_config(channel: C, config: ConnectionConfig) -> Result<Self> {
        let (input, output) = match acquire_streams(&channel) {
            Ok(streams) => streams,
            Err(err) => {
                warn!(transport = channel.describe(), error = %err, "channel streams unavailable");
                if let Err(close_err) = channel.close() {
                    debug!(error = %close_err, "channel close failed after setup error");
                }
                return Err(ConnectionError::StreamUnavailable(err));
            }
        };

        if let Some(timeout) = config.write_timeout {
            match channel.set_write_timeout(Some(timeout)) {
                Ok(()) => {}
                Err(err) if err.is_unsupported() => {
                    debug!(transport = channel.describe(), "write timeout not supported; ignoring");
                }
                Err(err) => warn!(error = %err, "failed to apply write timeout"),
            }
        }

        let thread_name = config.reader_thread_name.clone();
        let shared = Arc::new_cyclic(|weak: &Weak<Shared<C>>| {
            let weak = weak.clone();
            let bytes = ByteStream::new(input)
                .with_thread_name(thread_name)
                .with_terminate_hook(Box::new(move |termination: &Termination| {
                    // End-of-channel leaves the write side usable.
                    if let Termination::Failed(_) = termination {
                        if let Some(shared) = weak.upgrade() {
                            shared.teardown("read failed");
                        }
                    }
                }));
            Shared {
                channel,
                connected: AtomicBool::new(true),
                output: Mutex::new(Some(output)),
                bytes,
                events: EventChannel::new(STATE_EVENTS),
            }
        });

        debug!(transport = shared.channel.describe(), "connection established");
        Ok(Self { shared, config })
    }

    /// The shared byte stream. The first observer starts the reader thread.
    pub fn observe_byte_stream(&self) -> Subscription<u8> {
        self.shared.bytes.observe()
    }

    /// Tokens split on the configured delimiters (CR and LF by default).
    pub fn observe_string_stream(&self) -> Lines {
        self.shared.bytes.lines(self.config.delimiters.clone())
    }

    /// Tokens split on `delimiters`.
    pub fn observe_string_stream_with(&self, delimiters: Delimiters) -> Lines {
        self.shared.bytes.lines(delimiters)
    }

    #[cfg(feature = "async")]
    pub fn observe_byte_stream_async(&self) -> lineprims_stream::AsyncSubscription<u8> {
        self.shared.bytes.observe_async()
    }

    #[cfg(feature = "async")]
    pub fn observe_string_stream_async(&self) -> lineprims_stream::AsyncLines {
        self.shared.bytes.lines_async(self.config.delimiters.clone())
    }

    /// State transitions. Subscribers attached while connected see
    /// `Disconnected` once, then completion.
    pub fn observe_state(&self) -> Subscription<ConnectionState> {
        self.shared.events.subscribe()
    }

    /// Write and flush `bytes`.
    ///
    /// Returns `false` without touching the channel if already disconnected.
    /// A failed write disconnects and returns `false`.
    pub fn send(&self, bytes: &[u8]) -> bool {
        if !self.shared.is_connected() {
            return false;
        }

        let mut output = self.shared.output.lock();
        // Teardown flips the flag before it waits for this lock.
        if !self.shared.is_connected() {
            output.take();
            return false;
        }
        let Some(stream) = output.as_mut() else {
            return false;
        };

        match write_all_and_flush(stream, bytes) {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, len = bytes.len(), "send failed; disconnecting");
                output.take();
                drop(output);
                self.shared.teardown("write failed");
                false
            }
        }
    }

    /// Send the UTF-8 bytes of `text`.
    pub fn send_str(&self, text: &str) -> bool {
        self.send(text.as_bytes())
    }

    /// Send a single byte.
    pub fn send_byte(&self, byte: u8) -> bool {
        self.send(&[byte])
    }

    /// Disconnect and release the channel. Safe to call repeatedly.
    pub fn close(&self) {
        if !self.shared.teardown("closed by owner") {
            debug!("close on already disconnected connection");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        if self.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// The underlying byte stream, for diagnostics.
    pub fn byte_stream(&self) -> &ByteStream {
        &self.shared.bytes
    }

    pub fn channel(&self) -> &C {
        &self.shared.channel
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

impl<C: DuplexChannel> Drop for Connection<C> {
    fn drop(&mut self) {
        self.shared.teardown("dropped");
    }
}

impl<C: DuplexChannel> std::fmt::Debug for Connection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("transport", &self.shared.channel.describe())
            .field("state", &self.state())
            .field("bytes", &self.shared.bytes)
            .finish()
    }
}

fn acquire_streams<C: DuplexChannel>(
    channel: &C,
) -> lineprims_channel::Result<(C::Input, C::Output)> {
    let input = channel.input()?;
    let output = channel.output()?;
    Ok((input, output))
}

fn write_all_and_flush<W: Write>(out: &mut W, bytes: &[u8]) -> io::Result<()> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match out.write(&bytes[offset..]) {
            Ok(0) => return Err(io::Error::from(ErrorKind::WriteZero)),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }

    loop {
        match out.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}
