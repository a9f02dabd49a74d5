/// Errors that can occur while setting up a connection.
///
/// Send failures are not errors: `send` reports them as `false`.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The channel's input or output stream could not be obtained.
    #[error("stream unavailable: {0}")]
    StreamUnavailable(#[source] lineprims_channel::ChannelError),
}

pub type Result<T> = std::result::Result<T, ConnectionError>;
