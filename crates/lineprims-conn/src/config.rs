use std::time::Duration;

use lineprims_stream::{Delimiters, DEFAULT_THREAD_NAME};

/// Configuration for a [`Connection`](crate::Connection).
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Delimiters used by `observe_string_stream`. Default: CR and LF.
    pub delimiters: Delimiters,
    /// Timeout for blocking writes. Ignored if the channel cannot apply it.
    pub write_timeout: Option<Duration>,
    /// Name of the reader thread.
    pub reader_thread_name: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            delimiters: Delimiters::default(),
            write_timeout: None,
            reader_thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}
