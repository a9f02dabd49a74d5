//! Shared byte streams and delimiter framing.
//!
//! This is the read side of lineprims. A [`ByteStream`] owns a channel's
//! input and runs exactly one blocking read loop for it, no matter how many
//! consumers attach. Every consumer gets its own unbounded queue, so a slow
//! consumer never loses bytes and never stalls the reader or its siblings.
//!
//! [`Lines`] layers a [`DelimiterFramer`] over one byte subscription and
//! yields string tokens, flushing a trailing partial token before the stream
//! completes or fails.

pub mod delimiter;
pub mod error;
pub mod event;
pub mod hub;
pub mod lines;
pub mod source;

#[cfg(feature = "async")]
pub mod codec;

pub use delimiter::{DelimiterFramer, Delimiters, CR, LF};
pub use error::{Result, StreamError, WaitError};
pub use event::{EventChannel, EventSource};
pub use hub::{Hub, Subscription, Termination};
pub use lines::Lines;
pub use source::{ByteStream, TerminateHook, DEFAULT_THREAD_NAME};

#[cfg(feature = "async")]
pub use codec::DelimiterCodec;
#[cfg(feature = "async")]
pub use hub::AsyncSubscription;
#[cfg(feature = "async")]
pub use lines::AsyncLines;
