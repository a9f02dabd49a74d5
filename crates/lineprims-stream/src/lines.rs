//! Token streams framed from one byte subscription.

use std::time::{Duration, Instant};

use crate::delimiter::{DelimiterFramer, Delimiters};
use crate::error::{StreamError, WaitError};
use crate::hub::Subscription;

/// Delimiter-terminated tokens framed from one byte subscription.
///
/// Framing happens on the consuming thread; the byte subscription's
/// unbounded queue is the only buffer, so tokens are never dropped. When the
/// bytes end or fail, a non-empty partial token is yielded first, then the
/// completion or the error.
#[derive(Debug)]
pub struct Lines {
    bytes: Subscription<u8>,
    framer: DelimiterFramer,
    pending_error: Option<StreamError>,
    finished: bool,
}

impl Lines {
    pub fn new(bytes: Subscription<u8>, delimiters: Delimiters) -> Self {
        Self {
            bytes,
            framer: DelimiterFramer::new(delimiters),
            pending_error: None,
            finished: false,
        }
    }

    /// Wait at most `timeout` for the next token.
    ///
    /// `Ok(None)` means the stream has completed. A timeout keeps the
    /// partially buffered token for the next call.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<String>, WaitError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(ready) = self.terminal_step() {
                return ready.map_err(WaitError::Stream);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            let received = self.bytes.recv_timeout(remaining);
            if let Some(ready) = self.step(received)? {
                return Ok(Some(ready));
            }
        }
    }

    /// Returns true once the terminal signal has been yielded.
    pub fn is_terminated(&self) -> bool {
        self.finished
    }

    pub fn delimiters(&self) -> &Delimiters {
        self.framer.delimiters()
    }

    // Yields the stashed error, or completion once everything was delivered.
    fn terminal_step(&mut self) -> Option<Result<Option<String>, StreamError>> {
        if let Some(err) = self.pending_error.take() {
            self.finished = true;
            return Some(Err(err));
        }
        if self.finished {
            return Some(Ok(None));
        }
        None
    }

    // Feed one receive outcome through the framer.
    fn step(&mut self, received: Result<Option<u8>, WaitError>) -> Result<Option<String>, WaitError> {
        match received {
            Ok(Some(byte)) => Ok(self.framer.push(byte)),
            Ok(None) => {
                self.finished = true;
                Ok(self.framer.finish())
            }
            Err(WaitError::Stream(err)) => match self.framer.finish() {
                Some(token) => {
                    self.pending_error = Some(err);
                    Ok(Some(token))
                }
                None => {
                    self.finished = true;
                    Err(WaitError::Stream(err))
                }
            },
            Err(other) => Err(other),
        }
    }
}

impl Iterator for Lines {
    type Item = Result<String, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(ready) = self.terminal_step() {
                return ready.transpose();
            }
            let received = match self.bytes.next() {
                Some(Ok(byte)) => Ok(Some(byte)),
                Some(Err(err)) => Err(WaitError::Stream(err)),
                None => Ok(None),
            };
            match self.step(received) {
                Ok(Some(token)) => return Some(Ok(token)),
                Ok(None) if self.finished => return None,
                Ok(None) => continue,
                Err(WaitError::Stream(err)) => return Some(Err(err)),
                Err(_) => return None,
            }
        }
    }
}

/// Async counterpart of [`Lines`], a [`futures_core::Stream`] of tokens.
#[cfg(feature = "async")]
pub struct AsyncLines {
    bytes: crate::hub::AsyncSubscription<u8>,
    framer: DelimiterFramer,
    pending_error: Option<StreamError>,
    finished: bool,
}

#[cfg(feature = "async")]
impl AsyncLines {
    pub fn new(bytes: crate::hub::AsyncSubscription<u8>, delimiters: Delimiters) -> Self {
        Self {
            bytes,
            framer: DelimiterFramer::new(delimiters),
            pending_error: None,
            finished: false,
        }
    }
}

#[cfg(feature = "async")]
impl futures_core::Stream for AsyncLines {
    type Item = Result<String, StreamError>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;

        let this = &mut *self;
        if let Some(err) = this.pending_error.take() {
            this.finished = true;
            return Poll::Ready(Some(Err(err)));
        }
        if this.finished {
            return Poll::Ready(None);
        }
        loop {
            match futures_core::Stream::poll_next(std::pin::Pin::new(&mut this.bytes), cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(byte))) => {
                    if let Some(token) = this.framer.push(byte) {
                        return Poll::Ready(Some(Ok(token)));
                    }
                }
                Poll::Ready(Some(Err(err))) => {
                    return Poll::Ready(Some(match this.framer.finish() {
                        Some(token) => {
                            this.pending_error = Some(err);
                            Ok(token)
                        }
                        None => {
                            this.finished = true;
                            Err(err)
                        }
                    }));
                }
                Poll::Ready(None) => {
                    this.finished = true;
                    return Poll::Ready(this.framer.finish().map(Ok));
                }
            }
        }
    }
}
