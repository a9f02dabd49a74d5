//! The single reader thread behind every byte and token consumer of a channel.

use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::delimiter::Delimiters;
use crate::error::StreamError;
use crate::hub::{Hub, Subscription, Termination};
use crate::lines::Lines;

/// Default name of the reader thread.
pub const DEFAULT_THREAD_NAME: &str = "lineprims-reader";

/// Invoked from the reader thread when the read loop ends on its own,
/// before consumers are told.
pub type TerminateHook = Box<dyn FnOnce(&Termination) + Send + 'static>;

type Input = Box<dyn Read + Send + 'static>;

enum LoopState {
    Idle(Input),
    Running,
    Stopped,
}

/// A hot, shared sequence of the bytes read from one input stream.
///
/// The first [`observe`](Self::observe) starts a single reader thread that
/// performs blocking one-byte reads and publishes every byte to all attached
/// consumers. Further observers share that thread; they see bytes read after
/// they attached, never earlier ones. The loop runs until end-of-input or a
/// read failure. Detaching consumers never stops it and never closes anything.
pub struct ByteStream {
    hub: Hub<u8>,
    state: Arc<Mutex<LoopState>>,
    hook: Arc<Mutex<Option<TerminateHook>>>,
    reads: Arc<AtomicU64>,
    thread_name: String,
}

impl ByteStream {
    /// Wrap `input`. Nothing is read until the first observation.
    pub fn new<R>(input: R) -> Self
    where
        R: Read + Send + 'static,
    {
        Self {
            hub: Hub::new(),
            state: Arc::new(Mutex::new(LoopState::Idle(Box::new(input)))),
            hook: Arc::new(Mutex::new(None)),
            reads: Arc::new(AtomicU64::new(0)),
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }

    /// Run `hook` when the read loop ends by itself (end-of-input or read failure).
    pub fn with_terminate_hook(self, hook: TerminateHook) -> Self {
        *self.hook.lock() = Some(hook);
        self
    }

    /// Override the reader thread name.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Attach a byte consumer, starting the read loop if this is the first one.
    pub fn observe(&self) -> Subscription<u8> {
        let subscription = self.hub.subscribe();
        self.ensure_started();
        subscription
    }

    /// Attach an async byte consumer, starting the read loop if needed.
    #[cfg(feature = "async")]
    pub fn observe_async(&self) -> crate::hub::AsyncSubscription<u8> {
        let subscription = self.hub.subscribe_async();
        self.ensure_started();
        subscription
    }

    /// Attach a token consumer splitting on `delimiters`.
    pub fn lines(&self, delimiters: Delimiters) -> Lines {
        Lines::new(self.observe(), delimiters)
    }

    /// Attach a token consumer splitting on CR and LF.
    pub fn lines_default(&self) -> Lines {
        self.lines(Delimiters::default())
    }

    /// Attach an async token consumer splitting on `delimiters`.
    #[cfg(feature = "async")]
    pub fn lines_async(&self, delimiters: Delimiters) -> crate::lines::AsyncLines {
        crate::lines::AsyncLines::new(self.observe_async(), delimiters)
    }

    /// End a stream whose read loop never started, releasing its input.
    ///
    /// Consumers attached later see completion. Once the loop is running
    /// this does nothing; closing the channel underneath it ends the loop.
    pub fn shutdown(&self) {
        let input = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, LoopState::Stopped) {
                LoopState::Idle(input) => input,
                other => {
                    *state = other;
                    return;
                }
            }
        };
        drop(input);
        self.hook.lock().take();
        debug!("byte stream shut down before first read");
        self.hub.complete();
    }

    /// Number of times the read primitive has been invoked.
    pub fn physical_reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns true while the reader thread is running.
    pub fn is_running(&self) -> bool {
        matches!(*self.state.lock(), LoopState::Running)
    }

    pub fn termination(&self) -> Option<Termination> {
        self.hub.termination()
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    fn ensure_started(&self) {
        let mut state = self.state.lock();
        let input = match std::mem::replace(&mut *state, LoopState::Running) {
            LoopState::Idle(input) => input,
            other => {
                *state = other;
                return;
            }
        };

        let reader = ReadLoop {
            input,
            hub: self.hub.clone(),
            state: Arc::clone(&self.state),
            hook: Arc::clone(&self.hook),
            reads: Arc::clone(&self.reads),
        };
        let spawned = std::thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || reader.run());

        if let Err(err) = spawned {
            warn!(error = %err, "failed to start reader thread");
            *state = LoopState::Stopped;
            drop(state);
            finish(&self.hook, &self.hub, Termination::Failed(StreamError::channel_closed(&err)));
        }
    }
}

impl std::fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteStream")
            .field("running", &self.is_running())
            .field("subscribers", &self.hub.subscriber_count())
            .field("physical_reads", &self.physical_reads())
            .finish()
    }
}

struct ReadLoop {
    input: Input,
    hub: Hub<u8>,
    state: Arc<Mutex<LoopState>>,
    hook: Arc<Mutex<Option<TerminateHook>>>,
    reads: Arc<AtomicU64>,
}

impl ReadLoop {
    fn run(mut self) {
        debug!("byte stream read loop started");
        let mut byte = [0u8; 1];

        let termination = loop {
            self.reads.fetch_add(1, Ordering::Relaxed);
            match self.input.read(&mut byte) {
                Ok(0) => break Termination::Completed,
                Ok(_) => {
                    self.hub.publish(byte[0]);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!(error = %err, "read failed; ending byte stream");
                    break Termination::Failed(StreamError::channel_closed(&err));
                }
            }
        };

        drop(self.input);
        *self.state.lock() = LoopState::Stopped;
        debug!(reads = self.reads.load(Ordering::Relaxed), "byte stream read loop stopped");
        finish(&self.hook, &self.hub, termination);
    }
}

fn finish(hook: &Mutex<Option<TerminateHook>>, hub: &Hub<u8>, termination: Termination) {
    let hook = hook.lock().take();
    if let Some(hook) = hook {
        hook(&termination);
    }
    hub.terminate(termination);
}
