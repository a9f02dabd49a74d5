//! Hot, non-replaying fan-out.
//!
//! A [`Hub`] keeps one unbounded queue per attached consumer. Publishing
//! clones the item into every queue and never blocks, so delivery to one
//! consumer is independent of how fast any other consumer drains its queue.
//! Once the hub terminates it remembers how, and late subscribers receive
//! only that terminal signal.

use std::sync::{Arc, Weak};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use tracing::trace;

use crate::error::{StreamError, WaitError};

/// How a stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The upstream reached its end normally.
    Completed,
    /// The upstream failed.
    Failed(StreamError),
}

#[derive(Debug)]
pub(crate) enum Signal<T> {
    Item(T),
    Completed,
    Failed(StreamError),
}

impl<T> From<&Termination> for Signal<T> {
    fn from(termination: &Termination) -> Self {
        match termination {
            Termination::Completed => Signal::Completed,
            Termination::Failed(err) => Signal::Failed(err.clone()),
        }
    }
}

enum Sink<T> {
    Blocking(Sender<Signal<T>>),
    #[cfg(feature = "async")]
    Async(tokio::sync::mpsc::UnboundedSender<Signal<T>>),
}

impl<T> Sink<T> {
    /// Returns false once the consumer is gone.
    fn send(&self, signal: Signal<T>) -> bool {
        match self {
            Sink::Blocking(tx) => tx.send(signal).is_ok(),
            #[cfg(feature = "async")]
            Sink::Async(tx) => tx.send(signal).is_ok(),
        }
    }
}

struct Registry<T> {
    next_id: u64,
    sinks: Vec<(u64, Sink<T>)>,
    terminal: Option<Termination>,
}

impl<T> Registry<T> {
    /// Attach a sink, or hand it the terminal signal if the hub already ended.
    fn attach(&mut self, sink: Sink<T>) -> u64 {
        if let Some(terminal) = &self.terminal {
            sink.send(terminal.into());
            return 0;
        }
        self.next_id += 1;
        self.sinks.push((self.next_id, sink));
        self.next_id
    }

    fn detach(&mut self, id: u64) {
        self.sinks.retain(|(sink_id, _)| *sink_id != id);
    }
}

/// Multicast hub delivering each published item to every current subscriber.
pub struct Hub<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> Clone for Hub<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T: Clone + Send + 'static> Hub<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                sinks: Vec::new(),
                terminal: None,
            })),
        }
    }

    /// Attach a blocking consumer. It sees items published from now on.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let id = self.registry.lock().attach(Sink::Blocking(tx));
        Subscription {
            id,
            rx,
            registry: Arc::downgrade(&self.registry),
            done: false,
        }
    }

    /// Attach an async consumer. It sees items published from now on.
    #[cfg(feature = "async")]
    pub fn subscribe_async(&self) -> AsyncSubscription<T> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let id = self.registry.lock().attach(Sink::Async(tx));
        AsyncSubscription {
            id,
            rx,
            registry: Arc::downgrade(&self.registry),
            done: false,
        }
    }

    /// Deliver `item` to every attached consumer. Returns how many received it.
    ///
    /// Items published after termination are discarded.
    pub fn publish(&self, item: T) -> usize {
        let mut registry = self.registry.lock();
        if registry.terminal.is_some() {
            return 0;
        }
        let before = registry.sinks.len();
        registry
            .sinks
            .retain(|(_, sink)| sink.send(Signal::Item(item.clone())));
        let delivered = registry.sinks.len();
        if delivered < before {
            trace!(pruned = before - delivered, "dropped detached consumers");
        }
        delivered
    }

    /// End the hub. Only the first call has any effect; returns whether it was this one.
    pub fn terminate(&self, termination: Termination) -> bool {
        let mut registry = self.registry.lock();
        if registry.terminal.is_some() {
            return false;
        }
        for (_, sink) in registry.sinks.drain(..) {
            sink.send((&termination).into());
        }
        registry.terminal = Some(termination);
        true
    }

    /// Complete the hub normally.
    pub fn complete(&self) -> bool {
        self.terminate(Termination::Completed)
    }

    /// Fail the hub with `err`.
    pub fn fail(&self, err: StreamError) -> bool {
        self.terminate(Termination::Failed(err))
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().sinks.len()
    }

    pub fn termination(&self) -> Option<Termination> {
        self.registry.lock().terminal.clone()
    }

    pub fn is_terminated(&self) -> bool {
        self.registry.lock().terminal.is_some()
    }
}

impl<T: Clone + Send + 'static> Default for Hub<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Hub<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.lock();
        f.debug_struct("Hub")
            .field("subscribers", &registry.sinks.len())
            .field("terminal", &registry.terminal)
            .finish()
    }
}

fn detach<T>(registry: &Weak<Mutex<Registry<T>>>, id: u64) {
    if id == 0 {
        return;
    }
    if let Some(registry) = registry.upgrade() {
        registry.lock().detach(id);
    }
}

/// A blocking consumer attached to a [`Hub`].
///
/// Iterating yields items until the hub completes, or yields one error and
/// then stops if the hub fails. Dropping the subscription detaches it.
pub struct Subscription<T> {
    id: u64,
    rx: Receiver<Signal<T>>,
    registry: Weak<Mutex<Registry<T>>>,
    done: bool,
}

impl<T> Subscription<T> {
    /// Wait at most `timeout` for the next item.
    ///
    /// `Ok(None)` means the stream has completed.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<T>, WaitError> {
        if self.done {
            return Ok(None);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(signal) => self.settle(signal),
            Err(RecvTimeoutError::Timeout) => Err(WaitError::Timeout),
            Err(RecvTimeoutError::Disconnected) => self.settle(Signal::Completed),
        }
    }

    /// Take the next item if one is already queued.
    pub fn try_recv(&mut self) -> Result<Option<T>, WaitError> {
        if self.done {
            return Ok(None);
        }
        match self.rx.try_recv() {
            Ok(signal) => self.settle(signal),
            Err(TryRecvError::Empty) => Err(WaitError::Empty),
            Err(TryRecvError::Disconnected) => self.settle(Signal::Completed),
        }
    }

    /// Returns true once the terminal signal has been consumed.
    pub fn is_terminated(&self) -> bool {
        self.done
    }

    // A hub dropped without terminating reads as completion.
    fn settle(&mut self, signal: Signal<T>) -> Result<Option<T>, WaitError> {
        match signal {
            Signal::Item(item) => Ok(Some(item)),
            Signal::Completed => {
                self.done = true;
                Ok(None)
            }
            Signal::Failed(err) => {
                self.done = true;
                Err(WaitError::Stream(err))
            }
        }
    }
}

impl<T> Iterator for Subscription<T> {
    type Item = Result<T, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let signal = self.rx.recv().unwrap_or(Signal::Completed);
        match self.settle(signal) {
            Ok(item) => item.map(Ok),
            Err(WaitError::Stream(err)) => Some(Err(err)),
            Err(_) => None,
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        detach(&self.registry, self.id);
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("queued", &self.rx.len())
            .field("done", &self.done)
            .finish()
    }
}

/// An async consumer attached to a [`Hub`]; the [`futures_core::Stream`]
/// counterpart of [`Subscription`].
#[cfg(feature = "async")]
pub struct AsyncSubscription<T> {
    id: u64,
    rx: tokio::sync::mpsc::UnboundedReceiver<Signal<T>>,
    registry: Weak<Mutex<Registry<T>>>,
    done: bool,
}

#[cfg(feature = "async")]
impl<T> futures_core::Stream for AsyncSubscription<T> {
    type Item = Result<T, StreamError>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;

        if self.done {
            return Poll::Ready(None);
        }
        let signal = match self.rx.poll_recv(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(signal) => signal.unwrap_or(Signal::Completed),
        };
        Poll::Ready(match signal {
            Signal::Item(item) => Some(Ok(item)),
            Signal::Completed => {
                self.done = true;
                None
            }
            Signal::Failed(err) => {
                self.done = true;
                Some(Err(err))
            }
        })
    }
}

#[cfg(feature = "async")]
impl<T> Drop for AsyncSubscription<T> {
    fn drop(&mut self) {
        detach(&self.registry, self.id);
    }
}
