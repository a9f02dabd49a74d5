//! Named sources of typed notifications.
//!
//! Anything that merely republishes outside events (adapter state, discovery,
//! connection state) exposes them through [`EventSource`]: subscribe, receive
//! typed events until the subscription is dropped.

use crate::hub::{Hub, Subscription};

/// A named source of typed events.
pub trait EventSource {
    type Event: Clone + Send + 'static;

    /// Name of the source, for diagnostics.
    fn name(&self) -> &str;

    /// Start receiving events. Dropping the subscription unsubscribes.
    fn subscribe(&self) -> Subscription<Self::Event>;
}

/// An [`EventSource`] backed by a [`Hub`].
#[derive(Debug, Clone)]
pub struct EventChannel<E> {
    name: String,
    hub: Hub<E>,
}

impl<E: Clone + Send + 'static> EventChannel<E> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hub: Hub::new(),
        }
    }

    /// Deliver `event` to current subscribers.
    pub fn emit(&self, event: E) -> usize {
        self.hub.publish(event)
    }

    /// Stop the source; subscribers see completion.
    pub fn close(&self) -> bool {
        self.hub.complete()
    }

    pub fn is_closed(&self) -> bool {
        self.hub.is_terminated()
    }
}

impl<E: Clone + Send + 'static> EventSource for EventChannel<E> {
    type Event = E;

    fn name(&self) -> &str {
        &self.name
    }

    fn subscribe(&self) -> Subscription<E> {
        self.hub.subscribe()
    }
}
