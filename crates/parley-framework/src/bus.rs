//! The event bus.
//!
//! An [`EventBus`] maps each [`EventName`] to an ordered chain of listeners.
//! Position in the chain is priority: index 0 is tried first.
//!
//! # Dispatch
//!
//! When a payload is dispatched:
//!
//! 1. A snapshot of the chain is taken and the lock released
//! 2. Listeners are called strictly in order
//! 3. The first listener returning `true` claims the event and ends the walk
//! 4. An error ends the walk and is returned as-is
//!
//! Because the walk iterates a snapshot, listeners may register or remove
//! other listeners while running. Changes become visible on the next dispatch.
//!
//! ```rust,ignore
//! use parley_framework::{EventBus, listener_fn};
//!
//! let bus = EventBus::new();
//! bus.append(EventName::Message, MessageHandler::new(echo));
//!
//! // Tried before `echo`
//! bus.prepend(EventName::Message, listener_fn("spam-guard", is_spam));
//!
//! let claimed = bus.dispatch(EventName::Message, Payload::Message(&msg)).await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{Instrument, debug, debug_span, trace};

use parley_core::{EventName, Payload};

use crate::error::DispatchResult;
use crate::listener::{BoxedListener, Listener, ListenerId};

#[derive(Clone)]
struct Entry {
    id: ListenerId,
    listener: BoxedListener,
}

#[derive(Default)]
struct BusInner {
    chains: RwLock<HashMap<EventName, Vec<Entry>>>,
    next_id: AtomicU64,
}

/// A registry of listener chains keyed by event name.
///
/// `EventBus` is a cheap handle: clones share the same chains.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener to the end of the chain for `event`.
    pub fn append<L>(&self, event: EventName, listener: L) -> ListenerId
    where
        L: Listener + 'static,
    {
        self.append_boxed(event, Arc::new(listener))
    }

    /// Adds a shared listener to the end of the chain for `event`.
    pub fn append_boxed(&self, event: EventName, listener: BoxedListener) -> ListenerId {
        let id = self.reserve_id();
        debug!(%event, %id, listener = listener.name(), "Appending listener");
        self.inner
            .chains
            .write()
            .entry(event)
            .or_default()
            .push(Entry { id, listener });
        id
    }

    /// Adds a listener to the front of the chain for `event`.
    pub fn prepend<L>(&self, event: EventName, listener: L) -> ListenerId
    where
        L: Listener + 'static,
    {
        self.prepend_boxed(event, Arc::new(listener))
    }

    /// Adds a shared listener to the front of the chain for `event`.
    pub fn prepend_boxed(&self, event: EventName, listener: BoxedListener) -> ListenerId {
        let id = self.reserve_id();
        self.prepend_with_id(event, id, listener);
        id
    }

    /// Allocates an id ahead of registration.
    ///
    /// Lets a listener learn its own id before it is inserted.
    pub(crate) fn reserve_id(&self) -> ListenerId {
        ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn prepend_with_id(&self, event: EventName, id: ListenerId, listener: BoxedListener) {
        debug!(%event, %id, listener = listener.name(), "Prepending listener");
        self.inner
            .chains
            .write()
            .entry(event)
            .or_default()
            .insert(0, Entry { id, listener });
    }

    /// Removes a listener from whichever chain holds it.
    ///
    /// Returns `false` if no chain contains `id`.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut chains = self.inner.chains.write();
        for (event, chain) in chains.iter_mut() {
            if let Some(index) = chain.iter().position(|entry| entry.id == id) {
                chain.remove(index);
                debug!(%event, %id, "Removed listener");
                return true;
            }
        }
        false
    }

    /// Returns whether `id` is registered under any event.
    pub fn contains(&self, id: ListenerId) -> bool {
        self.inner
            .chains
            .read()
            .values()
            .any(|chain| chain.iter().any(|entry| entry.id == id))
    }

    /// Returns the number of listeners registered for `event`.
    pub fn listener_count(&self, event: EventName) -> usize {
        self.inner.chains.read().get(&event).map_or(0, Vec::len)
    }

    /// Removes every listener.
    pub fn clear(&self) {
        self.inner.chains.write().clear();
    }

    fn snapshot(&self, event: EventName) -> Option<Vec<Entry>> {
        self.inner.chains.read().get(&event).cloned()
    }

    /// Dispatches a payload to the chain for `event`.
    ///
    /// Returns `true` if a listener claimed the payload. Listener errors are
    /// not caught.
    pub async fn dispatch(&self, event: EventName, payload: Payload<'_>) -> DispatchResult<bool> {
        let span = debug_span!("dispatch", %event);

        async move {
            let Some(chain) = self.snapshot(event) else {
                debug!("No listeners registered for event");
                return Ok(false);
            };

            for entry in &chain {
                if entry.listener.call(self, payload).await? {
                    trace!(id = %entry.id, listener = entry.listener.name(), "Event claimed");
                    return Ok(true);
                }
            }

            debug!("No listener accepted the event");
            Ok(false)
        }
        .instrument(span)
        .await
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let chains = self.inner.chains.read();
        let mut map = f.debug_map();
        for (event, chain) in chains.iter() {
            map.entry(event, &chain.len());
        }
        map.finish()
    }
}
