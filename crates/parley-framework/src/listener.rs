//! The listener abstraction.
//!
//! A [`Listener`] is anything the [`EventBus`] can invoke with a payload.
//! Its boolean result is the whole dispatch contract: `true` claims the
//! event and stops the chain, `false` lets the next listener try.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use parley_core::{Payload, Update};

use crate::bus::EventBus;
use crate::error::DispatchResult;

/// Handle returned when a listener is registered, used to remove it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// A callable registered on the event bus.
///
/// `bus` is the bus performing the dispatch. Listeners that register or
/// remove other listeners (or themselves) do so through it.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Handles one payload, returning whether the event was claimed.
    async fn call(&self, bus: &EventBus, payload: Payload<'_>) -> DispatchResult<bool>;

    /// A name for logs and error reports.
    fn name(&self) -> &str {
        "listener"
    }
}

/// A shared, type-erased listener.
pub type BoxedListener = Arc<dyn Listener>;

/// A listener built from a synchronous closure.
pub struct FnListener<F> {
    f: F,
    name: String,
}

/// Wraps a closure into a listener.
///
/// ```rust,ignore
/// bus.append(EventName::Update, listener_fn("audit", |payload| {
///     tracing::info!(?payload, "seen");
///     false
/// }));
/// ```
pub fn listener_fn<F>(name: impl Into<String>, f: F) -> FnListener<F>
where
    F: Fn(Payload<'_>) -> bool + Send + Sync + 'static,
{
    FnListener {
        f,
        name: name.into(),
    }
}

#[async_trait]
impl<F> Listener for FnListener<F>
where
    F: Fn(Payload<'_>) -> bool + Send + Sync + 'static,
{
    async fn call(&self, _bus: &EventBus, payload: Payload<'_>) -> DispatchResult<bool> {
        Ok((self.f)(payload))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Creates an observer for raw updates.
///
/// The closure sees every update before it is classified. The observer
/// never claims, so listeners registered after it still run.
pub fn update_observer<F>(
    name: impl Into<String>,
    f: F,
) -> FnListener<impl Fn(Payload<'_>) -> bool + Send + Sync + 'static>
where
    F: Fn(&Update) + Send + Sync + 'static,
{
    listener_fn(name, move |payload| {
        if let Payload::Update(update) = payload {
            f(update);
        }
        false
    })
}
