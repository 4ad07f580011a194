//! Handlers for events that are not chat messages.
//!
//! Inline queries, chosen inline results and callback queries each get an
//! [`EventHandler`] with an optional predicate over the payload.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use parley_core::{CallbackQuery, ChosenInlineResult, EventName, InlineQuery, Payload};

use crate::bus::EventBus;
use crate::error::{DispatchError, DispatchResult};
use crate::handler::{BoxedHandler, IntoReply, Reply, into_handler};
use crate::listener::Listener;

/// A payload type with its own event name.
pub trait EventPayload: Clone + Send + Sync + 'static {
    /// The event this payload is dispatched under.
    const EVENT: EventName;

    /// Whether a completed handler may claim the payload.
    ///
    /// Callback queries are never claimed, so every matching callback
    /// handler runs.
    const CLAIMS: bool = true;

    /// Extracts this payload from a dispatched one.
    fn from_payload(payload: Payload<'_>) -> Option<&Self>;
}

impl EventPayload for InlineQuery {
    const EVENT: EventName = EventName::InlineQuery;

    fn from_payload(payload: Payload<'_>) -> Option<&Self> {
        match payload {
            Payload::InlineQuery(query) => Some(query),
            _ => None,
        }
    }
}

impl EventPayload for ChosenInlineResult {
    const EVENT: EventName = EventName::ChosenInlineResult;

    fn from_payload(payload: Payload<'_>) -> Option<&Self> {
        match payload {
            Payload::ChosenInlineResult(result) => Some(result),
            _ => None,
        }
    }
}

impl EventPayload for CallbackQuery {
    const EVENT: EventName = EventName::CallbackQuery;
    const CLAIMS: bool = false;

    fn from_payload(payload: Payload<'_>) -> Option<&Self> {
        match payload {
            Payload::CallbackQuery(query) => Some(query),
            _ => None,
        }
    }
}

type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// A listener running a handler function on one kind of payload.
///
/// Inline and chosen inline result handlers claim on [`Reply::Done`] and
/// decline on [`Reply::Pass`]. Callback query handlers never claim.
/// Conversations are only available to message handlers: returning
/// [`Reply::Converse`] here fails the dispatch.
pub struct EventHandler<T> {
    handler: BoxedHandler<T>,
    predicate: Option<Predicate<T>>,
    name: Option<String>,
    _payload: PhantomData<fn(T)>,
}

/// Handles inline queries.
pub type InlineHandler = EventHandler<InlineQuery>;

/// Handles chosen inline results.
pub type ChosenInlineResultHandler = EventHandler<ChosenInlineResult>;

/// Handles callback queries.
pub type CallbackQueryHandler = EventHandler<CallbackQuery>;

impl<T: EventPayload> EventHandler<T> {
    /// Creates a handler accepting every payload of type `T`.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoReply,
    {
        Self {
            handler: into_handler(f),
            predicate: None,
            name: None,
            _payload: PhantomData,
        }
    }

    /// Sets a name for logs and errors.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Restricts the handler to payloads accepted by `predicate`.
    pub fn func<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Returns the handler's name.
    pub fn get_name(&self) -> &str {
        self.name.as_deref().unwrap_or(T::EVENT.as_str())
    }
}

#[async_trait]
impl<T: EventPayload> Listener for EventHandler<T> {
    async fn call(&self, _bus: &EventBus, payload: Payload<'_>) -> DispatchResult<bool> {
        let Some(value) = T::from_payload(payload) else {
            return Ok(false);
        };
        if self.predicate.as_ref().is_some_and(|accepts| !accepts(value)) {
            trace!(handler = self.get_name(), "Predicate rejected payload");
            return Ok(false);
        }

        let reply = (self.handler)(value.clone())
            .await
            .map_err(|source| DispatchError::handler(T::EVENT, self.get_name(), source))?;

        match reply {
            Reply::Done => Ok(T::CLAIMS),
            Reply::Pass => Ok(false),
            Reply::Converse(_) => Err(DispatchError::ConversationUnsupported {
                event: T::EVENT,
            }),
        }
    }

    fn name(&self) -> &str {
        self.get_name()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parley_core::User;

    use super::*;

    fn user() -> User {
        User::new(7, "Ann")
    }

    async fn claims(bus: &EventBus, payload: Payload<'_>) -> bool {
        bus.dispatch(payload.event_name(), payload).await.unwrap()
    }

    #[tokio::test]
    async fn test_inline_handler_predicate() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        bus.append(
            EventName::InlineQuery,
            InlineHandler::new(move |_query| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .func(|query| !query.query.is_empty()),
        );

        let empty = InlineQuery::new("1", user(), "");
        let cats = InlineQuery::new("2", user(), "cats");

        assert!(!claims(&bus, Payload::InlineQuery(&empty)).await);
        assert!(claims(&bus, Payload::InlineQuery(&cats)).await);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_falsy_result_falls_through() {
        let bus = EventBus::new();
        bus.append(
            EventName::ChosenInlineResult,
            ChosenInlineResultHandler::new(|result: ChosenInlineResult| async move {
                result.result_id == "yes"
            }),
        );

        let no = ChosenInlineResult::new("no", user(), "cats");
        let yes = ChosenInlineResult::new("yes", user(), "cats");

        assert!(!claims(&bus, Payload::ChosenInlineResult(&no)).await);
        assert!(claims(&bus, Payload::ChosenInlineResult(&yes)).await);
    }

    #[tokio::test]
    async fn test_callback_handlers_never_claim() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let counter = Arc::clone(&calls);
            bus.append(
                EventName::CallbackQuery,
                CallbackQueryHandler::new(move |_query: CallbackQuery| {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        true
                    }
                }),
            );
        }

        let query = CallbackQuery::new("cb", user(), "like");

        assert!(!claims(&bus, Payload::CallbackQuery(&query)).await);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_conversation_is_rejected() {
        let bus = EventBus::new();
        bus.append(
            EventName::ChosenInlineResult,
            ChosenInlineResultHandler::new(|_result| async {
                Reply::converse(|mut inbox| async move {
                    inbox.next().await;
                    Ok(())
                })
            }),
        );

        let chosen = ChosenInlineResult::new("r1", user(), "cats");
        let payload = Payload::ChosenInlineResult(&chosen);
        let err = bus
            .dispatch(EventName::ChosenInlineResult, payload)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DispatchError::ConversationUnsupported {
                event: EventName::ChosenInlineResult
            }
        ));
        assert_eq!(bus.listener_count(EventName::Message), 0);
    }

    #[tokio::test]
    async fn test_ignores_other_payloads() {
        let handler = InlineHandler::new(|_query| async {});
        let chosen = ChosenInlineResult::new("r1", user(), "cats");

        let claimed = handler
            .call(&EventBus::new(), Payload::ChosenInlineResult(&chosen))
            .await
            .unwrap();

        assert!(!claimed);
        assert_eq!(handler.get_name(), "inline_query");
    }
}
