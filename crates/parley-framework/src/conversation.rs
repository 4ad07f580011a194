//! Resumable conversations.
//!
//! A handler that needs several messages from the same chat returns
//! [`Reply::converse`](crate::Reply::converse) with an async body. The body
//! reads follow-up messages from its [`Inbox`]:
//!
//! ```rust,ignore
//! async fn order(message: Message) -> Reply {
//!     Reply::converse(|mut inbox| async move {
//!         let pizza = inbox.next().await;
//!         let address = inbox.next().await;
//!         kitchen.submit(pizza.text(), address.text()).await?;
//!         Ok(())
//!     })
//! }
//! ```
//!
//! Every `inbox.next().await` is a suspension point. When the body is parked
//! there, a [`Continuation`] sits at the front of the message chain and
//! feeds it the next message from the same chat. Messages from other chats
//! pass by untouched. When the body returns, the continuation removes
//! itself from the bus.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::future::poll_fn;
use parking_lot::Mutex;
use tracing::{debug, trace};

use parley_core::{ChatId, EventName, Message, Payload};

use crate::bus::EventBus;
use crate::error::{DispatchError, DispatchResult, HandlerResult};
use crate::filter::{Filter, same_chat};
use crate::handler::BoxFuture;
use crate::listener::{Listener, ListenerId};

#[derive(Debug, Default)]
struct Slot {
    message: Option<Message>,
    /// Set while the body is parked on [`Inbox::next`].
    waiting: bool,
}

// ============================================================================
// Inbox
// ============================================================================

/// The receiving end of a conversation.
#[derive(Debug)]
pub struct Inbox {
    slot: Arc<Mutex<Slot>>,
}

impl Inbox {
    /// Waits for the next message from the conversation's chat.
    pub fn next(&mut self) -> NextMessage<'_> {
        NextMessage { inbox: self }
    }
}

/// Future returned by [`Inbox::next`].
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct NextMessage<'a> {
    inbox: &'a mut Inbox,
}

impl Future for NextMessage<'_> {
    type Output = Message;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Message> {
        // No waker is stored: only the continuation resumes a parked body,
        // and it polls again right after filling the slot.
        let mut slot = self.inbox.slot.lock();
        match slot.message.take() {
            Some(message) => {
                slot.waiting = false;
                Poll::Ready(message)
            }
            None => {
                slot.waiting = true;
                Poll::Pending
            }
        }
    }
}

// ============================================================================
// Conversation
// ============================================================================

/// Where a driven conversation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Parked on the inbox.
    Suspended,
    /// The body returned.
    Completed,
}

/// A suspended multi-turn computation.
pub struct Conversation {
    body: BoxFuture<'static, HandlerResult<()>>,
    slot: Arc<Mutex<Slot>>,
}

impl Conversation {
    /// Creates a conversation from its body. The body does not run until
    /// the conversation is driven.
    pub fn new<F, Fut>(body: F) -> Self
    where
        F: FnOnce(Inbox) -> Fut,
        Fut: Future<Output = HandlerResult<()>> + Send + 'static,
    {
        let slot = Arc::new(Mutex::new(Slot::default()));
        let inbox = Inbox {
            slot: Arc::clone(&slot),
        };

        Self {
            body: Box::pin(body(inbox)),
            slot,
        }
    }

    /// Places a message where the parked body will find it.
    fn feed(&mut self, message: Message) {
        self.slot.lock().message = Some(message);
    }

    /// Runs the body until it parks on the inbox or returns.
    ///
    /// Anything else the body awaits is awaited here. Must not be called
    /// again after it returned `Completed` or an error.
    async fn drive(&mut self) -> HandlerResult<Step> {
        let slot = Arc::clone(&self.slot);
        let body = &mut self.body;

        poll_fn(move |cx| match body.as_mut().poll(cx) {
            Poll::Ready(result) => Poll::Ready(result.map(|()| Step::Completed)),
            Poll::Pending if slot.lock().waiting => Poll::Ready(Ok(Step::Suspended)),
            Poll::Pending => Poll::Pending,
        })
        .await
    }
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("waiting", &self.slot.lock().waiting)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Continuation
// ============================================================================

/// A listener that resumes a parked conversation with its chat's messages.
///
/// Registered at the front of the [`EventName::Message`] chain, so it runs
/// before any ordinary handler.
pub struct Continuation {
    id: ListenerId,
    chat_id: ChatId,
    name: String,
    filter: Filter,
    /// `None` once the body has returned or failed.
    conversation: tokio::sync::Mutex<Option<Conversation>>,
}

impl Continuation {
    /// Drives a new conversation to its first suspension point.
    ///
    /// If the body parks, a continuation for `chat_id` is prepended to the
    /// message chain and its id is returned. A body that finishes right away
    /// leaves nothing behind.
    pub async fn open(
        bus: &EventBus,
        chat_id: ChatId,
        mut conversation: Conversation,
    ) -> HandlerResult<Option<ListenerId>> {
        if conversation.drive().await? == Step::Completed {
            trace!(%chat_id, "Conversation finished without suspending");
            return Ok(None);
        }

        let id = bus.reserve_id();
        let continuation = Self {
            id,
            chat_id,
            name: format!("conversation:{chat_id}"),
            filter: same_chat(chat_id),
            conversation: tokio::sync::Mutex::new(Some(conversation)),
        };
        bus.prepend_with_id(EventName::Message, id, Arc::new(continuation));
        debug!(%chat_id, %id, "Conversation suspended");

        Ok(Some(id))
    }

    /// The chat this continuation listens to.
    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }
}

#[async_trait]
impl Listener for Continuation {
    async fn call(&self, bus: &EventBus, payload: Payload<'_>) -> DispatchResult<bool> {
        let Payload::Message(message) = payload else {
            return Ok(false);
        };
        if !(self.filter)(payload) {
            return Ok(false);
        }

        let mut state = self.conversation.lock().await;
        let Some(conversation) = state.as_mut() else {
            // A failed body is exhausted; the message ends it.
            bus.remove(self.id);
            debug!(chat_id = %self.chat_id, "Closed failed conversation");
            return Ok(true);
        };

        conversation.feed(message.clone());
        match conversation.drive().await {
            Ok(Step::Suspended) => Ok(true),
            Ok(Step::Completed) => {
                *state = None;
                bus.remove(self.id);
                debug!(chat_id = %self.chat_id, "Conversation completed");
                Ok(true)
            }
            Err(source) => {
                *state = None;
                Err(DispatchError::Conversation {
                    chat_id: self.chat_id,
                    source,
                })
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio_test::task;
    use tokio_test::{assert_pending, assert_ready};

    use super::*;
    use crate::listener::listener_fn;

    fn text(chat_id: i64, text: &str) -> Message {
        Message::text_in(chat_id, text)
    }

    /// A conversation recording the text of the next `turns` messages.
    fn recorder(turns: usize, log: Arc<Mutex<Vec<String>>>) -> Conversation {
        Conversation::new(move |mut inbox| async move {
            for _ in 0..turns {
                let message = inbox.next().await;
                log.lock().push(message.text().unwrap_or_default().to_owned());
            }
            Ok(())
        })
    }

    async fn send(bus: &EventBus, message: &Message) -> DispatchResult<bool> {
        bus.dispatch(EventName::Message, Payload::Message(message)).await
    }

    #[test]
    fn test_inbox_pending_until_fed() {
        let slot = Arc::new(Mutex::new(Slot::default()));
        let mut inbox = Inbox {
            slot: Arc::clone(&slot),
        };

        let mut next = task::spawn(inbox.next());
        assert_pending!(next.poll());
        assert!(slot.lock().waiting);

        slot.lock().message = Some(text(1, "hi"));
        let message = assert_ready!(next.poll());
        assert_eq!(message.text(), Some("hi"));
        assert!(!slot.lock().waiting);
    }

    #[tokio::test]
    async fn test_conversation_resumes_in_its_chat_only() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let fallback = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fallback);
        bus.append(
            EventName::Message,
            listener_fn("fallback", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }),
        );

        let id = Continuation::open(&bus, ChatId(1), recorder(1, Arc::clone(&log)))
            .await
            .unwrap()
            .unwrap();
        assert!(bus.contains(id));

        // Another chat falls through to the fallback.
        assert!(send(&bus, &text(2, "other chat")).await.unwrap());
        assert_eq!(fallback.load(Ordering::SeqCst), 1);
        assert!(log.lock().is_empty());

        // The owning chat resumes and completes the conversation.
        assert!(send(&bus, &text(1, "answer")).await.unwrap());
        assert_eq!(*log.lock(), vec!["answer".to_owned()]);
        assert_eq!(fallback.load(Ordering::SeqCst), 1);
        assert!(!bus.contains(id));

        // Afterwards the chat reaches ordinary listeners again.
        assert!(send(&bus, &text(1, "hello again")).await.unwrap());
        assert_eq!(fallback.load(Ordering::SeqCst), 2);
        assert_eq!(log.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_conversation_spans_several_messages() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = Continuation::open(&bus, ChatId(5), recorder(3, Arc::clone(&log)))
            .await
            .unwrap()
            .unwrap();

        for word in ["one", "two"] {
            assert!(send(&bus, &text(5, word)).await.unwrap());
            assert!(bus.contains(id));
        }
        assert!(send(&bus, &text(5, "three")).await.unwrap());
        assert!(!bus.contains(id));
        assert_eq!(*log.lock(), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_conversations_in_different_chats_are_independent() {
        let bus = EventBus::new();
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        Continuation::open(&bus, ChatId(1), recorder(2, Arc::clone(&first)))
            .await
            .unwrap();
        Continuation::open(&bus, ChatId(2), recorder(2, Arc::clone(&second)))
            .await
            .unwrap();

        send(&bus, &text(2, "b1")).await.unwrap();
        send(&bus, &text(1, "a1")).await.unwrap();
        send(&bus, &text(1, "a2")).await.unwrap();
        assert_eq!(bus.listener_count(EventName::Message), 1);
        send(&bus, &text(2, "b2")).await.unwrap();

        assert_eq!(*first.lock(), vec!["a1", "a2"]);
        assert_eq!(*second.lock(), vec!["b1", "b2"]);
        assert_eq!(bus.listener_count(EventName::Message), 0);
    }

    #[tokio::test]
    async fn test_body_that_never_suspends_registers_nothing() {
        let bus = EventBus::new();
        let conversation = Conversation::new(|_inbox| async { Ok(()) });

        let id = Continuation::open(&bus, ChatId(1), conversation).await.unwrap();

        assert!(id.is_none());
        assert_eq!(bus.listener_count(EventName::Message), 0);
    }

    #[tokio::test]
    async fn test_other_awaits_do_not_count_as_suspension() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&log);
        let conversation = Conversation::new(move |mut inbox| async move {
            tokio::task::yield_now().await;
            recorded.lock().push("before".to_owned());
            let message = inbox.next().await;
            tokio::task::yield_now().await;
            recorded.lock().push(message.text().unwrap_or_default().to_owned());
            Ok(())
        });

        let id = Continuation::open(&bus, ChatId(3), conversation)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*log.lock(), vec!["before"]);

        assert!(send(&bus, &text(3, "after")).await.unwrap());
        assert_eq!(*log.lock(), vec!["before", "after"]);
        assert!(!bus.contains(id));
    }

    #[tokio::test]
    async fn test_failed_conversation_is_closed_by_next_message() {
        let bus = EventBus::new();
        let conversation = Conversation::new(|mut inbox| async move {
            let message = inbox.next().await;
            anyhow::bail!("cannot parse {:?}", message.text());
        });
        let id = Continuation::open(&bus, ChatId(9), conversation)
            .await
            .unwrap()
            .unwrap();

        let err = send(&bus, &text(9, "abc")).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Conversation {
                chat_id: ChatId(9),
                ..
            }
        ));
        assert!(bus.contains(id));

        // The exhausted continuation swallows one message and goes away.
        assert!(send(&bus, &text(9, "retry")).await.unwrap());
        assert!(!bus.contains(id));
        assert!(!send(&bus, &text(9, "again")).await.unwrap());
    }

    #[tokio::test]
    async fn test_continuation_ignores_edits() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        Continuation::open(&bus, ChatId(1), recorder(1, Arc::clone(&log)))
            .await
            .unwrap();

        let edited = text(1, "edited");
        let claimed = bus
            .dispatch(EventName::Message, Payload::EditedMessage(&edited))
            .await
            .unwrap();

        assert!(!claimed);
        assert!(log.lock().is_empty());
    }
}
