//! Handler functions and their replies.
//!
//! A handler is any `async` function or closure taking one owned payload
//! (a [`Message`](parley_core::Message), an
//! [`InlineQuery`](parley_core::InlineQuery), ...) and returning something
//! that implements [`IntoReply`]:
//!
//! ```rust,ignore
//! // Claims every message it sees
//! async fn log_message(message: Message) {
//!     tracing::info!(text = ?message.text(), "Got message");
//! }
//!
//! // Claims, or fails the dispatch
//! async fn store(message: Message) -> anyhow::Result<()> {
//!     db.insert(&message).await?;
//!     Ok(())
//! }
//!
//! // Opens a multi-turn conversation
//! async fn register(message: Message) -> Reply {
//!     Reply::converse(|mut inbox| async move {
//!         let name = inbox.next().await;
//!         let age = inbox.next().await;
//!         Ok(())
//!     })
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::conversation::{Conversation, Inbox};
use crate::error::{HandlerError, HandlerResult};

/// A type alias for a boxed, pinned future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ============================================================================
// Reply
// ============================================================================

/// What a handler wants done with the event it was given.
pub enum Reply {
    /// The event is handled; nobody else sees it.
    Done,
    /// The handler declines; the next listener in the chain is tried.
    ///
    /// Message handlers claim every message they run on, so only inline
    /// and chosen inline result handlers act on this.
    Pass,
    /// The event is handled and the chat enters a conversation.
    Converse(Conversation),
}

impl Reply {
    /// Opens a conversation whose body receives the chat's next messages
    /// through an [`Inbox`].
    pub fn converse<F, Fut>(body: F) -> Self
    where
        F: FnOnce(Inbox) -> Fut,
        Fut: Future<Output = HandlerResult<()>> + Send + 'static,
    {
        Self::Converse(Conversation::new(body))
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Done => f.write_str("Done"),
            Self::Pass => f.write_str("Pass"),
            Self::Converse(_) => f.write_str("Converse(..)"),
        }
    }
}

// ============================================================================
// IntoReply
// ============================================================================

/// Types a handler may return.
pub trait IntoReply {
    /// Converts this value into a reply or a handler error.
    fn into_reply(self) -> HandlerResult<Reply>;
}

/// `()` claims the event.
impl IntoReply for () {
    fn into_reply(self) -> HandlerResult<Reply> {
        Ok(Reply::Done)
    }
}

impl IntoReply for Reply {
    fn into_reply(self) -> HandlerResult<Reply> {
        Ok(self)
    }
}

/// `true` maps to [`Reply::Done`], `false` to [`Reply::Pass`].
impl IntoReply for bool {
    fn into_reply(self) -> HandlerResult<Reply> {
        Ok(if self { Reply::Done } else { Reply::Pass })
    }
}

/// On `Ok`, the inner value decides. On `Err`, the dispatch fails.
impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<HandlerError>,
{
    fn into_reply(self) -> HandlerResult<Reply> {
        self.map_err(Into::into)?.into_reply()
    }
}

// ============================================================================
// Handler Trait
// ============================================================================

/// An async function over one payload type.
///
/// Implemented for every `Fn(T) -> impl Future<Output: IntoReply>`.
pub trait Handler<T>: Send + Sync + 'static {
    /// Calls the handler.
    fn call(&self, input: T) -> BoxFuture<'static, HandlerResult<Reply>>;
}

impl<F, Fut, T> Handler<T> for F
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoReply,
{
    fn call(&self, input: T) -> BoxFuture<'static, HandlerResult<Reply>> {
        let fut = (self)(input);
        Box::pin(async move { fut.await.into_reply() })
    }
}

/// A type-erased handler that can be stored in a listener.
pub type BoxedHandler<T> = Arc<dyn Fn(T) -> BoxFuture<'static, HandlerResult<Reply>> + Send + Sync>;

/// Converts a handler function into a boxed handler.
pub fn into_handler<F, T>(f: F) -> BoxedHandler<T>
where
    F: Handler<T>,
    T: 'static,
{
    Arc::new(move |input| f.call(input))
}
