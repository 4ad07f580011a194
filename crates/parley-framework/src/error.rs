//! Error types for the Parley framework.
//!
//! Nothing in this crate catches errors. A failing handler or conversation
//! turns into a [`DispatchError`] that travels out of
//! [`EventBus::dispatch`](crate::EventBus::dispatch) unchanged, so the driver
//! can apply its failure policy.

use thiserror::Error;

use parley_core::{ChatId, EventName};

/// The error type produced by user handlers and conversations.
///
/// Any error converts into it with `?`.
pub type HandlerError = anyhow::Error;

/// Result type for user handlers and conversations.
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Errors raised while a listener processes an event.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A handler returned an error.
    #[error("handler `{handler}` failed on {event}")]
    Handler {
        /// The event being dispatched.
        event: EventName,
        /// Name of the failing handler.
        handler: String,
        /// The handler's error.
        #[source]
        source: HandlerError,
    },

    /// A suspended conversation returned an error after being resumed.
    #[error("conversation in chat {chat_id} failed")]
    Conversation {
        /// The chat the conversation belongs to.
        chat_id: ChatId,
        /// The conversation's error.
        #[source]
        source: HandlerError,
    },

    /// A handler for an event without a chat tried to open a conversation.
    #[error("handlers for {event} cannot open a conversation")]
    ConversationUnsupported {
        /// The event being dispatched.
        event: EventName,
    },

    /// A custom listener failed.
    #[error("listener `{listener}` failed")]
    Listener {
        /// Name of the failing listener.
        listener: String,
        /// The listener's error.
        #[source]
        source: HandlerError,
    },
}

impl DispatchError {
    /// Creates a handler error.
    pub fn handler(event: EventName, handler: impl Into<String>, source: HandlerError) -> Self {
        Self::Handler {
            event,
            handler: handler.into(),
            source,
        }
    }

    /// Creates a custom listener error.
    pub fn listener(listener: impl Into<String>, source: impl Into<HandlerError>) -> Self {
        Self::Listener {
            listener: listener.into(),
            source: source.into(),
        }
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
